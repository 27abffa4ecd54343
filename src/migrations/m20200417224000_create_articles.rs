use super::Migration;

pub fn migration() -> Migration {
    Migration::new("20200417224000_create_articles", |m| {
        m.create_table("articles", |t| {
            t.references("user_id", "users").not_null();
            t.string("title");
            t.string("text");
            t.string("image");
            t.datetime("post_date");

            t.timestamps();
        });
    })
}
