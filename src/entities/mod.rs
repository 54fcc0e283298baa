pub mod prelude;

pub mod items;
pub mod post_members;
pub mod posts;
pub mod users;
