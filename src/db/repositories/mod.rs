pub mod item;
pub mod membership;
pub mod post;
pub mod user;
