pub mod capital;
pub mod post;
pub mod user;

pub use capital::Capital;
pub use post::{NewPost, PostStatus, ValidationError, validate_new_post};
pub use user::UserRole;
