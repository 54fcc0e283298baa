pub use super::items::Entity as Items;
pub use super::post_members::Entity as PostMembers;
pub use super::posts::Entity as Posts;
pub use super::users::Entity as Users;
