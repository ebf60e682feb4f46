/// Data models for the blog API
///
/// - User: registered account (the password hash never serializes)
/// - Post: text content with an optional media attachment, owned by a user
pub mod post;
pub mod user;

pub use post::{Post, PostAuthor, PostWithAuthor};
pub use user::User;
