/// HTTP endpoint handlers
pub mod posts;
pub mod users;
