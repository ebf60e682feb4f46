/// Repository layer: typed operations over parameterized SQL.
///
/// Relational invariants (unique email, author FK with cascade delete) are
/// enforced by the schema in `migrations/`; the repositories surface the
/// violations as application errors.
pub mod post_repo;
pub mod user_repo;
