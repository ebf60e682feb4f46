//! Credential and token primitives shared by the blog backend
//!
//! Password hashing (Argon2id) and JWT issuing/validation (HS256) live here
//! so that handlers and middleware depend on one vetted implementation.

pub mod jwt;
pub mod password;
