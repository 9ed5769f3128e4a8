//! Shared error types for FromSoft Mod Manager

pub mod errors;

pub use errors::{AuthError, AuthResult};
