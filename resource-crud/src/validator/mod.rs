//! Input and output shapes for resources
//!
//! Each resource declares a write-shape (what create / update accept) and a
//! read-shape (what responses project). Write-shapes are validated with the
//! `validator` derive; read-shapes are built from persisted records and
//! always drop their excluded fields.
//!
//! # Example
//!
//! ```rust,ignore
//! use resource_crud::validator::{ReadShape, WriteShape};
//! use serde::{Deserialize, Serialize};
//! use validator::Validate;
//!
//! #[derive(Debug, Serialize, Deserialize, Validate)]
//! struct NewUser {
//!     #[validate(email)]
//!     email: String,
//!     #[validate(length(min = 8))]
//!     password: String,
//! }
//!
//! impl WriteShape for NewUser {}
//!
//! #[derive(Debug, Serialize)]
//! struct UserView {
//!     id: i64,
//!     email: String,
//!     password_hash: String,
//! }
//!
//! impl ReadShape for UserView {
//!     const EXCLUDE_FIELDS: &'static [&'static str] = &["password_hash"];
//! }
//! ```

mod error;
mod shape;

pub use error::{FieldError, ValidationFailure};
pub use shape::{parse_write, validate_write, Projection, ReadShape, WriteShape};
