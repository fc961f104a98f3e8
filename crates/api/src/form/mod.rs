//! Contact form security and validation.
//!
//! - Stateless CSRF token issuance and verification
//! - Origin allow-list checks
//! - Field validation for submitted forms

pub mod csrf;
pub mod origin;
pub mod validate;

pub use csrf::{CsrfError, CsrfSigner, CsrfToken};
pub use origin::OriginPolicy;
pub use validate::{FieldError, validate_fields};
