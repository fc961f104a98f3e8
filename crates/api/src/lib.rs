//! Connected website API
//!
//! Backend for the contact form: stateless CSRF tokens, hCaptcha
//! verification, submission storage and notification email.
//! The server binary is `connected-api`.

pub mod config;
pub mod db;
pub mod error;
pub mod form;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use state::{AppState, Collaborators};
