//! Auth module: three-layer architecture (domain, repository, service).
//!
//! Registration, login, sessions, API tokens, password management and email
//! verification live here, independent of the web framework.

pub mod domain;
pub mod errors;
pub mod mailer;
pub mod password;
pub mod repository;
pub mod repo;
pub mod service;
pub mod tokens;

pub use service::{AuthConfig, AuthService};
