//! Service layer providing business-oriented operations on top of models.
//! - Separates business logic from data access through repository traits.
//! - Reuses validation and entity definitions in `models` crate.
//! - Ships a SeaORM backend and an in-memory backend for both repositories.

pub mod errors;
pub mod pagination;
pub mod auth;
pub mod polls;
pub mod memory;
#[cfg(test)]
pub mod test_support;
