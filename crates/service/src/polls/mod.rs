//! Poll store: questions own choices, choices own votes.
//!
//! Only *published* questions (publication date reached and at least one
//! choice) are visible, and every nested route is checked against its parent.

pub mod domain;
pub mod repository;
pub mod repo;
pub mod service;

pub use service::PollService;
