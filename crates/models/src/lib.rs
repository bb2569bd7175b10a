pub mod errors;
pub mod db;
pub mod validate;
pub mod user;
pub mod user_credentials;
pub mod auth_token;
pub mod user_session;
pub mod question;
pub mod choice;
pub mod vote;
