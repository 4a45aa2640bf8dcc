pub mod auth;
pub mod health;
pub mod oauth2;
