pub mod approval;
pub mod artifacts;
pub mod auth;
pub mod config;
pub mod db;
pub mod docgen;
pub mod error;
pub mod mailer;
pub mod models;
pub mod notify;
pub mod routes;
pub mod schema;
pub mod shares;
pub mod state;
pub mod utils;
