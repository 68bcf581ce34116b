pub mod auth;
pub mod config;
pub mod db;
pub mod documents;
pub mod error;
pub mod models;
pub mod notifications;
pub mod routes;
pub mod schema;
pub mod seed;
pub mod state;
pub mod utils;
