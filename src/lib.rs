pub mod auth;
pub mod blob;
pub mod config;
pub mod dto;
pub mod handlers;
pub mod mail;
pub mod models;
pub mod pagination;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod utils;
