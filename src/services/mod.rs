//! Business operations. Handlers stay thin and call into these.

pub mod auth;
pub mod category;
pub mod event;
pub mod file;
pub mod ticket;
pub mod token;
pub mod user;
