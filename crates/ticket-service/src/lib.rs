//! `ticketd`: HTTP front end for the ticket lifecycle engine

pub mod api;
pub mod config;

pub use api::{router, ApiError, AppState};
pub use config::{ServerConfig, ServiceConfig};
