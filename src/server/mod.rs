//! HTTP control surface

pub mod api;
pub mod config;
pub mod listener;
pub mod routes;

pub use config::ServerConfig;
pub use listener::ControlServer;
pub use routes::{app, router};
