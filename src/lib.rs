//! Routing matrix and preview tap for live network video sources
//!
//! Sources discovered on the network are bound to numbered slots, slots are
//! routed to named destinations, and two pointers (preview and studio
//! monitor) tap any discoverable source for low-rate frame display.
//!
//! The native discovery, receive and send library is consumed through three
//! traits so the engine runs without it:
//!
//! - [`catalog::Discovery`] lists the sources visible right now
//! - [`monitor::CaptureBackend`] opens receive connections and yields frames
//! - [`matrix::SignalRouter`] advertises destinations and switches signals
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use ndi_matrix::catalog::{Source, SourceCatalog, StaticDiscovery};
//! use ndi_matrix::matrix::{MatrixConfig, NullRouter, RoutingEngine};
//! use ndi_matrix::monitor::{MonitorService, TestPatternCapture};
//! use ndi_matrix::{ControlServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> ndi_matrix::Result<()> {
//!     let discovery = Arc::new(StaticDiscovery::new(vec![Source::new("CAM-A", "10.0.0.5:5961")]));
//!     let engine = Arc::new(RoutingEngine::new(
//!         MatrixConfig::default(),
//!         Arc::new(SourceCatalog::new(discovery)),
//!         Arc::new(MonitorService::new(Arc::new(TestPatternCapture::default()))),
//!         Arc::new(NullRouter),
//!     ));
//!
//!     ControlServer::new(ServerConfig::default(), engine).run().await
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod matrix;
pub mod monitor;
pub mod server;
pub mod stats;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use matrix::{MatrixError, RoutingEngine};
pub use server::{ControlServer, ServerConfig};
