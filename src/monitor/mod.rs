//! Preview/monitor service
//!
//! Two pointers ("preview" and "studio monitor") each name a catalog source
//! directly, independent of the routing matrix. A bound pointer runs one
//! background capture task that keeps the latest decoded frame in a
//! single-slot cache.
//!
//! ```text
//!   set_pointer(kind, source)
//!          │
//!          ▼
//!   ┌──────────────┐ tick (100ms) ┌────────────────┐  BGRA   ┌──────────────┐
//!   │ capture task │─────────────►│ FrameReceiver  │────────►│ PreviewFrame │
//!   │  (epoch n)   │              │ (blocking pool)│         │    (RGB)     │
//!   └──────────────┘              └────────────────┘         └──────┬───────┘
//!                                                                   │ store if epoch == n
//!                                                                   ▼
//!                                                            ┌──────────────┐
//!                                            frame(kind) ◄───│  FrameSlot   │
//!                                                            └──────────────┘
//! ```

pub mod capture;
pub mod config;
pub mod frame;
pub mod service;

pub use capture::{CaptureBackend, CapturedFrame, FrameReceiver, PatternMode, TestPatternCapture};
pub use config::MonitorConfig;
pub use frame::{FrameError, PreviewFrame};
pub use service::{ClearedPointer, Detached, MonitorService, PointerKind, PointerState};
