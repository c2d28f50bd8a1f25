//! Source catalog adapter
//!
//! Read-only view of the sources the native discovery library can currently
//! see. The catalog never touches routing state: a source being discovered
//! and a source being in use (bound to a slot) are separate facts.

pub mod config;
pub mod source;
pub mod store;

pub use config::CatalogConfig;
pub use source::{Discovery, Source, StaticDiscovery};
pub use store::SourceCatalog;
