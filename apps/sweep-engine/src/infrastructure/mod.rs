//! Infrastructure layer.
//!
//! Inbound adapters over the sweep core.

pub mod http;
