//! HTTP/REST API adapter.
//!
//! Inbound adapter exposing the sweep operations as REST endpoints.

mod controller;
mod response;

pub use controller::{AppState, create_router};
pub use response::*;
