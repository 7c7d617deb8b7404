//! HTTP surface for the Spindrift streaming engine.
//!
//! JSON management endpoints plus the progressive `/stream` path that
//! serves ranges out of partially assembled jobs. All handlers share one
//! [`server::AppState`]; the content source behind it is whatever
//! [`spindrift_core::ContentSource`] the binary wires in.

pub mod handlers;
pub mod server;

pub use server::{AppState, router, run_server};
