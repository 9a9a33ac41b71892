//! HTTP front door for Dockhand.
//!
//! Turns manual requests and GitHub push webhooks into queued jobs, and exposes the
//! queue's sizes, pending deliveries and failures.

pub mod error;
pub mod routes;
pub mod state;

pub use state::AppState;
