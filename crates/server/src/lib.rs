//! HTTP API and chat command surfaces for session-watch.

pub mod chat;
pub mod destinations;
pub mod error;
pub mod preview;
pub mod rate_limiter;
pub mod routes;
pub mod search_state;
pub mod state;
