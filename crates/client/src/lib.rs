//! Client for the asynchronous video-generation workflow.
//!
//! [`orchestrator::JobOrchestrator`] drives quote -> submit -> poll ->
//! complete over any [`vidgen_core::transport::Transport`];
//! [`api::HttpTransport`] is the reqwest-backed implementation and
//! [`config::ClientConfig`] wires both from the environment.

pub mod api;
pub mod config;
pub mod orchestrator;

pub use orchestrator::{JobOrchestrator, RunOptions};
pub use tokio_util::sync::CancellationToken;
