//! Domain types and pure logic for the asynchronous video-generation
//! workflow (quote -> submit -> poll -> complete).
//!
//! Nothing in this crate performs I/O. The HTTP side lives behind the
//! [`transport::Transport`] trait, implemented by `vidgen-client`.

pub mod catalog;
pub mod decode;
pub mod error;
pub mod lifecycle;
pub mod rate_limit;
pub mod retry;
pub mod transport;
pub mod types;
