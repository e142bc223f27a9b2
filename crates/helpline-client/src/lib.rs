//! Typed access to the HelplineOS API.
//!
//! This crate provides:
//!
//! - [`Gateway`]: the trait every console flow talks to
//! - [`HttpGateway`]: the reqwest implementation with bearer authentication
//! - [`SessionContext`]: the shared, observable authenticated session
//! - [`ClientConfig`]: API location, timeouts and session file settings
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use helpline_client::{ClientConfig, FileSessionStore, Gateway, HttpGateway, SessionContext};
//!
//! # async fn example() -> helpline_client::Result<()> {
//! let config = ClientConfig::from_env()?;
//! let store = Arc::new(FileSessionStore::new(config.session_file.clone()));
//! let (session, writer) = SessionContext::new(store);
//! writer.restore();
//!
//! let gateway = HttpGateway::new(&config, session)?;
//! let stats = gateway.call_stats().await?;
//! println!("{} calls today", stats.calls_today);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod session;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use gateway::Gateway;
pub use http::HttpGateway;
pub use session::{
    FileSessionStore, MemorySessionStore, Session, SessionContext, SessionEvent, SessionStore,
    SessionWriter,
};

#[cfg(any(test, feature = "test-utils"))]
pub use mock::{Op, RecordedRequest, RecordingGateway};
