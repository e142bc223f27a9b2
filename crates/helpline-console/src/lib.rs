//! Console flows for the HelplineOS call center.
//!
//! Each screen of the console is a UI-independent state object driven
//! through a [`helpline_client::Gateway`]:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     NavigationShell                         │
//! │            routes · role guards · expiry redirects          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!     ┌──────────────┬─────────┴────┬──────────────┬───────────┐
//!     ▼              ▼              ▼              ▼           ▼
//! ┌─────────┐  ┌───────────┐  ┌───────────┐  ┌─────────┐ ┌─────────┐
//! │ CallLog │  │  Contact  │  │   User    │  │  Call   │ │Dashboard│
//! │  Flow   │  │ Directory │  │   Admin   │  │ History │ │         │
//! └─────────┘  └───────────┘  └───────────┘  └─────────┘ └─────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │          SessionHolder  ──▶  SessionContext  ◀── Gateway    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use helpline_client::{ClientConfig, FileSessionStore, HttpGateway, SessionContext};
//! use helpline_console::{CallLogFlow, Redirect, SessionHolder};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::from_env()?;
//! let (session, writer) =
//!     SessionContext::new(Arc::new(FileSessionStore::new(config.session_file.clone())));
//! let gateway = Arc::new(HttpGateway::new(&config, session.clone())?);
//! let holder = SessionHolder::new(gateway.clone(), writer);
//! holder.initialize().await;
//!
//! let redirect = Redirect::parse("/calls/new?contact=42&phone=+15551234567&callEventId=900")?;
//! let flow = CallLogFlow::redirected(gateway, session, redirect.entry).await?;
//! flow.stop_stopwatch();
//! let logged = flow.submit().await?;
//! println!("logged call {}", logged.call.id);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod admin;
pub mod auth;
pub mod call_log;
pub mod dashboard;
pub mod debounce;
pub mod directory;
pub mod entry;
pub mod error;
pub mod history;
pub mod nav;
pub mod resolution;
pub mod stopwatch;

pub use admin::{check_new_password, UserAdmin, UserForm};
pub use auth::SessionHolder;
pub use call_log::{CallForm, CallLogFlow, CallLogged, EntryMode, NewContactDetails};
pub use dashboard::{DashboardSummary, SeriesPoint};
pub use debounce::{Debouncer, SearchOutcome};
pub use directory::{ContactDirectory, ContactForm};
pub use entry::{Redirect, RedirectEntry};
pub use error::{FlowError, Result};
pub use history::CallHistory;
pub use nav::{guard, visible_nav, NavigationShell, Route};
pub use resolution::{ContactResolution, ResolutionPhase};
pub use stopwatch::Stopwatch;
