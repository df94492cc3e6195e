//! qline Core Library
//!
//! This crate provides the client side of qline, a shared waiting-line
//! service: the REST client, the push update channel, and the local state
//! that front ends render from.
//!
//! # Architecture
//!
//! - **Server is the source of truth**: every mutation is followed by a full
//!   re-fetch of the queue list; nothing is patched locally
//! - **Push updates only signal**: a change to the active queue triggers one
//!   re-fetch, other queues are ignored
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let credentials = Arc::new(FileCredentialStore::new(config.token_path()));
//! let session = QueueSession::from_config(&config, ReqwestTransport::new(), credentials);
//!
//! session.load().await?;
//! session.join_queue(&QueueId::from("q1")).await?;
//! let rows = render_queues(&session.snapshot());
//! ```
//!
//! # Modules
//!
//! - `session`: Queue operations (main entry point)
//! - `api`: HTTP client, transport seam and request errors
//! - `updates`: Server-sent events decoding and the reconnecting channel
//! - `state`: Observable client state
//! - `view`: Render projection
//! - `models`: Wire types
//! - `credentials`: Bearer token storage
//! - `config`: Application configuration

pub mod api;
pub mod config;
pub mod credentials;
pub mod models;
pub mod session;
pub mod state;
pub mod updates;
pub mod view;

#[cfg(test)]
mod test_support;

pub use api::{ApiClient, ReqwestTransport, RequestError, Transport};
pub use config::Config;
pub use credentials::{CredentialError, CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use models::{EntryId, Member, Queue, QueueId, QueueUpdate, User, UserId};
pub use session::{QueueSession, SessionError};
pub use state::{ClientState, SessionPhase, StateStore};
pub use updates::{spawn_update_channel, ChannelStatus, UpdateChannelConfig, UpdateEvent};
pub use view::{render_details, render_queues, Action, MemberRow, QueueRow};
