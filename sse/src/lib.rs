//! Server-Sent Events (SSE) session registry and stream lifecycle.
//!
//! This crate keeps long-lived, one-way SSE streams indexed by session id and
//! lets application code push text messages to one session or to all of them.
//!
//! # Architecture
//!
//! - **Session registry**: a DashMap of session id to channel. Every operation
//!   is atomic per session id; broadcast iterates over a snapshot.
//! - **Self-healing removal**: a failed push evicts the stale session before
//!   the error is returned, so dead clients are reclaimed on first contact.
//! - **Channels**: the registry only sees the `Channel` trait. `SseChannel`
//!   is the axum implementation feeding an `Sse` response body.
//! - **Stream lifecycle**: `Manager` runs one tokio task per open stream that
//!   pulls payloads from a `Producer` and sends them through the registry until
//!   a stop predicate, an unregister, or a failure ends it.
//! - **Overwrites**: re-registering a session id completes the superseded
//!   channel and aborts the loop that owned it.
//!
//! # Example: pushing to a session
//!
//! ```rust,ignore
//! use sse::SessionId;
//!
//! let session_id = SessionId::parse("123456")?;
//! match app_state.sse_manager.registry().send(&session_id, "hello") {
//!     Ok(()) => {}
//!     Err(e) => warn!("push failed: {e}"),
//! }
//! ```
//!
//! # Modules
//!
//! - `channel`: the `Channel` contract and the axum-backed `SseChannel`
//! - `error`: `Error` and `ErrorKind` (NotConnected, DeliveryFailed, Production)
//! - `manager`: per-connection production loops and their termination causes
//! - `producer`: the `Producer` trait and the built-in clock stream
//! - `registry`: `SessionRegistry`
//! - `session`: the `SessionId` key type

pub mod channel;
pub mod error;
pub mod manager;
pub mod producer;
pub mod registry;
pub mod session;

pub use channel::{Channel, SseChannel};
pub use error::{Error, ErrorKind, Result};
pub use manager::{Manager, Termination};
pub use registry::SessionRegistry;
pub use session::SessionId;
