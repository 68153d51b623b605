//! SSE HTTP handlers for the web layer.
//!
//! This module only accepts inbound stream requests and hands the new channel
//! to the stream manager. The registry, channels and production loops live in
//! the `sse` crate.

pub mod handler;
