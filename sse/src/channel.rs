//! The channel collaborator: one open outbound stream to one client.
//!
//! The registry only ever talks to the [`Channel`] trait. [`SseChannel`] is the
//! axum-backed implementation: pushes are queued on an unbounded mpsc channel
//! and drained by the HTTP response stream returned from [`SseChannel::open`].

use crate::error::{Error, Result};
use async_stream::stream;
use axum::response::sse::Event;
use futures::Stream;
use log::*;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc::{self, UnboundedSender};

/// Name of the SSE event emitted right before a stream ends with an error.
pub const ERROR_EVENT: &str = "error";

/// Contract every transport must satisfy to be held by the registry.
pub trait Channel: Send + Sync {
    /// Push one text payload to the client. Fails once the client is gone or
    /// the channel has been completed.
    fn push(&self, payload: &str) -> Result<()>;

    /// End the stream normally.
    fn complete(&self);

    /// End the stream, telling the client why.
    fn complete_with_error(&self, error: &Error);

    fn is_open(&self) -> bool;
}

/// Response body stream handed to axum's `Sse`.
pub type ChannelStream =
    Pin<Box<dyn Stream<Item = core::result::Result<Event, Infallible>> + Send>>;

#[derive(Debug)]
enum Frame {
    Data(String),
    Error(String),
}

/// Channel backed by an axum SSE response.
pub struct SseChannel {
    // `None` once the channel has been completed.
    sender: Mutex<Option<UnboundedSender<Frame>>>,
}

impl SseChannel {
    /// Create a channel together with the response stream it feeds.
    pub fn open() -> (Self, ChannelStream) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();

        let stream = stream! {
            while let Some(frame) = rx.recv().await {
                match frame {
                    Frame::Data(data) => yield Ok::<Event, Infallible>(Event::default().data(data)),
                    Frame::Error(message) => {
                        yield Ok::<Event, Infallible>(Event::default().event(ERROR_EVENT).data(message));
                        break;
                    }
                }
            }
            trace!("SSE channel stream finished");
        };

        let channel = Self {
            sender: Mutex::new(Some(tx)),
        };

        (channel, Box::pin(stream))
    }

    fn take_sender(&self) -> Option<UnboundedSender<Frame>> {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl Channel for SseChannel {
    fn push(&self, payload: &str) -> Result<()> {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(sender) => sender
                .send(Frame::Data(payload.to_string()))
                .map_err(|_| Error::delivery_failed("client disconnected")),
            None => Err(Error::delivery_failed("channel already completed")),
        }
    }

    fn complete(&self) {
        // Dropping the last sender ends the response stream.
        drop(self.take_sender());
    }

    fn complete_with_error(&self, error: &Error) {
        if let Some(sender) = self.take_sender() {
            // The client may already be gone; nothing left to tell it then.
            let _ = sender.send(Frame::Error(error.to_string()));
        }
    }

    fn is_open(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|sender| !sender.is_closed())
    }
}
