// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Channel Access client seam.
//!
//! The sink never talks to an IOC directly. It drives a client through the
//! five calls below, mirroring the `ca_search` / `ca_pend_io` / `ca_put` /
//! `ca_flush_io` / `ca_clear_channel` sequence of the C client library.

use std::time::Duration;

use thiserror::Error;

use crate::encode::DbrValue;

/// Errors reported by a Channel Access client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaError {
    /// Outstanding searches did not complete within the pend timeout.
    #[error("timed out after {0:?} waiting for channel resolution")]
    Timeout(Duration),

    /// No IOC answered for the channel.
    #[error("channel not found: {0}")]
    NotFound(String),

    /// The channel handle is no longer connected.
    #[error("channel disconnected: {0}")]
    Disconnected(String),

    /// The put request was rejected.
    #[error("put failed: {0}")]
    Put(String),

    /// The flush of buffered requests failed.
    #[error("flush failed: {0}")]
    Flush(String),

    /// Any other client-side failure.
    #[error("channel access error: {0}")]
    Other(String),
}

/// Operations the sink needs from a Channel Access client.
///
/// `search` only queues the lookup; resolution is confirmed by the next
/// `pend_io`. A handle returned by `search` must be handed back through
/// `clear_channel` if the pend fails.
pub trait ChannelAccess: Send {
    /// Client-side handle for one channel.
    type Channel: Send;

    /// Queue a search for `name` and return its (not yet resolved) handle.
    fn search(&mut self, name: &str) -> Result<Self::Channel, CaError>;

    /// Block until outstanding searches resolve or `timeout` expires.
    fn pend_io(&mut self, timeout: Duration) -> Result<(), CaError>;

    /// Queue a write of `value` to `channel`.
    fn put(&mut self, channel: &Self::Channel, value: &DbrValue) -> Result<(), CaError>;

    /// Send every queued request, blocking until transmitted.
    fn flush_io(&mut self) -> Result<(), CaError>;

    /// Release a channel handle.
    fn clear_channel(&mut self, channel: Self::Channel) -> Result<(), CaError>;
}
