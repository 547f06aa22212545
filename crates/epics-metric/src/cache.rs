// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-channel connection cache.
//!
//! Channels are searched lazily on first use. A channel that does not
//! resolve is remembered as failed so later sends to it cost nothing and
//! do not hit the network again.
//!
//! # State machine
//!
//! ```text
//!                 search + pend ok
//!   Unconnected ---------------------> Connected(handle)
//!        |
//!        | search or pend failed
//!        v
//!     Failed { since } --(cooldown elapsed, opt-in)--> Unconnected
//! ```
//!
//! With the default [`RetryPolicy::Never`] both `Connected` and `Failed`
//! are terminal until [`ChannelCache::release_all`].

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::client::ChannelAccess;
use crate::config::RetryPolicy;
use crate::naming::ChannelId;

/// State of one channel.
#[derive(Debug)]
pub enum ChannelEntry<H> {
    /// No search has been attempted yet.
    Unconnected,
    /// Search resolved; owns the client handle.
    Connected(H),
    /// Search did not resolve.
    Failed {
        /// When the failing search completed.
        since: Instant,
    },
}

impl<H> ChannelEntry<H> {
    /// Handle-free view of this entry.
    pub fn status(&self) -> ChannelStatus {
        match self {
            ChannelEntry::Unconnected => ChannelStatus::Unconnected,
            ChannelEntry::Connected(_) => ChannelStatus::Connected,
            ChannelEntry::Failed { .. } => ChannelStatus::Failed,
        }
    }
}

/// Handle-free channel state, for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    /// Not looked up yet, or forgotten by a release.
    Unconnected,
    /// Holds a live handle.
    Connected,
    /// Last search did not resolve.
    Failed,
}

/// Mapping from channel name to connection state.
pub struct ChannelCache<H> {
    entries: HashMap<ChannelId, ChannelEntry<H>>,
    connect_timeout: Duration,
    retry: RetryPolicy,
}

impl<H> ChannelCache<H> {
    /// Create an empty cache.
    pub fn new(connect_timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            entries: HashMap::new(),
            connect_timeout,
            retry,
        }
    }

    /// Make sure `id` has a connected handle, searching for it if needed.
    ///
    /// Returns `true` if the channel can be written to. Only the first
    /// lookup of a channel (or the first after a retry cooldown) talks to
    /// the client; failures log a warning once per attempt.
    pub fn ensure_connected<C>(&mut self, client: &mut C, id: &ChannelId) -> bool
    where
        C: ChannelAccess<Channel = H>,
    {
        let entry = self
            .entries
            .entry(id.clone())
            .or_insert(ChannelEntry::Unconnected);

        match entry {
            ChannelEntry::Connected(_) => return true,
            ChannelEntry::Failed { since } => match self.retry.cooldown() {
                Some(cooldown) if since.elapsed() >= cooldown => {
                    log::debug!("Retrying search for channel \"{}\"", id);
                }
                _ => return false,
            },
            ChannelEntry::Unconnected => {}
        }

        *entry = match connect(client, id, self.connect_timeout) {
            Some(handle) => ChannelEntry::Connected(handle),
            None => ChannelEntry::Failed {
                since: Instant::now(),
            },
        };
        matches!(entry, ChannelEntry::Connected(_))
    }

    /// Handle of a connected channel.
    pub fn handle(&self, id: &ChannelId) -> Option<&H> {
        match self.entries.get(id) {
            Some(ChannelEntry::Connected(handle)) => Some(handle),
            _ => None,
        }
    }

    /// Current state of `id`; unknown channels are `Unconnected`.
    pub fn status(&self, id: &ChannelId) -> ChannelStatus {
        self.entries
            .get(id)
            .map_or(ChannelStatus::Unconnected, ChannelEntry::status)
    }

    /// Clear every connected handle and forget every entry.
    ///
    /// Returns the number of handles released. Errors from the client are
    /// logged; the entry is dropped regardless.
    pub fn release_all<C>(&mut self, client: &mut C) -> usize
    where
        C: ChannelAccess<Channel = H>,
    {
        let mut released = 0;
        for (id, entry) in self.entries.drain() {
            if let ChannelEntry::Connected(handle) = entry {
                if let Err(e) = client.clear_channel(handle) {
                    log::warn!("Failed to clear channel \"{}\": {}", id, e);
                }
                released += 1;
            }
        }
        released
    }

    /// Number of known channels (any state).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no channel has been looked up since the last release.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of channels with a live handle.
    pub fn connected_count(&self) -> usize {
        self.count(ChannelStatus::Connected)
    }

    /// Number of channels remembered as failed.
    pub fn failed_count(&self) -> usize {
        self.count(ChannelStatus::Failed)
    }

    fn count(&self, status: ChannelStatus) -> usize {
        self.entries
            .values()
            .filter(|e| e.status() == status)
            .count()
    }
}

/// Search for a channel and wait for it to resolve.
fn connect<C: ChannelAccess>(client: &mut C, id: &ChannelId, timeout: Duration) -> Option<C::Channel> {
    let handle = match client.search(id.as_str()) {
        Ok(handle) => handle,
        Err(e) => {
            log::warn!("Channel \"{}\" not found! ({})", id, e);
            return None;
        }
    };

    match client.pend_io(timeout) {
        Ok(()) => {
            log::debug!("Connected to channel \"{}\"", id);
            Some(handle)
        }
        Err(e) => {
            if let Err(clear_err) = client.clear_channel(handle) {
                log::debug!("Clearing unresolved channel \"{}\" failed: {}", id, clear_err);
            }
            log::warn!("Channel \"{}\" not found! ({})", id, e);
            None
        }
    }
}
