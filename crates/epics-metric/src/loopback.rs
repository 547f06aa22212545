// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process Channel Access client.
//!
//! [`LoopbackClient`] plays the part of both the client library and an IOC
//! hosting a fixed set of channel names. Puts are queued and only become
//! visible through [`LoopbackClient::puts`] once flushed. Used for dry runs
//! and tests.
//!
//! Clones share state, so a test can keep one clone for inspection after
//! handing another to a sink.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::client::{CaError, ChannelAccess};
use crate::encode::DbrValue;

/// A put that reached the loopback IOC.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPut {
    /// Channel name.
    pub channel: String,
    /// Value written.
    pub value: DbrValue,
}

#[derive(Debug, Default)]
struct LoopbackState {
    hosted: HashSet<String>,
    /// Handle -> channel name, for every handle not yet cleared.
    open: HashMap<u64, String>,
    /// Searches issued since the last pend.
    pending: Vec<String>,
    queued: Vec<RecordedPut>,
    delivered: Vec<RecordedPut>,
    next_handle: u64,
    searches: usize,
    pends: usize,
    flushes: usize,
    clears: usize,
    last_pend_timeout: Option<Duration>,
    fail_search: bool,
    fail_puts: bool,
    fail_flush: bool,
}

/// Loopback Channel Access client hosting an in-memory set of channels.
#[derive(Debug, Clone, Default)]
pub struct LoopbackClient {
    state: Arc<Mutex<LoopbackState>>,
}

impl LoopbackClient {
    /// Create a client whose IOC hosts `channels`.
    pub fn hosting<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let client = Self::default();
        {
            let mut state = client.state.lock();
            state.hosted.extend(channels.into_iter().map(Into::into));
        }
        client
    }

    /// Start hosting `channel`.
    pub fn host(&self, channel: impl Into<String>) {
        self.state.lock().hosted.insert(channel.into());
    }

    /// Stop hosting `channel`. Open handles to it see puts fail.
    pub fn unhost(&self, channel: &str) {
        self.state.lock().hosted.remove(channel);
    }

    /// Make every subsequent search fail without returning a handle.
    pub fn set_fail_search(&self, fail: bool) {
        self.state.lock().fail_search = fail;
    }

    /// Make every subsequent put fail.
    pub fn set_fail_puts(&self, fail: bool) {
        self.state.lock().fail_puts = fail;
    }

    /// Make every subsequent flush fail (queued puts are discarded).
    pub fn set_fail_flush(&self, fail: bool) {
        self.state.lock().fail_flush = fail;
    }

    /// Flushed puts, in order.
    pub fn puts(&self) -> Vec<RecordedPut> {
        self.state.lock().delivered.clone()
    }

    /// Flushed puts to one channel, in order.
    pub fn puts_to(&self, channel: &str) -> Vec<DbrValue> {
        self.state
            .lock()
            .delivered
            .iter()
            .filter(|p| p.channel == channel)
            .map(|p| p.value.clone())
            .collect()
    }

    /// Number of `search` calls.
    pub fn search_count(&self) -> usize {
        self.state.lock().searches
    }

    /// Number of `pend_io` calls.
    pub fn pend_count(&self) -> usize {
        self.state.lock().pends
    }

    /// Timeout passed to the most recent `pend_io`.
    pub fn last_pend_timeout(&self) -> Option<Duration> {
        self.state.lock().last_pend_timeout
    }

    /// Number of `flush_io` calls.
    pub fn flush_count(&self) -> usize {
        self.state.lock().flushes
    }

    /// Number of `clear_channel` calls.
    pub fn clear_count(&self) -> usize {
        self.state.lock().clears
    }

    /// Number of handles handed out and not yet cleared.
    pub fn open_channels(&self) -> usize {
        self.state.lock().open.len()
    }
}

impl ChannelAccess for LoopbackClient {
    type Channel = u64;

    fn search(&mut self, name: &str) -> Result<u64, CaError> {
        let mut state = self.state.lock();
        state.searches += 1;
        if state.fail_search {
            return Err(CaError::NotFound(name.to_string()));
        }
        let handle = state.next_handle;
        state.next_handle += 1;
        state.open.insert(handle, name.to_string());
        state.pending.push(name.to_string());
        Ok(handle)
    }

    fn pend_io(&mut self, timeout: Duration) -> Result<(), CaError> {
        let mut state = self.state.lock();
        state.pends += 1;
        state.last_pend_timeout = Some(timeout);
        let pending = std::mem::take(&mut state.pending);
        if pending.iter().all(|name| state.hosted.contains(name)) {
            Ok(())
        } else {
            Err(CaError::Timeout(timeout))
        }
    }

    fn put(&mut self, channel: &u64, value: &DbrValue) -> Result<(), CaError> {
        let mut state = self.state.lock();
        let name = state
            .open
            .get(channel)
            .cloned()
            .ok_or_else(|| CaError::Other(format!("unknown channel handle {}", channel)))?;
        if !state.hosted.contains(&name) {
            return Err(CaError::Disconnected(name));
        }
        if state.fail_puts {
            return Err(CaError::Put(format!("put to {} rejected", name)));
        }
        state.queued.push(RecordedPut {
            channel: name,
            value: value.clone(),
        });
        Ok(())
    }

    fn flush_io(&mut self) -> Result<(), CaError> {
        let mut state = self.state.lock();
        state.flushes += 1;
        let queued = std::mem::take(&mut state.queued);
        if state.fail_flush {
            return Err(CaError::Flush(format!("{} request(s) lost", queued.len())));
        }
        state.delivered.extend(queued);
        Ok(())
    }

    fn clear_channel(&mut self, channel: u64) -> Result<(), CaError> {
        let mut state = self.state.lock();
        state.clears += 1;
        match state.open.remove(&channel) {
            Some(_) => Ok(()),
            None => Err(CaError::Other(format!("unknown channel handle {}", channel))),
        }
    }
}
