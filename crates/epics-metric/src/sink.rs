// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Metric sink orchestrator.
//!
//! Connects name sanitization, the channel cache and value encoding into a
//! single entry point. Every send is handled synchronously:
//!
//! ```text
//! name -> ChannelId -> ensure_connected -> encode -> put -> flush
//! ```
//!
//! Failures never reach the caller. A channel that cannot be found drops
//! its metrics silently after one warning; a failed put or flush is logged
//! and the channel is tried again on the next send.

use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use crate::cache::{ChannelCache, ChannelStatus};
use crate::client::ChannelAccess;
use crate::config::SinkConfig;
use crate::encode::{self, DbrValue};
use crate::naming::{self, ChannelId};
use crate::stats::{SinkStats, SinkStatsSnapshot};

/// A typed metric value.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    String(String),
    Int(i32),
    Unsigned(u64),
    Double(f64),
    Float(f32),
}

/// Capability interface implemented by metric backends.
///
/// Hosts hold an `Arc<dyn MetricSink>` and may call the send methods from a
/// reporting thread while another thread calls [`stop`](MetricSink::stop).
/// None of the methods report errors; a backend absorbs and logs them.
pub trait MetricSink: Send + Sync {
    /// Short backend name.
    fn lib_name(&self) -> &'static str;

    /// Called before the first send.
    fn start(&self);

    /// Release every resource held for sending. Safe to call repeatedly.
    fn stop(&self);

    /// Send a string metric.
    fn send_string(&self, name: &str, value: &str, unit: &str, timestamp: SystemTime);

    /// Send a signed integer metric.
    fn send_int(&self, name: &str, value: i32, unit: &str, timestamp: SystemTime);

    /// Send a double metric.
    fn send_double(&self, name: &str, value: f64, unit: &str, timestamp: SystemTime);

    /// Send a float metric.
    fn send_float(&self, name: &str, value: f32, unit: &str, timestamp: SystemTime);

    /// Send an unsigned integer metric.
    fn send_unsigned(&self, name: &str, value: u64, unit: &str, timestamp: SystemTime);

    /// Dispatch a [`MetricValue`] to the matching typed send.
    fn send_metric(&self, name: &str, value: &MetricValue, unit: &str, timestamp: SystemTime) {
        match value {
            MetricValue::String(v) => self.send_string(name, v, unit, timestamp),
            MetricValue::Int(v) => self.send_int(name, *v, unit, timestamp),
            MetricValue::Unsigned(v) => self.send_unsigned(name, *v, unit, timestamp),
            MetricValue::Double(v) => self.send_double(name, *v, unit, timestamp),
            MetricValue::Float(v) => self.send_float(name, *v, unit, timestamp),
        }
    }
}

/// Client and cache, always locked together.
struct SinkState<C: ChannelAccess> {
    client: C,
    cache: ChannelCache<C::Channel>,
}

/// [`MetricSink`] writing to EPICS Channel Access process variables.
///
/// The channel for metric `name` is `prefix:sanitized(name)`, optionally
/// followed by a per-process suffix.
pub struct EpicsMetricSink<C: ChannelAccess> {
    prefix: String,
    suffix: Option<String>,
    state: Mutex<SinkState<C>>,
    stats: SinkStats,
}

impl<C: ChannelAccess> EpicsMetricSink<C> {
    /// Create a sink driving `client`.
    pub fn new(config: SinkConfig, client: C) -> Self {
        let suffix = config.unique_channel_names.then(naming::process_suffix);
        let cache = ChannelCache::new(config.connect_timeout(), config.retry_policy());

        Self {
            prefix: config.channel_name_prefix,
            suffix,
            state: Mutex::new(SinkState { client, cache }),
            stats: SinkStats::new(),
        }
    }

    /// Channel name used for metric `name`.
    pub fn channel_id(&self, name: &str) -> ChannelId {
        let id = naming::sanitize(&self.prefix, name);
        match &self.suffix {
            Some(suffix) => id.with_suffix(suffix),
            None => id,
        }
    }

    /// Cache state of the channel used for metric `name`.
    pub fn channel_status(&self, name: &str) -> ChannelStatus {
        let id = self.channel_id(name);
        self.state.lock().cache.status(&id)
    }

    /// Current statistics.
    pub fn stats(&self) -> SinkStatsSnapshot {
        let state = self.state.lock();
        self.stats
            .snapshot(state.cache.connected_count(), state.cache.failed_count())
    }

    /// Release all channels, returning how many handles were cleared.
    pub fn release_channels(&self) -> usize {
        let mut state = self.state.lock();
        let SinkState { client, cache } = &mut *state;
        cache.release_all(client)
    }

    /// `dropped_unit` is noted before the lookup, so it is logged even when
    /// the channel turns out to be unreachable.
    fn send_with<F>(&self, name: &str, dropped_unit: &str, timestamp: SystemTime, make_value: F)
    where
        F: FnOnce() -> DbrValue,
    {
        let id = self.channel_id(name);
        encode::note_dropped_unit(id.as_str(), dropped_unit);

        let mut state = self.state.lock();
        let SinkState { client, cache } = &mut *state;

        if !cache.ensure_connected(client, &id) {
            self.stats.record_dropped();
            return;
        }
        let Some(handle) = cache.handle(&id) else {
            self.stats.record_dropped();
            return;
        };

        let value = make_value();
        log::debug!(
            "Putting value {} ({}) into {} [t={:.3}]",
            value,
            value.dbr_type(),
            id,
            epoch_seconds(timestamp)
        );

        match client.put(handle, &value).and_then(|()| client.flush_io()) {
            Ok(()) => self.stats.record_sent(),
            Err(e) => {
                log::warn!("Failed to write to channel \"{}\": {}", id, e);
                self.stats.record_write_error();
            }
        }
    }
}

impl<C: ChannelAccess> MetricSink for EpicsMetricSink<C> {
    fn lib_name(&self) -> &'static str {
        "epics"
    }

    fn start(&self) {
        log::info!("EPICS metric sink started (prefix \"{}\")", self.prefix);
    }

    fn stop(&self) {
        let released = self.release_channels();
        log::info!("EPICS metric sink stopped, released {} channel(s)", released);
    }

    fn send_string(&self, name: &str, value: &str, unit: &str, timestamp: SystemTime) {
        self.send_with(name, "", timestamp, || encode::encode_string(value, unit));
    }

    fn send_int(&self, name: &str, value: i32, unit: &str, timestamp: SystemTime) {
        self.send_with(name, unit, timestamp, || encode::encode_int(value));
    }

    fn send_double(&self, name: &str, value: f64, unit: &str, timestamp: SystemTime) {
        self.send_with(name, unit, timestamp, || encode::encode_double(value));
    }

    fn send_float(&self, name: &str, value: f32, unit: &str, timestamp: SystemTime) {
        self.send_with(name, unit, timestamp, || encode::encode_float(value));
    }

    fn send_unsigned(&self, name: &str, value: u64, unit: &str, timestamp: SystemTime) {
        self.send_with(name, unit, timestamp, || encode::encode_unsigned(value));
    }
}

impl<C: ChannelAccess> Drop for EpicsMetricSink<C> {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        let SinkState { client, cache } = state;
        cache.release_all(client);
    }
}

fn epoch_seconds(timestamp: SystemTime) -> f64 {
    timestamp
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
