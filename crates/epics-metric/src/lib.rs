// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! EPICS Channel Access metric sink
//!
//! Publishes named, typed metrics as writes to Channel Access process
//! variables.
//!
//! This crate provides:
//! - Metric name to channel name sanitization
//! - Lazy per-channel connection caching, with sticky failure for
//!   channels that do not resolve
//! - Encoding of string/int/double/float/unsigned values into the fixed
//!   width `DBR_*` field types
//! - YAML configuration for the channel prefix, connect timeout and
//!   retry policy
//!
//! # Overview
//!
//! The sink does NOT speak the Channel Access wire protocol itself. It
//! drives any client implementing [`ChannelAccess`] (search, pend, put,
//! flush, clear).
//!
//! ```text
//! metric name --> sanitize --> ChannelCache --> encode --> put + flush
//! ```
//!
//! # Example
//!
//! ```
//! use epics_metric::{EpicsMetricSink, LoopbackClient, MetricSink, SinkConfig};
//! use std::time::SystemTime;
//!
//! let client = LoopbackClient::hosting(["artdaq:Event_Rate"]);
//! let sink = EpicsMetricSink::new(SinkConfig::default(), client.clone());
//!
//! sink.start();
//! sink.send_double("Event Rate", 42.5, "Hz", SystemTime::now());
//! sink.stop();
//!
//! assert_eq!(client.puts().len(), 1);
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod encode;
pub mod loopback;
pub mod naming;
pub mod sink;
pub mod stats;

pub use cache::{ChannelCache, ChannelEntry, ChannelStatus};
pub use client::{CaError, ChannelAccess};
pub use config::{ConfigError, RetryPolicy, SinkConfig};
pub use encode::{DbrString, DbrType, DbrValue, MAX_STRING_SIZE};
pub use loopback::{LoopbackClient, RecordedPut};
pub use naming::{sanitize, ChannelId};
pub use sink::{EpicsMetricSink, MetricSink, MetricValue};
pub use stats::{SinkStats, SinkStatsSnapshot};
