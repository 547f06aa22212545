// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Metric name to Channel Access channel name translation.
//!
//! Metric names coming from the host are free-form ("Detector Rate/Value 1").
//! Channel Access names use `:` as namespace separator and must not contain
//! spaces, so names are rewritten before any channel lookup.

use std::fmt;

/// Sanitized, prefixed Channel Access channel name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(String);

impl ChannelId {
    /// Wrap an already sanitized channel name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Channel name as sent to the client.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Append a suffix (used for per-process unique channel names).
    pub fn with_suffix(mut self, suffix: &str) -> Self {
        self.0.push_str(suffix);
        self
    }

    /// Consume the id, returning the channel name.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ChannelId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Translate a raw metric name into a channel name under `prefix`.
///
/// Rules, in order:
/// - spaces become `_`
/// - `.` becomes `:`
/// - `/` becomes `_`
/// - every `_%` (index placeholder artifact) is removed
/// - the result is prefixed with `prefix:`
///
/// ```
/// use epics_metric::sanitize;
///
/// let id = sanitize("artdaq", "Detector Rate/Value 1.count_%");
/// assert_eq!(id.as_str(), "artdaq:Detector_Rate_Value_1:count");
/// ```
pub fn sanitize(prefix: &str, raw_name: &str) -> ChannelId {
    let mut name: String = raw_name
        .chars()
        .map(|c| match c {
            ' ' | '/' => '_',
            '.' => ':',
            other => other,
        })
        .collect();

    // Removing one "_%" can splice a new one together ("__%%"), so loop.
    while name.contains("_%") {
        name = name.replace("_%", "");
    }

    let mut channel = String::with_capacity(prefix.len() + 1 + name.len());
    channel.push_str(prefix);
    channel.push(':');
    channel.push_str(&name);

    log::trace!("Channel name is: \"{}\"", channel);
    ChannelId(channel)
}

/// Suffix appended to every channel name when unique channel names are
/// requested. Identifies the current process.
pub fn process_suffix() -> String {
    format!("_{}", std::process::id())
}
