// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end behaviour of the EPICS metric sink against the loopback
//! client: caching, sticky failures, encoding limits and shutdown.

use std::sync::{Arc, Barrier, OnceLock};
use std::thread;
use std::time::{Duration, SystemTime};

use epics_metric::{
    ChannelStatus, DbrValue, EpicsMetricSink, LoopbackClient, MetricSink, SinkConfig,
    MAX_STRING_SIZE,
};
use parking_lot::Mutex;

// ---------------------------------------------------------------------------
// Log capture
// ---------------------------------------------------------------------------

struct CaptureLogger {
    records: Mutex<Vec<(log::Level, String)>>,
}

impl log::Log for CaptureLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        self.records
            .lock()
            .push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

fn logger() -> &'static CaptureLogger {
    static LOGGER: OnceLock<&'static CaptureLogger> = OnceLock::new();
    LOGGER.get_or_init(|| {
        let logger: &'static CaptureLogger = Box::leak(Box::new(CaptureLogger {
            records: Mutex::new(Vec::new()),
        }));
        log::set_logger(logger).expect("logger installed once");
        log::set_max_level(log::LevelFilter::Trace);
        logger
    })
}

/// Records at `level` mentioning `channel`. Tests use distinct channel
/// names so parallel tests do not see each other's records.
fn records_for(level: log::Level, channel: &str) -> Vec<String> {
    logger()
        .records
        .lock()
        .iter()
        .filter(|(l, msg)| *l == level && msg.contains(channel))
        .map(|(_, msg)| msg.clone())
        .collect()
}

fn warnings_for(channel: &str) -> usize {
    records_for(log::Level::Warn, channel).len()
}

fn unit_notes_for(channel: &str) -> Vec<String> {
    records_for(log::Level::Debug, channel)
        .into_iter()
        .filter(|msg| msg.contains("not transmitted"))
        .collect()
}

fn sink(client: &LoopbackClient) -> EpicsMetricSink<LoopbackClient> {
    EpicsMetricSink::new(SinkConfig::default(), client.clone())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn test_sticky_failure_one_search_one_warning() {
    logger();
    let client = LoopbackClient::hosting(Vec::<String>::new());
    let sink = sink(&client);

    for i in 0..25 {
        sink.send_int("Sticky Missing", i, "", SystemTime::now());
    }

    assert_eq!(client.search_count(), 1);
    assert_eq!(warnings_for("artdaq:Sticky_Missing"), 1);
    assert!(client.puts().is_empty());
    assert_eq!(sink.stats().metrics_dropped, 25);
}

#[test]
fn test_cache_reuse_after_connect() {
    let client = LoopbackClient::hosting(["artdaq:Reuse:rate"]);
    let sink = sink(&client);

    sink.send_double("Reuse.rate", 1.0, "Hz", SystemTime::now());
    let searches = client.search_count();
    for i in 0..50 {
        sink.send_double("Reuse.rate", i as f64, "Hz", SystemTime::now());
    }

    assert_eq!(searches, 1);
    assert_eq!(client.search_count(), 1);
    assert_eq!(client.puts_to("artdaq:Reuse:rate").len(), 51);
}

#[test]
fn test_reference_name_reaches_sanitized_channel() {
    let client = LoopbackClient::hosting(["artdaq:Detector_Rate_Value_1:count"]);
    let sink = sink(&client);

    sink.send_unsigned("Detector Rate/Value 1.count_%", 3, "", SystemTime::now());

    assert_eq!(
        client.puts_to("artdaq:Detector_Rate_Value_1:count"),
        vec![DbrValue::Long(3)]
    );
}

#[test]
fn test_string_payload_truncated_to_40_bytes() {
    let client = LoopbackClient::hosting(["artdaq:status"]);
    let sink = sink(&client);

    let value = "Run in progress, waiting for next spill from accelerator";
    let unit = "state";
    sink.send_string("status", value, unit, SystemTime::now());

    let full = format!("{} {}", value, unit);
    let puts = client.puts_to("artdaq:status");
    assert_eq!(puts.len(), 1);
    match &puts[0] {
        DbrValue::String(s) => {
            assert_eq!(s.len(), MAX_STRING_SIZE);
            assert_eq!(s.as_bytes(), &full.as_bytes()[..MAX_STRING_SIZE]);
        }
        other => panic!("expected String, got {:?}", other),
    }
}

#[test]
fn test_unsigned_narrowed_to_32_bits() {
    let client = LoopbackClient::hosting(["artdaq:bytes"]);
    let sink = sink(&client);

    sink.send_unsigned("bytes", 5_000_000_000, "B", SystemTime::now());

    match client.puts_to("artdaq:bytes").as_slice() {
        [DbrValue::Long(v)] => assert_eq!(*v as u32 as u64, 5_000_000_000 % (1u64 << 32)),
        other => panic!("expected one Long, got {:?}", other),
    }
}

#[test]
fn test_stop_twice_releases_nothing_second_time() {
    let client = LoopbackClient::hosting(["artdaq:a", "artdaq:b"]);
    let sink = sink(&client);
    sink.send_int("a", 1, "", SystemTime::now());
    sink.send_int("b", 1, "", SystemTime::now());
    sink.send_int("c", 1, "", SystemTime::now());

    sink.stop();
    let clears = client.clear_count();
    sink.stop();

    assert_eq!(client.clear_count(), clears);
    assert_eq!(client.open_channels(), 0);
    assert_eq!(sink.channel_status("a"), ChannelStatus::Unconnected);
}

#[test]
fn test_restart_after_stop_retries_failed_channel() {
    let client = LoopbackClient::hosting(Vec::<String>::new());
    let sink = sink(&client);

    sink.send_int("late", 1, "", SystemTime::now());
    client.host("artdaq:late");
    sink.send_int("late", 2, "", SystemTime::now());
    assert!(client.puts().is_empty());

    sink.stop();
    sink.start();
    sink.send_int("late", 3, "", SystemTime::now());
    assert_eq!(client.puts_to("artdaq:late"), vec![DbrValue::Long(3)]);
}

#[test]
fn test_put_failure_keeps_channel_connected() {
    logger();
    let client = LoopbackClient::hosting(["artdaq:PutFail"]);
    let sink = sink(&client);

    sink.send_int("PutFail", 1, "", SystemTime::now());
    client.set_fail_puts(true);
    sink.send_int("PutFail", 2, "", SystemTime::now());
    client.set_fail_puts(false);
    sink.send_int("PutFail", 3, "", SystemTime::now());

    assert_eq!(sink.channel_status("PutFail"), ChannelStatus::Connected);
    assert_eq!(client.search_count(), 1);
    assert_eq!(
        client.puts_to("artdaq:PutFail"),
        vec![DbrValue::Long(1), DbrValue::Long(3)]
    );
    assert_eq!(warnings_for("artdaq:PutFail"), 1);

    let stats = sink.stats();
    assert_eq!(stats.metrics_sent, 2);
    assert_eq!(stats.write_errors, 1);
}

#[test]
fn test_flush_failure_drops_metric_only() {
    let client = LoopbackClient::hosting(["artdaq:FlushFail"]);
    let sink = sink(&client);

    client.set_fail_flush(true);
    sink.send_float("FlushFail", 1.0, "", SystemTime::now());
    client.set_fail_flush(false);
    sink.send_float("FlushFail", 2.0, "", SystemTime::now());

    assert_eq!(client.puts_to("artdaq:FlushFail"), vec![DbrValue::Float(2.0)]);
    assert_eq!(sink.channel_status("FlushFail"), ChannelStatus::Connected);
}

#[test]
fn test_disconnected_channel_stays_cached() {
    let client = LoopbackClient::hosting(["artdaq:gone"]);
    let sink = sink(&client);

    sink.send_int("gone", 1, "", SystemTime::now());
    client.unhost("artdaq:gone");
    sink.send_int("gone", 2, "", SystemTime::now());
    client.host("artdaq:gone");
    sink.send_int("gone", 3, "", SystemTime::now());

    assert_eq!(client.search_count(), 1);
    assert_eq!(
        client.puts_to("artdaq:gone"),
        vec![DbrValue::Long(1), DbrValue::Long(3)]
    );
}

#[test]
fn test_concurrent_first_use_searches_once() {
    let client = LoopbackClient::hosting(["artdaq:shared"]);
    let sink = Arc::new(sink(&client));
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let sink = Arc::clone(&sink);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                sink.send_int("shared", i as i32, "", SystemTime::now());
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("sender thread");
    }

    assert_eq!(client.search_count(), 1);
    assert_eq!(client.puts_to("artdaq:shared").len(), threads);
}

#[test]
fn test_concurrent_stop_and_send() {
    let client = LoopbackClient::hosting(["artdaq:busy"]);
    let sink: Arc<dyn MetricSink> = Arc::new(sink(&client));

    let sender = {
        let sink = Arc::clone(&sink);
        thread::spawn(move || {
            for i in 0..200 {
                sink.send_int("busy", i, "", SystemTime::now());
            }
        })
    };
    for _ in 0..20 {
        sink.stop();
    }
    sender.join().expect("sender thread");
    sink.stop();

    // Every send either reused a live handle or searched anew; none lost
    // its handle mid-put.
    assert_eq!(client.puts_to("artdaq:busy").len(), 200);
    assert_eq!(client.open_channels(), 0);
}

#[test]
fn test_retry_policy_from_yaml() {
    let config = SinkConfig::from_yaml("failed_channel_retry_ms: 0\n").expect("config");
    let client = LoopbackClient::hosting(Vec::<String>::new());
    let sink = EpicsMetricSink::new(config, client.clone());

    sink.send_int("warmup", 1, "", SystemTime::now());
    client.host("artdaq:warmup");
    sink.send_int("warmup", 2, "", SystemTime::now());

    assert_eq!(client.search_count(), 2);
    assert_eq!(client.puts_to("artdaq:warmup"), vec![DbrValue::Long(2)]);
}

#[test]
fn test_connect_timeout_reaches_pend() {
    logger();
    let config = SinkConfig::from_yaml("connect_timeout_ms: 1234\n").expect("config");
    let client = LoopbackClient::hosting(Vec::<String>::new());
    let sink = EpicsMetricSink::new(config, client.clone());

    sink.send_int("SlowIoc", 1, "", SystemTime::now());

    assert_eq!(client.last_pend_timeout(), Some(Duration::from_millis(1234)));
    let warnings = records_for(log::Level::Warn, "artdaq:SlowIoc");
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("1.234s"), "warning was {:?}", warnings[0]);
}

#[test]
fn test_numeric_unit_noted_at_debug_only_when_present() {
    logger();
    let client = LoopbackClient::hosting(["artdaq:WithUnit", "artdaq:NoUnit"]);
    let sink = sink(&client);

    sink.send_double("WithUnit", 2.5, "Hz", SystemTime::now());
    sink.send_int("NoUnit", 4, "", SystemTime::now());

    let notes = unit_notes_for("artdaq:WithUnit");
    assert_eq!(notes.len(), 1);
    assert!(notes[0].contains("\"Hz\""));
    assert!(unit_notes_for("artdaq:NoUnit").is_empty());
    assert_eq!(client.puts_to("artdaq:WithUnit"), vec![DbrValue::Double(2.5)]);
}

#[test]
fn test_string_unit_is_sent_not_noted() {
    logger();
    let client = LoopbackClient::hosting(["artdaq:StrUnit"]);
    let sink = sink(&client);

    sink.send_string("StrUnit", "idle", "state", SystemTime::now());

    assert!(unit_notes_for("artdaq:StrUnit").is_empty());
    assert_eq!(client.puts_to("artdaq:StrUnit").len(), 1);
}

#[test]
fn test_unit_noted_for_unreachable_channel() {
    logger();
    let client = LoopbackClient::hosting(Vec::<String>::new());
    let sink = sink(&client);

    sink.send_float("UnitNowhere", 1.0, "V", SystemTime::now());

    assert_eq!(unit_notes_for("artdaq:UnitNowhere").len(), 1);
    assert_eq!(sink.channel_status("UnitNowhere"), ChannelStatus::Failed);
}

#[test]
fn test_search_error_warns_once_and_clears_nothing() {
    logger();
    let client = LoopbackClient::hosting(["artdaq:SearchRefused"]);
    client.set_fail_search(true);
    let sink = sink(&client);

    for i in 0..5 {
        sink.send_int("SearchRefused", i, "", SystemTime::now());
    }

    assert_eq!(warnings_for("artdaq:SearchRefused"), 1);
    assert_eq!(sink.channel_status("SearchRefused"), ChannelStatus::Failed);
    assert_eq!(client.search_count(), 1);
    assert_eq!(client.clear_count(), 0);
    assert_eq!(sink.stats().metrics_dropped, 5);
}

#[test]
fn test_cooldown_refailure_warns_again() {
    logger();
    let config = SinkConfig::from_yaml("failed_channel_retry_ms: 0\n").expect("config");
    let client = LoopbackClient::hosting(Vec::<String>::new());
    let sink = EpicsMetricSink::new(config, client.clone());

    sink.send_int("StillMissing", 1, "", SystemTime::now());
    sink.send_int("StillMissing", 2, "", SystemTime::now());

    assert_eq!(client.search_count(), 2);
    assert_eq!(warnings_for("artdaq:StillMissing"), 2);
    assert_eq!(sink.channel_status("StillMissing"), ChannelStatus::Failed);
}
