//! pgbench output folded into a run snapshot.

use std::sync::Arc;
use std::time::Duration;

use failwatch::adapter::inbound::pgbench;
use failwatch::application::loadgen::LoadBridge;
use failwatch::application::recorder::{RecorderSettings, RunRecorder};
use failwatch::domain::{PathKind, PathName, RunClock};
use failwatch::testkit::config;
use tokio::sync::watch;

const PGBENCH_LOG: &str = "\
pgbench (16.2)
starting vacuum...end.
progress: 5.0 s, 1200.0 tps, lat 8.000 ms stddev 1.200, 0 failed
progress: 10.0 s, 400.0 tps, lat 24.000 ms stddev 9.800, 12 failed
pgbench: error: client 2 script 0 aborted in command 5 query 0: FATAL:  terminating connection due to administrator command
progress: 15.0 s, 1100.0 tps, lat 9.000 ms stddev 1.500, 0 failed
transaction type: <builtin: TPC-B (sort of)>
tps = 900.123456 (without initial connection time)
";

fn recorder(warmup: bool) -> Arc<RunRecorder> {
    let paths = vec![
        config::path("direct", PathKind::Direct).to_access_path(),
        config::path("proxied", PathKind::Proxied).to_access_path(),
    ];
    Arc::new(RunRecorder::new(
        RunClock::start(),
        &paths,
        RecorderSettings {
            failure_threshold: 3,
            probe_enabled: false,
            warmup,
        },
    ))
}

#[tokio::test]
async fn pgbench_log_is_folded_into_the_proxied_path() {
    let recorder = recorder(false);
    let bridge = LoadBridge::new(Arc::clone(&recorder));
    let (_stop, stop_rx) = watch::channel(false);
    let proxied = PathName::from("proxied");

    let summary = bridge
        .pump(&proxied, PGBENCH_LOG.as_bytes(), pgbench::parse_line, stop_rx)
        .await
        .unwrap();
    assert_eq!(summary.lines, 8);
    assert_eq!(summary.events, 5);
    assert_eq!(summary.errors, 1);

    let load = recorder
        .aggregate(&proxied)
        .unwrap()
        .aggregate
        .load
        .expect("load snapshot");
    assert_eq!(load.samples, 3);
    assert_eq!(load.min_tps, 400.0);
    assert_eq!(load.max_tps, 1200.0);
    assert!((load.avg_tps - 900.0).abs() < 1e-9);
    assert_eq!(load.max_latency_ms, 24.0);
    assert_eq!(load.errors, 13);
    assert_eq!(load.final_tps, Some(900.123456));

    let direct = recorder.aggregate(&PathName::from("direct")).unwrap();
    assert!(direct.aggregate.load.is_none());
}

#[tokio::test]
async fn samples_are_stamped_at_their_pgbench_offset() {
    let recorder = recorder(false);
    let bridge = LoadBridge::new(Arc::clone(&recorder));
    let (_stop, stop_rx) = watch::channel(false);
    let proxied = PathName::from("proxied");

    bridge
        .pump(&proxied, PGBENCH_LOG.as_bytes(), pgbench::parse_line, stop_rx)
        .await
        .unwrap();

    // The closing tps line carries no offset of its own and keeps the last one.
    let load = recorder.aggregate(&proxied).unwrap().aggregate.load.unwrap();
    let clock = recorder.clock();
    assert_eq!(load.last_at, Some(clock.at(Duration::from_secs(15))));
}

#[tokio::test(start_paused = true)]
async fn log_read_after_warmup_keeps_only_measured_samples() {
    let recorder = recorder(true);
    let bridge = LoadBridge::new(Arc::clone(&recorder));
    let (_stop, stop_rx) = watch::channel(false);
    let proxied = PathName::from("proxied");

    tokio::time::sleep(Duration::from_secs(7)).await;
    recorder.start_recording();
    bridge
        .pump(&proxied, PGBENCH_LOG.as_bytes(), pgbench::parse_line, stop_rx)
        .await
        .unwrap();

    let load = recorder
        .aggregate(&proxied)
        .unwrap()
        .aggregate
        .load
        .expect("load snapshot after warm-up");
    // The 5.0 s sample fell inside warm-up.
    assert_eq!(load.samples, 2);
    assert_eq!(load.min_tps, 400.0);
    assert_eq!(load.max_tps, 1100.0);
    assert_eq!(load.errors, 13);
    assert_eq!(load.final_tps, Some(900.123456));
}
