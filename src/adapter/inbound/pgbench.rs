//! Parser for pgbench's textual output.
//!
//! pgbench is run externally (typically with `--progress=N`); its stdout and
//! stderr are piped into a [`LoadBridge`](crate::application::loadgen::LoadBridge)
//! using [`parse_line`] as the line parser. Recognised lines:
//!
//! ```text
//! progress: 5.0 s, 1234.5 tps, lat 8.123 ms stddev 1.456, 0 failed
//! tps = 1180.370497 (without initial connection time)
//! pgbench: error: connection to server ... failed
//! FATAL:  terminating connection due to administrator command
//! ```

use std::time::Duration;

use crate::application::aggregator::LoadEvent;

/// Parse one line of pgbench output; `None` for lines that carry nothing.
#[must_use]
pub fn parse_line(line: &str) -> Option<LoadEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if let Some(rest) = line.strip_prefix("progress:") {
        return parse_progress(rest);
    }
    if let Some(rest) = line.strip_prefix("tps =") {
        let tps = rest.split_whitespace().next()?.parse().ok()?;
        return Some(LoadEvent::Final { tps });
    }
    if is_error(line) {
        return Some(LoadEvent::Error);
    }
    None
}

fn is_error(line: &str) -> bool {
    line.starts_with("ERROR")
        || line.starts_with("FATAL")
        || line.contains("error:")
        || line.contains("FATAL:")
}

/// `5.0 s, 1234.5 tps, lat 8.123 ms stddev 1.456, 0 failed`
fn parse_progress(rest: &str) -> Option<LoadEvent> {
    let mut offset = None;
    let mut tps = None;
    let mut latency_ms = None;
    let mut failed = 0;

    for field in rest.split(',').map(str::trim) {
        let words: Vec<&str> = field.split_whitespace().collect();
        match words.as_slice() {
            [value, "s"] => offset = value.parse().ok().and_then(seconds),
            [value, "tps"] => tps = value.parse().ok(),
            ["lat", value, "ms", ..] => latency_ms = value.parse().ok(),
            [value, "failed"] => failed = value.parse().unwrap_or(0),
            _ => {}
        }
    }

    Some(LoadEvent::Progress {
        offset,
        tps: tps?,
        latency_ms,
        failed,
    })
}

fn seconds(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_line_with_failures() {
        let event = parse_line("progress: 5.0 s, 1234.5 tps, lat 8.123 ms stddev 1.456, 3 failed");
        assert_eq!(
            event,
            Some(LoadEvent::Progress {
                offset: Some(Duration::from_secs(5)),
                tps: 1234.5,
                latency_ms: Some(8.123),
                failed: 3,
            })
        );
    }

    #[test]
    fn older_progress_line_without_failed_field() {
        let event = parse_line("progress: 10.0 s, 980.0 tps, lat 10.204 ms stddev 2.1");
        assert_eq!(
            event,
            Some(LoadEvent::Progress {
                offset: Some(Duration::from_secs(10)),
                tps: 980.0,
                latency_ms: Some(10.204),
                failed: 0,
            })
        );
    }

    #[test]
    fn fractional_and_missing_offsets() {
        let Some(LoadEvent::Progress { offset, .. }) =
            parse_line("progress: 2.5 s, 100.0 tps, lat 1.0 ms stddev 0.1")
        else {
            panic!("not a progress line");
        };
        assert_eq!(offset, Some(Duration::from_millis(2_500)));

        let Some(LoadEvent::Progress { offset, tps, .. }) = parse_line("progress: 100.0 tps")
        else {
            panic!("not a progress line");
        };
        assert_eq!(offset, None);
        assert_eq!(tps, 100.0);

        let Some(LoadEvent::Progress { offset, .. }) = parse_line("progress: -1.0 s, 100.0 tps")
        else {
            panic!("not a progress line");
        };
        assert_eq!(offset, None);
    }

    #[test]
    fn final_tps_line() {
        assert_eq!(
            parse_line("tps = 1180.370497 (without initial connection time)"),
            Some(LoadEvent::Final { tps: 1180.370497 })
        );
    }

    #[test]
    fn error_lines() {
        assert_eq!(
            parse_line("pgbench: error: client 3 aborted in command 4"),
            Some(LoadEvent::Error)
        );
        assert_eq!(
            parse_line("FATAL:  terminating connection due to administrator command"),
            Some(LoadEvent::Error)
        );
    }

    #[test]
    fn noise_is_ignored() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("transaction type: <builtin: TPC-B (sort of)>"), None);
        assert_eq!(parse_line("progress: garbage"), None);
    }
}
