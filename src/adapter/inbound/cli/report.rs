//! Rendering of the final run report.

use std::path::Path;

use tabled::settings::Style;
use tabled::{Table, Tabled};

use super::output;
use crate::application::run::{Comparison, PathReport, RunReport};
use crate::domain::{DowntimeInterval, ErrorClass};
use crate::error::Result;

/// How the proxied path fared against the direct one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    MuchBetter,
    Better,
    Neutral,
    MuchWorse,
}

impl Verdict {
    /// Classify a downtime reduction percentage. Differences within 5% in
    /// the worse direction are treated as noise.
    #[must_use]
    pub fn from_reduction(pct: f64) -> Self {
        if pct > 5.0 {
            Self::MuchBetter
        } else if pct > 0.0 {
            Self::Better
        } else if pct < -5.0 {
            Self::MuchWorse
        } else {
            Self::Neutral
        }
    }

    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::MuchBetter => "Proxy significantly reduced failover downtime",
            Self::Better => "Proxy reduced failover downtime",
            Self::Neutral => "Proxy had little effect on failover downtime",
            Self::MuchWorse => "Proxy significantly increased failover downtime",
        }
    }
}

#[derive(Tabled)]
struct PathRow {
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Ops")]
    operations: u64,
    #[tabled(rename = "Success")]
    success: String,
    #[tabled(rename = "Mean ms")]
    mean_ms: String,
    #[tabled(rename = "p95 ms")]
    p95_ms: String,
    #[tabled(rename = "TPS")]
    tps: String,
    #[tabled(rename = "Downtime s")]
    downtime: String,
    #[tabled(rename = "Intervals")]
    intervals: usize,
    #[tabled(rename = "Blips")]
    blips: u64,
}

impl PathRow {
    fn new(report: &PathReport) -> Self {
        let aggregate = &report.snapshot.aggregate;
        let workload = &report.snapshot.workload;
        Self {
            path: report.snapshot.path.to_string(),
            kind: report.snapshot.kind.to_string(),
            operations: aggregate.attempted(),
            success: percent(aggregate.success_rate()),
            mean_ms: format!("{:.1}", aggregate.latency.mean_ms),
            p95_ms: format!("{:.1}", aggregate.latency.p95_ms),
            tps: format!("{:.1}", aggregate.tps),
            downtime: format!("{:.3}", workload.summary.total.as_secs_f64()),
            intervals: workload.summary.count,
            blips: workload.suppressed_blips,
        }
    }
}

#[derive(Tabled)]
struct KindRow {
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Operation")]
    kind: &'static str,
    #[tabled(rename = "Attempted")]
    attempted: u64,
    #[tabled(rename = "Success")]
    success: String,
    #[tabled(rename = "Lost")]
    lost: u64,
    #[tabled(rename = "Timeout")]
    timeout: u64,
    #[tabled(rename = "Constraint")]
    constraint: u64,
    #[tabled(rename = "Other")]
    other: u64,
}

fn kind_rows(report: &PathReport) -> impl Iterator<Item = KindRow> + '_ {
    report.snapshot.aggregate.kinds.iter().map(|k| KindRow {
        path: report.snapshot.path.to_string(),
        kind: k.kind.as_str(),
        attempted: k.attempted,
        success: percent(k.success_rate()),
        lost: k.failures.get(ErrorClass::ConnectionLost),
        timeout: k.failures.get(ErrorClass::Timeout),
        constraint: k.failures.get(ErrorClass::ConstraintViolation),
        other: k.failures.get(ErrorClass::Other),
    })
}

fn percent(rate: f64) -> String {
    format!("{:.2}%", rate * 100.0)
}

fn interval_line(index: usize, interval: &DowntimeInterval) -> String {
    let start = interval.started_at.format("%H:%M:%S%.3f");
    match (interval.ended_at, interval.duration()) {
        (Some(end), Some(duration)) => {
            let suffix = if interval.unresolved { " unresolved" } else { "" };
            format!(
                "{index}. {start} - {} ({:.3} s){suffix}",
                end.format("%H:%M:%S%.3f"),
                duration.as_secs_f64()
            )
        }
        _ => format!("{index}. {start} - ongoing"),
    }
}

/// Print the report, or emit it as one JSON document in `--json` mode.
///
/// # Errors
///
/// Returns an error if the report cannot be serialised.
pub fn render(report: &RunReport) -> Result<()> {
    if output::is_json() {
        output::json_output(&serde_json::to_value(report)?);
        return Ok(());
    }

    output::section("Run");
    output::field("Mode", report.mode);
    output::field("Started", report.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
    output::field("Measured", format!("{:.1} s", report.measured_secs));
    if report.warmup_secs > 0 {
        output::field("Warm-up", format!("{} s", report.warmup_secs));
    }
    output::field("Threshold", report.failure_threshold);
    if report.interrupted {
        output::warning("Run was stopped before the configured duration");
    }

    output::section("Paths");
    let rows: Vec<PathRow> = report.paths.iter().map(PathRow::new).collect();
    output::lines(&Table::new(rows).with(Style::rounded()).to_string());

    if output::verbosity() > 0 {
        output::section("Operations");
        let rows: Vec<KindRow> = report.paths.iter().flat_map(kind_rows).collect();
        output::lines(&Table::new(rows).with(Style::rounded()).to_string());
    }

    output::section("Downtime intervals");
    for path in &report.paths {
        render_intervals(path);
    }

    if report.paths.iter().any(|p| p.snapshot.aggregate.load.is_some()) {
        output::section("Load generator");
        for path in &report.paths {
            if let Some(load) = &path.snapshot.aggregate.load {
                output::field(
                    path.snapshot.path.as_str(),
                    format!(
                        "avg {:.1} tps (min {:.1}, max {:.1}), {} samples, {} errors",
                        load.avg_tps, load.min_tps, load.max_tps, load.samples, load.errors
                    ),
                );
            }
        }
    }

    if let Some(comparison) = &report.comparison {
        render_comparison(comparison);
    }
    Ok(())
}

fn render_intervals(path: &PathReport) {
    let name = path.snapshot.path.as_str();
    let intervals = &path.snapshot.workload.intervals;
    if intervals.is_empty() {
        output::field(name, output::positive("no downtime"));
    } else {
        output::field(name, format!("{} interval(s)", intervals.len()));
        let lines: Vec<String> = intervals
            .iter()
            .enumerate()
            .map(|(i, interval)| interval_line(i + 1, interval))
            .collect();
        output::lines(&lines.join("\n"));
    }

    if let Some(probe) = &path.snapshot.probe {
        output::field(
            "  probe",
            format!(
                "{} interval(s), {:.3} s total",
                probe.summary.count,
                probe.summary.total.as_secs_f64()
            ),
        );
    }
}

fn render_comparison(comparison: &Comparison) {
    output::section("Comparison");
    output::field(
        "Downtime",
        format!(
            "{} {:.3} s, {} {:.3} s",
            comparison.direct,
            comparison.direct_downtime_secs,
            comparison.proxied,
            comparison.proxied_downtime_secs
        ),
    );
    output::field(
        "Success rate",
        format!("{:+.2} pp", comparison.success_rate_delta_pct),
    );
    if let Some(change) = comparison.latency_change_pct {
        output::field("Latency", format!("{change:+.2}%"));
    }

    let Some(reduction) = comparison.downtime_reduction_pct else {
        output::note("Direct path saw no downtime, nothing to compare");
        return;
    };
    output::field("Reduction", output::highlight(format!("{reduction:.2}%")));
    let verdict = Verdict::from_reduction(reduction);
    match verdict {
        Verdict::MuchBetter | Verdict::Better => output::success(verdict.message()),
        Verdict::Neutral => output::note(verdict.message()),
        Verdict::MuchWorse => output::warning(&output::negative(verdict.message())),
    }
}

/// Write the report as pretty JSON.
///
/// # Errors
///
/// Returns an error if serialisation or the write fails.
pub fn write_json(report: &RunReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn verdict_thresholds() {
        assert_eq!(Verdict::from_reduction(40.0), Verdict::MuchBetter);
        assert_eq!(Verdict::from_reduction(3.0), Verdict::Better);
        assert_eq!(Verdict::from_reduction(0.0), Verdict::Neutral);
        assert_eq!(Verdict::from_reduction(-4.9), Verdict::Neutral);
        assert_eq!(Verdict::from_reduction(-12.0), Verdict::MuchWorse);
    }

    #[test]
    fn interval_lines() {
        let start = Utc.with_ymd_and_hms(2026, 1, 2, 10, 0, 4).unwrap();
        let end = start + chrono::Duration::milliseconds(2_250);
        let closed = DowntimeInterval {
            started_at: start,
            ended_at: Some(end),
            unresolved: false,
        };
        assert_eq!(
            interval_line(1, &closed),
            "1. 10:00:04.000 - 10:00:06.250 (2.250 s)"
        );

        let unresolved = DowntimeInterval {
            unresolved: true,
            ..closed.clone()
        };
        assert!(interval_line(2, &unresolved).ends_with("unresolved"));

        let open = DowntimeInterval {
            ended_at: None,
            ..closed
        };
        assert_eq!(interval_line(3, &open), "3. 10:00:04.000 - ongoing");
    }
}
