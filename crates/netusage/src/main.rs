//! netusage - print network usage recorded by netusaged.

use std::fmt::Write as _;
use std::path::PathBuf;

use chrono::{DateTime, Local, TimeZone};
use clap::Parser;
use tracing::{Level, error};
use tracing_subscriber::EnvFilter;

use netusage_core::fmt::format_bucket_time;
use netusage_core::query::{Range, Unit, query, total};
use netusage_core::storage::{LogStore, Record, compact};
use netusage_core::validate::validate;

#[derive(Parser)]
#[command(name = "netusage", about = "Show recorded network usage", version)]
struct Cli {
    /// Directory holding network_usage.log.
    #[arg(short, long, env = "NETUSAGE_LOG_DIR", default_value = "./data")]
    log_dir: PathBuf,

    /// Range to show: 1h, 1d, 24h, 1w, 7d, 1M, 30d or all.
    #[arg(short, long, default_value = "24h")]
    range: Range,

    /// Display unit: B, KB, MB, GB, TB or PB.
    #[arg(short, long, default_value = "MB")]
    unit: Unit,

    /// Retention period in days; match the daemon's --max-days.
    #[arg(long, default_value = "365")]
    max_days: u32,

    /// Output bucketed records as JSON lines
    #[arg(long)]
    json: bool,

    /// Check the log for inconsistencies instead of showing usage
    #[arg(long)]
    check: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is warnings only.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("netusage={}", level).parse().unwrap())
        .add_directive(format!("netusage_core={}", level).parse().unwrap());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let store = LogStore::new(&cli.log_dir);
    let loaded = match store.load() {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("Failed to read {}: {}", store.path().display(), e);
            std::process::exit(1);
        }
    };

    if cli.check {
        let findings = validate(&loaded.records);
        print!("{}", check_report(loaded.records.len(), loaded.skipped, &findings));
        if !findings.is_empty() || loaded.skipped > 0 {
            std::process::exit(1);
        }
        return;
    }

    let now = Local::now();
    let records = compact(
        loaded.records,
        now.to_utc(),
        chrono::Duration::days(i64::from(cli.max_days)),
    )
    .records;

    if cli.json {
        for bucket in query(&records, cli.range, &now) {
            match serde_json::to_string(&bucket) {
                Ok(line) => println!("{line}"),
                Err(e) => {
                    error!("Failed to encode record: {}", e);
                    std::process::exit(1);
                }
            }
        }
        return;
    }

    println!(
        "Network usage: {} ({} records)",
        store.path().display(),
        records.len()
    );
    println!();
    print!("{}", totals_table(&records, &now, cli.unit));
    println!();
    print!("{}", series_table(&records, cli.range, &now, cli.unit));
}

fn fmt_value(bytes: i64, unit: Unit) -> String {
    match unit {
        Unit::B => bytes.to_string(),
        _ => format!("{:.2}", unit.scale(bytes)),
    }
}

/// Received/sent/total per range.
fn totals_table<Tz: TimeZone>(records: &[Record], now: &DateTime<Tz>, unit: Unit) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "  {:<16} {:>14} {:>14} {:>14}",
        "Range",
        format!("Received {unit}"),
        format!("Sent {unit}"),
        format!("Total {unit}")
    );
    let _ = writeln!(out, "  {}", "─".repeat(61));
    for range in Range::ALL {
        let usage = total(records, range, now);
        let _ = writeln!(
            out,
            "  {:<16} {:>14} {:>14} {:>14}",
            range.label(),
            fmt_value(usage.received, unit),
            fmt_value(usage.sent, unit),
            fmt_value(usage.total(), unit)
        );
    }
    out
}

/// One row per bucket of `range`.
fn series_table<Tz: TimeZone>(
    records: &[Record],
    range: Range,
    now: &DateTime<Tz>,
    unit: Unit,
) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let tz = now.timezone();
    let mut out = String::new();
    let _ = writeln!(out, "{} ({}):", range.label(), unit);

    let mut rows = 0usize;
    for bucket in query(records, range, now) {
        if rows == 0 {
            let _ = writeln!(
                out,
                "  {:<16} {:>14} {:>14} {:>14}",
                "Time", "Received", "Sent", "Total"
            );
            let _ = writeln!(out, "  {}", "─".repeat(61));
        }
        rows += 1;
        let _ = writeln!(
            out,
            "  {:<16} {:>14} {:>14} {:>14}",
            format_bucket_time(bucket.time, &tz, range.shows_time_of_day()),
            fmt_value(bucket.bytes_received, unit),
            fmt_value(bucket.bytes_sent, unit),
            fmt_value(bucket.bytes_total(), unit)
        );
    }
    if rows == 0 {
        let _ = writeln!(out, "  (no data)");
    }
    out
}

fn check_report(
    records: usize,
    skipped: usize,
    findings: &[netusage_core::validate::Finding],
) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} records, {} unreadable lines, {} findings",
        records,
        skipped,
        findings.len()
    );
    for finding in findings {
        let _ = writeln!(out, "  {finding}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use clap::CommandFactory;

    fn rec(h: u32, received: i64, sent: i64) -> Record {
        Record {
            bytes_received: received,
            bytes_sent: sent,
            ..Record::zero(Utc.with_ymd_and_hms(2026, 10, 19, h, 0, 0).unwrap())
        }
    }

    #[test]
    fn cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cli_parses_range_and_unit() {
        let cli = Cli::try_parse_from([
            "netusage",
            "--range",
            "1M",
            "--unit",
            "kb",
            "--json",
            "--max-days",
            "30",
        ])
        .unwrap();
        assert_eq!(cli.range, Range::Month);
        assert_eq!(cli.unit, Unit::KB);
        assert_eq!(cli.max_days, 30);
        assert!(cli.json);
        assert!(Cli::try_parse_from(["netusage", "--range", "2w"]).is_err());

        let defaults = Cli::try_parse_from(["netusage"]).unwrap();
        assert_eq!(defaults.max_days, 365);
    }

    #[test]
    fn totals_table_lists_every_range() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let records = vec![rec(9, 1024, 0), rec(11, 2048, 1024)];

        let table = totals_table(&records, &now, Unit::KB);
        assert_eq!(table.lines().count(), 2 + Range::ALL.len());
        assert!(table.contains("Received KB"));
        let hour = table.lines().find(|l| l.contains("Last hour")).unwrap();
        assert!(hour.ends_with("2.00           1.00           3.00"));
        let day = table.lines().find(|l| l.contains("Today")).unwrap();
        assert!(day.ends_with("4.00"));
    }

    #[test]
    fn series_table_uses_buckets() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let records = vec![rec(9, 100, 0), rec(10, 200, 0), rec(11, 300, 0)];

        let table = series_table(&records, Range::Hours24, &now, Unit::B);
        let rows: Vec<_> = table.lines().skip(3).collect();
        assert_eq!(rows.len(), 3);
        assert!(rows[0].contains("2026-10-19 09:00"));
        assert!(rows[2].trim_end().ends_with("300"));

        let empty = series_table(&[], Range::Hour, &now, Unit::MB);
        assert!(empty.contains("(no data)"));
    }

    #[test]
    fn check_report_lists_findings() {
        let findings = validate(&[rec(9, 100, 0), rec(9, 100, 0)]);
        let report = check_report(2, 1, &findings);
        assert!(report.starts_with("2 records, 1 unreadable lines, 1 findings"));
        assert!(report.contains("share time"));
    }
}
