use std::fs;
use std::future::pending;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use proctrail::{
    cli::Args,
    config::resolve_config,
    ConfigError, Encoder, Error, Format, MetricsProvider, ProcessMetrics, ProcfsCollector,
    Scheduler, SchedulerState, Settings, SinkWriter, Target,
};
use tempfile::TempDir;

const STATUS: &str = "Name:\tworker\nVmRSS:\t  204800 kB\nThreads:\t6\n";
const IO: &str = "rchar: 1\nwchar: 2\nread_bytes: 100000\nwrite_bytes: 50000\n";

/// A minimal procfs tree: uptime 20s, every process started at 10s with
/// 5s of CPU time.
fn fake_proc() -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("uptime"), "20.00 40.00\n").unwrap();
    dir
}

fn add_process(root: &Path, pid: i32, comm: &str) -> PathBuf {
    let p = root.join(pid.to_string());
    fs::create_dir_all(p.join("fd")).unwrap();
    for fd in 0..3 {
        fs::write(p.join("fd").join(fd.to_string()), "").unwrap();
    }
    fs::write(p.join("comm"), format!("{}\n", comm)).unwrap();
    fs::write(
        p.join("stat"),
        format!(
            "{} ({}) S 1 {} {} 0 -1 0 0 0 0 0 300 200 0 0 20 0 6 0 1000 0 0",
            pid, comm, pid, pid
        ),
    )
    .unwrap();
    fs::write(p.join("status"), STATUS).unwrap();
    fs::write(p.join("io"), IO).unwrap();
    p
}

fn collector(root: &Path) -> ProcfsCollector {
    ProcfsCollector::with_root(root).with_clock_ticks(100)
}

#[tokio::test(start_paused = true)]
async fn csv_interval_run_writes_header_once() {
    let proc = fake_proc();
    add_process(proc.path(), 42, "worker");
    let out = tempfile::tempdir().unwrap();
    let path = out.path().join("metrics.csv");

    let sink = SinkWriter::create(&path, Encoder::new(Format::Csv, false)).unwrap();
    let report = Scheduler::new(collector(proc.path()), Target::Pid(42), sink)
        .with_interval(Duration::from_secs(1))
        .with_duration(Duration::from_secs(2))
        .run(pending::<()>())
        .await
        .unwrap();

    assert_eq!(report.state, SchedulerState::Completed);
    assert_eq!(report.cycles, 3);
    assert_eq!(report.snapshots, 3);

    let content = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("timestamp,pid,name,cpu_percent"));
    // Lifetime average, identical while the fake tree does not change
    for row in &lines[1..] {
        assert!(row.ends_with(",42,worker,50.00,200.00,100000,50000,6,3"));
    }
}

#[tokio::test]
async fn jsonl_name_run_collects_every_match_in_pid_order() {
    let proc = fake_proc();
    add_process(proc.path(), 300, "nginx");
    add_process(proc.path(), 12, "nginx");
    add_process(proc.path(), 77, "postgres");
    let out = tempfile::tempdir().unwrap();
    let path = out.path().join("nginx.jsonl");

    let sink = SinkWriter::create(&path, Encoder::new(Format::Jsonl, false)).unwrap();
    let report = Scheduler::new(collector(proc.path()), Target::Name("nginx".into()), sink)
        .run(pending::<()>())
        .await
        .unwrap();
    assert_eq!(report.snapshots, 2);

    let records: Vec<ProcessMetrics> = fs::read_to_string(&path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).expect("valid json line"))
        .collect();
    let pids: Vec<i32> = records.iter().map(|m| m.pid).collect();
    assert_eq!(pids, vec![12, 300]);
    assert!(records.iter().all(|m| m.name == "nginx"));
}

#[tokio::test]
async fn xml_run_keeps_degraded_fields_and_closes_document() {
    let proc = fake_proc();
    let p = add_process(proc.path(), 42, "worker");
    fs::write(p.join("status"), "Name:\tworker\nThreads:\t6\n").unwrap();
    fs::remove_file(p.join("io")).unwrap();
    let out = tempfile::tempdir().unwrap();
    let path = out.path().join("metrics.xml");

    let sink = SinkWriter::create(&path, Encoder::new(Format::Xml, false)).unwrap();
    Scheduler::new(collector(proc.path()), Target::Pid(42), sink)
        .run(pending::<()>())
        .await
        .unwrap();

    let content = fs::read_to_string(&path).unwrap();
    assert!(content.starts_with("<?xml"));
    assert_eq!(content.matches("<process_metrics>").count(), 1);
    assert!(content.ends_with("</process_metrics>\n"));
    assert!(content.contains("<memory_mb>-1</memory_mb>"));
    assert!(content.contains("<io_read_bytes>0</io_read_bytes>"));
    assert!(content.contains("<thread_count>6</thread_count>"));
}

#[tokio::test]
async fn vanished_process_fails_run_without_rows() {
    let proc = fake_proc();
    let out = tempfile::tempdir().unwrap();
    let path = out.path().join("metrics.csv");

    let sink = SinkWriter::create(&path, Encoder::new(Format::Csv, false)).unwrap();
    let err = Scheduler::new(collector(proc.path()), Target::Pid(4242), sink)
        .run(pending::<()>())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Collect { .. }));
    assert_eq!(err.to_string(), "failed to collect metrics for PID 4242");
    assert_eq!(fs::read_to_string(&path).unwrap(), "");
}

#[test]
fn conflicting_target_is_rejected_before_output_exists() {
    let out = tempfile::tempdir().unwrap();
    let path = out.path().join("never.csv");
    let args = Args::try_parse_from([
        "proctrail",
        "--no-config",
        "-p",
        "1",
        "-n",
        "nginx",
        "-o",
        path.to_str().unwrap(),
    ])
    .unwrap();

    let config = resolve_config(&args).unwrap();
    let err = Settings::from_config(&config).unwrap_err();
    assert!(matches!(err, ConfigError::ConflictingTarget));
    assert!(!path.exists());
}

#[test]
fn provider_trait_is_usable_by_reference() {
    let proc = fake_proc();
    add_process(proc.path(), 5, "worker");
    let c = collector(proc.path());
    let by_ref: &dyn MetricsProvider = &c;

    assert_eq!(by_ref.collect_by_pid(5).unwrap().fd_count, 3);
    assert!(by_ref.collect_by_name("missing").unwrap().is_empty());
}
