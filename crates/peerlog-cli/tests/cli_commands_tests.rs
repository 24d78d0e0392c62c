//! End-to-end tests of the CLI commands over export files on disk

use std::path::{Path, PathBuf};

use clap::Parser;
use peerlog_cli::{commands::CommandDispatcher, Cli, CliAppConfig};
use peerlog_core::store;
use serde_json::json;
use tempfile::TempDir;

fn write_export(dir: &TempDir, name: &str, entries: serde_json::Value) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, entries.to_string()).unwrap();
    path
}

fn entry(id: &str, device: &str, timestamp: &str, source: &str, message: &str) -> serde_json::Value {
    json!({
        "recordId": id,
        "deviceId": device,
        "timestamp": timestamp,
        "source": source,
        "message": message,
    })
}

async fn run(args: &[&str], config: &CliAppConfig) -> Result<String, peerlog_cli::CliError> {
    let cli = Cli::try_parse_from(std::iter::once("peerlog").chain(args.iter().copied())).unwrap();
    let mut out = Vec::new();
    CommandDispatcher::execute_with_output(cli, config, &mut out).await?;
    Ok(String::from_utf8(out).unwrap())
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

fn sample(dir: &TempDir) -> PathBuf {
    write_export(
        dir,
        "phone.json",
        json!([
            entry("r1", "phone", "2024-01-01 10:00:02", "net", "wifi up"),
            entry("r2", "phone", "2024-01-01 10:00:01", "ui", "tap"),
            entry("r3", "tablet", "2024-01-01 10:00:03", "logger", "session state"),
            entry("r4", "tablet", "2024-01-01 10:00:04", "net", "WiFi down"),
        ]),
    )
}

#[tokio::test]
async fn test_view_orders_and_hides_internal_records() {
    let dir = TempDir::new().unwrap();
    let file = sample(&dir);

    let output = run(&["view", arg(&file)], &CliAppConfig::default()).await.unwrap();
    let lines: Vec<&str> = output.lines().collect();

    assert_eq!(lines.len(), 3);
    assert!(lines[0].ends_with("[ui]  tap"));
    assert!(lines[1].ends_with("[net]  wifi up"));
    assert!(lines[2].ends_with("[net]  WiFi down"));
}

#[tokio::test]
async fn test_view_filters_compose() {
    let dir = TempDir::new().unwrap();
    let file = sample(&dir);
    let config = CliAppConfig::default();

    let output = run(&["view", "--text", "WIFI", arg(&file)], &config).await.unwrap();
    assert_eq!(output.lines().count(), 2);

    let output = run(&["view", "-t", "wifi", "-d", "tablet", arg(&file)], &config)
        .await
        .unwrap();
    assert_eq!(output.lines().count(), 1);
    assert!(output.contains("WiFi down"));

    let output = run(&["view", "--include-internal", arg(&file)], &config)
        .await
        .unwrap();
    assert_eq!(output.lines().count(), 4);

    let output = run(&["view", "-n", "1", arg(&file)], &config).await.unwrap();
    assert_eq!(output.lines().count(), 1);
    assert!(output.contains("WiFi down"));
}

#[tokio::test]
async fn test_view_json_is_an_export_document() {
    let dir = TempDir::new().unwrap();
    let file = sample(&dir);

    let output = run(&["view", "--json", "-x", "net", arg(&file)], &CliAppConfig::default())
        .await
        .unwrap();
    let records = store::from_json(&output).unwrap();

    let ids: Vec<&str> = records.iter().map(|r| r.record_id.as_str()).collect();
    assert_eq!(ids, vec!["r2", "r3"]);
}

#[tokio::test]
async fn test_view_chronological_ordering() {
    let dir = TempDir::new().unwrap();
    let file = write_export(
        &dir,
        "zones.json",
        json!([
            entry("a", "phone", "2024-01-01T10:00:00+02:00", "net", "local ten"),
            entry("b", "phone", "2024-01-01T09:00:00Z", "net", "utc nine"),
            entry("c", "phone", "boot", "net", "unparsed"),
        ]),
    );
    let config = CliAppConfig::default();

    let output = run(&["view", "--chronological", arg(&file)], &config).await.unwrap();
    let messages: Vec<&str> = output
        .lines()
        .map(|line| line.rsplit("  ").next().unwrap())
        .collect();
    assert_eq!(messages, vec!["unparsed", "local ten", "utc nine"]);
}

#[tokio::test]
async fn test_merge_deduplicates_and_orders() {
    let dir = TempDir::new().unwrap();
    let first = sample(&dir);
    let second = write_export(
        &dir,
        "laptop.json",
        json!([entry("q1", "laptop", "2024-01-01 09:59:59", "net", "early")]),
    );
    let merged = dir.path().join("merged.json");

    run(
        &["merge", arg(&first), arg(&first), arg(&second), "-o", arg(&merged)],
        &CliAppConfig::default(),
    )
    .await
    .unwrap();

    let records = store::from_json(&std::fs::read_to_string(&merged).unwrap()).unwrap();
    let ids: Vec<&str> = records.iter().map(|r| r.record_id.as_str()).collect();
    // The internal record is left out of exports
    assert_eq!(ids, vec!["q1", "r2", "r1", "r4"]);
}

#[tokio::test]
async fn test_merge_respects_store_cap() {
    let dir = TempDir::new().unwrap();
    let file = sample(&dir);
    let mut config = CliAppConfig::default();
    config.collector.store.max_records = 2;

    let output = run(&["merge", arg(&file)], &config).await.unwrap();
    let records = store::from_json(&output).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].record_id, "r4");
}

#[tokio::test]
async fn test_stats_summarizes_devices() {
    let dir = TempDir::new().unwrap();
    let file = sample(&dir);

    let output = run(&["stats", arg(&file), arg(&file)], &CliAppConfig::default())
        .await
        .unwrap();
    let lines: Vec<&str> = output.lines().collect();

    assert_eq!(
        lines[0],
        "phone\t2 record(s)\t2024-01-01 10:00:01 .. 2024-01-01 10:00:02"
    );
    assert!(lines[1].starts_with("tablet\t2 record(s)"));
    assert_eq!(
        lines[2],
        "total\t4 stored, 4 duplicate(s), 0 malformed, 0 evicted"
    );
}

#[tokio::test]
async fn test_bad_input_is_reported() {
    let dir = TempDir::new().unwrap();
    let not_array = write_export(&dir, "object.json", json!({"recordId": "r1"}));
    let missing = dir.path().join("missing.json");
    let config = CliAppConfig::default();

    let err = run(&["view", arg(&not_array)], &config).await.unwrap_err();
    assert!(err.to_string().contains("is not a log export"));

    let err = run(&["view", arg(&missing)], &config).await.unwrap_err();
    assert!(err.to_string().contains("cannot read"));
}

#[tokio::test]
async fn test_config_init_show_and_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("peerlog.toml");
    let config = CliAppConfig::default();

    let output = run(&["--config", arg(&path), "config", "init"], &config)
        .await
        .unwrap();
    assert!(output.starts_with("Wrote "));
    assert!(path.is_file());

    assert!(run(&["--config", arg(&path), "config", "init"], &config)
        .await
        .is_err());
    assert!(run(&["--config", arg(&path), "config", "init", "--force"], &config)
        .await
        .is_ok());

    let output = run(&["--config", arg(&path), "config", "path"], &config)
        .await
        .unwrap();
    assert_eq!(output.trim(), arg(&path));

    let shown = run(&["config", "show"], &config).await.unwrap();
    let reparsed: CliAppConfig = toml::from_str(&shown).unwrap();
    assert_eq!(
        reparsed.collector.store.max_records,
        config.collector.store.max_records
    );
}
