//! Command handlers for the peerlog CLI
//!
//! Every command works on export files: they are re-ingested into a `LogStore`, so
//! dedup, ordering and the retention cap behave exactly as in the live collector.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, info, warn};

use peerlog_core::{
    store, ExportedRecord, FilterCriteria, FilterView, LogRecord, LogStore, PeerId, StoreConfig,
    TimestampOrdering, INTERNAL_LOG_SOURCE,
};

use crate::cli::{Cli, Commands, ConfigAction};
use crate::config::{CliAppConfig, DisplayConfig};
use crate::error::{CliError, Result};

/// Filter flags of the `view` command
#[derive(Debug, Clone, Default)]
pub struct ViewOptions {
    pub text: Option<String>,
    pub exclude_source: Option<String>,
    pub device: Option<String>,
    pub include_internal: bool,
    pub chronological: bool,
    pub json: bool,
    pub limit: Option<usize>,
}

impl ViewOptions {
    /// Layer the flags over the configured initial filter
    pub fn criteria(&self, base: &FilterCriteria) -> FilterCriteria {
        let mut criteria = base.clone();
        if self.include_internal
            && criteria.exclude_source.as_deref() == Some(INTERNAL_LOG_SOURCE)
        {
            criteria.exclude_source = None;
        }
        if let Some(source) = &self.exclude_source {
            criteria.exclude_source = Some(source.clone());
        }
        if let Some(text) = &self.text {
            criteria.free_text = text.clone();
        }
        if let Some(device) = &self.device {
            criteria.device_id = Some(PeerId::new(device.as_str()));
        }
        criteria
    }
}

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute the parsed command, printing to stdout
    pub async fn execute(cli: Cli, config: CliAppConfig) -> Result<()> {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        Self::execute_with_output(cli, &config, &mut out).await
    }

    /// Execute the parsed command, printing to `out`
    pub async fn execute_with_output<W: Write>(
        cli: Cli,
        config: &CliAppConfig,
        out: &mut W,
    ) -> Result<()> {
        match cli.command {
            Commands::View {
                files,
                text,
                exclude_source,
                device,
                include_internal,
                chronological,
                json,
                limit,
            } => {
                let options = ViewOptions {
                    text,
                    exclude_source,
                    device,
                    include_internal,
                    chronological,
                    json,
                    limit,
                };
                handle_view_command(&files, &options, config, out).await
            }
            Commands::Merge { inputs, output } => {
                handle_merge_command(&inputs, output.as_deref(), config, out).await
            }
            Commands::Stats { files } => handle_stats_command(&files, config, out).await,
            Commands::Config { action } => {
                handle_config_command(action, cli.config.as_deref(), config, out)
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Loading
// ----------------------------------------------------------------------------

/// Read and parse one export file
pub async fn read_export(path: &Path) -> Result<Vec<ExportedRecord>> {
    let document = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))?;
    let records = store::from_json(&document)
        .with_context(|| format!("{} is not a log export", path.display()))?;
    debug!("Read {} record(s) from {}", records.len(), path.display());
    Ok(records)
}

/// Import every file, in order, into a fresh store
pub async fn load_store(paths: &[PathBuf], config: StoreConfig) -> Result<LogStore> {
    let mut log_store = LogStore::new(config);
    for path in paths {
        let records = read_export(path).await?;
        let total = records.len();
        let stored = log_store.import(records).len();
        info!(
            "{}: {} of {} record(s) stored",
            path.display(),
            stored,
            total
        );
    }

    let stats = log_store.stats();
    if stats.evicted > 0 {
        warn!(
            "{} record(s) evicted by the {}-record cap",
            stats.evicted,
            log_store.config().max_records
        );
    }
    Ok(log_store)
}

// ----------------------------------------------------------------------------
// Command Handlers
// ----------------------------------------------------------------------------

/// Handle the view command
pub async fn handle_view_command<W: Write>(
    files: &[PathBuf],
    options: &ViewOptions,
    config: &CliAppConfig,
    out: &mut W,
) -> Result<()> {
    let mut store_config = config.collector.store.clone();
    if options.chronological {
        store_config.ordering = TimestampOrdering::Chronological;
    }
    let log_store = load_store(files, store_config).await?;

    let mut view = FilterView::new(options.criteria(&config.collector.filter));
    view.rebuild(&log_store);

    let skip = options
        .limit
        .map_or(0, |limit| view.len().saturating_sub(limit));
    let rows: Vec<&LogRecord> = view.iter().skip(skip).map(|record| record.as_ref()).collect();

    if options.json {
        let records: Vec<ExportedRecord> = rows.into_iter().map(ExportedRecord::from).collect();
        writeln!(out, "{}", store::to_json(&records)?)?;
        return Ok(());
    }

    for record in &rows {
        writeln!(out, "{}", format_record(record, &config.display))?;
    }
    info!(
        "Showing {} of {} record(s)",
        rows.len(),
        log_store.len()
    );
    Ok(())
}

/// Handle the merge command
pub async fn handle_merge_command<W: Write>(
    inputs: &[PathBuf],
    output: Option<&Path>,
    config: &CliAppConfig,
    out: &mut W,
) -> Result<()> {
    let log_store = load_store(inputs, config.collector.store.clone()).await?;
    let document = store::to_json(&log_store.export())?;

    match output {
        Some(path) => {
            tokio::fs::write(path, document).await?;
            info!(
                "Merged {} file(s) into {} ({} record(s), {} duplicate(s) dropped)",
                inputs.len(),
                path.display(),
                log_store.len(),
                log_store.stats().duplicates
            );
        }
        None => writeln!(out, "{}", document)?,
    }
    Ok(())
}

/// Per-device totals for the stats command
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DeviceSummary {
    pub records: usize,
    pub first_timestamp: String,
    pub last_timestamp: String,
}

/// Group the store by device, in store order
pub fn summarize(log_store: &LogStore) -> BTreeMap<PeerId, DeviceSummary> {
    let mut summary: BTreeMap<PeerId, DeviceSummary> = BTreeMap::new();
    for record in log_store.iter() {
        let entry = summary.entry(record.device_id.clone()).or_default();
        if entry.records == 0 {
            entry.first_timestamp = record.timestamp.clone();
        }
        entry.records += 1;
        entry.last_timestamp = record.timestamp.clone();
    }
    summary
}

/// Handle the stats command
pub async fn handle_stats_command<W: Write>(
    files: &[PathBuf],
    config: &CliAppConfig,
    out: &mut W,
) -> Result<()> {
    let log_store = load_store(files, config.collector.store.clone()).await?;

    for (device, summary) in summarize(&log_store) {
        writeln!(
            out,
            "{}\t{} record(s)\t{} .. {}",
            device, summary.records, summary.first_timestamp, summary.last_timestamp
        )?;
    }

    let stats = log_store.stats();
    writeln!(
        out,
        "total\t{} stored, {} duplicate(s), {} malformed, {} evicted",
        log_store.len(),
        stats.duplicates,
        stats.malformed,
        stats.evicted
    )?;
    Ok(())
}

/// Handle the config subcommands
pub fn handle_config_command<W: Write>(
    action: ConfigAction,
    explicit_path: Option<&str>,
    config: &CliAppConfig,
    out: &mut W,
) -> Result<()> {
    match action {
        ConfigAction::Example => {
            write!(out, "{}", CliAppConfig::example_config()?)?;
        }
        ConfigAction::Path => {
            writeln!(out, "{}", config_path(explicit_path)?.display())?;
        }
        ConfigAction::Show => {
            write!(out, "{}", config.to_toml()?)?;
        }
        ConfigAction::Init { force } => {
            let path = config_path(explicit_path)?;
            if path.exists() && !force {
                return Err(CliError::Config(format!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                )));
            }
            CliAppConfig::default().save_to_file(&path)?;
            writeln!(out, "Wrote {}", path.display())?;
        }
    }
    Ok(())
}

fn config_path(explicit_path: Option<&str>) -> Result<PathBuf> {
    match explicit_path {
        Some(path) => Ok(PathBuf::from(path)),
        None => CliAppConfig::default_config_path(),
    }
}

/// Render one record as a text line
pub fn format_record(record: &LogRecord, display: &DisplayConfig) -> String {
    let mut line = record.timestamp.clone();
    if display.show_device {
        line.push_str("  ");
        line.push_str(record.device_id.as_str());
    }
    if display.show_source {
        line.push_str("  [");
        line.push_str(&record.source);
        line.push(']');
    }
    line.push_str("  ");
    match display.max_message_chars {
        Some(max) if record.message.chars().count() > max => {
            line.extend(record.message.chars().take(max));
            line.push('…');
        }
        _ => line.push_str(&record.message),
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(message: &str) -> LogRecord {
        LogRecord {
            record_id: "r1".to_string(),
            device_id: PeerId::new("phone"),
            sequence: 1,
            timestamp: "2024-01-01 00:00:00".to_string(),
            source: "net".to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn test_format_record_columns() {
        let line = format_record(&record("hello"), &DisplayConfig::default());
        assert_eq!(line, "2024-01-01 00:00:00  phone  [net]  hello");

        let bare = DisplayConfig {
            show_device: false,
            show_source: false,
            max_message_chars: None,
        };
        assert_eq!(
            format_record(&record("hello"), &bare),
            "2024-01-01 00:00:00  hello"
        );
    }

    #[test]
    fn test_format_record_truncates_on_char_boundary() {
        let display = DisplayConfig {
            max_message_chars: Some(3),
            ..DisplayConfig::default()
        };
        let line = format_record(&record("héllo"), &display);
        assert!(line.ends_with("  hél…"));

        let line = format_record(&record("abc"), &display);
        assert!(line.ends_with("  abc"));
    }

    #[test]
    fn test_view_options_layer_over_base_filter() {
        let base = FilterCriteria::hide_internal();

        let criteria = ViewOptions::default().criteria(&base);
        assert_eq!(criteria, base);

        let options = ViewOptions {
            include_internal: true,
            text: Some("wifi".into()),
            device: Some("tablet".into()),
            ..ViewOptions::default()
        };
        let criteria = options.criteria(&base);
        assert_eq!(criteria.exclude_source, None);
        assert_eq!(criteria.free_text, "wifi");
        assert_eq!(criteria.device_id, Some(PeerId::new("tablet")));

        let options = ViewOptions {
            include_internal: true,
            exclude_source: Some("ui".into()),
            ..ViewOptions::default()
        };
        assert_eq!(options.criteria(&base).exclude_source.as_deref(), Some("ui"));
    }
}
