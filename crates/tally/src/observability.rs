//! Structured JSONL logging.
//!
//! Every event becomes one JSON object per line, carrying the fields of the
//! spans it happened in (so an event inside an organization fan-out records
//! the `owner` and `name` of the repository being ranked).
//!
//! Nothing here writes to stdout; rankings own stdout. Logs go to a daily
//! rolling file, or to stderr when no log location is writable.

use anyhow::Result;
use serde_json::{Map, Value};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::Event;
use tracing::field::{Field, Visit};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::{Context as LayerContext, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

const ENV_LOG_PATH: &str = "TALLY_LOG_PATH";
const ENV_LOG_DIR: &str = "TALLY_LOG_DIR";
const LOG_FILE_SUFFIX: &str = ".jsonl";

/// Where logs should go, gathered from the environment and configuration.
#[derive(Clone, Debug, Default)]
pub struct ObservabilityConfig {
    /// Service name; names the log file and tags every entry.
    pub service: String,
    /// `TALLY_LOG_PATH`: an explicit log file.
    pub log_path: Option<PathBuf>,
    /// `TALLY_LOG_DIR`: a log directory, ahead of the configured one.
    pub env_log_dir: Option<PathBuf>,
    /// `log_dir` from configuration.
    pub config_log_dir: Option<PathBuf>,
}

impl ObservabilityConfig {
    /// Read the environment overrides and combine them with the configured
    /// log directory.
    pub fn from_env(config_log_dir: Option<PathBuf>) -> Self {
        Self {
            service: env!("CARGO_PKG_NAME").to_string(),
            log_path: std::env::var_os(ENV_LOG_PATH).map(PathBuf::from),
            env_log_dir: std::env::var_os(ENV_LOG_DIR).map(PathBuf::from),
            config_log_dir,
        }
    }

    fn file_name(&self) -> String {
        format!("{}{LOG_FILE_SUFFIX}", self.service)
    }

    /// Pick the log file location.
    ///
    /// Order: `TALLY_LOG_PATH`, `TALLY_LOG_DIR`, configured `log_dir`, then
    /// the platform's local data directory. Explicit choices that are not
    /// writable are errors rather than silently skipped.
    fn resolve(&self) -> Result<LogFile, String> {
        if let Some(ref path) = self.log_path {
            return LogFile::from_path(path);
        }
        if let Some(dir) = self.env_log_dir.as_ref().or(self.config_log_dir.as_ref()) {
            return LogFile::in_dir(dir.clone(), self.file_name());
        }

        directories::ProjectDirs::from("", "", &self.service)
            .map(|dirs| dirs.data_local_dir().join("logs"))
            .ok_or_else(|| "no home directory for default log location".to_string())
            .and_then(|dir| LogFile::in_dir(dir, self.file_name()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct LogFile {
    dir: PathBuf,
    file_name: String,
}

impl LogFile {
    fn from_path(path: &Path) -> Result<Self, String> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| format!("{ENV_LOG_PATH} must end in a UTF-8 file name"))?
            .to_string();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self::in_dir(dir, file_name)
    }

    fn in_dir(dir: PathBuf, file_name: String) -> Result<Self, String> {
        std::fs::create_dir_all(&dir)
            .map_err(|e| format!("cannot create log directory {}: {e}", dir.display()))?;
        let path = dir.join(&file_name);
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| format!("cannot open log file {}: {e}", path.display()))?;
        Ok(Self { dir, file_name })
    }

    fn writer(&self) -> (NonBlocking, WorkerGuard) {
        tracing_appender::non_blocking(tracing_appender::rolling::daily(
            &self.dir,
            &self.file_name,
        ))
    }
}

/// Keeps the background log writer alive; drop it last.
pub struct ObservabilityGuard {
    _worker: WorkerGuard,
}

/// Install the global subscriber.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_observability(
    cfg: &ObservabilityConfig,
    env_filter: EnvFilter,
) -> Result<ObservabilityGuard> {
    let (writer, worker) = match cfg.resolve() {
        Ok(file) => file.writer(),
        Err(reason) => {
            eprintln!("Warning: {reason}. Logging to stderr.");
            tracing_appender::non_blocking(std::io::stderr())
        }
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(JsonLines::new(cfg.service.clone(), writer))
        .try_init()?;

    tracing::debug!(service = %cfg.service, "observability initialized");
    Ok(ObservabilityGuard { _worker: worker })
}

/// Build an `EnvFilter` based on CLI flags and environment.
///
/// Priority: quiet flag > verbose flag > RUST_LOG env > default_level
pub fn env_filter(quiet: bool, verbose: u8, default_level: &str) -> EnvFilter {
    match (quiet, verbose) {
        (true, _) => EnvFilter::new("error"),
        (false, 0) => {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
        }
        (false, 1) => EnvFilter::new("debug"),
        (false, _) => EnvFilter::new("trace"),
    }
}

// ============================================================================
// JSON Lines Layer
// ============================================================================

struct JsonLines<W> {
    service: String,
    writer: W,
}

impl<W> JsonLines<W> {
    const fn new(service: String, writer: W) -> Self {
        Self { service, writer }
    }

    fn entry(&self, event: &Event<'_>) -> Map<String, Value> {
        let meta = event.metadata();
        let mut entry = Map::new();
        entry.insert("timestamp".into(), Value::String(timestamp_now()));
        entry.insert(
            "level".into(),
            Value::String(meta.level().as_str().to_ascii_lowercase()),
        );
        entry.insert("service".into(), Value::String(self.service.clone()));
        entry.insert("target".into(), Value::String(meta.target().to_string()));
        entry
    }
}

/// Fields recorded on a span, stored in its extensions.
#[derive(Clone, Debug, Default)]
struct SpanFields(Map<String, Value>);

impl<S, W> tracing_subscriber::Layer<S> for JsonLines<W>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'writer> tracing_subscriber::fmt::MakeWriter<'writer> + Send + Sync + 'static,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: LayerContext<'_, S>,
    ) {
        let Some(span) = ctx.span(id) else { return };
        let mut fields = FieldCollector::default();
        attrs.record(&mut fields);
        span.extensions_mut().insert(SpanFields(fields.0));
    }

    fn on_record(
        &self,
        id: &tracing::span::Id,
        values: &tracing::span::Record<'_>,
        ctx: LayerContext<'_, S>,
    ) {
        let Some(span) = ctx.span(id) else { return };
        let mut fields = FieldCollector::default();
        values.record(&mut fields);
        let mut extensions = span.extensions_mut();
        match extensions.get_mut::<SpanFields>() {
            Some(existing) => existing.0.extend(fields.0),
            None => extensions.insert(SpanFields(fields.0)),
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: LayerContext<'_, S>) {
        let mut entry = self.entry(event);

        if let Some(scope) = ctx.event_scope(event) {
            let mut spans = Vec::new();
            for span in scope.from_root() {
                spans.push(Value::String(span.name().to_string()));
                if let Some(SpanFields(fields)) = span.extensions().get::<SpanFields>() {
                    entry.extend(fields.clone());
                }
            }
            entry.insert("spans".into(), Value::Array(spans));
        }

        let mut fields = FieldCollector::default();
        event.record(&mut fields);
        entry.extend(fields.0);

        let mut line = match serde_json::to_vec(&Value::Object(entry)) {
            Ok(line) => line,
            Err(_) => return,
        };
        line.push(b'\n');
        let _ = self.writer.make_writer().write_all(&line);
    }
}

#[derive(Default)]
struct FieldCollector(Map<String, Value>);

impl FieldCollector {
    fn put(&mut self, field: &Field, value: Value) {
        self.0.insert(field.name().to_string(), value);
    }
}

impl Visit for FieldCollector {
    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, Value::Bool(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if let Some(number) = serde_json::Number::from_f64(value) {
            self.put(field, Value::Number(number));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, Value::String(value.to_string()));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.put(field, Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.put(field, Value::String(format!("{value:?}")));
    }
}

/// Current UTC time as RFC 3339 with millisecond precision.
fn timestamp_now() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let secs = elapsed.as_secs();
    let (year, month, day) = civil_from_days((secs / 86_400) as i64);
    let clock = secs % 86_400;

    format!(
        "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}.{:03}Z",
        clock / 3600,
        clock % 3600 / 60,
        clock % 60,
        elapsed.subsec_millis(),
    )
}

/// Days since 1970-01-01 to a proleptic Gregorian (year, month, day).
const fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let shifted = days + 719_468;
    let era = if shifted >= 0 { shifted } else { shifted - 146_096 } / 146_097;
    let day_of_era = (shifted - era * 146_097) as u32;
    let year_of_era =
        (day_of_era - day_of_era / 1460 + day_of_era / 36_524 - day_of_era / 146_096) / 365;
    let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
    let month_index = (5 * day_of_year + 2) / 153;
    let day = day_of_year - (153 * month_index + 2) / 5 + 1;
    let month = if month_index < 10 { month_index + 3 } else { month_index - 9 };
    let year = year_of_era as i64 + era * 400 + if month <= 2 { 1 } else { 0 };
    (year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &Path) -> ObservabilityConfig {
        ObservabilityConfig {
            service: "demo".into(),
            config_log_dir: Some(dir.join("config")),
            ..ObservabilityConfig::default()
        }
    }

    #[test]
    fn quiet_wins_over_verbose() {
        assert_eq!(env_filter(true, 2, "info").to_string(), "error");
    }

    #[test]
    fn verbosity_maps_to_debug_then_trace() {
        assert_eq!(env_filter(false, 1, "info").to_string(), "debug");
        assert_eq!(env_filter(false, 3, "info").to_string(), "trace");
    }

    #[test]
    fn explicit_path_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = config_in(tmp.path());
        cfg.env_log_dir = Some(tmp.path().join("env"));
        cfg.log_path = Some(tmp.path().join("custom").join("run.jsonl"));

        let file = cfg.resolve().unwrap();
        assert_eq!(file.dir, tmp.path().join("custom"));
        assert_eq!(file.file_name, "run.jsonl");
        assert!(file.dir.join("run.jsonl").exists());
    }

    #[test]
    fn env_dir_beats_config_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = config_in(tmp.path());
        cfg.env_log_dir = Some(tmp.path().join("env"));

        let file = cfg.resolve().unwrap();
        assert_eq!(file.dir, tmp.path().join("env"));
        assert_eq!(file.file_name, "demo.jsonl");
    }

    #[test]
    fn config_dir_used_without_env() {
        let tmp = tempfile::tempdir().unwrap();
        let file = config_in(tmp.path()).resolve().unwrap();
        assert_eq!(file.dir, tmp.path().join("config"));
    }

    #[test]
    fn log_path_creates_missing_parent() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("deeper").join("bare.jsonl");
        let file = LogFile::from_path(&path).unwrap();
        assert_eq!(file.dir, tmp.path().join("nested").join("deeper"));
        assert!(path.exists());
    }

    #[test]
    fn log_path_requires_file_name() {
        assert!(LogFile::from_path(Path::new("/")).is_err());
    }

    #[test]
    fn timestamp_is_rfc3339_millis() {
        let ts = timestamp_now();
        assert_eq!(ts.len(), 24, "{ts}");
        assert!(ts.ends_with('Z'));
        assert_eq!(&ts[10..11], "T");
    }

    #[test]
    fn civil_dates() {
        assert_eq!(civil_from_days(0), (1970, 1, 1));
        assert_eq!(civil_from_days(11_016), (2000, 2, 29));
        assert_eq!(civil_from_days(-1), (1969, 12, 31));
    }
}
