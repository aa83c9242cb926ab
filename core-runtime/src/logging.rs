//! # Logging & Tracing Infrastructure
//!
//! Structured logging for the player core, built on `tracing`:
//! - JSON, pretty and compact output formats
//! - Per-crate filtering
//! - Scrubbing of credentials, signed media URLs and local paths
//! - Mirroring into the host's log pipeline via [`LoggerSink`]
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_traits::logging::{ConsoleLogger, LogLevel};
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     init_logging(
//!         LoggingConfig::default()
//!             .with_format(LogFormat::Compact)
//!             .with_level(LogLevel::Debug)
//!             .with_logger_sink(Arc::new(ConsoleLogger::default())),
//!     )
//!     .expect("logging already initialized");
//!
//!     tracing::info!(track_id = "abc", "Player started");
//! }
//! ```
//!
//! ## Host sink
//!
//! Events that pass the filter are also converted into a [`LogEntry`] and
//! handed to the configured sink (OSLog, Logcat). With redaction on, each
//! field goes through [`redact_if_sensitive`] before it leaves the core.

use crate::error::{Error, Result};
use bridge_traits::logging::{LogEntry, LogLevel, LoggerSink};

use std::fmt;
use std::io;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Crates whose level follows [`LoggingConfig::level`] when no custom
/// filter is given.
const PLAYER_TARGETS: &[&str] = &[
    "player_workspace",
    "core_runtime",
    "core_playback",
    "core_service",
    "bridge_desktop",
];

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, human oriented
    Pretty,
    /// One JSON object per event
    Json,
    /// One short line per event
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            LogFormat::Pretty
        } else {
            LogFormat::Json
        }
    }
}

/// Logging configuration
#[derive(Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Level applied to the player crates; dependencies stay at `warn`
    pub level: LogLevel,
    /// Scrub sensitive fields before forwarding to the host sink
    pub redact_pii: bool,
    /// Full `EnvFilter` directive, replacing the per-crate default
    pub filter: Option<String>,
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
    pub enable_spans: bool,
    pub display_target: bool,
    pub display_thread_info: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            redact_pii: true,
            filter: None,
            logger_sink: None,
            enable_spans: true,
            display_target: true,
            display_thread_info: false,
        }
    }
}

impl fmt::Debug for LoggingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingConfig")
            .field("format", &self.format)
            .field("level", &self.level)
            .field("redact_pii", &self.redact_pii)
            .field("filter", &self.filter)
            .field("has_logger_sink", &self.logger_sink.is_some())
            .field("enable_spans", &self.enable_spans)
            .finish()
    }
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_pii_redaction(mut self, redact: bool) -> Self {
        self.redact_pii = redact;
        self
    }

    pub fn with_filter(mut self, directive: impl Into<String>) -> Self {
        self.filter = Some(directive.into());
        self
    }

    pub fn with_logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    pub fn with_spans(mut self, enable: bool) -> Self {
        self.enable_spans = enable;
        self
    }

    pub fn with_target(mut self, display: bool) -> Self {
        self.display_target = display;
        self
    }

    pub fn with_thread_info(mut self, display: bool) -> Self {
        self.display_thread_info = display;
        self
    }

    fn directive(&self) -> String {
        if let Some(custom) = &self.filter {
            return custom.clone();
        }

        let level = self.level.as_str();
        let mut directive: Vec<String> = PLAYER_TARGETS
            .iter()
            .map(|target| format!("{target}={level}"))
            .collect();
        directive.push("sqlx=warn".to_string());
        directive.join(",")
    }
}

/// Install the global tracing subscriber.
///
/// Call once during application startup. A second call fails with
/// [`Error::Logging`] because a global subscriber is already installed.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = build_filter(&config)?;
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(LoggerSinkLayer::new(
            config.logger_sink.clone(),
            config.redact_pii,
        ));

    let span_events = if config.enable_spans {
        FmtSpan::ACTIVE
    } else {
        FmtSpan::NONE
    };

    let installed = match config.format {
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(config.display_target)
                    .with_thread_ids(config.display_thread_info)
                    .with_thread_names(config.display_thread_info)
                    .with_span_events(span_events)
                    .with_writer(io::stdout),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(config.enable_spans)
                    .with_span_list(config.enable_spans)
                    .with_target(config.display_target)
                    .with_thread_ids(config.display_thread_info)
                    .with_thread_names(config.display_thread_info)
                    .with_writer(io::stdout),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(config.display_target)
                    .with_thread_ids(config.display_thread_info)
                    .with_thread_names(config.display_thread_info)
                    .with_writer(io::stdout),
            )
            .try_init(),
    };

    installed.map_err(|e| Error::Logging(e.to_string()))
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let directive = config.directive();
    EnvFilter::try_new(&directive)
        .map_err(|e| Error::Logging(format!("invalid filter {directive:?}: {e}")))
}

/// Mirrors events into a host [`LoggerSink`].
struct LoggerSinkLayer {
    sink: Option<Arc<dyn LoggerSink>>,
    redact_pii: bool,
}

impl LoggerSinkLayer {
    fn new(sink: Option<Arc<dyn LoggerSink>>, redact_pii: bool) -> Self {
        Self { sink, redact_pii }
    }

    fn entry_for<S>(&self, event: &Event<'_>, ctx: &Context<'_, S>, level: LogLevel) -> LogEntry
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        let metadata = event.metadata();
        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        let message = fields
            .message
            .take()
            .unwrap_or_else(|| metadata.name().to_string());
        let mut entry = LogEntry::new(level, metadata.target(), message);

        for (name, value) in fields.values {
            let value = if self.redact_pii {
                redact_if_sensitive(name, &value)
            } else {
                value
            };
            entry = entry.with_field(name, value);
        }

        match ctx.lookup_current() {
            Some(span) => entry.with_span_id(span.name()),
            None => entry,
        }
    }
}

impl<S> Layer<S> for LoggerSinkLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let Some(sink) = &self.sink else {
            return;
        };

        let level = sink_level(*event.metadata().level());
        if level < sink.min_level() {
            return;
        }

        let entry = self.entry_for(event, &ctx, level);
        let sink = Arc::clone(sink);

        // Inside a runtime the sink runs on its own task; otherwise inline.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = sink.log(entry).await {
                        eprintln!("LoggerSink error: {e}");
                    }
                });
            }
            Err(_) => {
                if let Err(e) = futures::executor::block_on(sink.log(entry)) {
                    eprintln!("LoggerSink error: {e}");
                }
            }
        }
    }
}

/// Collects an event's fields as strings. Numbers and bools go through
/// `record_debug`, whose output matches their `Display`.
#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    values: Vec<(&'static str, String)>,
}

impl FieldCollector {
    fn push(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            name => self.values.push((name, value)),
        }
    }
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, value.to_owned());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.push(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.push(field, format!("{value:?}"));
    }
}

fn sink_level(level: tracing::Level) -> LogLevel {
    match level {
        tracing::Level::ERROR => LogLevel::Error,
        tracing::Level::WARN => LogLevel::Warn,
        tracing::Level::INFO => LogLevel::Info,
        tracing::Level::DEBUG => LogLevel::Debug,
        _ => LogLevel::Trace,
    }
}

/// How a log field is treated when redaction is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldClass {
    /// Dropped entirely.
    Credential,
    /// Query string removed.
    MediaUri,
    /// Reduced to the file name.
    LocalPath,
    Plain,
}

impl FieldClass {
    fn of(field_name: &str) -> Self {
        const CREDENTIAL_MARKERS: &[&str] = &[
            "token",
            "password",
            "secret",
            "api_key",
            "authorization",
            "bearer",
            "signature",
        ];

        let name = field_name.to_ascii_lowercase();
        if CREDENTIAL_MARKERS.iter().any(|marker| name.contains(marker)) {
            FieldClass::Credential
        } else if name.ends_with("uri") || name.ends_with("url") {
            FieldClass::MediaUri
        } else if name == "path" || name.ends_with("_path") {
            FieldClass::LocalPath
        } else {
            FieldClass::Plain
        }
    }
}

/// Redact a field value according to its name, masking stray e-mail
/// addresses in otherwise plain fields.
///
/// ```
/// use core_runtime::logging::redact_if_sensitive;
///
/// assert_eq!(redact_if_sensitive("access_token", "abc"), "[REDACTED]");
/// assert_eq!(
///     redact_if_sensitive("uri", "https://cdn.example.com/a.mp4?sig=xyz"),
///     "https://cdn.example.com/a.mp4?[REDACTED]"
/// );
/// assert_eq!(redact_if_sensitive("path", "/home/ana/Music/a.m4a"), "a.m4a");
/// ```
pub fn redact_if_sensitive(field_name: &str, value: &str) -> String {
    match FieldClass::of(field_name) {
        FieldClass::Credential => "[REDACTED]".to_string(),
        FieldClass::MediaUri => redact_uri(value),
        FieldClass::LocalPath => strip_path(value).to_string(),
        FieldClass::Plain => mask_email(value).unwrap_or_else(|| value.to_string()),
    }
}

fn mask_email(value: &str) -> Option<String> {
    if value.contains("://") {
        return None;
    }
    let (local, domain) = value.split_once('@')?;
    if !domain.contains('.') {
        return None;
    }
    let first = local.chars().next().map(String::from).unwrap_or_default();
    Some(format!("{first}***@[REDACTED]"))
}

/// Drop the query string of a media URI; CDN signatures live there.
pub fn redact_uri(uri: &str) -> String {
    match uri.split_once('?') {
        Some((base, _)) => format!("{base}?[REDACTED]"),
        None => uri.to_string(),
    }
}

/// Reduce a local path to its file name. Downloaded tracks live under the
/// host's private storage, whose path often contains the device user name.
pub fn strip_path(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as SinkResult;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        entries: Mutex<Vec<LogEntry>>,
    }

    #[async_trait]
    impl LoggerSink for RecordingSink {
        async fn log(&self, entry: LogEntry) -> SinkResult<()> {
            self.entries.lock().unwrap().push(entry);
            Ok(())
        }

        fn min_level(&self) -> LogLevel {
            LogLevel::Debug
        }
    }

    fn recording(redact: bool) -> (Arc<RecordingSink>, impl Subscriber + Send + Sync) {
        let sink = Arc::new(RecordingSink::default());
        let layer = LoggerSinkLayer::new(Some(sink.clone() as Arc<dyn LoggerSink>), redact);
        (sink, tracing_subscriber::registry().with(layer))
    }

    #[test]
    fn default_directive_covers_player_crates() {
        let directive = LoggingConfig::default()
            .with_level(LogLevel::Debug)
            .directive();
        assert!(directive.contains("core_playback=debug"));
        assert!(directive.contains("core_service=debug"));
        assert!(directive.ends_with("sqlx=warn"));
        assert!(build_filter(&LoggingConfig::default()).is_ok());
    }

    #[test]
    fn custom_filter_replaces_default() {
        let config = LoggingConfig::default().with_filter("core_playback=trace");
        assert_eq!(config.directive(), "core_playback=trace");
    }

    #[test]
    fn field_classes() {
        assert_eq!(FieldClass::of("refresh_token"), FieldClass::Credential);
        assert_eq!(FieldClass::of("Authorization"), FieldClass::Credential);
        assert_eq!(FieldClass::of("artwork_uri"), FieldClass::MediaUri);
        assert_eq!(FieldClass::of("download_path"), FieldClass::LocalPath);
        assert_eq!(FieldClass::of("track_id"), FieldClass::Plain);
    }

    #[test]
    fn plain_values_pass_unless_email() {
        assert_eq!(redact_if_sensitive("title", "Song Name"), "Song Name");
        assert_eq!(redact_if_sensitive("artist", "AC@DC"), "AC@DC");
        assert_eq!(redact_if_sensitive("user", "ana@example.com"), "a***@[REDACTED]");
    }

    #[test]
    fn strip_path_handles_both_separators() {
        assert_eq!(strip_path("/home/user/music/song.mp3"), "song.mp3");
        assert_eq!(strip_path("C:\\Users\\Ana\\Music\\song.mp3"), "song.mp3");
        assert_eq!(strip_path("song.mp3"), "song.mp3");
        assert_eq!(strip_path("/var/log/"), "");
    }

    #[test]
    fn sink_receives_structured_entry() {
        let (sink, subscriber) = recording(false);
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "core_playback::engine", track_id = "abc", attempt = 2u32, "track loaded");
            tracing::trace!("below the sink's level");
        });

        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.level, LogLevel::Info);
        assert_eq!(entry.target, "core_playback::engine");
        assert_eq!(entry.message, "track loaded");
        assert_eq!(entry.fields.get("track_id").map(String::as_str), Some("abc"));
        assert_eq!(entry.fields.get("attempt").map(String::as_str), Some("2"));
    }

    #[test]
    fn sink_entries_are_redacted() {
        let (sink, subscriber) = recording(true);
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(
                uri = "https://cdn.example.com/a.mp4?sig=1",
                path = "/data/user/0/files/a.m4a",
                "acquire failed"
            );
        });

        let entries = sink.entries.lock().unwrap();
        let fields = &entries[0].fields;
        assert_eq!(
            fields.get("uri").map(String::as_str),
            Some("https://cdn.example.com/a.mp4?[REDACTED]")
        );
        assert_eq!(fields.get("path").map(String::as_str), Some("a.m4a"));
    }
}
