use std::fmt::Write as _;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use once_cell::sync::{Lazy, OnceCell};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::context::{LoggingContext, RotationChecker};
use crate::format::Record;
use crate::lifecycle::LogManager;
use crate::{Error, LogConfig, Result};

/// Target prefix of the crate's own diagnostics.
const CRATE_TARGET: &str = "daylog";

static ROTATION_CHECKER: Lazy<Mutex<Option<RotationChecker>>> = Lazy::new(|| Mutex::new(None));

/// The context a [`FileLayer`] writes to, filled in once the files are up.
type ContextSlot = Arc<OnceCell<LoggingContext>>;

/// Initialize logging with the given configuration and optional CLI verbosity override.
///
/// Returns the file context when file logging is configured so the host can
/// run rotation checks or shut it down explicitly.
pub fn init_logging(config: &LogConfig, cli_verbose: Option<u8>) -> Result<Option<LoggingContext>> {
    let (subscriber, slot) = build_subscriber(config, cli_verbose)?;
    subscriber.try_init().map_err(|e| Error::Init(e.to_string()))?;

    // The subscriber is installed first so the startup rotation check is logged.
    let context = attach_files(config, slot)?;

    if let (Some(ctx), Some(file)) = (&context, &config.file)
        && file.check_interval_secs > 0
    {
        let checker = ctx.spawn_rotation_checker(Duration::from_secs(file.check_interval_secs))?;
        *ROTATION_CHECKER.lock().map_err(|_| Error::Poisoned)? = Some(checker);
    }

    Ok(context)
}

/// Stop the background rotation checker started by [`init_logging`].
pub fn stop_rotation_checker() {
    let checker = match ROTATION_CHECKER.lock() {
        Ok(mut guard) => guard.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    };
    drop(checker);
}

fn build_subscriber(
    config: &LogConfig,
    cli_verbose: Option<u8>,
) -> Result<(impl Subscriber + Send + Sync + 'static, Option<ContextSlot>)> {
    let log_spec = effective_log_spec(config, cli_verbose);
    let env_filter = EnvFilter::try_new(&log_spec).map_err(|e| Error::Init(e.to_string()))?;

    let console_layer = config.console.then(|| {
        let builder = tracing_subscriber::fmt::layer()
            .with_target(config.target)
            .with_thread_ids(false)
            .with_thread_names(false);
        if config.format == "json" {
            builder.json().boxed()
        } else {
            builder.boxed()
        }
    });

    let slot = config.file.as_ref().map(|_| ContextSlot::default());
    let file_layer = slot.clone().map(|context| FileLayer { context });

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer);
    Ok((subscriber, slot))
}

/// Create and start the file context, then hand it to the file layer.
fn attach_files(config: &LogConfig, slot: Option<ContextSlot>) -> Result<Option<LoggingContext>> {
    let (Some(file), Some(slot)) = (&config.file, slot) else {
        return Ok(None);
    };

    let context = LoggingContext::wrap(LogManager::new(file)?);
    context.start()?;
    slot.set(context.clone())
        .map_err(|_| Error::Init("file layer already attached".to_string()))?;
    Ok(Some(context))
}

/// A layer writing `tracing` events to the rotating files.
///
/// Events emitted by this crate itself are not written back, since they are
/// produced while the file pair is locked for rotation.
pub struct FileLayer {
    context: ContextSlot,
}

impl FileLayer {
    /// Create a layer over `context`.
    pub fn new(context: LoggingContext) -> Self {
        Self {
            context: Arc::new(OnceCell::with_value(context)),
        }
    }
}

impl<S: Subscriber> Layer<S> for FileLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if is_own_target(meta.target()) {
            return;
        }
        let Some(context) = self.context.get() else {
            return;
        };

        let mut visitor = RecordVisitor::default();
        event.record(&mut visitor);

        let mut record = Record::new(*meta.level(), visitor.message()).with_target(meta.target());
        record.file = meta.file().map(str::to_string);
        record.line = meta.line();
        record.exception = visitor.exception;
        record.stack = visitor.stack;

        // After shutdown the files are detached and records are dropped. Any
        // other failure loses a record and there is no caller to return it to.
        match context.log(&record) {
            Ok(()) | Err(Error::Closed) => {}
            Err(e) => panic!("failed to write log record: {}", e),
        }
    }
}

/// Collects the message, extra fields and error text of an event.
#[derive(Default)]
struct RecordVisitor {
    message: String,
    fields: String,
    exception: Option<String>,
    stack: Option<String>,
}

impl RecordVisitor {
    /// The message followed by any `key=value` fields.
    fn message(&self) -> String {
        match (self.message.is_empty(), self.fields.is_empty()) {
            (_, true) => self.message.clone(),
            (true, false) => self.fields.trim_start().to_string(),
            (false, false) => format!("{}{}", self.message, self.fields),
        }
    }

    fn record_text(&mut self, field: &Field, text: String) {
        match field.name() {
            "message" => self.message = text,
            "exception" | "error" => self.exception = Some(text),
            "backtrace" | "stack" => self.stack = Some(text),
            name => {
                let _ = write!(self.fields, " {}={}", name, text);
            }
        }
    }
}

impl Visit for RecordVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_text(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        let mut text = value.to_string();
        let mut source = value.source();
        while let Some(cause) = source {
            let _ = write!(text, "\nCaused by: {}", cause);
            source = cause.source();
        }
        match field.name() {
            "message" => self.message = text,
            "backtrace" | "stack" => self.stack = Some(text),
            _ => self.exception = Some(text),
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.record_text(field, format!("{:?}", value));
    }
}

fn is_own_target(target: &str) -> bool {
    target
        .strip_prefix(CRATE_TARGET)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

/// Determine the effective log specification, considering config and CLI overrides.
fn effective_log_spec(config: &LogConfig, cli_verbose: Option<u8>) -> String {
    // RUST_LOG takes precedence over everything
    if let Ok(rust_log) = std::env::var("RUST_LOG")
        && !rust_log.is_empty()
    {
        return rust_log;
    }

    if let Some(verbose) = cli_verbose {
        return match verbose {
            0 => config.level.clone(),
            1 => format!("{},{}=debug", config.level, CRATE_TARGET),
            2 => format!("{},{}=trace", config.level, CRATE_TARGET),
            _ => "trace".to_string(),
        };
    }

    if config.level.is_empty() {
        format!("info,{}=info", CRATE_TARGET)
    } else {
        format!("{},{}={}", config.level, CRATE_TARGET, config.level)
    }
}
