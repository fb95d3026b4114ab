// Logging for roost
//
// Built on the `tracing` ecosystem. The pool itself only emits events; installing
// a subscriber is left to the application, and the helpers below cover the usual
// setups.
//
// ## Basic Initialization
//
// ```rust
// use roost::logging;
//
// // INFO level, console output
// logging::init_default();
//
// // Or custom settings
// let config = logging::LogConfig {
//     level: tracing::Level::DEBUG,
//     json_format: false,
//     ..Default::default()
// };
// logging::init(config);
// ```
//
// ## Worker threads
//
// Worker and attempt threads are spawned with the dispatcher that was current
// when the pool was built (see `current_subscriber`), so a scoped subscriber
// installed with `tracing::subscriber::with_default` also sees their events.
//
// Every worker thread runs inside a `worker` span carrying its index. Task
// events carry a `task_id` field matching the id returned by `Pool::submit`.

use std::fs::{File, OpenOptions};
use std::io;
use std::sync::{Mutex, Once};
use tracing::{Level, Subscriber};
use tracing_subscriber::{EnvFilter, filter::LevelFilter, fmt, prelude::*};

pub use tracing;

/// Configuration for the logging helpers
///
/// # Examples
///
/// ```rust
/// use roost::logging::LogConfig;
/// use roost::logging::tracing::Level;
///
/// let config = LogConfig {
///     level: Level::DEBUG,
///     json_format: true,
///     show_file_line: false,
///     show_thread_info: true,
///     show_time: true,
///     target_filters: Some("roost=debug,roost::executor=trace".to_string()),
/// };
/// ```
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: Level,
    /// Whether to use JSON format for logs
    pub json_format: bool,
    /// Whether to include file and line information
    pub show_file_line: bool,
    /// Whether to include thread name/id
    pub show_thread_info: bool,
    /// Whether to include timestamps
    pub show_time: bool,
    /// Target filter expressions (format: "target=level,target2=level2,...")
    pub target_filters: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            show_file_line: true,
            show_thread_info: true,
            show_time: true,
            target_filters: None,
        }
    }
}

// Initialization guard to ensure we only initialize once
static INIT: Once = Once::new();

fn env_filter(config: &LogConfig) -> EnvFilter {
    let mut filter =
        EnvFilter::from_default_env().add_directive(LevelFilter::from_level(config.level).into());
    if let Some(filters) = &config.target_filters {
        for directive in filters.split(',') {
            if let Ok(directive) = directive.trim().parse() {
                filter = filter.add_directive(directive);
            }
        }
    }
    filter
}

/// Initialize the global subscriber with the given configuration
///
/// Safe to call multiple times; only the first call takes effect.
pub fn init(config: LogConfig) {
    INIT.call_once(|| {
        let registry = tracing_subscriber::registry().with(env_filter(&config));

        let subscriber: Box<dyn Subscriber + Send + Sync> = match (config.json_format, config.show_time) {
            (true, _) => Box::new(registry.with(fmt::layer().json().flatten_event(true))),
            (false, true) => Box::new(registry.with(
                fmt::layer()
                    .with_ansi(atty::is(atty::Stream::Stdout))
                    .with_file(config.show_file_line)
                    .with_line_number(config.show_file_line)
                    .with_thread_names(config.show_thread_info)
                    .with_thread_ids(config.show_thread_info),
            )),
            (false, false) => Box::new(registry.with(
                fmt::layer()
                    .without_time()
                    .with_ansi(atty::is(atty::Stream::Stdout))
                    .with_file(config.show_file_line)
                    .with_line_number(config.show_file_line)
                    .with_thread_names(config.show_thread_info)
                    .with_thread_ids(config.show_thread_info),
            )),
        };

        set_global_subscriber(subscriber);
    });
}

fn set_global_subscriber<S>(subscriber: S)
where
    S: Subscriber + Send + Sync + 'static,
{
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Error setting global tracing subscriber: {}", err);
    }
}

/// Opens `path` in append mode, creating it if needed.
///
/// The handle is opened once and shared by every event the layer writes.
pub fn file_writer(path: &str) -> io::Result<Mutex<File>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(Mutex::new(file))
}

/// Initialize logging to both console and `log_file`
///
/// The file layer never uses ANSI colors and always records file, line and
/// thread information. Fails if the file cannot be opened.
pub fn init_with_file(config: LogConfig, log_file: &str) -> io::Result<()> {
    let writer = file_writer(log_file)?;

    INIT.call_once(|| {
        let console_layer = fmt::layer()
            .with_ansi(atty::is(atty::Stream::Stdout))
            .with_file(config.show_file_line)
            .with_line_number(config.show_file_line)
            .with_thread_names(config.show_thread_info)
            .with_thread_ids(config.show_thread_info);

        let file_layer = fmt::layer()
            .with_ansi(false)
            .with_writer(writer)
            .with_file(true)
            .with_line_number(true)
            .with_thread_names(true)
            .with_thread_ids(true);

        let subscriber = tracing_subscriber::registry()
            .with(env_filter(&config))
            .with(console_layer)
            .with(file_layer);

        set_global_subscriber(subscriber);
    });

    Ok(())
}

/// INFO level with human-readable console output.
pub fn init_default() {
    init(LogConfig::default());
}

/// DEBUG level, with TRACE for task execution.
pub fn init_development() {
    init(LogConfig {
        level: Level::DEBUG,
        target_filters: Some("roost=debug,roost::executor=trace".to_string()),
        ..Default::default()
    });
}

/// JSON output at INFO level without file/line information.
pub fn init_production() {
    init(LogConfig {
        level: Level::INFO,
        json_format: true,
        show_file_line: false,
        show_thread_info: true,
        show_time: true,
        target_filters: None,
    });
}

/// Warnings and errors only, compact output for test runs.
///
/// ```rust
/// roost::logging::init_test();
/// roost::logging::tracing::warn!("only warnings and errors are printed");
/// ```
pub fn init_test() {
    init(LogConfig {
        level: Level::WARN,
        json_format: false,
        show_file_line: true,
        show_thread_info: false,
        show_time: false,
        target_filters: None,
    });
}

/// Create a span for a pool
///
/// ```rust
/// let span = roost::pool_span!("roost", workers = 4);
/// let _guard = span.enter();
/// ```
#[macro_export]
macro_rules! pool_span {
    ($name:expr) => {
        $crate::logging::tracing::info_span!("pool", name = $name)
    };
    ($name:expr, $($fields:tt)*) => {
        $crate::logging::tracing::info_span!("pool", name = $name, $($fields)*)
    };
}

/// Create a span for a worker thread
#[macro_export]
macro_rules! worker_span {
    ($index:expr) => {
        $crate::logging::tracing::info_span!("worker", index = $index)
    };
    ($index:expr, $($fields:tt)*) => {
        $crate::logging::tracing::info_span!("worker", index = $index, $($fields)*)
    };
}

/// Log worker lifecycle events
///
/// ```rust
/// roost::log_worker!(3, "started");
/// ```
#[macro_export]
macro_rules! log_worker {
    ($index:expr, $event:expr) => {
        $crate::logging::tracing::info!(worker = $index, event = $event)
    };
    ($index:expr, $event:expr, $($fields:tt)*) => {
        $crate::logging::tracing::info!(worker = $index, event = $event, $($fields)*)
    };
}

/// Log task processing events
///
/// ```rust
/// let id = roost::TaskId::new();
/// roost::log_task!(id, "retrying", attempt = 1);
/// ```
#[macro_export]
macro_rules! log_task {
    ($task_id:expr, $event:expr) => {
        $crate::logging::tracing::debug!(task_id = %$task_id, event = $event)
    };
    ($task_id:expr, $event:expr, $($fields:tt)*) => {
        $crate::logging::tracing::debug!(task_id = %$task_id, event = $event, $($fields)*)
    };
}

/// Get the current tracing dispatcher
///
/// Captured by the pool at construction and installed on every thread it spawns.
#[inline]
pub fn current_subscriber() -> tracing::Dispatch {
    tracing::dispatcher::get_default(|d| d.clone())
}
