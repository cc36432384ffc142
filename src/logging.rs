// Unified tracing setup for the crate's pools and actors, built on the
// `tracing` ecosystem. Hosts that install their own subscriber can skip this
// module entirely.

use std::sync::Once;

use tracing::{Level, Subscriber};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*, registry::Registry};

/// Configuration for the crate's log output.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display.
    pub level: Level,
    /// Whether to include file and line information.
    pub show_file_line: bool,
    /// Whether to include thread names and ids. Worker threads carry their
    /// pool name, which makes this the most useful field when debugging
    /// fairness or resize behaviour.
    pub show_thread_info: bool,
    /// Whether to include timestamps.
    pub show_time: bool,
    /// Target filter expressions ("target=level,target2=level2,...").
    pub target_filters: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            show_file_line: false,
            show_thread_info: true,
            show_time: true,
            target_filters: None,
        }
    }
}

// Initialization guard so competing callers only install one subscriber.
static INIT: Once = Once::new();

/// Initialize the logging system with the given configuration.
pub fn init(config: LogConfig) {
    INIT.call_once(|| {
        let mut env_filter = EnvFilter::from_default_env().add_directive(config.level.into());
        if let Some(filters) = config.target_filters {
            for filter in filters.split(',') {
                if let Ok(directive) = filter.parse() {
                    env_filter = env_filter.add_directive(directive);
                }
            }
        }

        let fmt_layer = fmt::layer()
            .with_ansi(atty::is(atty::Stream::Stdout))
            .with_file(config.show_file_line)
            .with_line_number(config.show_file_line)
            .with_thread_names(config.show_thread_info)
            .with_thread_ids(config.show_thread_info);

        let subscriber: Box<dyn Subscriber + Send + Sync> = if config.show_time {
            Box::new(
                Registry::default()
                    .with(env_filter)
                    .with(fmt_layer.with_timer(fmt::time::uptime())),
            )
        } else {
            Box::new(Registry::default().with(env_filter).with(fmt_layer.without_time()))
        };

        if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("failed to set global tracing subscriber: {err}");
        }
    });
}

/// Initialize default logging.
///
/// A reasonable configuration for most hosts: INFO level, thread names on.
pub fn init_default() {
    init(LogConfig::default());
}

/// Initialize logging for testing.
///
/// Warnings and errors only, no timestamps, to keep test output clean.
pub fn init_test() {
    init(LogConfig {
        level: Level::WARN,
        show_file_line: true,
        show_thread_info: false,
        show_time: false,
        target_filters: None,
    });
}
