use crate::config::{Config, RustEnv};
use log::LevelFilter;
use simplelog::{self, ColorChoice, ConfigBuilder, TerminalMode};

/// Modules to filter out from logging when not in Trace mode.
/// The HTTP stack logs every keep-alive and poll at debug level.
const FILTERED_MODULES: &[&str] = &["tower", "tower_http", "tracing", "hyper", "axum", "mio"];

/// Everything the terminal logger needs, resolved from `Config`.
#[derive(Debug, PartialEq)]
struct LogSettings {
    level: LevelFilter,
    filter_dependencies: bool,
    colors: bool,
}

impl LogSettings {
    fn from_config(config: &Config) -> Self {
        Self {
            level: config.log_level_filter,
            // Trace shows everything, dependencies included.
            filter_dependencies: config.log_level_filter != LevelFilter::Trace,
            // Production output goes to a collector, not a terminal.
            colors: config.runtime_env != RustEnv::Production,
        }
    }
}

pub struct Logger {}

impl Logger {
    /// Initializes the global terminal logger from the provided Config.
    pub fn init_logger(config: &Config) {
        let settings = LogSettings::from_config(config);
        let color_choice = if settings.colors {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        };

        simplelog::TermLogger::init(
            settings.level,
            Self::build_log_config(settings.filter_dependencies),
            TerminalMode::Mixed,
            color_choice,
        )
        .expect("Failed to start simplelog");

        log::info!(
            "Logger initialized at level {} ({})",
            settings.level,
            config.runtime_env
        );
    }

    fn build_log_config(filter_dependencies: bool) -> simplelog::Config {
        let mut builder = ConfigBuilder::new();
        builder.set_time_format_rfc3339();

        if filter_dependencies {
            for module in FILTERED_MODULES {
                builder.add_filter_ignore_str(module);
            }
        }

        builder.build()
    }
}
