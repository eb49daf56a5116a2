// src/logging.rs

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Инициализация tracing. `RUST_LOG` имеет приоритет над уровнем из конфигурации.
pub fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.level.to_lowercase()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    // Повторная инициализация (например, в тестах) не считается ошибкой
    let _ = if config.enable_json_output {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
