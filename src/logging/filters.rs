use tracing_subscriber::EnvFilter;

use crate::logging::config::LoggingConfig;

/// Директива на случай, если конфигурация содержит некорректную.
const FALLBACK_DIRECTIVE: &str = "error";

/// Собирает фильтр: `RUST_LOG` важнее конфигурации.
pub fn build_filter_from_config(config: &LoggingConfig) -> EnvFilter {
    if let Ok(env_filter) = EnvFilter::try_from_default_env() {
        return env_filter;
    }

    let directive = config.build_filter_directive();
    match EnvFilter::try_new(&directive) {
        Ok(filter) => filter,
        Err(e) => {
            // подписчика ещё нет, сообщить можно только напрямую
            eprintln!("Invalid log filter directive '{directive}': {e}; falling back to '{FALLBACK_DIRECTIVE}'");
            EnvFilter::new(FALLBACK_DIRECTIVE)
        }
    }
}
