use kvsh_error::{GenericError, KvshResult, StackError, StatusCode};
use tracing_appender::{
    non_blocking::WorkerGuard,
    non_blocking,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{fmt, layer::Layer as LayerTrait, registry::LookupSpan};

use crate::logging::config::{LogFormat, LoggingConfig};

/// Файловый слой и guard фонового писателя.
///
/// Guard должен жить до конца работы: при уничтожении он сбрасывает буфер.
pub fn layer_with_config<S>(config: &LoggingConfig) -> KvshResult<(Box<dyn LayerTrait<S> + Send + Sync>, WorkerGuard)>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let rotation = if config.file.daily {
        Rotation::DAILY
    } else {
        Rotation::NEVER
    };
    let appender = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(&config.file.prefix)
        .build(&config.file.dir)
        .map_err(|e| {
            StackError::new(GenericError::new(
                StatusCode::InvalidConfig,
                format!("Cannot open log file in {}: {e}", config.file.dir.display()),
            ))
        })?;
    let (writer, guard) = non_blocking(appender);

    let layer: Box<dyn LayerTrait<S> + Send + Sync> = match config.format {
        LogFormat::Json => Box::new(fmt::layer().json().with_ansi(false).with_writer(writer)),
        _ => Box::new(fmt::layer().with_ansi(false).with_writer(writer)),
    };

    Ok((layer, guard))
}
