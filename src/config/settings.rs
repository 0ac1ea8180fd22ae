use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use config::{Config, ConfigError, Environment, File, FileFormat};
use kvsh_error::{ensure, GenericError, KvshResult, StackError, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    client::ClientConfig,
    logging::LoggingConfig,
    protocol::{FrameLimits, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_FRAME_SIZE},
    session::StopCommands,
};

/// Префикс переменных окружения.
pub const ENV_PREFIX: &str = "KVSH";

/// Управляющие слова оболочки.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Keywords {
    /// Завершение процесса (сравнивается со строкой целиком)
    pub exit: String,
    /// Смена учётных данных с переподключением
    pub auth: String,
    pub subscribe: String,
    pub unsubscribe: String,
    /// Суффикс команд, начинающих watch (`GET.WATCH`, `GETWATCH`)
    pub watch_suffix: String,
    /// Суффикс команд, останавливающих watch
    pub unwatch_suffix: String,
    /// Команда, которой watch отменяется на сервере
    pub unwatch_command: String,
}

impl Default for Keywords {
    fn default() -> Self {
        Self {
            exit: "exit".to_string(),
            auth: "AUTH".to_string(),
            subscribe: "SUBSCRIBE".to_string(),
            unsubscribe: "UNSUBSCRIBE".to_string(),
            watch_suffix: "WATCH".to_string(),
            unwatch_suffix: "UNWATCH".to_string(),
            unwatch_command: "UNWATCH".to_string(),
        }
    }
}

impl Keywords {
    /// Команды, которыми завершаются потоки на сервере.
    pub fn stop_commands(&self) -> StopCommands {
        StopCommands {
            unwatch: self.unwatch_command.clone(),
            unsubscribe: self.unsubscribe.clone(),
        }
    }

    fn all(&self) -> [(&'static str, &str); 7] {
        [
            ("exit", &self.exit),
            ("auth", &self.auth),
            ("subscribe", &self.subscribe),
            ("unsubscribe", &self.unsubscribe),
            ("watch_suffix", &self.watch_suffix),
            ("unwatch_suffix", &self.unwatch_suffix),
            ("unwatch_command", &self.unwatch_command),
        ]
    }
}

/// Настройки оболочки.
///
/// Порядок источников: значения по умолчанию, TOML файл, переменные
/// окружения `KVSH_*` (вложенность через `__`), флаги командной строки.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub connect_timeout_ms: u64,
    pub write_timeout_ms: u64,
    /// Потолок размера одного входящего сообщения
    pub max_frame_size: usize,
    /// Размер буфера одного чтения из сокета
    pub read_chunk_size: usize,
    pub history_file: Option<PathBuf>,
    pub color: bool,
    pub keywords: Keywords,
    pub logging: LoggingConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7379,
            password: None,
            connect_timeout_ms: 5_000,
            write_timeout_ms: 10_000,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            read_chunk_size: DEFAULT_CHUNK_SIZE,
            history_file: dirs::home_dir().map(|home| home.join(".kvsh_history")),
            color: true,
            keywords: Keywords::default(),
            logging: LoggingConfig::default(),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Settings {
    /// Загружает настройки.
    ///
    /// Явно указанный файл обязан существовать; файл по умолчанию
    /// (`$XDG_CONFIG_HOME/kvsh/config.toml`) необязателен.
    pub fn load(path: Option<&Path>) -> KvshResult<Self> {
        let defaults = Config::try_from(&Self::default()).map_err(config_error)?;
        let mut builder = Config::builder().add_source(defaults);

        match path {
            Some(path) => {
                debug!(path = %path.display(), "Loading config file");
                builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
            }
            None => {
                if let Some(path) = Self::default_path() {
                    builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
                }
            }
        }

        let settings: Self = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(Config::try_deserialize)
            .map_err(config_error)?;

        settings.validate()?;
        Ok(settings)
    }

    /// Путь к файлу настроек по умолчанию.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("kvsh").join("config.toml"))
    }

    pub fn validate(&self) -> KvshResult<()> {
        ensure!(!self.host.is_empty(), StatusCode::InvalidConfig, "host must not be empty");
        ensure!(self.port != 0, StatusCode::InvalidConfig, "port must not be 0");
        ensure!(
            self.read_chunk_size > 0,
            StatusCode::InvalidConfig,
            "read_chunk_size must be greater than 0"
        );
        ensure!(
            self.max_frame_size >= self.read_chunk_size,
            StatusCode::InvalidConfig,
            "max_frame_size ({}) must not be smaller than read_chunk_size ({})",
            self.max_frame_size,
            self.read_chunk_size
        );
        for (name, value) in self.keywords.all() {
            ensure!(
                !value.trim().is_empty(),
                StatusCode::InvalidConfig,
                "keywords.{} must not be empty",
                name
            );
        }
        self.logging.validate()
    }

    /// Адрес сервера в виде `host:port`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn frame_limits(&self) -> FrameLimits {
        FrameLimits {
            chunk_size: self.read_chunk_size,
            max_frame_size: self.max_frame_size,
        }
    }

    /// Конфигурация клиента с новым идентификатором.
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(&self.host, self.port);
        config.connect_timeout = Duration::from_millis(self.connect_timeout_ms);
        config.write_timeout = Duration::from_millis(self.write_timeout_ms);
        config.password = self.password.clone().filter(|p| !p.is_empty());
        config.limits = self.frame_limits();
        config
    }
}

fn config_error(err: ConfigError) -> StackError {
    StackError::new(GenericError::new(
        StatusCode::InvalidConfig,
        format!("Invalid configuration: {err}"),
    ))
}

#[cfg(test)]
mod tests {
    use std::{env, io::Write};

    use serial_test::serial;

    use super::*;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert_eq!(settings.address(), "127.0.0.1:7379");
        assert_eq!(settings.frame_limits(), FrameLimits::default());
        assert!(settings.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_file_overrides_defaults() {
        let file = write_config(
            r#"
            port = 7380
            color = false

            [keywords]
            exit = "quit"

            [logging]
            level = "debug"
            "#,
        );

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.port, 7380);
        assert!(!settings.color);
        assert_eq!(settings.keywords.exit, "quit");
        // не указанные ключи секции сохраняют значения по умолчанию
        assert_eq!(settings.keywords.watch_suffix, "WATCH");
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(settings.host, "127.0.0.1");
    }

    /// Тест проверяет, что переменные окружения важнее файла.
    #[test]
    #[serial]
    fn test_env_overrides_file() {
        let file = write_config("port = 7380\n");
        env::set_var("KVSH_PORT", "7381");
        env::set_var("KVSH_LOGGING__LEVEL", "warn");

        let result = Settings::load(Some(file.path()));
        env::remove_var("KVSH_PORT");
        env::remove_var("KVSH_LOGGING__LEVEL");

        let settings = result.unwrap();
        assert_eq!(settings.port, 7381);
        assert_eq!(settings.logging.level, "warn");
    }

    #[test]
    #[serial]
    fn test_missing_explicit_file_is_error() {
        let err = Settings::load(Some(Path::new("/definitely/not/here/kvsh.toml"))).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::InvalidConfig);
    }

    #[test]
    #[serial]
    fn test_invalid_limits_rejected_on_load() {
        let file = write_config("read_chunk_size = 1024\nmax_frame_size = 512\n");
        let err = Settings::load(Some(file.path())).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::InvalidConfig);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.read_chunk_size = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.keywords.watch_suffix = String::new();
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("keywords.watch_suffix"));
    }

    #[test]
    fn test_client_config_from_settings() {
        let settings = Settings {
            password: Some(String::new()),
            connect_timeout_ms: 250,
            ..Default::default()
        };
        let config = settings.client_config();
        assert_eq!(config.addr, "127.0.0.1:7379");
        assert_eq!(config.connect_timeout, Duration::from_millis(250));
        // пустой пароль означает «без аутентификации»
        assert!(config.password.is_none());
    }
}
