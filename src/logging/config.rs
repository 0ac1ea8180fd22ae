use std::path::PathBuf;

use kvsh_error::{ensure, KvshResult, StatusCode};
use serde::{Deserialize, Serialize};

/// Формат строк лога.
#[derive(Debug, Default, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    #[default]
    Compact,
    Json,
}

/// Конфигурация вывода в консоль (stderr).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub enabled: bool,
    pub with_ansi: bool,
    pub with_target: bool,
}

/// Конфигурация файлового лога.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FileConfig {
    pub enabled: bool,
    /// Каталог для файлов лога
    pub dir: PathBuf,
    /// Префикс имени файла
    pub prefix: String,
    /// Новый файл каждый день
    pub daily: bool,
}

/// Конфигурация логирования.
///
/// Уровень по умолчанию `error`: оболочка интерактивная, и диагностика не
/// должна перемешиваться с ответами сервера.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Директива фильтра (`info`, `kvsh=debug,warn`, ...)
    pub level: String,
    pub format: LogFormat,
    pub console: ConsoleConfig,
    pub file: FileConfig,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            with_ansi: true,
            with_target: false,
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        let dir = dirs::data_local_dir()
            .map(|d| d.join("kvsh").join("logs"))
            .unwrap_or_else(|| PathBuf::from("logs"));
        Self {
            enabled: false,
            dir,
            prefix: "kvsh.log".to_string(),
            daily: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "error".to_string(),
            format: LogFormat::default(),
            console: ConsoleConfig::default(),
            file: FileConfig::default(),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl LoggingConfig {
    /// Директива для `EnvFilter`.
    pub fn build_filter_directive(&self) -> String {
        self.level.trim().to_string()
    }

    pub fn validate(&self) -> KvshResult<()> {
        ensure!(
            !self.level.trim().is_empty(),
            StatusCode::InvalidConfig,
            "logging.level must not be empty"
        );
        ensure!(
            !self.file.enabled || !self.file.prefix.is_empty(),
            StatusCode::InvalidConfig,
            "logging.file.prefix must not be empty"
        );
        Ok(())
    }

    /// Создаёт каталог файлового лога, если он включён.
    pub fn ensure_log_dir(&self) -> KvshResult<()> {
        if self.file.enabled {
            std::fs::create_dir_all(&self.file.dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = LoggingConfig::default();
        assert_eq!(cfg.level, "error");
        assert_eq!(cfg.format, LogFormat::Compact);
        assert!(cfg.console.enabled);
        assert!(!cfg.file.enabled);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_empty_level_rejected() {
        let cfg = LoggingConfig {
            level: "  ".to_string(),
            ..Default::default()
        };
        assert_eq!(cfg.validate().unwrap_err().status_code(), StatusCode::InvalidConfig);
    }

    /// Тест проверяет, что частичная секция дополняется значениями по
    /// умолчанию.
    #[test]
    fn test_partial_deserialize() {
        let cfg: LoggingConfig = serde_json::from_str(r#"{"format":"json","file":{"enabled":true}}"#).unwrap();
        assert_eq!(cfg.format, LogFormat::Json);
        assert!(cfg.file.enabled);
        assert_eq!(cfg.file.prefix, "kvsh.log");
        assert_eq!(cfg.level, "error");
    }
}
