//! CLI оболочка kvsh
//!
//! Интерактивная оболочка для удалённого key-value хранилища. Поддерживает
//! интерактивный режим (REPL) с живым watch-режимом и подписками, а также
//! выполнение одной команды.

use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kvsh::{
    config::Settings,
    logging::init_logging,
    repl::{run_interactive, run_once},
};
use tracing::{debug, error};

/// Основная структура CLI аргументов
///
/// Аргументы переопределяют значения из файла конфигурации и переменных
/// окружения.
#[derive(Parser)]
#[command(name = "kvsh")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "kvsh - interactive shell for a remote key-value store", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Хост сервера (IP или доменное имя)
    #[arg(short = 'H', long, env = "KVSH_HOST", help = "Хост сервера для подключения")]
    host: Option<String>,
    /// Порт сервера
    #[arg(short, long, env = "KVSH_PORT", help = "Порт сервера для подключения")]
    port: Option<u16>,
    /// Пароль для аутентификации
    #[arg(
        short,
        long,
        env = "KVSH_PASSWORD",
        hide_env_values = true,
        help = "Пароль для аутентификации (можно использовать переменную окружения KVSH_PASSWORD)"
    )]
    auth: Option<String>,
    /// Путь к файлу конфигурации
    #[arg(long, help = "Файл конфигурации (TOML)")]
    config: Option<PathBuf>,
    /// Таймаут соединения в миллисекундах
    #[arg(long, help = "Таймаут соединения в миллисекундах")]
    connect_timeout: Option<u64>,
    /// Максимальный размер кадра в байтах
    #[arg(long, help = "Максимальный размер одного ответа сервера в байтах")]
    max_frame_size: Option<usize>,
    /// Отключить цветной вывод
    #[arg(long, help = "Отключить цветной вывод")]
    no_color: bool,
    /// Включить подробный вывод (debug)
    #[arg(short, long, help = "Включить подробный вывод для отладки")]
    verbose: bool,
    /// Подавить логирование полностью
    #[arg(short = 'q', long, conflicts_with = "verbose", help = "Отключить логирование")]
    quiet: bool,
    /// Подкоманда для выполнения
    #[command(subcommand)]
    command: Option<Commands>,
    /// Прямое выполнение команды (например: GET key)
    #[arg(help = "Прямая команда для выполнения (например, 'GET key' или 'GETWATCH key')")]
    args: Vec<String>,
}

/// Подкоманды CLI
#[derive(Subcommand)]
enum Commands {
    /// Интерактивный режим (REPL)
    #[command(alias = "i")]
    Interactive {
        /// Путь к файлу истории команд
        #[arg(long, help = "Файл для сохранения истории команд")]
        history: Option<PathBuf>,
    },
    /// Выполнить одну команду и выйти
    #[command(alias = "e")]
    Exec {
        /// Команда с аргументами
        #[arg(
            required = true,
            trailing_var_arg = true,
            allow_hyphen_values = true,
            help = "Команда для выполнения (например, 'GET key')"
        )]
        args: Vec<String>,
    },
}

/// Точка входа в CLI
///
/// Загружает конфигурацию, применяет аргументы, инициализирует логирование
/// и запускает выбранный режим. Ошибка на старте даёт код выхода 1.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let logging = match init_logging(&settings.logging) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Error: failed to initialize logging: {e}");
            return ExitCode::FAILURE;
        }
    };
    debug!("Settings loaded: {}", settings.address());

    let code = match handle_command(&cli, &settings).await {
        Ok(()) => {
            debug!("Session finished successfully");
            0
        }
        Err(e) => {
            error!("Session failed: {e:#}");
            eprintln!("Error: {e:#}");
            1
        }
    };

    logging.shutdown();
    // поток readline может остаться заблокированным на stdin, а рантайм при
    // остановке ждёт блокирующие задачи
    std::process::exit(code);
}

/// Собирает итоговые настройки: файл, окружение, затем аргументы.
fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;

    if let Some(host) = &cli.host {
        settings.host = host.clone();
    }
    if let Some(port) = cli.port {
        settings.port = port;
    }
    if let Some(password) = &cli.auth {
        settings.password = Some(password.clone());
    }
    if let Some(ms) = cli.connect_timeout {
        settings.connect_timeout_ms = ms;
    }
    if let Some(size) = cli.max_frame_size {
        settings.max_frame_size = size;
    }
    if cli.no_color {
        settings.color = false;
    }
    if cli.verbose {
        settings.logging.level = "debug".to_string();
    }
    if cli.quiet {
        settings.logging.level = "off".to_string();
    }

    settings.validate().context("Invalid configuration")?;
    Ok(settings)
}

/// Обработчик выполнения команд
async fn handle_command(
    cli: &Cli,
    settings: &Settings,
) -> Result<()> {
    match &cli.command {
        Some(Commands::Interactive { history }) => {
            debug!("Starting interactive mode");
            run_interactive(settings, history.clone()).await?;
        }
        Some(Commands::Exec { args }) => {
            debug!("Executing one-shot command: {args:?}");
            run_once(settings, args.clone()).await?;
        }
        None if cli.args.is_empty() => {
            debug!("No command given, starting interactive mode");
            run_interactive(settings, None).await?;
        }
        None => {
            debug!("Executing direct command: {:?}", cli.args);
            run_once(settings, cli.args.clone()).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    /// Тест проверяет, что позиционные аргументы уходят в однократный режим.
    #[test]
    fn test_direct_command_args() {
        let cli = Cli::try_parse_from(["kvsh", "-H", "db", "GETWATCH", "key"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.host.as_deref(), Some("db"));
        assert_eq!(cli.args, vec!["GETWATCH", "key"]);
    }

    #[test]
    fn test_exec_subcommand() {
        let cli = Cli::try_parse_from(["kvsh", "e", "SET", "k", "-1"]).unwrap();
        match cli.command {
            Some(Commands::Exec { args }) => assert_eq!(args, vec!["SET", "k", "-1"]),
            _ => panic!("expected exec subcommand"),
        }
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["kvsh", "-v", "-q"]).is_err());
    }
}
