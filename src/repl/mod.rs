//! Интерактивный цикл и однократное выполнение команды.
//!
//! Блокирующий `readline` выполняется в `spawn_blocking`, поэтому фоновый
//! поток обновлений продолжает выводить сообщения, пока пользователь печатает.
//! Прерывание приходит двумя путями: как `ReadlineError::Interrupted` из
//! редактора и как SIGINT вне его. Оба проходят через
//! [`SessionState::interrupt`].

pub mod completer;

use std::{path::PathBuf, sync::Arc};

use kvsh_error::{GenericError, KvshResult, StackError, StatusCode};
use owo_colors::OwoColorize;
use rustyline::{error::ReadlineError, history::DefaultHistory, Editor};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use completer::ShellHelper;

use crate::{
    client::Client,
    config::Settings,
    render::{ConsoleRenderer, Renderer},
    session::{Dispatcher, InterruptAction, SessionMode, SessionState},
};

type LineEditor = Editor<ShellHelper, DefaultHistory>;

/// Приглашение: `host:port> `, в потоковом режиме с пометкой режима.
pub fn prompt(
    host: &str,
    port: u16,
    mode: SessionMode,
    color: bool,
) -> String {
    let addr = format!("{host}:{port}");
    let addr = if color {
        addr.bold().blue().to_string()
    } else {
        addr
    };

    match mode {
        SessionMode::Command => format!("{addr}> "),
        SessionMode::Watching => format!("{addr} [watching]> "),
        SessionMode::Subscribed => format!("{addr} [subscribed]> "),
    }
}

/// Запускает интерактивную оболочку.
///
/// Ошибка подключения при старте возвращается вызывающему и завершает
/// процесс; все последующие ошибки выводятся, и цикл продолжается.
pub async fn run_interactive(
    settings: &Settings,
    history_file: Option<PathBuf>,
) -> KvshResult<()> {
    let renderer = Arc::new(ConsoleRenderer::new(settings.color));
    let client = Client::connect(settings.client_config()).await?;
    let state = Arc::new(SessionState::new());
    let mut dispatcher = Dispatcher::new(client, state.clone(), renderer.clone(), settings.keywords.clone());

    let history_file = history_file.or_else(|| settings.history_file.clone());
    let mut editor = build_editor(settings, history_file.as_ref())?;
    match editor.create_external_printer() {
        Ok(printer) => renderer.attach_printer(Box::new(printer)),
        Err(e) => debug!("External printer unavailable, using stdout: {e}"),
    }

    let exit = CancellationToken::new();
    let signals = spawn_interrupt_handler(state.clone(), exit.clone());

    renderer.notice(&format!(
        "Connected to {}. Type '{}' or press Ctrl+D to exit.",
        settings.address(),
        settings.keywords.exit
    ));

    let mut editor = Some(editor);
    while let Some(ed) = editor.take() {
        dispatcher.reap_stream().await;
        let prompt = prompt(&settings.host, settings.port, state.mode(), settings.color);

        let (ed, line) = tokio::select! {
            result = read_line(ed, prompt) => result?,
            _ = exit.cancelled() => break,
        };
        editor = Some(ed);

        match line {
            Ok(line) => {
                if let Some(ed) = editor.as_mut() {
                    if let Err(e) = ed.add_history_entry(line.as_str()) {
                        debug!("Failed to add history entry: {e}");
                    }
                }

                let keep_going = tokio::select! {
                    keep = dispatcher.handle_line(&line) => keep,
                    _ = exit.cancelled() => false,
                };
                if !keep_going {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => match state.interrupt() {
                InterruptAction::CancelStream => debug!("Interrupt cancelled the active stream"),
                InterruptAction::Exit => break,
            },
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                warn!("Line editor failed: {e}");
                return Err(readline_error(e));
            }
        }
    }

    signals.abort();
    dispatcher.shutdown().await;
    renderer.detach_printer();

    if let (Some(ed), Some(path)) = (editor.as_mut(), history_file.as_ref()) {
        if let Err(e) = ed.save_history(path) {
            warn!("Failed to save history to {}: {e}", path.display());
        }
    }

    info!("Interactive session finished");
    Ok(())
}

/// Выполняет одну команду и выходит.
///
/// Watch или подписка транслируются до Ctrl+C или до закрытия потока
/// сервером.
pub async fn run_once(
    settings: &Settings,
    tokens: Vec<String>,
) -> KvshResult<()> {
    let renderer: Arc<dyn Renderer> = Arc::new(ConsoleRenderer::new(settings.color));
    let client = Client::connect(settings.client_config()).await?;
    let state = Arc::new(SessionState::new());
    let mut dispatcher = Dispatcher::new(client, state.clone(), renderer, settings.keywords.clone());

    let exit = CancellationToken::new();
    let signals = spawn_interrupt_handler(state.clone(), exit.clone());

    tokio::select! {
        _ = dispatcher.execute_tokens(tokens) => {}
        _ = exit.cancelled() => {}
    }

    if state.mode().is_streaming() {
        tokio::select! {
            _ = dispatcher.wait_stream() => {}
            _ = exit.cancelled() => {}
        }
    }

    signals.abort();
    dispatcher.shutdown().await;
    Ok(())
}

fn build_editor(
    settings: &Settings,
    history_file: Option<&PathBuf>,
) -> KvshResult<LineEditor> {
    let config = rustyline::Config::builder()
        .auto_add_history(false)
        .history_ignore_dups(true)
        .map_err(readline_error)?
        .max_history_size(1000)
        .map_err(readline_error)?
        .build();

    let mut editor = LineEditor::with_config(config).map_err(readline_error)?;
    editor.set_helper(Some(ShellHelper::new(&settings.keywords)));

    if let Some(path) = history_file {
        if let Err(e) = editor.load_history(path) {
            debug!("No history loaded from {}: {e}", path.display());
        }
    }

    Ok(editor)
}

/// Читает строку в блокирующем потоке и возвращает редактор обратно.
async fn read_line(
    mut editor: LineEditor,
    prompt: String,
) -> KvshResult<(LineEditor, Result<String, ReadlineError>)> {
    tokio::task::spawn_blocking(move || {
        let line = editor.readline(&prompt);
        (editor, line)
    })
    .await
    .map_err(|e| {
        StackError::new(GenericError::new(
            StatusCode::Internal,
            format!("Line editor task failed: {e}"),
        ))
    })
}

/// Обрабатывает SIGINT, пришедший вне редактора строки.
fn spawn_interrupt_handler(
    state: Arc<SessionState>,
    exit: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {e}");
                return;
            }
            match state.interrupt() {
                InterruptAction::CancelStream => debug!("SIGINT cancelled the active stream"),
                InterruptAction::Exit => {
                    info!("Received interrupt, exiting");
                    exit.cancel();
                    return;
                }
            }
        }
    })
}

fn readline_error(e: ReadlineError) -> StackError {
    StackError::new(GenericError::new(StatusCode::Io, format!("Line editor error: {e}")))
}
