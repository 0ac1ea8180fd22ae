use std::sync::Arc;

use kvsh_error::{bail, KvshResult, LogLevel, SessionError, StackError};
use tracing::{debug, error, info, warn};

use super::{tokenize, SessionMode, SessionState, WatchController, WatchPhase};
use crate::{
    client::Transport,
    config::Keywords,
    protocol::{Command, Response},
    render::Renderer,
};

const AUTH_USAGE: &str = "AUTH password";
const SUBSCRIBE_USAGE: &str = "SUBSCRIBE channel [channel ...]";

/// Куда направить введённую команду.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Auth,
    Subscribe,
    Unsubscribe,
    WatchStart,
    WatchStop,
    Ordinary,
}

/// Возвращает базовую команду watch-варианта (`GETWATCH` → `GET`,
/// `GET.WATCH` → `GET`).
///
/// Имя должно оканчиваться суффиксом, быть длиннее него и не оканчиваться
/// суффиксом отмены. Регистр не учитывается.
pub fn watch_base<'a>(
    name: &'a str,
    keywords: &Keywords,
) -> Option<&'a str> {
    if name.len() <= keywords.watch_suffix.len()
        || !ends_with_ignore_case(name, &keywords.watch_suffix)
        || ends_with_ignore_case(name, &keywords.unwatch_suffix)
    {
        return None;
    }

    let base = &name[..name.len() - keywords.watch_suffix.len()];
    Some(base.strip_suffix('.').unwrap_or(base))
}

fn ends_with_ignore_case(
    name: &str,
    suffix: &str,
) -> bool {
    let Some(start) = name.len().checked_sub(suffix.len()) else {
        return false;
    };
    name.is_char_boundary(start) && name[start..].eq_ignore_ascii_case(suffix)
}

/// Классифицирует команду по имени.
pub fn classify(
    command: &Command,
    keywords: &Keywords,
) -> Route {
    let name = command.name();

    if name.eq_ignore_ascii_case(&keywords.auth) {
        Route::Auth
    } else if name.eq_ignore_ascii_case(&keywords.subscribe) {
        Route::Subscribe
    } else if name.eq_ignore_ascii_case(&keywords.unsubscribe) {
        Route::Unsubscribe
    } else if watch_base(name, keywords).is_some() {
        Route::WatchStart
    } else if ends_with_ignore_case(name, &keywords.unwatch_suffix) {
        Route::WatchStop
    } else {
        Route::Ordinary
    }
}

/// Диспетчер сессии: разбирает строку, проверяет режим и направляет команду.
///
/// Единственный владелец транспорта. Отклонённая из-за режима команда в
/// транспорт не попадает.
pub struct Dispatcher<T> {
    transport: T,
    state: Arc<SessionState>,
    watch: WatchController,
    renderer: Arc<dyn Renderer>,
    keywords: Keywords,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl<T: Transport> Dispatcher<T> {
    pub fn new(
        transport: T,
        state: Arc<SessionState>,
        renderer: Arc<dyn Renderer>,
        keywords: Keywords,
    ) -> Self {
        let watch = WatchController::new(state.clone(), renderer.clone(), keywords.stop_commands());
        Self {
            transport,
            state,
            watch,
            renderer,
            keywords,
        }
    }

    /// Обрабатывает строку ввода.
    ///
    /// Возвращает `false` только для ключевого слова выхода.
    pub async fn handle_line(
        &mut self,
        line: &str,
    ) -> bool {
        let line = line.trim();
        if line == self.keywords.exit {
            return false;
        }
        if line.is_empty() {
            self.watch.reap().await;
            return true;
        }

        self.dispatch(tokenize(line)).await;
        true
    }

    /// Обрабатывает уже разделённые аргументы (однократный режим).
    pub async fn execute_tokens(
        &mut self,
        tokens: Vec<String>,
    ) -> bool {
        if tokens.len() == 1 && tokens[0] == self.keywords.exit {
            return false;
        }
        self.dispatch(tokens).await;
        true
    }

    /// Останавливает активный поток перед выходом.
    pub async fn shutdown(&mut self) {
        if self.watch.phase() != WatchPhase::Idle {
            debug!("Stopping active stream before exit");
        }
        self.watch.stop().await;
    }

    /// Подбирает поток, завершённый отменой или сервером, и возвращает
    /// сессию в командный режим.
    pub async fn reap_stream(&mut self) -> bool {
        self.watch.reap().await
    }

    /// Ждёт окончания активного потока (однократный режим).
    pub async fn wait_stream(&mut self) {
        self.watch.wait().await;
    }

    pub fn mode(&self) -> SessionMode {
        self.state.mode()
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    pub fn watch_phase(&self) -> WatchPhase {
        self.watch.phase()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn dispatch(
        &mut self,
        tokens: Vec<String>,
    ) {
        // поток мог быть отменён или закрыт сервером, пока ждали ввод
        self.watch.reap().await;

        let Some(command) = Command::from_tokens(tokens) else {
            return;
        };

        if let Err(e) = self.route(command).await {
            self.report(&e);
        }
    }

    async fn route(
        &mut self,
        command: Command,
    ) -> KvshResult<()> {
        let route = classify(&command, &self.keywords);
        self.check_mode(route)?;
        debug!(?route, command = %command.summary(), "Dispatching");

        match route {
            Route::Auth => self.authenticate(&command).await,
            Route::Subscribe => {
                if command.args().is_empty() {
                    bail!(usage(SUBSCRIBE_USAGE));
                }
                self.watch.subscribe(&mut self.transport, &command).await
            }
            Route::Unsubscribe => self.watch.unsubscribe().await,
            Route::WatchStart => self.watch.start_watch(&mut self.transport, &command).await,
            Route::WatchStop if self.state.mode() == SessionMode::Watching => {
                let fingerprint = command.args().first().map(String::as_str);
                self.watch.stop_watch(fingerprint).await
            }
            Route::WatchStop | Route::Ordinary => {
                let response = self.transport.fire(&command).await?;
                self.renderer.render(&response);
                Ok(())
            }
        }
    }

    /// Взаимное исключение режимов: в потоковом режиме разрешена только
    /// соответствующая команда остановки.
    fn check_mode(
        &self,
        route: Route,
    ) -> KvshResult<()> {
        match (self.state.mode(), route) {
            (SessionMode::Command, _) => Ok(()),
            (SessionMode::Watching, Route::WatchStop) => Ok(()),
            (SessionMode::Watching, _) => Err(SessionError::Watching.into()),
            (SessionMode::Subscribed, Route::Unsubscribe) => Ok(()),
            (SessionMode::Subscribed, _) => Err(SessionError::Subscribed.into()),
        }
    }

    /// Переподключается с новым паролем. При ошибке остаётся старое
    /// соединение.
    async fn authenticate(
        &mut self,
        command: &Command,
    ) -> KvshResult<()> {
        let [password] = command.args() else {
            bail!(usage(AUTH_USAGE));
        };

        match self.transport.reconnect(password).await {
            Ok(()) => {
                self.renderer.render(&Response::ok("OK"));
                Ok(())
            }
            Err(e) => {
                warn!("AUTH failed: {e}");
                self.renderer.error(&format!("AUTH failed: {}", e.client_message()));
                Ok(())
            }
        }
    }

    /// Выводит ошибку одной команды. Сессия продолжается.
    fn report(
        &self,
        err: &StackError,
    ) {
        let code = err.status_code();
        let tags = err.metrics_tags();
        match err.log_level() {
            LogLevel::Trace | LogLevel::Debug => debug!(%code, ?tags, "Command rejected: {err}"),
            LogLevel::Info => info!(%code, ?tags, "Command failed: {err}"),
            LogLevel::Warn => warn!(%code, ?tags, retryable = code.is_retryable(), "Command failed: {err}"),
            LogLevel::Error => error!(%code, ?tags, "Command failed: {err}"),
        }
        self.renderer.error(&err.client_message());
    }
}

fn usage(text: &str) -> SessionError {
    SessionError::Usage {
        usage: text.to_string(),
    }
}
