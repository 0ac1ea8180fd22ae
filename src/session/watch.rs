//! Жизненный цикл потока push-сообщений.
//!
//! Контроллер владеет не более чем одной фоновой задачей, которая
//! переносит сообщения из [`PushStream`] в [`Renderer`]. Один и тот же
//! механизм обслуживает watch-сессии и pub/sub подписки: они взаимно
//! исключают друг друга.
//!
//! ```text
//! Idle ── start ──▶ Requesting ── OK + fingerprint ──▶ Watching
//!  ▲                    │                                 │
//!  └──── ERR / ошибка ──┘        отмена / конец потока ───┘
//! ```

use std::sync::Arc;

use kvsh_error::{KvshResult, ProtocolError, SessionError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{SessionMode, SessionState};
use crate::{
    client::{PushStream, Transport},
    protocol::{Command, Response, FINGERPRINT_ATTR},
    render::Renderer,
};

/// Фаза контроллера.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchPhase {
    Idle,
    /// Команда отправлена, ждём первый ответ
    Requesting,
    /// Фоновая задача переносит обновления
    Watching,
}

/// Команды, которыми контроллер завершает поток на стороне сервера.
#[derive(Debug, Clone)]
pub struct StopCommands {
    /// Отписка от watch по отпечатку
    pub unwatch: String,
    /// Отписка от каналов
    pub unsubscribe: String,
}

impl Default for StopCommands {
    fn default() -> Self {
        Self {
            unwatch: "UNWATCH".to_string(),
            unsubscribe: "UNSUBSCRIBE".to_string(),
        }
    }
}

/// Что именно сейчас транслируется.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamKind {
    Watch { fingerprint: String },
    Subscription { channels: Vec<String> },
}

impl StreamKind {
    fn mode(&self) -> SessionMode {
        match self {
            Self::Watch { .. } => SessionMode::Watching,
            Self::Subscription { .. } => SessionMode::Subscribed,
        }
    }

    fn stop_command(
        &self,
        commands: &StopCommands,
    ) -> Command {
        match self {
            Self::Watch { fingerprint } => Command::new(&commands.unwatch, [fingerprint.as_str()]),
            Self::Subscription { channels } => Command::new(&commands.unsubscribe, channels.iter().cloned()),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Watch { fingerprint } => format!("watch {fingerprint}"),
            Self::Subscription { channels } => format!("subscription to {}", channels.join(", ")),
        }
    }
}

struct ActiveStream {
    kind: StreamKind,
    cancel: CancellationToken,
    pump: JoinHandle<()>,
}

/// Контроллер watch-сессий и подписок.
pub struct WatchController {
    state: Arc<SessionState>,
    renderer: Arc<dyn Renderer>,
    commands: StopCommands,
    requesting: bool,
    active: Option<ActiveStream>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl WatchController {
    pub fn new(
        state: Arc<SessionState>,
        renderer: Arc<dyn Renderer>,
        commands: StopCommands,
    ) -> Self {
        Self {
            state,
            renderer,
            commands,
            requesting: false,
            active: None,
        }
    }

    pub fn phase(&self) -> WatchPhase {
        if self.active.is_some() {
            WatchPhase::Watching
        } else if self.requesting {
            WatchPhase::Requesting
        } else {
            WatchPhase::Idle
        }
    }

    /// Отпечаток активной watch-сессии.
    pub fn fingerprint(&self) -> Option<&str> {
        match self.active.as_ref().map(|a| &a.kind) {
            Some(StreamKind::Watch { fingerprint }) => Some(fingerprint),
            _ => None,
        }
    }

    /// Начинает watch-сессию.
    ///
    /// Ответ `ERR` выводится, и сессия остаётся в командном режиме. Успешный
    /// ответ без отпечатка — ошибка протокола: без него watch не остановить.
    pub async fn start_watch(
        &mut self,
        transport: &mut dyn Transport,
        command: &Command,
    ) -> KvshResult<()> {
        self.ensure_idle().await?;

        let (first, stream) = self.request(transport, command).await?;
        self.renderer.render(&first);

        if first.is_err() {
            stream.close().await;
            return Ok(());
        }

        let Some(fingerprint) = first.fingerprint().map(str::to_owned) else {
            stream.close().await;
            return Err(ProtocolError::MissingAttribute {
                name: FINGERPRINT_ATTR.to_string(),
            }
            .into());
        };

        info!(%fingerprint, command = command.name(), "Watch started");
        self.spawn(StreamKind::Watch { fingerprint }, stream);
        Ok(())
    }

    /// Подписывается на каналы.
    pub async fn subscribe(
        &mut self,
        transport: &mut dyn Transport,
        command: &Command,
    ) -> KvshResult<()> {
        self.ensure_idle().await?;

        let (first, stream) = self.request(transport, command).await?;
        self.renderer.render(&first);

        if first.is_err() {
            stream.close().await;
            return Ok(());
        }

        let channels = command.args().to_vec();
        info!(?channels, "Subscribed");
        self.spawn(StreamKind::Subscription { channels }, stream);
        Ok(())
    }

    /// Останавливает watch-сессию. Если отпечаток указан, он должен
    /// совпадать с активным.
    pub async fn stop_watch(
        &mut self,
        fingerprint: Option<&str>,
    ) -> KvshResult<()> {
        let Some(active) = self.fingerprint() else {
            return Err(SessionError::NotWatching.into());
        };

        if let Some(given) = fingerprint {
            if given != active {
                return Err(SessionError::FingerprintMismatch {
                    given: given.to_string(),
                    active: active.to_string(),
                }
                .into());
            }
        }

        self.stop().await;
        Ok(())
    }

    /// Завершает подписку на каналы целиком.
    pub async fn unsubscribe(&mut self) -> KvshResult<()> {
        let subscribed = matches!(
            self.active.as_ref().map(|a| &a.kind),
            Some(StreamKind::Subscription { .. })
        );
        if !subscribed {
            return Err(SessionError::NotSubscribed.into());
        }

        self.stop().await;
        Ok(())
    }

    /// Отменяет активный поток и дожидается завершения фоновой задачи.
    pub async fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
            self.join(active).await;
        }
    }

    /// Забирает фоновую задачу, если её отменили или она завершилась сама.
    ///
    /// Возвращает `true`, если задача была убрана.
    pub async fn reap(&mut self) -> bool {
        let finished = self
            .active
            .as_ref()
            .is_some_and(|a| a.cancel.is_cancelled() || a.pump.is_finished());

        match self.active.take() {
            Some(active) if finished => {
                self.join(active).await;
                true
            }
            other => {
                self.active = other;
                false
            }
        }
    }

    /// Ждёт, пока активный поток не закончится сам или по прерыванию.
    pub async fn wait(&mut self) {
        if let Some(active) = self.active.take() {
            self.join(active).await;
        }
    }

    async fn ensure_idle(&mut self) -> KvshResult<()> {
        self.reap().await;
        match self.active.as_ref().map(|a| &a.kind) {
            None => Ok(()),
            Some(StreamKind::Watch { fingerprint }) => Err(SessionError::AlreadyWatching {
                fingerprint: fingerprint.clone(),
            }
            .into()),
            Some(StreamKind::Subscription { .. }) => Err(SessionError::AlreadySubscribed.into()),
        }
    }

    async fn request(
        &mut self,
        transport: &mut dyn Transport,
        command: &Command,
    ) -> KvshResult<(Response, Box<dyn PushStream>)> {
        self.requesting = true;
        let result = transport.open_stream(command).await;
        self.requesting = false;
        result
    }

    fn spawn(
        &mut self,
        kind: StreamKind,
        stream: Box<dyn PushStream>,
    ) {
        let cancel = CancellationToken::new();
        // режим выставляется до запуска задачи: она может завершиться сразу
        self.state.enter_stream(kind.mode(), cancel.clone());

        let pump = tokio::spawn(pump(
            stream,
            kind.clone(),
            kind.stop_command(&self.commands),
            cancel.clone(),
            self.state.clone(),
            self.renderer.clone(),
        ));

        self.active = Some(ActiveStream { kind, cancel, pump });
    }

    async fn join(
        &self,
        active: ActiveStream,
    ) {
        if let Err(e) = active.pump.await {
            warn!("Stream task for {} terminated abnormally: {e}", active.kind.describe());
            self.state.leave_stream();
        }
    }
}

impl Drop for WatchController {
    fn drop(&mut self) {
        if let Some(active) = &self.active {
            active.cancel.cancel();
        }
    }
}

/// Фоновая задача: переносит обновления в вывод до отмены или конца потока.
///
/// Только после отмены отправляет ровно одну команду остановки; если поток
/// закрыл сервер, ничего не отправляет.
async fn pump(
    mut stream: Box<dyn PushStream>,
    kind: StreamKind,
    stop_command: Command,
    cancel: CancellationToken,
    state: Arc<SessionState>,
    renderer: Arc<dyn Renderer>,
) {
    let cancelled = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break true,
            update = stream.next() => match update {
                Some(Ok(response)) => renderer.render(&response),
                Some(Err(e)) if e.status_code().is_protocol_error() => {
                    warn!("Dropping malformed push message: {e}");
                    renderer.error(&e.client_message());
                }
                Some(Err(e)) => {
                    warn!("Stream for {} failed: {e}", kind.describe());
                    renderer.error(&e.client_message());
                    break false;
                }
                None => break false,
            },
        }
    };

    if cancelled {
        debug!("Sending {stop_command}");
        if let Err(e) = stream.send(&stop_command).await {
            warn!("Failed to send {}: {e}", stop_command.name());
        }
    }
    stream.close().await;
    state.leave_stream();

    let message = if cancelled {
        format!("Stopped {}", kind.describe())
    } else {
        format!("Server ended {}", kind.describe())
    };
    info!("{message}");
    renderer.notice(&message);
}
