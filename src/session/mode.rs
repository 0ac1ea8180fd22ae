use std::sync::atomic::{AtomicU8, Ordering};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Текущий режим сессии.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionMode {
    /// Ожидание следующей команды
    Command = 0,
    /// Получение сообщений подписки на каналы
    Subscribed = 1,
    /// Получение обновлений watch-сессии
    Watching = 2,
}

impl SessionMode {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Subscribed,
            2 => Self::Watching,
            _ => Self::Command,
        }
    }

    /// Активен ли поток push-сообщений.
    pub fn is_streaming(self) -> bool {
        self != Self::Command
    }
}

/// Что обработчик прерывания должен сделать с процессом.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    /// Остановлен активный поток, процесс продолжает работу
    CancelStream,
    /// Потока нет, процесс должен завершиться
    Exit,
}

/// Состояние, разделяемое циклом ввода, фоновым потоком обновлений и
/// обработчиком сигналов.
///
/// Режим меняют только диспетчер (переход в потоковый режим) и путь
/// завершения фонового потока (возврат в `Command`). Обработчик прерывания
/// режим только читает.
#[derive(Debug)]
pub struct SessionState {
    mode: AtomicU8,
    cancel: Mutex<Option<CancellationToken>>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl SessionState {
    pub fn new() -> Self {
        Self {
            mode: AtomicU8::new(SessionMode::Command as u8),
            cancel: Mutex::new(None),
        }
    }

    pub fn mode(&self) -> SessionMode {
        SessionMode::from_u8(self.mode.load(Ordering::Acquire))
    }

    /// Решает судьбу прерывания (Ctrl+C).
    ///
    /// Во время потока отменяет его и возвращает `CancelStream`; повторное
    /// прерывание до фактической остановки потока тоже `CancelStream`. В
    /// командном режиме возвращает `Exit`.
    pub fn interrupt(&self) -> InterruptAction {
        let mode = self.mode();
        if !mode.is_streaming() {
            return InterruptAction::Exit;
        }

        if let Some(token) = self.cancel.lock().as_ref() {
            debug!(?mode, "Interrupt routed to the active stream");
            token.cancel();
        }
        InterruptAction::CancelStream
    }

    /// Регистрирует токен отмены и переводит сессию в потоковый режим.
    pub(crate) fn enter_stream(
        &self,
        mode: SessionMode,
        token: CancellationToken,
    ) {
        *self.cancel.lock() = Some(token);
        self.mode.store(mode as u8, Ordering::Release);
    }

    /// Возвращает сессию в командный режим.
    pub(crate) fn leave_stream(&self) {
        self.mode
            .store(SessionMode::Command as u8, Ordering::Release);
        self.cancel.lock().take();
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
