use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Ошибки состояния сессии.
///
/// Возникают, когда команда конфликтует с текущим режимом. Обрабатываются
/// локально: пользователь видит сообщение, в транспорт ничего не пишется.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// Команда введена во время активного watch
    #[error("Cannot execute commands while in watch mode. Press Ctrl+C or use the unwatch command to exit.")]
    Watching,
    /// Команда введена во время pub/sub подписки
    #[error("Cannot execute commands while subscribed. Use UNSUBSCRIBE to exit subscription mode.")]
    Subscribed,
    /// Попытка начать второй watch
    #[error("Already watching (fingerprint {fingerprint}). Unwatch first.")]
    AlreadyWatching { fingerprint: String },
    /// Повторная подписка
    #[error("Already in a subscribed or watch state. Unsubscribe first.")]
    AlreadySubscribed,
    /// UNSUBSCRIBE без активной подписки
    #[error("Not subscribed to any channels.")]
    NotSubscribed,
    /// Остановка watch, которого нет
    #[error("Not in watch mode.")]
    NotWatching,
    /// Указан отпечаток, не совпадающий с активным
    #[error("Fingerprint {given} does not match the active watch ({active}).")]
    FingerprintMismatch { given: String, active: String },
    /// Неверное количество аргументов у управляющей команды
    #[error("Usage: {usage}")]
    Usage { usage: String },
}

impl ErrorExt for SessionError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Watching
            | Self::Subscribed
            | Self::AlreadyWatching { .. }
            | Self::AlreadySubscribed => StatusCode::ModeConflict,
            Self::NotSubscribed | Self::NotWatching => StatusCode::NotStreaming,
            Self::FingerprintMismatch { .. } => StatusCode::FingerprintMismatch,
            Self::Usage { .. } => StatusCode::Usage,
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
