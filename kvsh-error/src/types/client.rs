use std::io;

use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Ошибки транспорта: подключение, handshake, чтение и запись.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// Ошибка подключения к серверу
    #[error("Failed to connect to {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },
    /// Таймаут подключения
    #[error("Connection timeout")]
    ConnectTimeout,
    /// Соединение закрыто сервером
    #[error("Connection closed by server")]
    ConnectionClosed,
    /// Таймаут записи
    #[error("Write timeout")]
    WriteTimeout,
    /// Сервер отклонил handshake
    #[error("Handshake rejected: {reason}")]
    HandshakeFailed { reason: String },
    /// Ошибка аутентификации
    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },
    /// Ошибка ввода-вывода
    #[error("I/O error ({kind:?}): {message}")]
    Io {
        kind: io::ErrorKind,
        message: String,
    },
}

impl ErrorExt for ClientError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ConnectionFailed { .. } => StatusCode::ConnectionFailed,
            Self::ConnectTimeout => StatusCode::Timeout,
            Self::ConnectionClosed => StatusCode::ConnectionClosed,
            Self::WriteTimeout => StatusCode::WriteTimeout,
            Self::HandshakeFailed { .. } => StatusCode::HandshakeFailed,
            Self::AuthenticationFailed { .. } => StatusCode::InvalidCredentials,
            Self::Io { kind, .. } => match kind {
                io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe => StatusCode::ConnectionClosed,
                io::ErrorKind::ConnectionRefused => StatusCode::ConnectionFailed,
                io::ErrorKind::TimedOut => StatusCode::Timeout,
                io::ErrorKind::UnexpectedEof => StatusCode::UnexpectedEof,
                _ => StatusCode::Io,
            },
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn client_message(&self) -> String {
        match self {
            // Причину отказа аутентификации пользователю не показываем.
            Self::AuthenticationFailed { .. } => "Authentication failed".to_string(),
            _ => self.to_string(),
        }
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("error_type", "client".to_string()),
            ("status_code", self.status_code().to_string()),
        ];

        match self {
            Self::ConnectionFailed { address, .. } => {
                tags.push(("address", address.clone()));
            }
            Self::Io { kind, .. } => {
                tags.push(("io_kind", format!("{kind:?}")));
            }
            _ => {}
        }

        tags
    }
}

// Конверсия из io::Error
impl From<io::Error> for ClientError {
    fn from(err: io::Error) -> Self {
        Self::Io {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
