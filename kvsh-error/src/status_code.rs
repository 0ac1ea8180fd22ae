use std::fmt;

use num_enum::TryFromPrimitive;

/// Коды статуса для категоризации ошибок клиента.
///
/// # Диапазоны:
/// - 0xxx: Успех
/// - 1xxx: Общие ошибки
/// - 3xxx: Авторизация
/// - 6xxx: Сеть / IO
/// - 8xxx: Протокольные ошибки (кадры, кодек)
/// - 9xxx: Ошибки сессии (конфликт режимов, неверное использование)
///
/// `num_enum::TryFromPrimitive` даёт нативную реализацию `TryFrom<u32>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
#[non_exhaustive]
pub enum StatusCode {
    // === 0xxx: Успех ===
    Success = 0,

    // === 1xxx: Общие ошибки ===
    Unknown = 1000,
    Unexpected = 1002,
    Internal = 1003,
    InvalidArgs = 1004,
    InvalidConfig = 1006,

    // === 3xxx: Авторизация ===
    AuthFailed = 3000,
    InvalidCredentials = 3006,

    // === 6xxx: Сеть/IO ===
    Io = 6000,
    ConnectionClosed = 6001,
    Timeout = 6002,
    ConnectionFailed = 6004,
    WriteTimeout = 6006,
    UnexpectedEof = 6007,
    HandshakeFailed = 6008,

    // === 8xxx: Протокол ===
    InvalidFrame = 8000,
    UnsupportedVersion = 8002,
    SizeLimit = 8007,
    EncodingError = 8010,
    DecodingError = 8011,
    MissingAttribute = 8012,

    // === 9xxx: Сессия ===
    ModeConflict = 9000,
    NotStreaming = 9001,
    FingerprintMismatch = 9002,
    Usage = 9003,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl StatusCode {
    /// Числовое представление кода статуса.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Пытается получить вариант `StatusCode` из `u32`.
    pub fn from_u32(v: u32) -> Option<Self> {
        Self::try_from(v).ok()
    }

    /// Имеет ли смысл повторить операцию (например, переподключиться).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout
                | Self::WriteTimeout
                | Self::ConnectionFailed
                | Self::ConnectionClosed
                | Self::UnexpectedEof
        )
    }

    /// Ошибка транспорта: соединение, чтение, запись (диапазон 6xxx).
    pub fn is_connection_error(&self) -> bool {
        (6000..=6999).contains(&self.code())
    }

    /// Ошибка протокола или кодека (диапазон 8xxx).
    pub fn is_protocol_error(&self) -> bool {
        (8000..=8999).contains(&self.code())
    }

    /// Локальная ошибка сессии (диапазон 9xxx). Такие ошибки никогда не
    /// порождают сетевой трафик.
    pub fn is_session_error(&self) -> bool {
        (9000..=9999).contains(&self.code())
    }

    /// Рекомендуемый уровень логирования для данного кода.
    pub fn log_level(&self) -> LogLevel {
        match self {
            Self::Success => LogLevel::Trace,
            Self::ModeConflict
            | Self::NotStreaming
            | Self::FingerprintMismatch
            | Self::Usage
            | Self::InvalidArgs => LogLevel::Debug,
            Self::AuthFailed | Self::InvalidCredentials => LogLevel::Info,
            Self::Internal => LogLevel::Error,
            _ => LogLevel::Warn,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для StatusCode
////////////////////////////////////////////////////////////////////////////////

impl From<StatusCode> for u32 {
    fn from(c: StatusCode) -> Self {
        c.code()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
