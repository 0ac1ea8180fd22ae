use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Ошибки уровня кадров и кодека.
///
/// Любая из них относится только к одной команде: буфер чтения сбрасывается
/// целиком, и следующее чтение начинается с чистого состояния.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// Накопленный кадр превысил допустимый размер
    #[error("Frame too large: {size} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge { size: usize, limit: usize },
    /// Не удалось сериализовать команду
    #[error("Failed to encode command: {reason}")]
    Encode { reason: String },
    /// Байты кадра не являются корректным конвертом
    #[error("Failed to decode response: {reason}")]
    Decode { reason: String },
    /// Неподдерживаемая версия конверта
    #[error("Unsupported envelope version {found} (expected {expected})")]
    UnsupportedVersion { found: u8, expected: u8 },
    /// Конверт декодирован, но нарушает инварианты ответа
    #[error("Invalid response envelope: {reason}")]
    InvalidEnvelope { reason: String },
    /// В ответе отсутствует обязательный атрибут
    #[error("Response is missing the '{name}' attribute")]
    MissingAttribute { name: String },
}

impl ErrorExt for ProtocolError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::FrameTooLarge { .. } => StatusCode::SizeLimit,
            Self::Encode { .. } => StatusCode::EncodingError,
            Self::Decode { .. } => StatusCode::DecodingError,
            Self::UnsupportedVersion { .. } => StatusCode::UnsupportedVersion,
            Self::InvalidEnvelope { .. } => StatusCode::InvalidFrame,
            Self::MissingAttribute { .. } => StatusCode::MissingAttribute,
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("error_type", "protocol".to_string()),
            ("status_code", self.status_code().to_string()),
        ];

        if let Self::FrameTooLarge { size, limit } = self {
            tags.push(("frame_size", size.to_string()));
            tags.push(("frame_limit", limit.to_string()));
        }

        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Тест проверяет статус и текст для FrameTooLarge.
    #[test]
    fn test_frame_too_large() {
        let err = ProtocolError::FrameTooLarge {
            size: 40,
            limit: 32,
        };
        assert_eq!(err.status_code(), StatusCode::SizeLimit);
        assert!(err.to_string().contains("40"));
        assert!(err
            .metrics_tags()
            .iter()
            .any(|(k, v)| *k == "frame_limit" && v == "32"));
    }

    /// Тест проверяет, что все варианты попадают в протокольный диапазон.
    #[test]
    fn test_all_protocol_range() {
        let errs = [
            ProtocolError::Encode {
                reason: "x".to_string(),
            },
            ProtocolError::Decode {
                reason: "x".to_string(),
            },
            ProtocolError::UnsupportedVersion {
                found: 9,
                expected: 1,
            },
            ProtocolError::InvalidEnvelope {
                reason: "x".to_string(),
            },
            ProtocolError::MissingAttribute {
                name: "fingerprint".to_string(),
            },
        ];
        for err in errs {
            assert!(err.status_code().is_protocol_error(), "{err:?}");
        }
    }
}
