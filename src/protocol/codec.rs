//! Версионированный бинарный конверт.
//!
//! Каждое сообщение — это MessagePack-структура `{ v, body }` с именованными
//! полями. Кодек вызывается строго на границах транспорта: команда кодируется
//! перед записью, кадр декодируется после того, как `FrameReader` собрал его
//! целиком. Ошибки возвращаются типизированно, паник на входных данных нет.

use kvsh_error::ProtocolError;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::{Command, Response};

/// Текущая версия конверта.
pub const PROTOCOL_VERSION: u8 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    v: u8,
    body: &'a T,
}

#[derive(Deserialize)]
struct Envelope<T> {
    #[allow(dead_code)]
    v: u8,
    body: T,
}

/// Читает только версию, остальные поля пропускаются.
#[derive(Deserialize)]
struct VersionProbe {
    v: u8,
}

/// Кодирует произвольное тело в конверт текущей версии.
pub fn encode<T: Serialize>(body: &T) -> Result<Vec<u8>, ProtocolError> {
    let envelope = EnvelopeRef {
        v: PROTOCOL_VERSION,
        body,
    };
    rmp_serde::to_vec_named(&envelope).map_err(|e| ProtocolError::Encode {
        reason: e.to_string(),
    })
}

/// Декодирует конверт, сначала проверяя версию.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    let probe: VersionProbe = rmp_serde::from_slice(bytes).map_err(|e| ProtocolError::Decode {
        reason: e.to_string(),
    })?;

    if probe.v != PROTOCOL_VERSION {
        return Err(ProtocolError::UnsupportedVersion {
            found: probe.v,
            expected: PROTOCOL_VERSION,
        });
    }

    let envelope: Envelope<T> =
        rmp_serde::from_slice(bytes).map_err(|e| ProtocolError::Decode {
            reason: e.to_string(),
        })?;
    Ok(envelope.body)
}

/// Кодирует команду для отправки.
pub fn encode_command(command: &Command) -> Result<Vec<u8>, ProtocolError> {
    encode(command)
}

/// Декодирует ответ и проверяет его инварианты.
pub fn decode_response(bytes: &[u8]) -> Result<Response, ProtocolError> {
    let response: Response = decode(bytes)?;
    response.validate()?;
    Ok(response)
}
