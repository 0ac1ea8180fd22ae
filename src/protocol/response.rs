use std::collections::BTreeMap;

use bytes::Bytes;
use kvsh_error::ProtocolError;
use serde::{Deserialize, Serialize};

/// Атрибут, в котором сервер возвращает идентификатор watch-сессии.
pub const FINGERPRINT_ATTR: &str = "fingerprint";

/// Статус ответа.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Ok,
    Err,
}

/// Типизированное значение ответа. Заполняется ровно один вариант.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bytes(Bytes),
    Nil,
}

/// Элемент многозначного ответа (списки, хеши, отсортированные множества).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Element {
    /// Пара ключ/значение (HGETALL и подобные)
    Pair { key: String, value: String },
    /// Элемент отсортированного множества со счётом (ZRANGE)
    Scored { member: String, score: i64 },
}

/// Ответ сервера.
///
/// Инвариант: при `status = ERR` поля `value` и `elements` отсутствуют, а
/// `message` содержит текст ошибки. Проверяется в [`Response::validate`]
/// при декодировании.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: Status,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "attrs", default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub elements: Option<Vec<Element>>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Response {
    /// Успешный ответ только с сообщением.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: Status::Ok,
            message: message.into(),
            attributes: BTreeMap::new(),
            value: None,
            elements: None,
        }
    }

    /// Ответ с прикладной ошибкой.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Err,
            ..Self::ok(message)
        }
    }

    pub fn with_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_value(
        mut self,
        value: Value,
    ) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_elements(
        mut self,
        elements: Vec<Element>,
    ) -> Self {
        self.elements = Some(elements);
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    pub fn is_err(&self) -> bool {
        self.status == Status::Err
    }

    /// Идентификатор watch-сессии из атрибутов, если он есть.
    pub fn fingerprint(&self) -> Option<&str> {
        self.attributes
            .get(FINGERPRINT_ATTR)
            .map(String::as_str)
            .filter(|fp| !fp.is_empty())
    }

    /// Проверяет инвариант ответа с ошибкой.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.is_err() && (self.value.is_some() || self.elements.is_some()) {
            return Err(ProtocolError::InvalidEnvelope {
                reason: "error response carries a payload".to_string(),
            });
        }
        Ok(())
    }
}
