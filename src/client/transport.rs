use async_trait::async_trait;
use kvsh_error::KvshResult;

use crate::protocol::{Command, Response};

/// Двунаправленный транспорт сессии.
///
/// Гарантирует не более одной команды «в полёте»: `fire` возвращается только
/// после того, как ответ (или ошибка) прочитан полностью.
#[async_trait]
pub trait Transport: Send {
    /// Отправляет обычную команду и ждёт ответ.
    async fn fire(
        &mut self,
        command: &Command,
    ) -> KvshResult<Response>;

    /// Открывает поток push-сообщений для watch/pub-sub команды.
    ///
    /// Возвращает первый ответ сервера вместе с потоком последующих
    /// сообщений. Если первый ответ — ошибка, поток следует закрыть.
    async fn open_stream(
        &mut self,
        command: &Command,
    ) -> KvshResult<(Response, Box<dyn PushStream>)>;

    /// Переподключается с новыми учётными данными.
    ///
    /// При ошибке продолжает использоваться старое соединение.
    async fn reconnect(
        &mut self,
        password: &str,
    ) -> KvshResult<()>;
}

/// Входящий поток сообщений, которые сервер отправляет сам.
#[async_trait]
pub trait PushStream: Send {
    /// Следующее сообщение; `None` — сервер завершил поток.
    async fn next(&mut self) -> Option<KvshResult<Response>>;

    /// Отправляет команду в тот же поток, не дожидаясь ответа.
    async fn send(
        &mut self,
        command: &Command,
    ) -> KvshResult<()>;

    /// Закрывает поток.
    async fn close(self: Box<Self>);
}
