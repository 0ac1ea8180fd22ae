use std::time::Duration;

use async_trait::async_trait;
use kvsh_error::{ClientError, KvshResult, ResultExt};
use tokio::{
    io::{AsyncWriteExt, BufWriter},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    time::timeout,
};
use tracing::{debug, trace, warn};

use crate::{
    client::PushStream,
    protocol::{decode_response, encode_command, Command, FrameLimits, FrameReader, Response},
};

/// Команда, открывающая каждое соединение.
pub const HANDSHAKE_COMMAND: &str = "HANDSHAKE";
/// Команда аутентификации.
pub const AUTH_COMMAND: &str = "AUTH";

/// Режим соединения, сообщаемый серверу в handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Запрос/ответ для обычных команд
    Command,
    /// Поток push-сообщений для watch и подписок
    Watch,
}

impl ConnectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::Watch => "watch",
        }
    }
}

/// Параметры одного TCP соединения.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Таймаут подключения
    pub connect_timeout: Duration,
    /// Таймаут записи
    pub write_timeout: Duration,
    /// Ограничения чтения кадров
    pub limits: FrameLimits,
}

/// Соединение с сервером.
///
/// Управляет TCP потоком и обменом кадрами. Чтение ответа не ограничено по
/// времени: зависший сервер блокирует команду.
pub struct Connection {
    /// Адрес сервера
    addr: String,
    /// Читающая часть соединения
    reader: FrameReader<OwnedReadHalf>,
    /// Пишущая часть соединения с буферизацией
    writer: BufWriter<OwnedWriteHalf>,
    /// Таймаут записи
    write_timeout: Duration,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Connection {
    /// Создаёт новое соединение с сервером.
    pub async fn connect(
        addr: &str,
        config: &ConnectionConfig,
    ) -> KvshResult<Self> {
        debug!("Connecting to {addr}");

        let stream = timeout(config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| ClientError::ConnectTimeout)?
            .map_err(|e| ClientError::ConnectionFailed {
                address: addr.to_string(),
                reason: e.to_string(),
            })?;
        // команды маленькие, ждать склейки пакетов незачем
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {e}");
        }
        debug!("Connection established with {addr}");

        let (read_half, write_half) = stream.into_split();

        Ok(Self {
            addr: addr.to_string(),
            reader: FrameReader::with_limits(read_half, config.limits),
            writer: BufWriter::new(write_half),
            write_timeout: config.write_timeout,
        })
    }

    /// Отправляет команду серверу.
    pub async fn send(
        &mut self,
        command: &Command,
    ) -> KvshResult<()> {
        trace!("Sending command: {}", command.summary());

        let encoded = encode_command(command)?;

        timeout(self.write_timeout, self.writer.write_all(&encoded))
            .await
            .map_err(|_| ClientError::WriteTimeout)??;

        timeout(self.write_timeout, self.writer.flush())
            .await
            .map_err(|_| ClientError::WriteTimeout)??;

        Ok(())
    }

    /// Читает один ответ. `None` — сервер закрыл соединение.
    pub async fn receive(&mut self) -> KvshResult<Option<Response>> {
        let Some(frame) = self.reader.read_frame().await? else {
            debug!("Connection to {} closed by peer", self.addr);
            return Ok(None);
        };

        let response = decode_response(&frame)?;
        trace!(status = ?response.status, "Response decoded");
        Ok(Some(response))
    }

    /// Отправляет команду и ожидает ответ.
    pub async fn execute(
        &mut self,
        command: &Command,
    ) -> KvshResult<Response> {
        self.send(command)
            .await
            .context("Failed to send command")?;
        self.receive()
            .await
            .context("Failed to receive response")?
            .ok_or_else(|| ClientError::ConnectionClosed.into())
    }

    /// Представляется серверу: идентификатор клиента и режим соединения.
    pub async fn handshake(
        &mut self,
        client_id: &str,
        mode: ConnectionMode,
    ) -> KvshResult<()> {
        let command = Command::new(HANDSHAKE_COMMAND, [client_id, mode.as_str()]);
        let response = self.execute(&command).await?;
        if response.is_err() {
            return Err(ClientError::HandshakeFailed {
                reason: response.message,
            }
            .into());
        }
        debug!(client_id, mode = mode.as_str(), "Handshake complete");
        Ok(())
    }

    /// Аутентификация на сервере.
    pub async fn authenticate(
        &mut self,
        password: &str,
    ) -> KvshResult<()> {
        let response = self.execute(&Command::new(AUTH_COMMAND, [password])).await?;
        if response.is_err() {
            return Err(ClientError::AuthenticationFailed {
                reason: response.message,
            }
            .into());
        }
        debug!("Authentication succeeded");
        Ok(())
    }

    /// Возвращает адрес сервера
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Закрывает соединение
    pub async fn close(mut self) -> KvshResult<()> {
        debug!("Closing connection to {}", self.addr);
        self.writer
            .shutdown()
            .await
            .context("Failed to shutdown connection")?;
        Ok(())
    }
}

#[async_trait]
impl PushStream for Connection {
    async fn next(&mut self) -> Option<KvshResult<Response>> {
        self.receive().await.transpose()
    }

    async fn send(
        &mut self,
        command: &Command,
    ) -> KvshResult<()> {
        Connection::send(self, command).await
    }

    async fn close(self: Box<Self>) {
        if let Err(e) = Connection::close(*self).await {
            debug!("Stream connection close failed: {e}");
        }
    }
}
