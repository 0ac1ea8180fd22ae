use std::time::Duration;

use async_trait::async_trait;
use kvsh_error::{KvshResult, ResultExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    client::{Connection, ConnectionConfig, ConnectionMode, PushStream, Transport},
    protocol::{Command, FrameLimits, Response},
};

/// Конфигурация клиента.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Адрес сервера в виде `host:port`
    pub addr: String,
    /// Таймаут подключения
    pub connect_timeout: Duration,
    /// Таймаут записи
    pub write_timeout: Duration,
    /// Пароль для аутентификации (опционально)
    pub password: Option<String>,
    /// Идентификатор клиента, передаваемый в handshake
    pub client_id: String,
    /// Ограничения чтения кадров
    pub limits: FrameLimits,
}

/// Клиент хранилища.
///
/// Держит одно соединение в режиме запрос/ответ. Для каждого watch-потока
/// открывается отдельное соединение, чтобы push-сообщения не смешивались с
/// ответами на обычные команды.
pub struct Client {
    connection: Connection,
    config: ClientConfig,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl ClientConfig {
    /// Создаёт конфигурацию со значениями по умолчанию и случайным
    /// идентификатором клиента.
    pub fn new(
        host: &str,
        port: u16,
    ) -> Self {
        Self {
            addr: format!("{host}:{port}"),
            connect_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(10),
            password: None,
            client_id: Uuid::new_v4().to_string(),
            limits: FrameLimits::default(),
        }
    }

    fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            connect_timeout: self.connect_timeout,
            write_timeout: self.write_timeout,
            limits: self.limits,
        }
    }
}

impl Client {
    /// Подключается к серверу.
    pub async fn connect(config: ClientConfig) -> KvshResult<Self> {
        info!("Connecting to server at {}", config.addr);

        let connection = Self::open(&config, ConnectionMode::Command).await?;

        info!("Connected to {}", config.addr);
        Ok(Self { connection, config })
    }

    /// Открывает соединение в заданном режиме: TCP, handshake и, если задан
    /// пароль, AUTH.
    async fn open(
        config: &ClientConfig,
        mode: ConnectionMode,
    ) -> KvshResult<Connection> {
        let mut connection = Connection::connect(&config.addr, &config.connection_config()).await?;

        connection
            .handshake(&config.client_id, mode)
            .await
            .with_context(|| format!("Handshake with {} failed", config.addr))?;

        if let Some(password) = config.password.as_deref() {
            connection.authenticate(password).await?;
        }

        Ok(connection)
    }

    /// Проверка соединения (PING).
    pub async fn ping(&mut self) -> KvshResult<bool> {
        debug!("Sending PING");
        let response = self.connection.execute(&Command::new("PING", Vec::<String>::new())).await?;
        Ok(response.is_ok())
    }

    /// Адрес сервера.
    pub fn addr(&self) -> &str {
        &self.config.addr
    }

    /// Идентификатор клиента.
    pub fn client_id(&self) -> &str {
        &self.config.client_id
    }

    /// Закрывает соединение с сервером.
    pub async fn close(self) -> KvshResult<()> {
        info!("Closing client connection to {}", self.config.addr);
        self.connection.close().await
    }
}

#[async_trait]
impl Transport for Client {
    async fn fire(
        &mut self,
        command: &Command,
    ) -> KvshResult<Response> {
        debug!("Executing {}", command.summary());
        self.connection.execute(command).await
    }

    async fn open_stream(
        &mut self,
        command: &Command,
    ) -> KvshResult<(Response, Box<dyn PushStream>)> {
        debug!("Opening push stream for {}", command.summary());

        let mut stream = Self::open(&self.config, ConnectionMode::Watch)
            .await
            .context("Failed to open watch connection")?;

        match stream.execute(command).await {
            Ok(first) => Ok((first, Box::new(stream))),
            Err(e) => {
                if let Err(close_err) = stream.close().await {
                    debug!("Watch connection close failed: {close_err}");
                }
                Err(e)
            }
        }
    }

    async fn reconnect(
        &mut self,
        password: &str,
    ) -> KvshResult<()> {
        let mut config = self.config.clone();
        config.password = Some(password.to_string());

        let fresh = Self::open(&config, ConnectionMode::Command).await?;
        let stale = std::mem::replace(&mut self.connection, fresh);
        self.config = config;

        if let Err(e) = stale.close().await {
            warn!("Failed to close previous connection: {e}");
        }
        info!("Re-authenticated with {}", self.config.addr);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::new("localhost", 7379);
        assert_eq!(config.addr, "localhost:7379");
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert!(config.password.is_none());
        assert!(Uuid::parse_str(&config.client_id).is_ok());
    }

    /// Тест проверяет, что каждый клиент получает свой идентификатор.
    #[test]
    fn test_client_ids_are_unique() {
        let a = ClientConfig::new("127.0.0.1", 1);
        let b = ClientConfig::new("127.0.0.1", 1);
        assert_ne!(a.client_id, b.client_id);
    }
}
