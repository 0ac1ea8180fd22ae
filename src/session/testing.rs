//! Тестовые двойники транспорта и вывода.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use kvsh_error::{ClientError, KvshResult, StackError};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::{
    client::{PushStream, Transport},
    protocol::{Command, Response},
    render::{format_response, Renderer},
};

/// Журнал всех записей в транспорт, в порядке отправки.
pub type Journal = Arc<Mutex<Vec<String>>>;

/// Транспорт с заранее заданными ответами.
#[derive(Default)]
pub struct MockTransport {
    pub journal: Journal,
    replies: VecDeque<KvshResult<Response>>,
    streams: VecDeque<(Response, mpsc::UnboundedReceiver<Response>)>,
    pub reject_auth: bool,
    closed_streams: Arc<AtomicUsize>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Следующий ответ на `fire`.
    pub fn reply(
        &mut self,
        response: Response,
    ) {
        self.replies.push_back(Ok(response));
    }

    /// Следующий `fire` завершится ошибкой транспорта.
    pub fn fail(
        &mut self,
        err: impl Into<StackError>,
    ) {
        self.replies.push_back(Err(err.into()));
    }

    /// Следующий поток: первый ответ и отправитель push-сообщений. Если
    /// отправитель уничтожен, сервер считается завершившим поток.
    pub fn stream(
        &mut self,
        first: Response,
    ) -> mpsc::UnboundedSender<Response> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.streams.push_back((first, rx));
        tx
    }

    pub fn writes(&self) -> Vec<String> {
        self.journal.lock().clone()
    }

    /// Сколько потоков было закрыто.
    pub fn closed_streams(&self) -> usize {
        self.closed_streams.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fire(
        &mut self,
        command: &Command,
    ) -> KvshResult<Response> {
        self.journal.lock().push(command.to_string());
        self.replies.pop_front().unwrap_or_else(|| Ok(Response::ok("OK")))
    }

    async fn open_stream(
        &mut self,
        command: &Command,
    ) -> KvshResult<(Response, Box<dyn PushStream>)> {
        self.journal.lock().push(command.to_string());
        let (first, updates) = self
            .streams
            .pop_front()
            .ok_or(ClientError::ConnectionClosed)?;
        let stream = MockStream {
            updates,
            journal: self.journal.clone(),
            closed: self.closed_streams.clone(),
        };
        Ok((first, Box::new(stream)))
    }

    async fn reconnect(
        &mut self,
        password: &str,
    ) -> KvshResult<()> {
        self.journal.lock().push(format!("RECONNECT {password}"));
        if self.reject_auth {
            return Err(ClientError::AuthenticationFailed {
                reason: "WRONGPASS".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

pub struct MockStream {
    updates: mpsc::UnboundedReceiver<Response>,
    journal: Journal,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl PushStream for MockStream {
    async fn next(&mut self) -> Option<KvshResult<Response>> {
        self.updates.recv().await.map(Ok)
    }

    async fn send(
        &mut self,
        command: &Command,
    ) -> KvshResult<()> {
        self.journal.lock().push(command.to_string());
        Ok(())
    }

    async fn close(self: Box<Self>) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Вывод, запоминающий каждую строку.
#[derive(Default)]
pub struct RecordingRenderer {
    lines: Mutex<Vec<String>>,
}

impl RecordingRenderer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    fn len(&self) -> usize {
        self.lines.lock().len()
    }

    /// Ждёт, пока не наберётся `n` строк.
    pub async fn wait_for(
        &self,
        n: usize,
    ) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.len() < n {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("renderer did not receive expected output");
    }
}

impl Renderer for RecordingRenderer {
    fn render(
        &self,
        response: &Response,
    ) {
        self.lines.lock().push(format_response(response, false));
    }

    fn notice(
        &self,
        message: &str,
    ) {
        self.lines.lock().push(format!("notice: {message}"));
    }

    fn error(
        &self,
        message: &str,
    ) {
        self.lines.lock().push(format!("error: {message}"));
    }
}
