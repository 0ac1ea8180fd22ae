//! Сквозные тесты сессии поверх настоящего TCP.
//!
//! Поддельный сервер говорит тем же конвертом MessagePack, что и клиент:
//! handshake, AUTH, обычные команды и watch-поток на отдельном соединении.

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use kvsh::{
    client::{Client, ClientConfig, Transport},
    config::Keywords,
    protocol::{decode, encode, Command, FrameReader, Response, Value, FINGERPRINT_ATTR},
    render::{format_response, Renderer},
    session::{Dispatcher, InterruptAction, SessionMode, SessionState},
    StatusCode,
};
use parking_lot::Mutex;
use tokio::{
    io::AsyncWriteExt,
    net::{TcpListener, TcpStream},
    time::{sleep, timeout},
};

const PASSWORD: &str = "secret";
const PUSH_GAP: Duration = Duration::from_millis(30);

/// Журнал сервера: `"<mode> <команда>"` в порядке получения.
type ServerLog = Arc<Mutex<Vec<String>>>;

#[derive(Default)]
struct Collector {
    lines: Mutex<Vec<String>>,
}

impl Collector {
    fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    async fn wait_for(
        &self,
        n: usize,
    ) {
        timeout(Duration::from_secs(5), async {
            while self.lines.lock().len() < n {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("renderer did not receive expected output");
    }
}

impl Renderer for Collector {
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

/// Поднимает сервер на свободном порту.
async fn spawn_server(require_auth: bool) -> Result<(u16, ServerLog)> {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
    let port = listener.local_addr()?.port();
    let log = ServerLog::default();

    let server_log = log.clone();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(serve(socket, require_auth, server_log.clone()));
        }
    });

    Ok((port, log))
}

async fn reply(
    socket: &mut tokio::net::tcp::OwnedWriteHalf,
    response: &Response,
) -> Result<()> {
    socket.write_all(&encode(response)?).await?;
    socket.flush().await?;
    Ok(())
}

async fn serve(
    socket: TcpStream,
    require_auth: bool,
    log: ServerLog,
) -> Result<()> {
    socket.set_nodelay(true)?;
    let (read_half, mut writer) = socket.into_split();
    let mut reader = FrameReader::new(read_half);
    let mut mode = String::from("?");
    let mut authed = !require_auth;

    while let Some(frame) = reader.read_frame().await? {
        let command: Command = decode(&frame)?;
        log.lock().push(format!("{mode} {command}"));

        let response = match command.name() {
            "HANDSHAKE" => {
                mode = command.args().get(1).cloned().unwrap_or_default();
                Response::ok("OK")
            }
            "AUTH" if command.args().first().map(String::as_str) == Some(PASSWORD) => {
                authed = true;
                Response::ok("OK")
            }
            "AUTH" => Response::error("invalid password"),
            _ if !authed => Response::error("NOAUTH authentication required"),
            "PING" => Response::ok("PONG"),
            "GET" => Response::ok("OK").with_value(Value::Str("v1".into())),
            "GETWATCH" => {
                let key = command.args().first().cloned().unwrap_or_default();
                let first = Response::ok("OK")
                    .with_attribute(FINGERPRINT_ATTR, "fp-1")
                    .with_value(Value::Str("v1".into()));
                reply(&mut writer, &first).await?;

                for i in 2..=3 {
                    sleep(PUSH_GAP).await;
                    reply(&mut writer, &Response::ok("OK").with_value(Value::Str(format!("v{i}")))).await?;
                }
                // "short" сервер закрывает сам после обновлений
                if key == "short" {
                    sleep(PUSH_GAP).await;
                    return Ok(());
                }
                continue;
            }
            "UNWATCH" => Response::ok("OK"),
            // watch-соединение обрывается до первого ответа
            "DROPWATCH" => return Ok(()),
            // ответ, который не является конвертом
            "BROKEN" => {
                writer.write_all(b"\xc1 definitely not msgpack").await?;
                writer.flush().await?;
                continue;
            }
            other => Response::error(format!("unknown command '{other}'")),
        };
        reply(&mut writer, &response).await?;
    }
    Ok(())
}

async fn wait_for_log(
    log: &ServerLog,
    entry: &str,
) {
    timeout(Duration::from_secs(5), async {
        while !log.lock().iter().any(|e| e == entry) {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("server never received {entry:?}, got {:?}", log.lock()));
}

fn config(port: u16) -> ClientConfig {
    let mut config = ClientConfig::new("127.0.0.1", port);
    config.connect_timeout = Duration::from_secs(2);
    config
}

async fn session(
    port: u16,
) -> Result<(Dispatcher<Client>, Arc<SessionState>, Arc<Collector>)> {
    let client = Client::connect(config(port)).await?;
    let state = Arc::new(SessionState::new());
    let renderer = Arc::new(Collector::default());
    let dispatcher = Dispatcher::new(client, state.clone(), renderer.clone(), Keywords::default());
    Ok((dispatcher, state, renderer))
}

/// Тест проверяет, что каждое соединение начинается с handshake, а обычная
/// команда возвращает отрисованный ответ.
#[tokio::test]
async fn test_handshake_and_plain_command() -> Result<()> {
    let (port, log) = spawn_server(false).await?;
    let (mut dispatcher, _state, renderer) = session(port).await?;

    assert!(dispatcher.handle_line("get key").await);
    assert_eq!(renderer.lines(), vec!["OK \"v1\""]);

    let entries = log.lock().clone();
    assert!(entries[0].starts_with("? HANDSHAKE "));
    assert!(entries[0].ends_with(" command"));
    assert_eq!(entries[1], "command GET key");
    Ok(())
}

/// Тест проверяет полный цикл watch: отдельное соединение, обновления,
/// отмена прерыванием и ровно одна команда `UNWATCH <fp>`.
#[tokio::test]
async fn test_watch_roundtrip_over_tcp() -> Result<()> {
    let (port, log) = spawn_server(false).await?;
    let (mut dispatcher, state, renderer) = session(port).await?;

    dispatcher.handle_line("GETWATCH key").await;
    assert_eq!(state.mode(), SessionMode::Watching);

    renderer.wait_for(3).await;
    let lines = renderer.lines();
    assert!(lines[0].contains("fingerprint=fp-1"));
    assert_eq!(lines[1], "OK \"v2\"");
    assert_eq!(lines[2], "OK \"v3\"");

    assert_eq!(state.interrupt(), InterruptAction::CancelStream);
    assert!(dispatcher.reap_stream().await);
    assert_eq!(state.mode(), SessionMode::Command);
    assert_eq!(renderer.lines().last().unwrap(), "notice: Stopped watch fp-1");

    wait_for_log(&log, "watch UNWATCH fp-1").await;
    let unwatch = log.lock().iter().filter(|e| e.contains("UNWATCH")).count();
    assert_eq!(unwatch, 1);
    // команда GETWATCH ушла по watch-соединению, не по командному
    assert!(log.lock().iter().any(|e| e == "watch GETWATCH key"));
    Ok(())
}

/// Тест проверяет, что поток, закрытый сервером, возвращает сессию в
/// командный режим без отправки UNWATCH.
#[tokio::test]
async fn test_server_closed_watch() -> Result<()> {
    let (port, log) = spawn_server(false).await?;
    let (mut dispatcher, state, renderer) = session(port).await?;

    dispatcher.handle_line("GETWATCH short").await;
    renderer.wait_for(4).await;

    assert_eq!(state.mode(), SessionMode::Command);
    assert_eq!(renderer.lines().last().unwrap(), "notice: Server ended watch fp-1");

    // следующая команда сама подбирает завершённый поток
    dispatcher.handle_line("GET key").await;
    assert_eq!(renderer.lines()[4], "OK \"v1\"");
    assert!(!log.lock().iter().any(|e| e.contains("UNWATCH")));
    Ok(())
}

/// Тест проверяет, что нечитаемый ответ выводится как ошибка этой команды,
/// а следующая команда получает свой собственный ответ.
#[tokio::test]
async fn test_garbage_reply_is_reported_and_session_continues() -> Result<()> {
    let (port, _log) = spawn_server(false).await?;
    let (mut dispatcher, state, renderer) = session(port).await?;

    assert!(dispatcher.handle_line("BROKEN").await);
    let lines = renderer.lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("error: "), "{lines:?}");
    assert_eq!(state.mode(), SessionMode::Command);

    assert!(dispatcher.handle_line("GET key").await);
    assert_eq!(renderer.lines()[1], "OK \"v1\"");
    Ok(())
}

/// Тест проверяет, что обрыв watch-соединения до первого ответа не меняет
/// режим сессии, а командное соединение остаётся рабочим.
#[tokio::test]
async fn test_watch_connection_dropped_before_reply() -> Result<()> {
    let (port, _log) = spawn_server(false).await?;
    let (mut dispatcher, state, renderer) = session(port).await?;

    assert!(dispatcher.handle_line("DROPWATCH key").await);
    let lines = renderer.lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("error: "), "{lines:?}");
    assert_eq!(state.mode(), SessionMode::Command);

    assert!(dispatcher.handle_line("GET key").await);
    assert_eq!(renderer.lines()[1], "OK \"v1\"");
    Ok(())
}

/// Тест проверяет AUTH: неверный пароль оставляет старое соединение,
/// верный открывает новое.
#[tokio::test]
async fn test_auth_reconnects() -> Result<()> {
    let (port, log) = spawn_server(true).await?;
    let (mut dispatcher, _state, renderer) = session(port).await?;

    dispatcher.handle_line("GET key").await;
    assert_eq!(renderer.lines()[0], "ERR NOAUTH authentication required");

    dispatcher.handle_line("AUTH wrong").await;
    assert!(renderer.lines()[1].starts_with("error: AUTH failed"));

    dispatcher.handle_line("AUTH secret").await;
    assert_eq!(renderer.lines()[2], "OK ");

    dispatcher.handle_line("GET key").await;
    assert_eq!(renderer.lines()[3], "OK \"v1\"");

    let handshakes = log.lock().iter().filter(|e| e.contains("HANDSHAKE")).count();
    // исходное соединение плюс две попытки переподключения
    assert_eq!(handshakes, 3);
    Ok(())
}

/// Тест проверяет, что пароль из конфигурации отправляется сразу после
/// handshake.
#[tokio::test]
async fn test_password_from_config() -> Result<()> {
    let (port, log) = spawn_server(true).await?;
    let mut config = config(port);
    config.password = Some(PASSWORD.to_string());

    let mut client = Client::connect(config).await?;
    assert!(client.ping().await?);
    let response = client.fire(&Command::new("get", ["k"])).await?;
    assert!(response.is_ok());

    let entries = log.lock().clone();
    assert_eq!(entries[1], "command AUTH secret");
    Ok(())
}

#[tokio::test]
async fn test_connection_refused() -> Result<()> {
    // занимаем порт и сразу освобождаем, чтобы на нём никого не было
    let port = {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        listener.local_addr()?.port()
    };

    let err = match Client::connect(config(port)).await {
        Ok(_) => panic!("connect to a closed port must fail"),
        Err(e) => e,
    };
    assert_eq!(err.status_code(), StatusCode::ConnectionFailed);
    Ok(())
}
