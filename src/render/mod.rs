//! Вывод ответов сервера в терминал.
//!
//! Ядро сессии передаёт сюда только полностью декодированные [`Response`],
//! никогда не сырые байты.

use std::io::Write;

use owo_colors::OwoColorize;
use parking_lot::Mutex;
use rustyline::ExternalPrinter;
use tracing::warn;

use crate::protocol::{Element, Response, Value};

/// Получатель всего, что сессия показывает пользователю.
///
/// Вызывается и из основного цикла, и из фонового потока обновлений, поэтому
/// должен быть `Send + Sync`.
pub trait Renderer: Send + Sync {
    /// Выводит ответ сервера.
    fn render(
        &self,
        response: &Response,
    );

    /// Служебное сообщение оболочки.
    fn notice(
        &self,
        message: &str,
    );

    /// Ошибка, которую нужно показать пользователю.
    fn error(
        &self,
        message: &str,
    );
}

/// Форматирует ответ в одну или несколько строк.
///
/// `ERR <сообщение>` для ошибок; иначе сообщение, атрибуты `[k=v ]`, затем
/// значение либо пронумерованный список элементов.
pub fn format_response(
    response: &Response,
    color: bool,
) -> String {
    if response.is_err() {
        return format!("{} {}", paint_err("ERR", color), response.message);
    }

    let mut out = if color {
        response.message.bold().green().to_string()
    } else {
        response.message.clone()
    };

    if !response.attributes.is_empty() {
        out.push_str(" [");
        for (key, value) in &response.attributes {
            out.push_str(&format!("{key}={value} "));
        }
        out.push(']');
    }
    out.push(' ');

    if let Some(value) = &response.value {
        out.push_str(&format_value(value));
    }

    if let Some(elements) = &response.elements {
        for (i, element) in elements.iter().enumerate() {
            out.push('\n');
            out.push_str(&format!("{i}) {}", format_element(element)));
        }
    }

    out
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Str(s) => format!("\"{s}\""),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        Value::Nil => "(nil)".to_string(),
    }
}

fn format_element(element: &Element) -> String {
    match element {
        Element::Pair { key, value } => format!("{key}=\"{value}\""),
        Element::Scored { member, score } => format!("{member}={score}"),
    }
}

fn paint_err(
    text: &str,
    color: bool,
) -> String {
    if color {
        text.bold().red().to_string()
    } else {
        text.to_string()
    }
}

/// Вывод в терминал.
///
/// Пока редактор строки активен, печать идёт через его внешний принтер,
/// чтобы обновления из фонового потока не ломали приглашение.
pub struct ConsoleRenderer {
    color: bool,
    printer: Mutex<Option<Box<dyn ExternalPrinter + Send>>>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl ConsoleRenderer {
    pub fn new(color: bool) -> Self {
        Self {
            color,
            printer: Mutex::new(None),
        }
    }

    /// Подключает внешний принтер редактора строки.
    pub fn attach_printer(
        &self,
        printer: Box<dyn ExternalPrinter + Send>,
    ) {
        *self.printer.lock() = Some(printer);
    }

    /// Отключает внешний принтер, дальнейший вывод идёт в stdout.
    pub fn detach_printer(&self) {
        self.printer.lock().take();
    }

    fn emit(
        &self,
        line: String,
    ) {
        let mut printer = self.printer.lock();
        if let Some(p) = printer.as_mut() {
            match p.print(format!("{line}\n")) {
                Ok(()) => return,
                Err(e) => {
                    warn!("External printer failed, falling back to stdout: {e}");
                    *printer = None;
                }
            }
        }
        drop(printer);

        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{line}");
        let _ = stdout.flush();
    }
}

impl Renderer for ConsoleRenderer {
    fn render(
        &self,
        response: &Response,
    ) {
        self.emit(format_response(response, self.color));
    }

    fn notice(
        &self,
        message: &str,
    ) {
        let line = if self.color {
            message.dimmed().to_string()
        } else {
            message.to_string()
        };
        self.emit(line);
    }

    fn error(
        &self,
        message: &str,
    ) {
        self.emit(format!("{} {message}", paint_err("ERR", self.color)));
    }
}
