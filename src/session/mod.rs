//! Модуль `session` содержит ядро оболочки.
//!
//! - `tokenizer` – разбор строки ввода с учётом кавычек;
//! - `mode` – режим сессии и маршрутизация прерываний;
//! - `watch` – фоновая трансляция watch-обновлений и сообщений подписки;
//! - `dispatcher` – классификация команд и взаимное исключение режимов.

pub mod dispatcher;
pub mod mode;
pub mod tokenizer;
pub mod watch;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatcher::*;
pub use mode::*;
pub use tokenizer::*;
pub use watch::*;
