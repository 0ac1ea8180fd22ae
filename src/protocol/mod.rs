//! Модуль `protocol` описывает клиентскую часть протокола.
//!
//! Он включает в себя:
//! - `command` – команда, которую оболочка отправляет серверу;
//! - `response` – типизированный ответ сервера (статус, атрибуты, значение
//!   или список элементов);
//! - `codec` – версионированный бинарный конверт (MessagePack);
//! - `frame` – чтение одного кадра из потока байт без префикса длины.

pub mod codec;
pub mod command;
pub mod frame;
pub mod response;

// Publicly re-export all error types and functions from the submodules to
// simplify access from external code.
pub use codec::*;
pub use command::*;
pub use frame::*;
pub use response::*;
