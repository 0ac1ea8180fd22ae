pub mod connection;
pub mod core;
pub mod transport;

// Публичный экспорт всех типов из вложенных модулей, чтобы упростить доступ к
// ним из внешнего кода.
pub use core::*;

pub use connection::*;
pub use transport::*;
