/// TCP client: connections, handshake, authentication, push streams.
pub mod client;
/// Shell configuration loading (defaults, file, environment).
pub mod config;
/// Flexible logging (formatting, filters, sinks).
pub mod logging;
/// Wire protocol: commands, responses, message codec and frame reader.
pub mod protocol;
/// Response rendering for the terminal.
pub mod render;
/// Interactive loop, prompt and completion.
pub mod repl;
/// Session state: tokenizer, modes, watch controller and dispatcher.
pub mod session;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// Client and transport seams.
pub use client::{Client, ClientConfig, Connection, PushStream, Transport};
/// config
pub use config::{Keywords, Settings};
/// Operation errors and result types.
pub use kvsh_error::{KvshResult, StackError, StatusCode};
/// Wire types.
pub use protocol::{Command, FrameLimits, FrameReader, Response, Status, Value};
/// Rendering.
pub use render::{format_response, ConsoleRenderer, Renderer};
/// Session API.
pub use session::{tokenize, Dispatcher, SessionMode, SessionState, WatchController, WatchPhase};
