//! Чтение кадров из потока байт.
//!
//! Транспорт не добавляет к сообщениям префикс длины. Граница сообщения
//! определяется по первому «короткому» чтению: пока чтение заполняет буфер
//! целиком, считается, что данные ещё идут. Конец потока с непустым
//! накопленным буфером — это законченное последнее сообщение, а не ошибка.
//!
//! Ограничение протокола: сообщение, длина которого ровно кратна размеру
//! буфера, завершается только следующим коротким чтением или концом потока.

use bytes::{Bytes, BytesMut};
use kvsh_error::{KvshResult, ProtocolError};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{trace, warn};

/// Размер буфера одного чтения по умолчанию (16 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;
/// Жёсткий потолок размера кадра по умолчанию (32 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 32 * 1024 * 1024;

/// Ограничения чтения кадров.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLimits {
    /// Размер буфера одного чтения
    pub chunk_size: usize,
    /// Максимальный размер накопленного кадра
    pub max_frame_size: usize,
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// Собирает кадры из произвольного асинхронного источника байт.
pub struct FrameReader<R> {
    source: R,
    chunk: Vec<u8>,
    max_frame_size: usize,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(source: R) -> Self {
        Self::with_limits(source, FrameLimits::default())
    }

    pub fn with_limits(
        source: R,
        limits: FrameLimits,
    ) -> Self {
        Self {
            source,
            // буфер нулевой длины сделал бы каждое чтение «коротким»
            chunk: vec![0u8; limits.chunk_size.max(1)],
            max_frame_size: limits.max_frame_size,
        }
    }

    /// Читает один кадр.
    ///
    /// Возвращает `Ok(Some(bytes))` для законченного кадра, `Ok(None)` если
    /// поток закрыт до первого байта. Кадр больше потолка дочитывается до
    /// своей границы и отбрасывается целиком, после чего возвращается
    /// `ProtocolError::FrameTooLarge`: следующий вызов начинается с нового
    /// сообщения. Ошибка ввода-вывода отбрасывает всё накопленное.
    pub async fn read_frame(&mut self) -> KvshResult<Option<Bytes>> {
        let capacity = self.chunk.len();
        let mut frame = BytesMut::new();
        // число байт отбрасываемого кадра; `Some` после превышения потолка
        let mut oversized: Option<usize> = None;

        loop {
            let n = self.source.read(&mut self.chunk).await?;

            match oversized.as_mut() {
                Some(size) => *size += n,
                None if n > 0 => {
                    frame.extend_from_slice(&self.chunk[..n]);
                    if frame.len() > self.max_frame_size {
                        oversized = Some(frame.len());
                        frame = BytesMut::new();
                    }
                }
                None => {}
            }

            // n == 0 — конец потока; n < capacity — конец сообщения
            if n < capacity {
                break;
            }
        }

        if let Some(size) = oversized {
            warn!(size, limit = self.max_frame_size, "Frame exceeds size limit, discarded");
            return Err(ProtocolError::FrameTooLarge {
                size,
                limit: self.max_frame_size,
            }
            .into());
        }

        if frame.is_empty() {
            trace!("End of stream");
            return Ok(None);
        }

        trace!(len = frame.len(), "Frame assembled");
        Ok(Some(frame.freeze()))
    }

    pub fn get_ref(&self) -> &R {
        &self.source
    }

    pub fn into_inner(self) -> R {
        self.source
    }
}
