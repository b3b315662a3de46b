use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::DecodeError;

const READ_CHUNK: usize = 8 * 1024;
/// Largest incomplete value buffered before it is dropped as malformed.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Decodes consecutive JSON values from a byte stream.
///
/// Values may be split across reads arbitrarily and need not be newline-separated.
/// When a value cannot be decoded, the rest of its line is discarded and the error is
/// returned; the next call resumes with whatever follows, so a single malformed frame
/// does not cost the connection. A value still incomplete after [`MAX_FRAME_LEN`] bytes
/// is dropped the same way.
///
/// # Examples
///
/// ```
/// # use creo_stats::stats::FrameDecoder;
/// # tokio_test_block_on(async {
/// let mut decoder = FrameDecoder::new(&b"{\"a\":1}\n{\"a\":2}\n"[..]);
/// let first: serde_json::Value = decoder.next_frame().await.unwrap().unwrap();
/// assert_eq!(first["a"], 1);
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Debug)]
pub struct FrameDecoder<R> {
    reader: R,
    buf: Vec<u8>,
    eof: bool,
    /// Drop input up to the next newline before buffering again.
    skipping: bool,
    max_frame_len: usize,
}

impl<R> FrameDecoder<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(READ_CHUNK),
            eof: false,
            skipping: false,
            max_frame_len: MAX_FRAME_LEN,
        }
    }

    /// Overrides [`MAX_FRAME_LEN`].
    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    /// Returns the next decoded value.
    ///
    /// Returns `None` once the stream ended cleanly between two values.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::Malformed`] if the next value is invalid; decoding may continue.
    /// - [`DecodeError::TooLarge`] if the next value exceeds the size limit; decoding
    ///   may continue.
    /// - [`DecodeError::UnexpectedEof`] if the stream ended inside a value.
    /// - [`DecodeError::Io`] if reading from the stream failed.
    pub async fn next_frame<T>(&mut self) -> Option<Result<T, DecodeError>>
    where
        T: DeserializeOwned,
    {
        loop {
            self.skip_whitespace();
            if !self.buf.is_empty() {
                let (result, consumed) = {
                    let mut frames =
                        serde_json::Deserializer::from_slice(&self.buf).into_iter::<T>();
                    let result = frames.next();
                    (result, frames.byte_offset())
                };
                match result {
                    Some(Ok(frame)) => {
                        self.buf.drain(..consumed);
                        return Some(Ok(frame));
                    }
                    Some(Err(err)) if err.is_eof() => {
                        if self.eof {
                            self.buf.clear();
                            return Some(Err(DecodeError::UnexpectedEof));
                        }
                        if self.buf.len() > self.max_frame_len {
                            self.skip_line();
                            return Some(Err(DecodeError::TooLarge(self.max_frame_len)));
                        }
                    }
                    Some(Err(err)) => {
                        self.skip_line();
                        return Some(Err(DecodeError::Malformed(err)));
                    }
                    None => {}
                }
            } else if self.eof {
                return None;
            }

            if let Err(err) = self.fill().await {
                return Some(Err(err.into()));
            }
        }
    }

    async fn fill(&mut self) -> std::io::Result<()> {
        let mut chunk = [0u8; READ_CHUNK];
        let n = self.reader.read(&mut chunk).await?;
        if n == 0 {
            self.eof = true;
            return Ok(());
        }

        let mut data = &chunk[..n];
        if self.skipping {
            match data.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    self.skipping = false;
                    data = &data[pos + 1..];
                }
                None => data = &[],
            }
        }
        self.buf.extend_from_slice(data);
        Ok(())
    }

    fn skip_whitespace(&mut self) {
        let start = self
            .buf
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(self.buf.len());
        self.buf.drain(..start);
    }

    fn skip_line(&mut self) {
        match self.buf.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                self.buf.drain(..=pos);
            }
            None => {
                self.buf.clear();
                self.skipping = true;
            }
        }
    }
}
