//! Sequential consumption of one decoder's PCM output
//!
//! The cursor is the only reader of the decoder. Each track takes exactly its
//! byte quota, whether the bytes go to an encoder or are discarded, so the
//! position always matches the next track's start offset.

use tracing::{debug, warn};

use crate::domain::errors::DomainError;
use crate::ports::{DecodeStream, EncodeSink};

/// Result of moving one track's quota
#[derive(Debug)]
pub struct PumpOutcome {
    /// Bytes read from the decoder for this track
    pub transferred: u64,
    /// First encoder write failure; later chunks were drained instead
    pub write_error: Option<DomainError>,
}

/// Position-tracking reader over a decoder
pub struct PcmCursor {
    stream: Box<dyn DecodeStream>,
    buffer: Vec<u8>,
    position: u64,
    exhausted: bool,
    failure: Option<DomainError>,
}

impl PcmCursor {
    pub fn new(stream: Box<dyn DecodeStream>, chunk_size: usize) -> Self {
        Self {
            stream,
            buffer: vec![0u8; chunk_size.max(1)],
            position: 0,
            exhausted: false,
            failure: None,
        }
    }

    /// Bytes consumed since the decoder started
    pub fn position(&self) -> u64 {
        self.position
    }

    /// True once the decoder reported end of stream (or a read failed)
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Decoder failure that ended the stream, if any
    ///
    /// Once set it stays set: every later read returns end of stream.
    pub fn failure(&self) -> Option<&DomainError> {
        self.failure.as_ref()
    }

    /// Read the next chunk, at most `limit` bytes; zero means end of stream
    async fn next_chunk(&mut self, limit: u64) -> usize {
        if self.exhausted || limit == 0 {
            return 0;
        }

        let want = (self.buffer.len() as u64).min(limit) as usize;
        match self.stream.read(&mut self.buffer[..want]).await {
            Ok(0) => {
                debug!(position = self.position, "Decoder reached end of stream");
                self.exhausted = true;
                0
            }
            Ok(n) => {
                self.position += n as u64;
                n
            }
            Err(e) => {
                warn!(position = self.position, error = %e, "Decoder failed, no more PCM");
                self.exhausted = true;
                self.failure = Some(e);
                0
            }
        }
    }

    /// Discard `quota` bytes; returns how many were actually read
    pub async fn drain(&mut self, quota: u64) -> u64 {
        let mut done = 0;
        while done < quota {
            let n = self.next_chunk(quota - done).await;
            if n == 0 {
                break;
            }
            done += n as u64;
        }
        done
    }

    /// Copy `quota` bytes into `sink`, reporting the running total after every chunk
    ///
    /// A failing sink does not stop the transfer: the rest of the quota is
    /// drained so the cursor stays aligned with the next track.
    pub async fn pump(
        &mut self,
        sink: &mut dyn EncodeSink,
        quota: u64,
        mut on_chunk: impl FnMut(u64) + Send,
    ) -> PumpOutcome {
        let mut done = 0;
        let mut write_error = None;

        while done < quota {
            let n = self.next_chunk(quota - done).await;
            if n == 0 {
                break;
            }
            if write_error.is_none() {
                if let Err(e) = sink.write_all(&self.buffer[..n]).await {
                    warn!(error = %e, "Encoder rejected input, draining the rest of the track");
                    write_error = Some(e);
                }
            }
            done += n as u64;
            on_chunk(done);
        }

        PumpOutcome {
            transferred: done,
            write_error,
        }
    }

    /// Stop the decoder; the remaining output is never read
    pub async fn terminate(mut self) -> Result<(), DomainError> {
        self.stream.terminate().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Decoder over an in-memory buffer that returns short reads
    struct MemoryDecoder {
        data: Vec<u8>,
        offset: usize,
        max_read: usize,
        exit_failure: bool,
    }

    #[async_trait]
    impl DecodeStream for MemoryDecoder {
        async fn read(&mut self, buf: &mut [u8]) -> Result<usize, DomainError> {
            if self.exit_failure && self.offset == self.data.len() {
                return Err(DomainError::process("ffmpeg", "exited with exit status: 1"));
            }
            let n = buf.len().min(self.max_read).min(self.data.len() - self.offset);
            buf[..n].copy_from_slice(&self.data[self.offset..self.offset + n]);
            self.offset += n;
            Ok(n)
        }

        async fn terminate(&mut self) -> Result<(), DomainError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct CollectingSink {
        data: Vec<u8>,
        fail_after: Option<usize>,
    }

    #[async_trait]
    impl EncodeSink for CollectingSink {
        async fn write_all(&mut self, buf: &[u8]) -> Result<(), DomainError> {
            if let Some(limit) = self.fail_after {
                if self.data.len() >= limit {
                    return Err(DomainError::process("encoder", "broken pipe"));
                }
            }
            self.data.extend_from_slice(buf);
            Ok(())
        }

        async fn finish(&mut self, _grace: Duration) -> Result<(), DomainError> {
            Ok(())
        }
    }

    fn cursor(len: usize, chunk: usize, max_read: usize) -> PcmCursor {
        let data = (0..len).map(|i| (i % 251) as u8).collect();
        PcmCursor::new(
            Box::new(MemoryDecoder {
                data,
                offset: 0,
                max_read,
                exit_failure: false,
            }),
            chunk,
        )
    }

    #[tokio::test]
    async fn test_drain_then_pump_stays_aligned() {
        let mut cursor = cursor(1000, 64, 50);
        assert_eq!(cursor.drain(300).await, 300);
        assert_eq!(cursor.position(), 300);

        let mut sink = CollectingSink::default();
        let outcome = cursor.pump(&mut sink, 200, |_| {}).await;
        assert_eq!(outcome.transferred, 200);
        assert!(outcome.write_error.is_none());
        assert_eq!(sink.data.len(), 200);
        assert_eq!(sink.data[0], (300 % 251) as u8);
        assert_eq!(cursor.position(), 500);
    }

    #[tokio::test]
    async fn test_pump_reports_running_total() {
        let mut cursor = cursor(1000, 100, 1000);
        let mut sink = CollectingSink::default();
        let mut seen = Vec::new();
        cursor.pump(&mut sink, 250, |done| seen.push(done)).await;
        assert_eq!(seen, vec![100, 200, 250]);
    }

    #[tokio::test]
    async fn test_underrun_stops_at_end_of_stream() {
        let mut cursor = cursor(100, 64, 64);
        let mut sink = CollectingSink::default();
        let outcome = cursor.pump(&mut sink, 500, |_| {}).await;
        assert_eq!(outcome.transferred, 100);
        assert!(cursor.is_exhausted());
        assert_eq!(cursor.drain(10).await, 0);
    }

    #[tokio::test]
    async fn test_decoder_exit_failure_is_kept() {
        let mut cursor = PcmCursor::new(
            Box::new(MemoryDecoder {
                data: vec![7u8; 40],
                offset: 0,
                max_read: 16,
                exit_failure: true,
            }),
            16,
        );
        let mut sink = CollectingSink::default();
        let outcome = cursor.pump(&mut sink, 100, |_| {}).await;
        assert_eq!(outcome.transferred, 40);
        assert!(cursor.is_exhausted());
        assert!(matches!(cursor.failure(), Some(DomainError::ExternalProcess { .. })));

        assert_eq!(cursor.drain(10).await, 0);
        assert!(cursor.failure().is_some());
    }

    #[tokio::test]
    async fn test_failed_sink_still_consumes_quota() {
        let mut cursor = cursor(1000, 10, 10);
        let mut sink = CollectingSink {
            data: Vec::new(),
            fail_after: Some(30),
        };
        let outcome = cursor.pump(&mut sink, 100, |_| {}).await;
        assert_eq!(outcome.transferred, 100);
        assert!(outcome.write_error.is_some());
        assert_eq!(sink.data.len(), 30);
        assert_eq!(cursor.position(), 100);
    }
}
