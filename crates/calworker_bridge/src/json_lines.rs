//! Newline-delimited JSON transport over any byte stream.

use crate::error::{BridgeError, BridgeResult};
use crate::transport::Transport;
use async_trait::async_trait;
use calworker_protocol::Envelope;
use std::fmt;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::sync::Mutex;

type BoxReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Transport that carries one JSON envelope per line.
///
/// Lines that do not decode to an envelope are logged and skipped, so a
/// stray write on the stream does not end the session.
pub struct JsonLinesTransport {
    reader: Mutex<Option<Lines<BufReader<BoxReader>>>>,
    writer: Mutex<Option<BoxWriter>>,
}

impl JsonLinesTransport {
    /// Wraps a reader and a writer.
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let reader: BoxReader = Box::new(reader);
        let writer: BoxWriter = Box::new(writer);
        Self {
            reader: Mutex::new(Some(BufReader::new(reader).lines())),
            writer: Mutex::new(Some(writer)),
        }
    }

    /// Wraps the process's standard input and output.
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }
}

#[async_trait]
impl Transport for JsonLinesTransport {
    async fn read_message(&self) -> BridgeResult<Option<Envelope>> {
        let mut reader = self.reader.lock().await;
        let Some(lines) = reader.as_mut() else {
            return Ok(None);
        };
        loop {
            let line = lines
                .next_line()
                .await
                .map_err(|e| BridgeError::transport(format!("read failed: {e}")))?;
            let Some(line) = line else {
                reader.take();
                return Ok(None);
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match Envelope::from_json(line) {
                Ok(envelope) => return Ok(Some(envelope)),
                Err(e) => tracing::warn!(error = %e, "skipping malformed line"),
            }
        }
    }

    async fn write_message(&self, envelope: Envelope) -> BridgeResult<()> {
        let mut line = envelope.to_json()?;
        line.push('\n');
        let mut writer = self.writer.lock().await;
        let writer = writer
            .as_mut()
            .ok_or_else(|| BridgeError::transport("channel closed"))?;
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| BridgeError::transport(format!("write failed: {e}")))?;
        writer
            .flush()
            .await
            .map_err(|e| BridgeError::transport(format!("flush failed: {e}")))
    }

    async fn close(&self) -> BridgeResult<()> {
        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            writer
                .shutdown()
                .await
                .map_err(|e| BridgeError::transport(format!("shutdown failed: {e}")))?;
        }
        Ok(())
    }
}

impl fmt::Debug for JsonLinesTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonLinesTransport").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calworker_protocol::{Args, CorrelationId, Value};
    use tokio::io::duplex;

    /// Two transports connected back to back through in-memory pipes.
    fn connected() -> (JsonLinesTransport, JsonLinesTransport) {
        let (a, b) = duplex(4096);
        let (a_read, a_write) = tokio::io::split(a);
        let (b_read, b_write) = tokio::io::split(b);
        (
            JsonLinesTransport::new(a_read, a_write),
            JsonLinesTransport::new(b_read, b_write),
        )
    }

    #[tokio::test]
    async fn envelopes_cross_the_pipe() {
        let (a, b) = connected();
        let call = Envelope::call(CorrelationId::new(1), "echo", Args::new());
        a.write_message(call.clone()).await.unwrap();
        a.write_message(Envelope::broadcast("syncComplete", Value::Null))
            .await
            .unwrap();

        assert_eq!(b.read_message().await.unwrap(), Some(call));
        assert_eq!(
            b.read_message().await.unwrap(),
            Some(Envelope::broadcast("syncComplete", Value::Null))
        );
    }

    #[tokio::test]
    async fn malformed_lines_are_skipped() {
        let input: &[u8] =
            b"not json\n\n{\"kind\":\"ping\"}\n{\"kind\":\"cancel\",\"id\":9}\n";
        let transport = JsonLinesTransport::new(input, tokio::io::sink());
        assert_eq!(
            transport.read_message().await.unwrap(),
            Some(Envelope::Cancel {
                id: CorrelationId::new(9)
            })
        );
        assert_eq!(transport.read_message().await.unwrap(), None);
        assert_eq!(transport.read_message().await.unwrap(), None);
    }

    #[tokio::test]
    async fn close_ends_the_peer() {
        let (a, b) = connected();
        a.close().await.unwrap();
        assert_eq!(b.read_message().await.unwrap(), None);
        assert!(a
            .write_message(Envelope::Cancel {
                id: CorrelationId::new(1)
            })
            .await
            .unwrap_err()
            .is_transport());
    }
}
