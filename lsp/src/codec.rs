//! `Content-Length` framing for JSON-RPC over a byte stream.
//!
//! Every message is `Content-Length: N\r\n\r\n` followed by exactly `N` bytes
//! of UTF-8 JSON. Other headers (`Content-Type`) are accepted and ignored.

use anyhow::{Context, Result, bail};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Upper bound on a single message body. Larger frames are a protocol error.
pub const MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

/// Reads framed JSON-RPC messages.
pub struct MessageReader<R> {
    reader: BufReader<R>,
    header: String,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            header: String::new(),
        }
    }

    /// Next raw message body, or `Ok(None)` when the stream ends between
    /// messages.
    ///
    /// Errors here mean the stream is out of sync: EOF inside a header block
    /// or body, a missing or bad `Content-Length`, or an oversized frame.
    pub async fn read_frame(&mut self) -> Result<Option<Vec<u8>>> {
        let Some(length) = self.read_content_length().await? else {
            return Ok(None);
        };
        if length > MAX_MESSAGE_BYTES {
            bail!("message of {length} bytes exceeds the {MAX_MESSAGE_BYTES} byte limit");
        }

        let mut body = vec![0u8; length];
        self.reader
            .read_exact(&mut body)
            .await
            .context("reading message body")?;
        Ok(Some(body))
    }

    /// Next decoded message, or `Ok(None)` at a clean end of stream.
    ///
    /// A body that is not JSON is an error too; use [`Self::read_frame`]
    /// to keep reading past one.
    pub async fn read_message(&mut self) -> Result<Option<Value>> {
        let Some(body) = self.read_frame().await? else {
            return Ok(None);
        };
        let message = serde_json::from_slice(&body).context("decoding message body")?;
        Ok(Some(message))
    }

    async fn read_content_length(&mut self) -> Result<Option<usize>> {
        let mut length = None;
        let mut started = false;

        loop {
            self.header.clear();
            let read = self
                .reader
                .read_line(&mut self.header)
                .await
                .context("reading message header")?;
            if read == 0 {
                if started {
                    bail!("stream ended inside a header block");
                }
                return Ok(None);
            }
            started = true;

            let line = self.header.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                break;
            }
            let Some((name, value)) = line.split_once(':') else {
                bail!("malformed header line: {line:?}");
            };
            if name.trim().eq_ignore_ascii_case("content-length") {
                let parsed = value
                    .trim()
                    .parse::<usize>()
                    .with_context(|| format!("invalid Content-Length {:?}", value.trim()))?;
                length = Some(parsed);
            }
        }

        match length {
            Some(length) => Ok(Some(length)),
            None => bail!("header block without Content-Length"),
        }
    }
}

/// Writes framed JSON-RPC messages.
pub struct MessageWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> MessageWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Serialize, frame and flush one message.
    pub async fn write_message(&mut self, message: &Value) -> Result<()> {
        let body = serde_json::to_vec(message).context("encoding message")?;
        self.write_frame(&body).await
    }

    /// Frame and flush an already encoded body.
    pub async fn write_frame(&mut self, body: &[u8]) -> Result<()> {
        let mut frame = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
        frame.extend_from_slice(body);

        self.writer
            .write_all(&frame)
            .await
            .context("writing message")?;
        self.writer.flush().await.context("flushing message")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    async fn frames(messages: &[Value]) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut writer = MessageWriter::new(&mut buf);
        for message in messages {
            writer.write_message(message).await.unwrap();
        }
        buf
    }

    #[tokio::test]
    async fn reads_back_consecutive_messages() {
        let open = json!({"jsonrpc": "2.0", "method": "textDocument/didOpen", "params": {}});
        let hover = json!({"jsonrpc": "2.0", "id": 7, "method": "textDocument/hover"});
        let buf = frames(&[open.clone(), hover.clone()]).await;

        let mut reader = MessageReader::new(buf.as_slice());
        assert_eq!(reader.read_message().await.unwrap(), Some(open));
        assert_eq!(reader.read_message().await.unwrap(), Some(hover));
        assert_eq!(reader.read_message().await.unwrap(), None);
    }

    #[tokio::test]
    async fn content_length_counts_bytes_not_chars() {
        let message = json!({"text": "✓ done"});
        let buf = frames(&[message.clone()]).await;
        let text = String::from_utf8(buf.clone()).unwrap();
        let body = serde_json::to_vec(&message).unwrap();
        assert!(text.starts_with(&format!("Content-Length: {}\r\n\r\n", body.len())));

        let mut reader = MessageReader::new(buf.as_slice());
        assert_eq!(reader.read_message().await.unwrap(), Some(message));
    }

    #[tokio::test]
    async fn empty_stream_is_clean_eof() {
        let mut reader = MessageReader::new(&b""[..]);
        assert!(reader.read_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn eof_inside_headers_is_an_error() {
        let mut reader = MessageReader::new(&b"Content-Length: 12\r\n"[..]);
        assert!(reader.read_message().await.is_err());
    }

    #[tokio::test]
    async fn eof_inside_body_is_an_error() {
        let mut reader = MessageReader::new(&b"Content-Length: 40\r\n\r\n{\"id\":1}"[..]);
        assert!(reader.read_message().await.is_err());
    }

    #[tokio::test]
    async fn missing_content_length_is_an_error() {
        let mut reader =
            MessageReader::new(&b"Content-Type: application/vscode-jsonrpc\r\n\r\n{}"[..]);
        assert!(reader.read_message().await.is_err());
    }

    #[tokio::test]
    async fn oversized_message_is_rejected_before_reading() {
        let header = format!("Content-Length: {}\r\n\r\n", MAX_MESSAGE_BYTES + 1);
        let mut reader = MessageReader::new(header.as_bytes());
        let err = reader.read_message().await.unwrap_err();
        assert!(err.to_string().contains("limit"), "{err}");
    }

    #[tokio::test]
    async fn header_name_is_case_insensitive_and_extras_ignored() {
        let body = r#"{"id":3}"#;
        let frame = format!(
            "content-type: application/vscode-jsonrpc; charset=utf-8\r\ncontent-length: {}\r\n\r\n{body}",
            body.len()
        );
        let mut reader = MessageReader::new(frame.as_bytes());
        assert_eq!(reader.read_message().await.unwrap(), Some(json!({"id": 3})));
    }

    #[tokio::test]
    async fn bad_length_and_bad_json_are_errors() {
        let mut reader = MessageReader::new(&b"Content-Length: twelve\r\n\r\n"[..]);
        assert!(reader.read_message().await.is_err());

        let mut reader = MessageReader::new(&b"Content-Length: 5\r\n\r\nnope!"[..]);
        assert!(reader.read_message().await.is_err());
    }

    #[tokio::test]
    async fn undecodable_body_leaves_the_stream_in_sync() {
        let garbage = b"{not json";
        let next = json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"});
        let mut buf = Vec::new();
        let mut writer = MessageWriter::new(&mut buf);
        writer.write_frame(garbage).await.unwrap();
        writer.write_message(&next).await.unwrap();

        let mut reader = MessageReader::new(buf.as_slice());
        assert_eq!(reader.read_frame().await.unwrap().unwrap(), garbage);
        assert_eq!(reader.read_message().await.unwrap(), Some(next));
        assert_eq!(reader.read_frame().await.unwrap(), None);
    }
}
