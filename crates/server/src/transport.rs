//! JSON-lines transport between stdio and the store service.

use pagewalk_core::protocol::ErrorFrame;
use pagewalk_core::{Request, StoreClient};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::FrameError;

/// Counters for one transport session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ServeStats {
    pub handled: u64,
    pub failed: u64,
}

/// Answer every request line from `input` on `output` until EOF.
///
/// Blank lines are skipped. A failed request, including a line that is not
/// UTF-8, produces an error frame on its line and does not stop the loop.
pub async fn serve<R, W>(input: R, mut output: W, client: &StoreClient) -> std::io::Result<ServeStats>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(input);
    let mut buf = Vec::new();
    let mut stats = ServeStats::default();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        if buf.trim_ascii().is_empty() {
            continue;
        }
        let (frame, ok) = handle_line(client, &buf).await;
        stats.handled += 1;
        if !ok {
            stats.failed += 1;
        }
        output.write_all(frame.as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await?;
    }

    Ok(stats)
}

/// Decode, send and encode one request. Returns the frame and whether it succeeded.
async fn handle_line(client: &StoreClient, line: &[u8]) -> (String, bool) {
    let request = match decode(line) {
        Ok(request) => request,
        Err(err) => {
            tracing::warn!(error = %err, "rejected request line");
            return (encode(&ErrorFrame::from(err)), false);
        }
    };

    let kind = request.kind();
    match client.send(request).await {
        Ok(response) => {
            tracing::debug!(kind, "request handled");
            (encode(&response), true)
        }
        Err(e) => (encode(&ErrorFrame::from(&e)), false),
    }
}

fn decode(line: &[u8]) -> Result<Request, FrameError> {
    let text = std::str::from_utf8(line)?;
    Ok(serde_json::from_str(text.trim_end())?)
}

fn encode<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| {
        format!(r#"{{"error":{{"code":"INVALID_INPUT","message":"unencodable response: {e}"}}}}"#)
    })
}
