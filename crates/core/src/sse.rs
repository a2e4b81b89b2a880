//! Line-oriented reader for server-sent-event style agent responses.
//!
//! Each non-empty line carries at most one JSON event, optionally prefixed
//! with `data: `. Lines that fail to decode are logged and skipped; only I/O
//! failures and read timeouts end the stream with an error.

use crate::{error::AgentError, extract::content_part_texts};
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use serde_json::Value;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::io::StreamReader;
use tracing::{debug, warn};

const DATA_PREFIX: &str = "data: ";

/// Decodes one stream line into a JSON event.
///
/// Returns `None` for blank lines. Otherwise the `data: ` prefix is removed
/// if present and the remainder is parsed.
pub fn decode_event_line(line: &str) -> Option<Result<Value, serde_json::Error>> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return None;
    }
    let payload = line.strip_prefix(DATA_PREFIX).unwrap_or(line);
    Some(serde_json::from_str(payload))
}

/// Adapts a chunked HTTP body into a buffered reader.
pub fn body_reader<S, E>(body: S) -> impl AsyncBufRead + Unpin
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    StreamReader::new(body.map_err(std::io::Error::other))
}

/// Reads the stream to its end and returns every `content.parts[].text` fragment in arrival order.
///
/// Each line read must arrive within `line_timeout`. The result is
/// all-or-nothing: a read failure discards the fragments gathered so far.
pub async fn collect_stream_texts<R>(
    mut reader: R,
    line_timeout: Duration,
) -> Result<Vec<String>, AgentError>
where
    R: AsyncBufRead + Unpin,
{
    let mut texts = Vec::new();
    let mut line = Vec::new();
    let mut events = 0usize;
    let mut skipped = 0usize;

    loop {
        line.clear();
        let read = tokio::time::timeout(line_timeout, reader.read_until(b'\n', &mut line))
            .await
            .map_err(|_| {
                AgentError::AgentStream(format!(
                    "no data received for {}s",
                    line_timeout.as_secs_f64()
                ))
            })?
            .map_err(|e| AgentError::AgentStream(e.to_string()))?;

        if read == 0 {
            break;
        }

        let Ok(text) = std::str::from_utf8(&line) else {
            skipped += 1;
            warn!(raw_line = ?String::from_utf8_lossy(&line), "Skipping stream line that is not valid UTF-8");
            continue;
        };

        match decode_event_line(text) {
            None => {}
            Some(Ok(event)) => {
                events += 1;
                texts.extend(content_part_texts(&event));
            }
            Some(Err(e)) => {
                skipped += 1;
                warn!(raw_line = %text.trim_end(), error = %e, "Skipping malformed stream line");
            }
        }
    }

    debug!(events, skipped, fragments = texts.len(), "Agent stream closed");
    Ok(texts)
}
