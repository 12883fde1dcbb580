//! Server-Sent Events parsing for streamed model replies
//!
//! The streaming endpoint answers with `text/event-stream`: events are
//! separated by blank lines and each carries one or more `data:` lines.
//! [`parse_sse_stream`] turns the raw byte stream into one string per
//! event and forwards it on a channel.

use crate::error::{Result, WestlineError};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;

/// Read an SSE byte stream and forward each event's data
///
/// Runs until the byte stream ends or the receiver is dropped. A transport
/// error is forwarded as an `Err` item and ends parsing.
///
/// # Arguments
///
/// * `byte_stream` - Response body chunks
/// * `data_tx` - Channel receiving one `data` payload per event
pub async fn parse_sse_stream(
    byte_stream: impl Stream<Item = reqwest::Result<Bytes>>,
    data_tx: mpsc::UnboundedSender<Result<String>>,
) {
    // Raw bytes: a chunk boundary may fall inside a multi-byte character,
    // so only complete event blocks are decoded.
    let mut buffer: Vec<u8> = Vec::new();

    tokio::pin!(byte_stream);

    while let Some(chunk_result) = byte_stream.next().await {
        let chunk = match chunk_result {
            Ok(c) => c,
            Err(e) => {
                tracing::error!("SSE stream interrupted: {}", e);
                let _ = data_tx.send(Err(WestlineError::Http(e).into()));
                return;
            }
        };

        buffer.extend_from_slice(&chunk);
        normalize_line_endings(&mut buffer);

        while let Some(pos) = find_event_end(&buffer) {
            let event_block = buffer[..pos].to_vec();
            buffer.drain(..pos + 2);
            if let Some(data) = event_data(&String::from_utf8_lossy(&event_block)) {
                if data_tx.send(Ok(data)).is_err() {
                    tracing::debug!("SSE receiver dropped, stopping parser");
                    return;
                }
            }
        }
    }

    if let Some(data) = event_data(&String::from_utf8_lossy(&buffer)) {
        let _ = data_tx.send(Ok(data));
    }
}

/// Collapse CRLF pairs into LF in place
///
/// A trailing lone `\r` is kept until the next chunk shows whether a `\n`
/// follows it.
fn normalize_line_endings(buffer: &mut Vec<u8>) {
    if !buffer.contains(&b'\r') {
        return;
    }
    let mut out = Vec::with_capacity(buffer.len());
    let mut i = 0;
    while i < buffer.len() {
        if buffer[i] == b'\r' && buffer.get(i + 1) == Some(&b'\n') {
            i += 1;
            continue;
        }
        out.push(buffer[i]);
        i += 1;
    }
    *buffer = out;
}

/// Offset of the blank line ending the first complete event
fn find_event_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

/// Extract the joined `data:` payload of one event block
///
/// Returns `None` for comments, pings and events without data.
pub fn event_data(event_block: &str) -> Option<String> {
    let mut data_lines: Vec<&str> = Vec::new();
    let mut event_type: Option<&str> = None;

    for line in event_block.lines() {
        if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.trim());
        } else if let Some(value) = line.strip_prefix("event:") {
            event_type = Some(value.trim());
        }
        // `id:`, `retry:` and `:` comment lines carry nothing we use.
    }

    if event_type.is_some_and(|et| et.eq_ignore_ascii_case("ping")) {
        return None;
    }

    let data = data_lines.join("\n");
    if data.is_empty() || data == "[DONE]" {
        return None;
    }
    Some(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    async fn collect(chunks: Vec<&'static str>) -> Vec<String> {
        collect_bytes(chunks.into_iter().map(|c| c.as_bytes().to_vec()).collect()).await
    }

    async fn collect_bytes(chunks: Vec<Vec<u8>>) -> Vec<String> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let body = stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from(c))));
        parse_sse_stream(body, tx).await;

        let mut out = Vec::new();
        while let Some(item) = rx.recv().await {
            out.push(item.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_events_split_on_blank_lines() {
        let out = collect(vec!["data: {\"a\":1}\n\ndata: {\"a\":2}\n\n"]).await;
        assert_eq!(out, vec!["{\"a\":1}", "{\"a\":2}"]);
    }

    #[tokio::test]
    async fn test_event_split_across_chunks() {
        let out = collect(vec!["data: {\"te", "xt\":\"hi\"}\n", "\n"]).await;
        assert_eq!(out, vec!["{\"text\":\"hi\"}"]);
    }

    #[tokio::test]
    async fn test_trailing_event_without_blank_line() {
        let out = collect(vec!["data: first\n\ndata: last"]).await;
        assert_eq!(out, vec!["first", "last"]);
    }

    #[tokio::test]
    async fn test_crlf_line_endings() {
        let out = collect(vec!["data: one\r\n\r\ndata: two\r\n\r\n"]).await;
        assert_eq!(out, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_multibyte_character_split_across_chunks() {
        let raw = "data: café 🔥\n\n".as_bytes();
        // Cut between the two bytes of `é`
        let cut = raw.iter().position(|&b| b == 0xC3).unwrap() + 1;
        let out = collect_bytes(vec![raw[..cut].to_vec(), raw[cut..].to_vec()]).await;
        assert_eq!(out, vec!["café 🔥"]);
    }

    #[tokio::test]
    async fn test_emoji_split_byte_by_byte() {
        let raw = "data: 🔥🔥\r\n\r\n".as_bytes();
        let out = collect_bytes(raw.iter().map(|b| vec![*b]).collect()).await;
        assert_eq!(out, vec!["🔥🔥"]);
    }

    #[test]
    fn test_event_data_skips_pings_and_comments() {
        assert_eq!(event_data(": keep-alive"), None);
        assert_eq!(event_data("event: ping\ndata: {}"), None);
        assert_eq!(event_data("data: [DONE]"), None);
        assert_eq!(
            event_data("id: 7\ndata: line1\ndata: line2"),
            Some("line1\nline2".to_string())
        );
    }
}
