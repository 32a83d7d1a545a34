//! Server-sent-events decoding for streamed completions.
//!
//! The response body arrives in arbitrary chunks; [`SseDecoder`] buffers
//! them, splits on blank lines and yields the `data:` payload of every
//! complete event. [`sse_response_stream`] drives a decoder from a
//! `reqwest::Response` and feeds each payload to an adapter-specific parser.

use crate::util::from_reqwest;
use sv_domain::error::Result;
use sv_domain::stream::{BoxStream, StreamEvent};

#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buffer: String,
}

impl SseDecoder {
    /// Append a chunk and return the payloads of all events it completed.
    pub(crate) fn push(&mut self, chunk: &str) -> Vec<String> {
        // Normalise CRLF framing so the delimiter search stays simple.
        self.buffer.push_str(&chunk.replace("\r\n", "\n"));
        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.find("\n\n") {
            let block: String = self.buffer.drain(..pos + 2).collect();
            payloads.extend(data_payloads(&block));
        }
        payloads
    }

    /// Flush a trailing event that was not terminated by a blank line.
    pub(crate) fn finish(&mut self) -> Vec<String> {
        let rest = std::mem::take(&mut self.buffer);
        data_payloads(&rest)
    }
}

fn data_payloads(block: &str) -> Vec<String> {
    block
        .lines()
        .filter_map(|line| line.trim().strip_prefix("data:"))
        .map(str::trim)
        .filter(|data| !data.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Stream [`StreamEvent`]s out of an SSE response.
///
/// `parse` sees each payload once and may keep state between calls. A
/// `Done` event is appended if the parser never produced one.
pub(crate) fn sse_response_stream<F>(
    response: reqwest::Response,
    mut parse: F,
) -> BoxStream<'static, Result<StreamEvent>>
where
    F: FnMut(&str) -> Vec<Result<StreamEvent>> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut response = response;
        let mut decoder = SseDecoder::default();
        let mut saw_done = false;

        loop {
            let payloads = match response.chunk().await {
                Ok(Some(bytes)) => decoder.push(&String::from_utf8_lossy(&bytes)),
                Ok(None) => {
                    for data in decoder.finish() {
                        for event in parse(&data) {
                            saw_done |= matches!(event, Ok(StreamEvent::Done { .. }));
                            yield event;
                        }
                    }
                    break;
                }
                Err(e) => {
                    yield Err(from_reqwest(e));
                    // A transport error ends the stream; no synthetic Done.
                    saw_done = true;
                    break;
                }
            };
            for data in payloads {
                for event in parse(&data) {
                    saw_done |= matches!(event, Ok(StreamEvent::Done { .. }));
                    yield event;
                }
            }
        }

        if !saw_done {
            yield Ok(StreamEvent::Done {
                usage: None,
                finish_reason: Some("stop".into()),
            });
        }
    };

    Box::pin(stream)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
