//! Server-sent event collection for streamed chat responses.

use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};

use agent_core::AgentError;

/// Drain an SSE body into its `data` payloads, stopping at `[DONE]`
pub(crate) async fn collect_data<S, B, E>(body: S) -> agent_core::Result<Vec<String>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut events = std::pin::pin!(body.eventsource());
    let mut payloads = Vec::new();

    while let Some(event) = events.next().await {
        let event = event.map_err(|e| AgentError::provider(None, format!("stream error: {e}")))?;
        if event.data == "[DONE]" {
            break;
        }
        if !event.data.is_empty() {
            payloads.push(event.data);
        }
    }

    tracing::trace!(events = payloads.len(), "Collected stream");
    Ok(payloads)
}

#[cfg(test)]
pub(crate) fn body_of(chunks: &[&'static str]) -> impl Stream<Item = Result<&'static str, std::io::Error>> {
    futures::stream::iter(chunks.iter().map(|c| Ok(*c)).collect::<Vec<_>>())
}
