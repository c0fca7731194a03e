//! The streaming emitter turns a finished answer into paced word chunks.
//!
//! Chunks are words together with their trailing whitespace, so joining
//! them gives back the exact input. Delivery goes through a bounded
//! `mpsc` channel fed by a background task; dropping the receiver stops
//! the task at its next send.

use std::time::Duration;
use tokio::sync::mpsc;
use crate::stream_event::{CompletionInfo, ResponseChunk};

const DEFAULT_BUFFER: usize = 128;

/// Receiver went away mid-stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamClosed;

#[derive(Debug, Clone)]
pub struct StreamEmitter {
    delay: Duration,
}

impl Default for StreamEmitter {
    fn default() -> Self {
        Self::new(Duration::from_millis(30))
    }
}

impl StreamEmitter {
    /// An emitter pausing `delay` after each chunk. Zero disables pacing.
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// A fresh bounded channel for one stream.
    pub fn channel(&self) -> (mpsc::Sender<ResponseChunk>, mpsc::Receiver<ResponseChunk>) {
        mpsc::channel(DEFAULT_BUFFER)
    }

    /// Send `text` as word chunks, without the completion marker.
    pub async fn send_text(
        &self,
        tx: &mpsc::Sender<ResponseChunk>,
        text: &str,
    ) -> Result<(), StreamClosed> {
        for word in split_words(text) {
            tx.send(ResponseChunk::text(word)).await.map_err(|_| StreamClosed)?;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }
        Ok(())
    }

    /// Send the completion marker.
    pub async fn finish(
        tx: &mpsc::Sender<ResponseChunk>,
        info: Option<CompletionInfo>,
    ) -> Result<(), StreamClosed> {
        tx.send(ResponseChunk::Done { info }).await.map_err(|_| StreamClosed)
    }
}

/// Split into words, each carrying the whitespace that follows it.
///
/// Leading whitespace stays attached to the first chunk.
pub fn split_words(text: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut prev_whitespace = false;
    let mut seen_word = false;

    for (i, c) in text.char_indices() {
        let whitespace = c.is_whitespace();
        if !whitespace && prev_whitespace && seen_word {
            chunks.push(&text[start..i]);
            start = i;
        }
        seen_word |= !whitespace;
        prev_whitespace = whitespace;
    }
    if start < text.len() {
        chunks.push(&text[start..]);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Stream `text` plus the marker the way the coordinator does.
    async fn stream(emitter: &StreamEmitter, text: &str) -> Vec<ResponseChunk> {
        let (tx, mut rx) = emitter.channel();
        let emitter = emitter.clone();
        let text = text.to_string();
        tokio::spawn(async move {
            if emitter.send_text(&tx, &text).await.is_ok() {
                let _ = StreamEmitter::finish(&tx, None).await;
            }
        });

        let mut out = vec![];
        while let Some(chunk) = rx.recv().await {
            out.push(chunk);
        }
        out
    }

    fn joined(chunks: &[ResponseChunk]) -> String {
        chunks
            .iter()
            .filter_map(|c| match c {
                ResponseChunk::Text { content } => Some(content.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn split_keeps_trailing_whitespace() {
        assert_eq!(split_words("Hello big world"), vec!["Hello ", "big ", "world"]);
        assert_eq!(split_words("  lead\n\ntrail  "), vec!["  lead\n\n", "trail  "]);
        assert_eq!(split_words("   "), vec!["   "]);
        assert!(split_words("").is_empty());
    }

    #[test]
    fn split_reconstructs_exactly() {
        for text in [
            "**Weather Expert Perspective:**\nSunny, 31°C.\n\n- irrigate early",
            "tabs\tand  double  spaces ",
            "unicode: जैविक खेती ok",
        ] {
            assert_eq!(split_words(text).concat(), text);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn emit_ends_with_single_marker() {
        let emitter = StreamEmitter::new(Duration::from_millis(30));
        let text = "It will rain  tomorrow.\n";
        let chunks = stream(&emitter, text).await;

        assert_eq!(joined(&chunks), text);
        assert_eq!(chunks.iter().filter(|c| c.is_complete()).count(), 1);
        assert!(chunks.last().unwrap().is_complete());
        assert_eq!(chunks.len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_text_yields_only_marker() {
        let chunks = stream(&StreamEmitter::default(), "").await;
        assert_eq!(chunks, vec![ResponseChunk::Done { info: None }]);
    }

    #[tokio::test(start_paused = true)]
    async fn pacing_delays_each_chunk() {
        let emitter = StreamEmitter::new(Duration::from_millis(30));
        let start = tokio::time::Instant::now();
        let _ = stream(&emitter, "one two three").await;
        assert!(start.elapsed() >= Duration::from_millis(90));
    }

    #[tokio::test]
    async fn dropped_receiver_stops_sending() {
        let emitter = StreamEmitter::new(Duration::ZERO);
        let (tx, rx) = emitter.channel();
        drop(rx);
        assert_eq!(emitter.send_text(&tx, "a b c").await, Err(StreamClosed));
    }
}
