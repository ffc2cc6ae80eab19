//! Server-sent-events wire format for the live event stream.
//!
//! ```text
//! id:<sequence>
//! event:<topic>
//! data:<payload>
//!
//! ```
//!
//! Keepalives are the comment frame `:keepalive` followed by a blank line.

use std::fmt::Write as _;

const KEEPALIVE_COMMENT: &str = "keepalive";

/// One blank-line-terminated block of the event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    Event {
        id: u64,
        topic: String,
        data: String,
    },
    Keepalive,
}

impl StreamFrame {
    pub fn event(id: u64, topic: impl Into<String>, data: impl Into<String>) -> Self {
        StreamFrame::Event {
            id,
            topic: topic.into(),
            data: data.into(),
        }
    }

    /// Render the frame as UTF-8 text ready to be written to the response body.
    pub fn encode(&self) -> String {
        match self {
            StreamFrame::Event { id, topic, data } => encode_event(*id, topic, data),
            StreamFrame::Keepalive => format!(":{KEEPALIVE_COMMENT}\n\n"),
        }
    }
}

/// Encode an event without building a `StreamFrame` first.
///
/// Payloads are expected to be single-line JSON; anything containing line
/// breaks is split over several `data:` lines so the block stays well formed.
pub fn encode_event(id: u64, topic: &str, data: &str) -> String {
    let mut out = String::with_capacity(data.len() + topic.len() + 32);
    let _ = write!(out, "id:{id}\nevent:{topic}\n");
    for line in data.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let _ = writeln!(out, "data:{line}");
    }
    out.push('\n');
    out
}

/// Incremental decoder for stream consumers.
///
/// Feed it raw body chunks in arrival order; it returns every frame completed
/// so far and keeps partial blocks buffered until the next chunk arrives.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamFrame> {
        self.buffer
            .extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut frames = Vec::new();
        while let Some(end) = find_block_end(&self.buffer) {
            let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
            let text = String::from_utf8_lossy(&block[..end]);
            if let Some(frame) = parse_block(&text) {
                frames.push(frame);
            }
        }
        frames
    }
}

fn find_block_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

fn parse_block(block: &str) -> Option<StreamFrame> {
    let mut id = None;
    let mut topic = None;
    let mut data: Option<String> = None;
    let mut keepalive = false;

    for line in block.lines() {
        if let Some(comment) = line.strip_prefix(':') {
            keepalive |= comment.trim() == KEEPALIVE_COMMENT;
            continue;
        }

        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "id" => id = value.parse::<u64>().ok(),
            "event" => topic = Some(value.to_string()),
            "data" => match data.as_mut() {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(value);
                }
                None => data = Some(value.to_string()),
            },
            _ => {}
        }
    }

    match (id, topic) {
        (Some(id), Some(topic)) => Some(StreamFrame::Event {
            id,
            topic,
            data: data.unwrap_or_default(),
        }),
        _ if keepalive => Some(StreamFrame::Keepalive),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_event() {
        let frame = StreamFrame::event(7, "beads.bead.created", r#"{"id":"bd-1"}"#);
        assert_eq!(
            frame.encode(),
            "id:7\nevent:beads.bead.created\ndata:{\"id\":\"bd-1\"}\n\n"
        );
    }

    #[test]
    fn test_encode_keepalive() {
        assert_eq!(StreamFrame::Keepalive.encode(), ":keepalive\n\n");
    }

    #[test]
    fn test_encode_multiline_payload() {
        let text = encode_event(1, "t", "a\r\nb");
        assert_eq!(text, "id:1\nevent:t\ndata:a\ndata:b\n\n");
    }

    #[test]
    fn test_decoder_handles_split_chunks() {
        let mut decoder = FrameDecoder::new();
        let encoded = StreamFrame::event(3, "beads.label.added", "{}").encode();
        let (head, tail) = encoded.split_at(10);

        assert!(decoder.push(head.as_bytes()).is_empty());
        let frames = decoder.push(tail.as_bytes());
        assert_eq!(frames, vec![StreamFrame::event(3, "beads.label.added", "{}")]);
    }

    #[test]
    fn test_decoder_mixed_frames() {
        let mut decoder = FrameDecoder::new();
        let mut body = StreamFrame::Keepalive.encode();
        body.push_str(&StreamFrame::event(1, "a.b", "x").encode());
        body.push_str(&StreamFrame::event(2, "a.c", "y").encode());

        let frames = decoder.push(body.as_bytes());
        assert_eq!(
            frames,
            vec![
                StreamFrame::Keepalive,
                StreamFrame::event(1, "a.b", "x"),
                StreamFrame::event(2, "a.c", "y"),
            ]
        );
    }

    #[test]
    fn test_decoder_accepts_space_after_colon() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(b"id: 9\nevent: a.b\ndata: {}\n\n");
        assert_eq!(frames, vec![StreamFrame::event(9, "a.b", "{}")]);
    }

    #[test]
    fn test_decoder_joins_data_lines() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(encode_event(4, "t", "one\ntwo").as_bytes());
        assert_eq!(frames, vec![StreamFrame::event(4, "t", "one\ntwo")]);
    }
}
