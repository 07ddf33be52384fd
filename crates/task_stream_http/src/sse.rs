use thiserror::Error;

/// A complete SSE frame whose bytes are not valid UTF-8.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("SSE frame is not valid UTF-8 (valid up to byte {valid_up_to})")]
pub struct InvalidFrame {
    pub valid_up_to: usize,
}

pub type FrameResult = Result<String, InvalidFrame>;

/// Incremental parser for SSE byte streams.
///
/// Bytes are buffered until a blank line closes a frame, so a character split
/// across network chunks is decoded whole. Yields the joined `data:` payload
/// of each complete frame. Comment lines, `event:`/`id:`/`retry:` fields,
/// empty payloads and `[DONE]` markers are dropped; interpreting the payload
/// is left to the caller.
#[derive(Debug, Default)]
pub struct SseFrameParser {
    buffer: Vec<u8>,
}

impl SseFrameParser {
    /// Feed arbitrary bytes into the parser and drain complete frames.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<FrameResult> {
        for &byte in bytes {
            // CRLF becomes LF, including when the pair straddles two chunks.
            if byte == b'\n' && self.buffer.last() == Some(&b'\r') {
                self.buffer.pop();
            }
            self.buffer.push(byte);
        }

        let mut frames = Vec::new();
        while let Some(split) = self.buffer.windows(2).position(|pair| pair == b"\n\n") {
            let frame: Vec<u8> = self.buffer.drain(..split + 2).take(split).collect();
            frames.extend(decode_frame(&frame));
        }

        frames
    }

    /// Flush a trailing frame the server closed without a blank line.
    pub fn finish(&mut self) -> Option<FrameResult> {
        let rest = std::mem::take(&mut self.buffer);
        let end = rest
            .iter()
            .rposition(|byte| !matches!(byte, b'\n' | b'\r'))
            .map_or(0, |last| last + 1);
        decode_frame(&rest[..end])
    }

    /// Parse a complete SSE payload in one shot.
    pub fn parse_frames(input: &str) -> Vec<FrameResult> {
        let mut parser = Self::default();
        let mut frames = parser.feed(input.as_bytes());
        frames.extend(parser.finish());
        frames
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.iter().all(u8::is_ascii_whitespace)
    }
}

fn decode_frame(frame: &[u8]) -> Option<FrameResult> {
    match std::str::from_utf8(frame) {
        Ok(text) => extract_data_payload(text)
            .filter(|payload| payload != "[DONE]")
            .map(Ok),
        Err(error) => Some(Err(InvalidFrame {
            valid_up_to: error.valid_up_to(),
        })),
    }
}

fn extract_data_payload(frame: &str) -> Option<String> {
    let data_lines: Vec<&str> = frame
        .lines()
        .filter(|line| !line.starts_with(':'))
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|value| value.strip_prefix(' ').unwrap_or(value))
        .collect();

    let payload = data_lines.join("\n");
    if payload.trim().is_empty() {
        None
    } else {
        Some(payload)
    }
}
