//! Server-Sent Events decoder for the push-stream transport
//!
//! Frames arrive in arbitrary network chunks; the decoder buffers partial
//! frames and partial UTF-8 sequences until a blank line completes a frame.

/// A parsed SSE frame
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    /// Event type (`endpoint`, `message`, ...)
    pub event_type: Option<String>,
    /// Event data
    pub data: String,
    /// Event ID
    pub id: Option<String>,
}

impl SseEvent {
    /// Create an event with just data
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            event_type: None,
            data: data.into(),
            id: None,
        }
    }

    /// Whether this frame announces the control endpoint
    pub fn is_endpoint(&self) -> bool {
        self.event_type.as_deref() == Some("endpoint")
    }
}

/// Buffered SSE decoder
///
/// ```text
/// event: endpoint\n
/// data: /rpc/message?session=42\n
/// \n
/// data: {"jsonrpc":"2.0","id":"files-1","result":{}}\n
/// \n
/// ```
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
    incomplete_utf8: Vec<u8>,
}

impl SseDecoder {
    /// Create a new decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes and drain every complete frame
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let bytes = if self.incomplete_utf8.is_empty() {
            chunk.to_vec()
        } else {
            let mut combined = std::mem::take(&mut self.incomplete_utf8);
            combined.extend_from_slice(chunk);
            combined
        };

        let (text, rest) = Self::split_utf8(&bytes);
        self.incomplete_utf8 = rest;
        // Normalize CRLF so a single boundary search suffices
        self.buffer.push_str(&text.replace("\r\n", "\n"));

        let mut events = Vec::new();
        while let Some(end) = self.buffer.find("\n\n") {
            let frame: String = self.buffer.drain(..end + 2).collect();
            if let Some(event) = Self::parse_frame(&frame) {
                events.push(event);
            }
        }
        events
    }

    /// Whether a partial frame is buffered
    pub fn has_remaining(&self) -> bool {
        !self.buffer.is_empty() || !self.incomplete_utf8.is_empty()
    }

    fn split_utf8(bytes: &[u8]) -> (String, Vec<u8>) {
        match std::str::from_utf8(bytes) {
            Ok(s) => (s.to_string(), Vec::new()),
            Err(e) => {
                let valid = e.valid_up_to();
                let head = String::from_utf8_lossy(&bytes[..valid]).into_owned();
                match e.error_len() {
                    // Truncated sequence at the end of the chunk
                    None => (head, bytes[valid..].to_vec()),
                    Some(bad) => {
                        tracing::warn!(position = valid, "invalid UTF-8 in event stream, skipping");
                        let (tail, rest) = Self::split_utf8(&bytes[valid + bad..]);
                        (head + &tail, rest)
                    }
                }
            }
        }
    }

    fn parse_frame(text: &str) -> Option<SseEvent> {
        let mut event_type = None;
        let mut id = None;
        let mut data_lines: Vec<&str> = Vec::new();

        for line in text.lines() {
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "event" => event_type = Some(value.trim().to_string()),
                "data" => data_lines.push(value),
                "id" => id = Some(value.trim().to_string()),
                _ => {}
            }
        }

        if data_lines.is_empty() {
            return None;
        }

        Some(SseEvent {
            event_type,
            data: data_lines.join("\n"),
            id,
        })
    }
}
