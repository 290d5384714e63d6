//! Incremental server-sent-event frame parser.

/// One dispatched SSE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// The event name; "message" when the stream omits it.
    pub event: String,
    /// The data payload; multi-line data is joined with newlines.
    pub data: String,
}

/// Incremental SSE parser fed with arbitrary byte-chunk boundaries.
///
/// Frames are dispatched on blank lines per the SSE wire format. Comment
/// lines (leading `:`) and unknown fields are ignored.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
    event: Option<String>,
    data_lines: Vec<String>,
}

impl SseParser {
    /// Creates an empty parser.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns any frames it completed.
    pub fn feed(&mut self, chunk: &str) -> Vec<SseFrame> {
        self.buffer.push_str(chunk);
        let mut frames = Vec::new();

        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            if let Some(frame) = self.consume_line(&line) {
                frames.push(frame);
            }
        }

        frames
    }

    /// Flushes a trailing frame left open when the stream ends without a
    /// final blank line.
    ///
    /// A stream can also end mid-line; the residual buffer is consumed as
    /// the final line so its field is not lost.
    pub fn finish(&mut self) -> Option<SseFrame> {
        let residue = std::mem::take(&mut self.buffer);
        if residue.is_empty() {
            return self.dispatch();
        }
        match self.consume_line(&residue) {
            Some(frame) => Some(frame),
            None => self.dispatch(),
        }
    }

    fn consume_line(&mut self, line: &str) -> Option<SseFrame> {
        let line = line.trim_end_matches(['\n', '\r']);

        if line.is_empty() {
            return self.dispatch();
        }
        if let Some(rest) = line.strip_prefix("event:") {
            self.event = Some(rest.trim_start().to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            self.data_lines.push(rest.trim_start().to_string());
        }
        // Comments and other fields (id:, retry:) are ignored.
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        if self.event.is_none() && self.data_lines.is_empty() {
            return None;
        }
        let event = self.event.take().unwrap_or_else(|| "message".to_string());
        let data = std::mem::take(&mut self.data_lines).join("\n");
        Some(SseFrame { event, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_single_frame() {
        let mut parser = SseParser::new();
        let frames = parser.feed("event: day\ndata: {\"x\":1}\n\n");
        assert_eq!(
            frames,
            vec![SseFrame {
                event: "day".into(),
                data: "{\"x\":1}".into()
            }]
        );
    }

    #[test]
    fn test_frame_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.feed("event: compl").is_empty());
        assert!(parser.feed("ete\ndata: {}").is_empty());
        let frames = parser.feed("\n\n");
        assert_eq!(frames[0].event, "complete");
        assert_eq!(frames[0].data, "{}");
    }

    #[test]
    fn test_multiple_frames_in_one_chunk() {
        let mut parser = SseParser::new();
        let frames = parser.feed("event: heartbeat\ndata:\n\nevent: heartbeat\ndata:\n\n");
        assert_eq!(frames.len(), 2);
    }

    #[test]
    fn test_multi_line_data_joined() {
        let mut parser = SseParser::new();
        let frames = parser.feed("data: line1\ndata: line2\n\n");
        assert_eq!(frames[0].data, "line1\nline2");
        assert_eq!(frames[0].event, "message");
    }

    #[test]
    fn test_crlf_lines() {
        let mut parser = SseParser::new();
        let frames = parser.feed("event: day\r\ndata: {}\r\n\r\n");
        assert_eq!(frames[0].event, "day");
    }

    #[test]
    fn test_comments_ignored() {
        let mut parser = SseParser::new();
        let frames = parser.feed(": keepalive\n\n");
        assert!(frames.is_empty());
    }

    #[test]
    fn test_finish_flushes_open_frame() {
        let mut parser = SseParser::new();
        assert!(parser.feed("event: complete\ndata: {}\n").is_empty());
        let frame = parser.finish().unwrap();
        assert_eq!(frame.event, "complete");
    }

    #[test]
    fn test_finish_keeps_unterminated_final_line() {
        let mut parser = SseParser::new();
        // The stream ends mid-frame with no trailing newline at all.
        assert!(parser.feed("event: complete\ndata: {\"summary\": \"ok\"}").is_empty());
        let frame = parser.finish().unwrap();
        assert_eq!(frame.event, "complete");
        assert_eq!(frame.data, "{\"summary\": \"ok\"}");
    }
}
