//! Line framing for NMEA byte streams
//!
//! Serial reads arrive at arbitrary boundaries: a chunk may hold half a
//! sentence, several sentences, or line noise in front of a `$`. The
//! [`LineFramer`] keeps the partial line between chunks and emits only
//! terminated lines, in arrival order.

use super::nmea::SENTENCE_MARKER;

/// Line terminator
pub const LINE_TERMINATOR: u8 = b'\n';

/// One terminated line, including its terminator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramedLine {
    bytes: Vec<u8>,
}

impl FramedLine {
    /// Raw bytes of the line, terminator included
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Lossy text of the line
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    /// Candidate sentences contained in this line.
    ///
    /// The line is split on the sentence marker; every fragment is re-prefixed
    /// with `$` and stripped of trailing control characters. Text in front of
    /// the first marker is noise and is dropped, as are empty fragments.
    pub fn sentences(&self) -> Vec<String> {
        split_sentences(&self.text())
    }
}

/// Split a line into `$`-prefixed sentence candidates
pub fn split_sentences(line: &str) -> Vec<String> {
    line.split(SENTENCE_MARKER)
        .skip(1)
        .map(|fragment| fragment.trim_end_matches(|c: char| c.is_control() || c == ' '))
        .filter(|fragment| !fragment.is_empty())
        .map(|fragment| format!("{SENTENCE_MARKER}{fragment}"))
        .collect()
}

/// Streaming line framer.
///
/// The buffer is unbounded by default; `with_max_line_length` caps it and
/// drops the partial line on overflow, resynchronising at the next terminator.
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: Vec<u8>,
    max_line_length: Option<usize>,
    /// Set after an overflow: discard bytes until the next terminator
    discarding: bool,
}

impl LineFramer {
    /// Create an unbounded framer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a framer that drops partial lines longer than `max` bytes
    pub fn with_max_line_length(max: Option<usize>) -> Self {
        Self {
            max_line_length: max,
            ..Self::default()
        }
    }

    /// Append a chunk and return every line completed by it
    pub fn ingest(&mut self, chunk: &[u8]) -> Vec<FramedLine> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == LINE_TERMINATOR) {
            let (head, tail) = rest.split_at(pos + 1);
            rest = tail;

            if self.discarding {
                self.discarding = false;
                continue;
            }

            self.buffer.extend_from_slice(head);
            lines.push(FramedLine {
                bytes: std::mem::take(&mut self.buffer),
            });
        }

        if !self.discarding {
            self.buffer.extend_from_slice(rest);
        }

        if let Some(max) = self.max_line_length {
            if self.buffer.len() > max {
                tracing::warn!(
                    "Dropping {} buffered bytes without line terminator (limit {})",
                    self.buffer.len(),
                    max
                );
                self.buffer.clear();
                self.discarding = true;
            }
        }

        lines
    }

    /// Bytes of the current partial line
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Forget any partial line (new physical session)
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.discarding = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STREAM: &[u8] = b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\r\n\
$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A\r\n\
$GPGSV,3,1,11,03,03,111,00,04,15,270,00,06,01,010,00,13,06,292,00*74\r\n";

    fn texts(lines: &[FramedLine]) -> Vec<String> {
        lines.iter().map(FramedLine::text).collect()
    }

    #[test]
    fn test_lines_simple() {
        let mut framer = LineFramer::new();
        let lines = framer.ingest(b"Hello\nWorld\n");
        assert_eq!(texts(&lines), vec!["Hello\n", "World\n"]);
        assert!(framer.pending().is_empty());
    }

    #[test]
    fn test_partial_line_carryover() {
        let mut framer = LineFramer::new();
        assert!(framer.ingest(b"$GPGGA,1235").is_empty());
        assert_eq!(framer.pending(), b"$GPGGA,1235");

        let lines = framer.ingest(b"19*XX\r\n$GPRMC");
        assert_eq!(texts(&lines), vec!["$GPGGA,123519*XX\r\n"]);
        assert_eq!(framer.pending(), b"$GPRMC");
    }

    #[test]
    fn test_split_invariance() {
        let mut whole = LineFramer::new();
        let expected = texts(&whole.ingest(STREAM));
        assert_eq!(expected.len(), 3);

        for chunk_size in 1..STREAM.len() {
            let mut framer = LineFramer::new();
            let lines: Vec<FramedLine> = STREAM
                .chunks(chunk_size)
                .flat_map(|chunk| framer.ingest(chunk))
                .collect();
            assert_eq!(texts(&lines), expected, "chunk size {chunk_size}");
        }
    }

    #[test]
    fn test_reset_clears_partial() {
        let mut framer = LineFramer::new();
        framer.ingest(b"$GPGGA,123");
        framer.reset();
        let lines = framer.ingest(b"519\n");
        assert_eq!(texts(&lines), vec!["519\n"]);
    }

    #[test]
    fn test_split_sentences_with_noise() {
        let sentences = split_sentences("\u{0}garbage$GPGGA,1*00$GPRMC,2*00\r\n");
        assert_eq!(sentences, vec!["$GPGGA,1*00", "$GPRMC,2*00"]);

        assert!(split_sentences("no marker here\r\n").is_empty());
        assert!(split_sentences("$\r\n").is_empty());
    }

    #[test]
    fn test_max_line_length_resync() {
        let mut framer = LineFramer::with_max_line_length(Some(8));
        assert!(framer.ingest(b"0123456789").is_empty());
        assert!(framer.pending().is_empty());

        // Remainder of the oversized line is discarded, next line survives
        let lines = framer.ingest(b"abc\n$GPGGA\n");
        assert_eq!(texts(&lines), vec!["$GPGGA\n"]);
    }
}
