//! # Diagnostic Stream Module
//!
//! Parser incrementale del canale diagnostico (stderr) del tool video.
//!
//! ## Componenti:
//! - `LineSplitter`: spezza lo stream di byte su `\r` **oppure** `\n`. ffmpeg ridisegna
//!   la riga di progresso con carriage return, quindi uno split solo su `\n`
//!   perderebbe quasi tutti gli aggiornamenti
//! - `ProgressParser`: macchina a stati `AwaitingDuration` → `Tracking { total }`
//! - `DiagnosticTail`: ring buffer a capacità fissa con le ultime righe, incluso
//!   nel messaggio d'errore quando il tool termina con exit code diverso da zero
//!
//! ## Pattern riconosciuti:
//! - `Duration: HH:MM:SS.f` una sola volta, vicino all'inizio dell'output
//! - `time=HH:MM:SS.f` ripetuto, con eventuale `speed=<float>x`
//!
//! La frazione può avere da 1 a 9 cifre. Percentuale = `floor(time / duration * 100)`,
//! limitata a 100; nessun progresso prima di aver visto la durata totale.

use regex::Regex;
use std::collections::VecDeque;
use std::sync::OnceLock;
use std::time::Duration;

/// Lines kept for failure reports
pub const TAIL_CAPACITY: usize = 20;

fn duration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"Duration: (\d+):(\d{2}):(\d{2})\.(\d{1,9})").expect("valid duration pattern")
    })
}

fn time_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"time=(\d+):(\d{2}):(\d{2})\.(\d{1,9})").expect("valid time pattern")
    })
}

fn speed_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"speed=\s*(\d+(?:\.\d+)?)x").expect("valid speed pattern"))
}

/// Parse the four capture groups of a timestamp match
fn timestamp(caps: &regex::Captures<'_>) -> Option<Duration> {
    let hours: u64 = caps.get(1)?.as_str().parse().ok()?;
    let minutes: u64 = caps.get(2)?.as_str().parse().ok()?;
    let seconds: u64 = caps.get(3)?.as_str().parse().ok()?;

    // Right-pad the fraction to nanoseconds: "5" -> 500_000_000
    let fraction = caps.get(4)?.as_str();
    let nanos: u32 = format!("{:0<9}", fraction).parse().ok()?;

    let secs = hours
        .checked_mul(3600)?
        .checked_add(minutes * 60)?
        .checked_add(seconds)?;
    Some(Duration::new(secs, nanos))
}

/// Longest line kept in memory; longer runs are emitted in pieces of this size
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Splits a byte stream into lines on either `\r` or `\n`
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and collect every completed, non-empty line
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if byte == b'\r' || byte == b'\n' {
                if !self.pending.is_empty() {
                    lines.push(String::from_utf8_lossy(&self.pending).into_owned());
                    self.pending.clear();
                }
            } else {
                self.pending.push(byte);
                if self.pending.len() >= MAX_LINE_LEN {
                    lines.push(String::from_utf8_lossy(&self.pending).into_owned());
                    self.pending.clear();
                }
            }
        }
        lines
    }

    /// Flush an unterminated last line at end of stream
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(line)
    }
}

/// A progress observation extracted from one diagnostic line
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub percent: u8,
    /// Encoding speed such as `"2.5x"`
    pub speed: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ParserState {
    AwaitingDuration,
    Tracking { total: Duration },
}

/// Incremental parser turning diagnostic lines into progress updates
#[derive(Debug)]
pub struct ProgressParser {
    state: ParserState,
}

impl Default for ProgressParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressParser {
    pub fn new() -> Self {
        Self {
            state: ParserState::AwaitingDuration,
        }
    }

    /// Total duration, once seen
    pub fn total(&self) -> Option<Duration> {
        match self.state {
            ParserState::AwaitingDuration => None,
            ParserState::Tracking { total } => Some(total),
        }
    }

    /// Consume one line; returns an update when the line carries a position
    pub fn feed(&mut self, line: &str) -> Option<ProgressUpdate> {
        if self.state == ParserState::AwaitingDuration {
            let total = duration_regex()
                .captures(line)
                .and_then(|caps| timestamp(&caps))
                .filter(|total| !total.is_zero());
            if let Some(total) = total {
                self.state = ParserState::Tracking { total };
            }
        }

        let ParserState::Tracking { total } = self.state else {
            return None;
        };

        let current = time_regex().captures(line).and_then(|caps| timestamp(&caps))?;
        let percent = (current.as_nanos() * 100 / total.as_nanos()).min(100) as u8;
        let speed = speed_regex()
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| format!("{}x", m.as_str()));

        Some(ProgressUpdate { percent, speed })
    }

    /// True for the periodic `time=` status lines
    pub fn is_progress_line(line: &str) -> bool {
        time_regex().is_match(line)
    }
}

/// Fixed-capacity ring of the most recent diagnostic lines
#[derive(Debug)]
pub struct DiagnosticTail {
    lines: VecDeque<String>,
    capacity: usize,
}

impl Default for DiagnosticTail {
    fn default() -> Self {
        Self::new(TAIL_CAPACITY)
    }
}

impl DiagnosticTail {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line.into());
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Retained lines, oldest first, joined with `\n`
    pub fn joined(&self) -> String {
        self.lines.iter().map(String::as_str).collect::<Vec<_>>().join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splitter_handles_carriage_returns() {
        let mut splitter = LineSplitter::new();
        let lines = splitter.push(b"Duration: 00:01:00.00\nframe=1 time=00:00:01.00\rframe=2 time=00:00:0");
        assert_eq!(lines, vec!["Duration: 00:01:00.00", "frame=1 time=00:00:01.00"]);

        let lines = splitter.push(b"2.00\r\n");
        assert_eq!(lines, vec!["frame=2 time=00:00:02.00"]);
        assert_eq!(splitter.finish(), None);

        splitter.push(b"trailing");
        assert_eq!(splitter.finish().as_deref(), Some("trailing"));
    }

    #[test]
    fn test_splitter_flushes_unterminated_runs() {
        let mut splitter = LineSplitter::new();
        let run = vec![b'x'; MAX_LINE_LEN + 10];

        let lines = splitter.push(&run);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].len(), MAX_LINE_LEN);
        assert_eq!(splitter.finish().map(|l| l.len()), Some(10));
    }

    #[test]
    fn test_half_way_reports_fifty() {
        let mut parser = ProgressParser::new();
        assert_eq!(parser.feed("  Duration: 00:01:00.00, start: 0.000000, bitrate: 1234 kb/s"), None);
        assert_eq!(parser.total(), Some(Duration::from_secs(60)));

        let update = parser.feed("frame=  750 fps=25 q=28.0 size=1024kB time=00:00:30.00 bitrate=2000.0kbits/s speed=2.5x");
        assert_eq!(
            update,
            Some(ProgressUpdate {
                percent: 50,
                speed: Some("2.5x".to_string())
            })
        );
    }

    #[test]
    fn test_no_progress_before_duration() {
        let mut parser = ProgressParser::new();
        assert_eq!(parser.feed("frame=1 time=00:00:10.00 speed=1.0x"), None);
        assert_eq!(parser.total(), None);
    }

    #[test]
    fn test_percentage_is_floored_and_clamped() {
        let mut parser = ProgressParser::new();
        parser.feed("Duration: 00:00:03.00");
        assert_eq!(parser.feed("time=00:00:02.00").map(|u| u.percent), Some(66));
        assert_eq!(parser.feed("time=00:00:04.00").map(|u| u.percent), Some(100));
    }

    #[test]
    fn test_fraction_precision_and_long_hours() {
        let mut parser = ProgressParser::new();
        parser.feed("Duration: 100:00:00.5, start: 0.000000");
        assert_eq!(parser.total(), Some(Duration::new(360_000, 500_000_000)));

        let mut parser = ProgressParser::new();
        parser.feed("Duration: 00:00:10.000000000");
        let update = parser.feed("time=00:00:01.500 bitrate=N/A").unwrap();
        assert_eq!(update.percent, 15);
        assert_eq!(update.speed, None);
    }

    #[test]
    fn test_duration_only_captured_once() {
        let mut parser = ProgressParser::new();
        parser.feed("Duration: 00:01:00.00");
        parser.feed("Duration: 00:10:00.00");
        assert_eq!(parser.total(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_zero_duration_is_ignored() {
        let mut parser = ProgressParser::new();
        parser.feed("Duration: 00:00:00.00");
        assert_eq!(parser.total(), None);
        assert_eq!(parser.feed("time=00:00:01.00"), None);
    }

    #[test]
    fn test_progress_line_detection() {
        assert!(ProgressParser::is_progress_line("frame=1 time=00:00:01.00 speed=1x"));
        assert!(!ProgressParser::is_progress_line("Stream #0:0: Video: hevc"));
    }

    #[test]
    fn test_tail_keeps_most_recent_lines() {
        let mut tail = DiagnosticTail::default();
        for i in 0..25 {
            tail.push(format!("line {}", i));
        }
        assert_eq!(tail.len(), TAIL_CAPACITY);
        let joined = tail.joined();
        assert!(joined.starts_with("line 5\n"));
        assert!(joined.ends_with("line 24"));
    }
}
