//! Logging backend
//!
//! [`init`] installs a [`ConsoleLogger`] as the `log` backend. Every record that
//! passes the env_logger filter (`RUST_LOG`, `info` by default) is printed by
//! env_logger and also framed into a [`BipBuffer`] so the UI can show it:
//!
//! ```text
//! | level: u8 | len: u32 le | text: [u8; len] |
//! ```
//!
//! When the buffer is full the oldest frames are dropped to make room.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use env_logger::Env;
use log::{Level, Log, Metadata, Record};

use crate::containers::BipBuffer;

pub const LOG_MAX_ENTRIES: usize = 256;
pub const LOG_BUFFER_SIZE: usize = 16 * 1024;

const HEADER_LEN: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub level: Level,
    pub text: String,
}

/// Pending log frames plus the lines already drained from them
pub struct LogConsole {
    buffer: BipBuffer,
    lines: VecDeque<LogLine>,
    dropped: usize,
}

impl LogConsole {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > HEADER_LEN, "log buffer cannot hold a single frame");
        Self {
            buffer: BipBuffer::new(capacity),
            lines: VecDeque::with_capacity(LOG_MAX_ENTRIES),
            dropped: 0,
        }
    }

    /// Frames dropped because the buffer was full, since the last clear
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn push(&mut self, level: Level, text: &str) {
        let mut len = text.len().min(self.buffer.capacity() - HEADER_LEN);
        while !text.is_char_boundary(len) {
            len -= 1;
        }

        let mut frame = Vec::with_capacity(HEADER_LEN + len);
        frame.push(level as u8);
        frame.extend_from_slice(&(len as u32).to_le_bytes());
        frame.extend_from_slice(&text.as_bytes()[..len]);

        while self.buffer.unused() < frame.len() {
            if self.pop_frame().is_none() {
                break;
            }
            self.dropped += 1;
        }

        if self.buffer.push(&frame) == 0 {
            self.dropped += 1;
        }
    }

    fn pop_frame(&mut self) -> Option<LogLine> {
        let header = self.buffer.peek(HEADER_LEN)?;
        let level = level_from_u8(header[0]);
        let len = u32::from_le_bytes([header[1], header[2], header[3], header[4]]) as usize;

        let frame = self.buffer.pop(HEADER_LEN + len)?;
        let text = String::from_utf8_lossy(&frame[HEADER_LEN..]).into_owned();
        Some(LogLine { level, text })
    }

    /// Moves pending frames into the line history
    pub fn drain(&mut self) {
        while let Some(line) = self.pop_frame() {
            if self.lines.len() == LOG_MAX_ENTRIES {
                self.lines.pop_front();
            }
            self.lines.push_back(line);
        }
    }

    pub fn lines(&self) -> impl Iterator<Item = &LogLine> {
        self.lines.iter()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.lines.clear();
        self.dropped = 0;
    }
}

fn level_from_u8(value: u8) -> Level {
    match value {
        1 => Level::Error,
        2 => Level::Warn,
        3 => Level::Info,
        4 => Level::Debug,
        _ => Level::Trace,
    }
}

pub type SharedConsole = Arc<Mutex<LogConsole>>;

pub struct ConsoleLogger {
    inner: env_logger::Logger,
    console: SharedConsole,
}

impl ConsoleLogger {
    pub fn new(console: SharedConsole) -> Self {
        let inner = env_logger::Builder::from_env(Env::default().default_filter_or("info")).build();
        Self { inner, console }
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if !self.inner.matches(record) {
            return;
        }
        self.inner.log(record);

        // a poisoned console only loses the in-app copy
        if let Ok(mut console) = self.console.lock() {
            console.push(record.level(), &record.args().to_string());
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Installs the console logger and returns the console the UI reads from
pub fn init() -> anyhow::Result<SharedConsole> {
    let console = Arc::new(Mutex::new(LogConsole::new(LOG_BUFFER_SIZE)));
    let logger = ConsoleLogger::new(console.clone());
    let filter = logger.inner.filter();

    log::set_boxed_logger(Box::new(logger)).context("a logger is already installed")?;
    log::set_max_level(filter);
    Ok(console)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(console: &LogConsole) -> Vec<String> {
        console.lines().map(|line| line.text.clone()).collect()
    }

    #[test]
    fn test_frames_roundtrip_in_order() {
        let mut console = LogConsole::new(128);
        console.push(Level::Warn, "first");
        console.push(Level::Debug, "second");
        console.drain();

        let lines: Vec<_> = console.lines().cloned().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].level, Level::Warn);
        assert_eq!(lines[0].text, "first");
        assert_eq!(lines[1].level, Level::Debug);
        assert_eq!(console.dropped(), 0);
    }

    #[test]
    fn test_full_buffer_drops_oldest() {
        let mut console = LogConsole::new(32);
        console.push(Level::Info, "aaaaaaaaaa");
        console.push(Level::Info, "bbbbbbbbbb");
        console.push(Level::Info, "cccccccccc");
        console.drain();

        assert_eq!(texts(&console), vec!["bbbbbbbbbb", "cccccccccc"]);
        assert_eq!(console.dropped(), 1);
    }

    #[test]
    fn test_oversize_frame_is_truncated() {
        let mut console = LogConsole::new(16);
        console.push(Level::Error, "this line is far too long");
        console.drain();

        assert_eq!(texts(&console), vec!["this line i"]);
    }

    #[test]
    fn test_truncation_keeps_utf8_valid() {
        let mut console = LogConsole::new(8);
        // three bytes fit, the second 'é' would be split
        console.push(Level::Info, "aéé");
        console.drain();
        assert_eq!(texts(&console), vec!["aé"]);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut console = LogConsole::new(LOG_BUFFER_SIZE);
        for i in 0..LOG_MAX_ENTRIES + 10 {
            console.push(Level::Info, &format!("line {}", i));
            console.drain();
        }

        assert_eq!(console.lines().count(), LOG_MAX_ENTRIES);
        assert_eq!(console.lines().next().unwrap().text, "line 10");
    }

    #[test]
    fn test_clear_resets_drop_count() {
        let mut console = LogConsole::new(32);
        for _ in 0..3 {
            console.push(Level::Info, "aaaaaaaaaa");
        }
        assert_eq!(console.dropped(), 1);

        console.clear();
        assert_eq!(console.dropped(), 0);
        assert_eq!(console.lines().count(), 0);

        console.push(Level::Info, "fresh");
        console.drain();
        assert_eq!(texts(&console), vec!["fresh"]);
    }
}
