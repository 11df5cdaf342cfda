//! Keyboard-driven cancellation.
//!
//! The terminal is switched to raw mode for as long as a [`KeyPressSource`]
//! lives, so single key presses arrive without waiting for Enter. Raw mode also
//! disables output post-processing, hence [`CrlfWriter`] for log output.

use crate::cancel::{CancellationSource, WatcherError};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use serde::Deserialize;
use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;
use std::time::Duration;

/// Key that stops the sender.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum CancelKey {
    #[default]
    Esc,
    Enter,
    Space,
    Char(char),
}

impl FromStr for CancelKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "esc" | "escape" => Ok(CancelKey::Esc),
            "enter" | "return" => Ok(CancelKey::Enter),
            "space" => Ok(CancelKey::Space),
            _ => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if !c.is_control() && !c.is_whitespace() => {
                        Ok(CancelKey::Char(c.to_ascii_lowercase()))
                    }
                    _ => Err(format!("unknown cancel key {:?}", s)),
                }
            }
        }
    }
}

impl TryFrom<String> for CancelKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for CancelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelKey::Esc => write!(f, "Esc"),
            CancelKey::Enter => write!(f, "Enter"),
            CancelKey::Space => write!(f, "Space"),
            CancelKey::Char(c) => write!(f, "'{}'", c),
        }
    }
}

impl CancelKey {
    /// Whether `event` should stop the sender. Ctrl+C always does, since raw
    /// mode swallows the interrupt signal.
    pub fn matches(&self, event: &KeyEvent) -> bool {
        if event.kind == KeyEventKind::Release {
            return false;
        }
        if event.modifiers.contains(KeyModifiers::CONTROL) && event.code == KeyCode::Char('c') {
            return true;
        }
        match (self, event.code) {
            (CancelKey::Esc, KeyCode::Esc) => true,
            (CancelKey::Enter, KeyCode::Enter) => true,
            (CancelKey::Space, KeyCode::Char(' ')) => true,
            (CancelKey::Char(want), KeyCode::Char(got)) => {
                !event.modifiers.contains(KeyModifiers::CONTROL) && got.to_ascii_lowercase() == *want
            }
            _ => false,
        }
    }
}

/// Restores cooked mode on drop.
#[derive(Debug)]
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            tracing::warn!("Failed to restore terminal mode: {}", e);
        }
    }
}

/// Fires when the configured key is pressed on the controlling terminal.
#[derive(Debug)]
pub struct KeyPressSource {
    key: CancelKey,
    _raw: RawModeGuard,
}

impl KeyPressSource {
    pub fn new(key: CancelKey) -> Result<Self, WatcherError> {
        let raw = RawModeGuard::enable()?;
        Ok(Self { key, _raw: raw })
    }
}

impl CancellationSource for KeyPressSource {
    fn poll(&mut self, timeout: Duration) -> Result<bool, WatcherError> {
        if !event::poll(timeout)? {
            return Ok(false);
        }
        match event::read()? {
            Event::Key(key_event) => Ok(self.key.matches(&key_event)),
            _ => Ok(false),
        }
    }

    fn describe(&self) -> String {
        format!("{} key", self.key)
    }
}

/// Writes `\r\n` for every `\n`, so lines stay aligned while the terminal is raw.
#[derive(Debug)]
pub struct CrlfWriter<W>(pub W);

impl<W: Write> Write for CrlfWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut start = 0;
        for (i, byte) in buf.iter().enumerate() {
            if *byte == b'\n' {
                self.0.write_all(&buf[start..i])?;
                self.0.write_all(b"\r\n")?;
                start = i + 1;
            }
        }
        self.0.write_all(&buf[start..])?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}
