//! ANSI terminal frame sink

use anyhow::{Context, Result};
use std::io::Write;

use super::FrameSink;
use crate::appearance::DisplayPreferences;
use crate::render::Frame;

const CLEAR_LINE: &str = "\r\x1b[2K";
const BOLD: &str = "\x1b[1m";
const REVERSE: &str = "\x1b[7m";
const RESET: &str = "\x1b[0m";

/// Redraws a single terminal line per frame
pub struct TerminalSink<W: Write> {
    out: W,
    drawn: bool,
}

impl<W: Write> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, drawn: false }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> FrameSink for TerminalSink<W> {
    fn present(&mut self, frame: &Frame, prefs: &DisplayPreferences) -> Result<()> {
        let fg = prefs.text_color(frame.overtime).ansi_fg();
        let bg = prefs.theme.background().ansi_bg();
        // The pulse is drawn as an inverted, bold flash
        let emphasis = if frame.pulse {
            format!("{BOLD}{REVERSE}")
        } else {
            String::from(BOLD)
        };
        write!(self.out, "{CLEAR_LINE}{bg}{fg}{emphasis}  {}  {RESET}", frame.text)
            .context("Failed to write frame to terminal")?;
        self.out.flush().context("Failed to flush terminal")?;
        self.drawn = true;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.drawn {
            writeln!(self.out, "{RESET}").context("Failed to restore terminal")?;
            self.out.flush().context("Failed to flush terminal")?;
        }
        Ok(())
    }
}
