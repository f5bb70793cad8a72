//! Live capture preview in the terminal.
//!
//! Frames are drawn as half-block colour thumbnails on the alternate screen
//! with a "Captured k/N" counter above them. `q`, `Esc` or Ctrl-C interrupt.
//! Without a terminal, progress is logged and a capture that stops making
//! progress is ended after a fixed number of frames.

use crate::logging::{LogHold, LogSink};
use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor};
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, queue};
use facetrain_hw::Frame;
use image::imageops::{self, FilterType};
use std::io::{self, Stdout, Write};
use std::time::Duration;
use thiserror::Error;

pub const PREVIEW_TITLE: &str = "Training - press 'q' to exit";

/// Rows reserved above the thumbnail for the title and counter.
const HEADER_ROWS: u16 = 2;

/// Consecutive frames without a new embedding before a headless capture
/// gives up; about ten seconds at 30 fps.
pub const HEADLESS_STALL_FRAMES: usize = 300;

#[derive(Error, Debug)]
pub enum PreviewError {
    #[error("terminal error: {0}")]
    Terminal(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewControl {
    Continue,
    Interrupt,
}

/// Shows capture progress and reports whether the user asked to stop.
pub trait Preview {
    fn show(&mut self, frame: &Frame, captured: usize, target: usize) -> Result<PreviewControl, PreviewError>;
}

/// Full-screen terminal preview. Raw mode and the alternate screen are
/// restored when dropped; log output is held until then.
pub struct TerminalPreview {
    out: Stdout,
    // Dropped after the terminal is restored.
    _logs: LogHold,
}

impl TerminalPreview {
    pub fn open(logs: &LogSink) -> Result<Self, PreviewError> {
        terminal::enable_raw_mode()?;
        let mut preview = Self {
            out: io::stdout(),
            _logs: logs.hold(),
        };
        execute!(preview.out, EnterAlternateScreen, Hide, Clear(ClearType::All))?;
        Ok(preview)
    }

    fn draw(&mut self, frame: &Frame, captured: usize, target: usize) -> io::Result<()> {
        let (cols, rows) = terminal::size()?;
        let (width, height) = thumbnail_size(
            frame.image.dimensions(),
            cols as u32,
            rows.saturating_sub(HEADER_ROWS) as u32 * 2,
        );

        queue!(
            self.out,
            MoveTo(0, 0),
            Print(PREVIEW_TITLE),
            MoveTo(0, 1),
            Print(counter_label(captured, target))
        )?;

        if width > 0 && height > 0 {
            let thumb = imageops::resize(&frame.image, width, height, FilterType::Triangle);
            for row in 0..height / 2 {
                queue!(self.out, MoveTo(0, HEADER_ROWS + row as u16))?;
                for x in 0..width {
                    let [tr, tg, tb] = thumb.get_pixel(x, row * 2).0;
                    let [br, bg, bb] = thumb.get_pixel(x, row * 2 + 1).0;
                    queue!(
                        self.out,
                        SetForegroundColor(Color::Rgb { r: tr, g: tg, b: tb }),
                        SetBackgroundColor(Color::Rgb { r: br, g: bg, b: bb }),
                        Print('\u{2580}')
                    )?;
                }
                queue!(self.out, ResetColor)?;
            }
        }

        self.out.flush()
    }
}

impl Preview for TerminalPreview {
    fn show(&mut self, frame: &Frame, captured: usize, target: usize) -> Result<PreviewControl, PreviewError> {
        self.draw(frame, captured, target)?;

        while event::poll(Duration::from_millis(1))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                let stop = matches!(key.code, KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc)
                    || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL));
                if stop {
                    return Ok(PreviewControl::Interrupt);
                }
            }
        }
        Ok(PreviewControl::Continue)
    }
}

impl Drop for TerminalPreview {
    fn drop(&mut self) {
        let _ = execute!(self.out, ResetColor, Show, LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

/// Progress logged instead of drawn, for sessions without a terminal.
///
/// There is no key to press, so the capture is interrupted once
/// `stall_limit` frames in a row add no embedding.
#[derive(Debug)]
pub struct HeadlessPreview {
    last: Option<usize>,
    stalled: usize,
    stall_limit: usize,
}

impl HeadlessPreview {
    pub fn new(stall_limit: usize) -> Self {
        Self {
            last: None,
            stalled: 0,
            stall_limit: stall_limit.max(1),
        }
    }
}

impl Default for HeadlessPreview {
    fn default() -> Self {
        Self::new(HEADLESS_STALL_FRAMES)
    }
}

impl Preview for HeadlessPreview {
    fn show(&mut self, _frame: &Frame, captured: usize, target: usize) -> Result<PreviewControl, PreviewError> {
        if self.last != Some(captured) {
            tracing::info!("{}", counter_label(captured, target));
            self.last = Some(captured);
            self.stalled = 0;
            return Ok(PreviewControl::Continue);
        }

        self.stalled += 1;
        if self.stalled >= self.stall_limit {
            tracing::warn!(frames = self.stalled, captured, "no new face encodings, stopping capture");
            return Ok(PreviewControl::Interrupt);
        }
        Ok(PreviewControl::Continue)
    }
}

pub fn counter_label(captured: usize, target: usize) -> String {
    format!("Captured {captured}/{target}")
}

/// Largest size fitting `max_w` × `max_h` pixels with the source aspect ratio.
/// Height is even so pixel rows pair up into half-block cells.
fn thumbnail_size((w, h): (u32, u32), max_w: u32, max_h: u32) -> (u32, u32) {
    if w == 0 || h == 0 || max_w == 0 || max_h < 2 {
        return (0, 0);
    }
    // Terminal cells are about twice as tall as wide; one cell holds 1×2 pixels.
    let scale = (max_w as f32 / w as f32).min(max_h as f32 / h as f32);
    let width = ((w as f32 * scale) as u32).clamp(1, max_w);
    let height = ((h as f32 * scale) as u32).clamp(2, max_h) & !1;
    (width, height)
}
