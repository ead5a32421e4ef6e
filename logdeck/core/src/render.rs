//! Render Engine
//!
//! Turns renderer state into a [`Frame`] of text lines, and writes frames to
//! the terminal as full-screen repaints.
//!
//! # Layout
//!
//! ```text
//!  Loading |██████████----------|  50 % (12 s) - assets     <- tasks, registry order
//!    Index |████████████████████| 100 % [1 min 3 s]
//!         ---                                                <- padding up to permanent_slots
//!
//! 19 october 2026 10:02:11 [INFO]    older message           <- messages, old to new
//! 19 october 2026 10:02:12 [WARNING] newer message
//!
//! 19 october 2026 10:02:12 [EXCEPTION] [Producer 4242]:     <- exceptions, new to old
//! ...
//! ```

use std::io::{self, Write};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::terminal::{Clear, ClearType};
use unicode_width::UnicodeWidthStr;

use crate::commands::{LogLevel, ProducerId};
use crate::config::RenderConfig;
use crate::ring::Ring;
use crate::tasks::{Task, TaskRegistry};

/// Glyph for the completed part of a bar
pub const FULL_GLYPH: char = '█';
/// Glyph for the remaining part of a bar
pub const EMPTY_GLYPH: char = '-';
/// Line drawn for each reserved but unused bar slot
pub const PLACEHOLDER_LINE: &str = "\t\t---";

// =============================================================================
// Frame
// =============================================================================

/// One complete screen of text
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    lines: Vec<String>,
}

impl Frame {
    /// Lines top to bottom
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// The frame as one newline-joined string
    #[must_use]
    pub fn to_text(&self) -> String {
        self.lines.join("\n")
    }

    /// Whether any line contains `needle`
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|line| line.contains(needle))
    }

    /// Index of the first line containing `needle`
    #[must_use]
    pub fn position(&self, needle: &str) -> Option<usize> {
        self.lines.iter().position(|line| line.contains(needle))
    }

    /// Every entry occupies at least one row, even when empty
    fn push_entry(&mut self, entry: &str) {
        if entry.is_empty() {
            self.lines.push(String::new());
        } else {
            self.lines.extend(entry.lines().map(str::to_string));
        }
    }
}

/// Lay out tasks, padding, messages and exceptions
#[must_use]
pub fn compose_frame(
    tasks: &TaskRegistry,
    messages: &Ring<String>,
    exceptions: &Ring<String>,
    permanent_slots: usize,
    now: Instant,
) -> Frame {
    let mut frame = Frame::default();
    let prefix_width = tasks.longest_prefix_width();

    for (_, task) in tasks.iter() {
        frame.lines.push(format_task_line(task, prefix_width, now));
    }

    for _ in tasks.len()..permanent_slots {
        frame.lines.push(PLACEHOLDER_LINE.to_string());
    }

    if !messages.is_empty() {
        if permanent_slots > 0 || !tasks.is_empty() {
            frame.lines.push(String::new());
        }
        for message in messages.iter() {
            frame.push_entry(message);
        }
    }

    if !exceptions.is_empty() {
        if !messages.is_empty() {
            frame.lines.push(String::new());
        }
        for exception in exceptions.iter() {
            frame.push_entry(exception);
        }
    }

    frame
}

// =============================================================================
// Task lines
// =============================================================================

/// Format one progress bar line
///
/// `prefix_width` is the display width every prefix is right-aligned to.
#[must_use]
pub fn format_task_line(task: &Task, prefix_width: usize, now: Instant) -> String {
    let spec = task.spec();
    let width = spec.bar_width;

    let (percent, filled) = match task.ratio() {
        Some(ratio) => {
            let percent = format!("{:.*}", usize::from(spec.decimals), ratio * 100.0);
            #[allow(
                clippy::cast_precision_loss,
                clippy::cast_possible_truncation,
                clippy::cast_sign_loss
            )]
            let filled = ((width as f64 * ratio).round() as usize).min(width);
            (percent, filled)
        }
        None => ("?".to_string(), 0),
    };

    let padding = " ".repeat(prefix_width.saturating_sub(spec.prefix.width()));
    let bar: String = std::iter::repeat(FULL_GLYPH)
        .take(filled)
        .chain(std::iter::repeat(EMPTY_GLYPH).take(width - filled))
        .collect();

    let mut line = format!(" {padding}{} |{bar}| {percent:>3} %", spec.prefix);

    if spec.display_elapsed {
        let elapsed = format_elapsed(task.elapsed(now));
        if !elapsed.is_empty() {
            if task.frozen_elapsed().is_some() {
                line.push_str(&format!(" [{elapsed}]"));
            } else {
                line.push_str(&format!(" ({elapsed})"));
            }
        }
    }

    if !spec.suffix.is_empty() {
        line.push_str(" - ");
        line.push_str(&spec.suffix);
    }

    line
}

/// Human elapsed time, largest unit first, zero units omitted
///
/// Rounds to whole seconds; anything under half a second is an empty string.
#[must_use]
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = (elapsed.as_millis() + 500) / 1000;

    let seconds = total % 60;
    let minutes = (total / 60) % 60;
    let hours = (total / 3600) % 24;
    let days = (total / 86_400) % 7;
    let weeks = total / 604_800;

    [
        (weeks, "w"),
        (days, "d"),
        (hours, "h"),
        (minutes, "min"),
        (seconds, "s"),
    ]
    .iter()
    .filter(|(value, _)| *value > 0)
    .map(|(value, unit)| format!("{value} {unit}"))
    .collect::<Vec<_>>()
    .join(" ")
}

// =============================================================================
// Message text
// =============================================================================

/// Replace `{name}` placeholders in a single pass
///
/// Unknown placeholders are left as they are; substituted values are never
/// expanded again.
#[must_use]
pub fn expand_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let replacement = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (close, *value))
        });

        match replacement {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Console line for a log message
#[must_use]
pub fn format_message(
    config: &RenderConfig,
    timestamp: DateTime<Local>,
    level: LogLevel,
    text: &str,
) -> String {
    let timestamp = timestamp.format(&config.timestamp_format).to_string();
    expand_template(
        &config.message_format,
        &[
            ("timestamp", timestamp.as_str()),
            ("level", level.label()),
            ("text", text),
        ],
    )
}

/// Console entry for a producer-reported exception
#[must_use]
pub fn format_exception(
    config: &RenderConfig,
    timestamp: DateTime<Local>,
    producer: &ProducerId,
    label: Option<&str>,
    text: &str,
) -> String {
    let timestamp = timestamp.format(&config.timestamp_format).to_string();
    let producer = producer.to_string();
    let label = label.map(|l| format!(" - {l}")).unwrap_or_default();
    expand_template(
        &config.exception_format,
        &[
            ("timestamp", timestamp.as_str()),
            ("producer", producer.as_str()),
            ("label", label.as_str()),
            ("text", text),
        ],
    )
}

// =============================================================================
// Terminal output
// =============================================================================

/// Full-screen writer: every repaint clears the screen first
#[derive(Debug)]
pub struct Terminal<W: Write> {
    out: W,
}

impl Terminal<io::Stdout> {
    /// Terminal on standard output
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> Terminal<W> {
    /// Wrap a writer
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Clear the screen and draw `frame` from the top-left corner
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying writer.
    pub fn repaint(&mut self, frame: &Frame) -> io::Result<()> {
        queue!(
            self.out,
            Clear(ClearType::All),
            Clear(ClearType::Purge),
            MoveTo(0, 0)
        )?;
        for line in frame.lines() {
            self.out.write_all(line.as_bytes())?;
            self.out.write_all(b"\r\n")?;
        }
        self.out.flush()
    }

    /// Borrow the underlying writer
    pub fn get_ref(&self) -> &W {
        &self.out
    }

    /// Recover the underlying writer
    pub fn into_inner(self) -> W {
        self.out
    }
}
