//! Backtrace rendering and paging.
//!
//! Output follows the familiar `thread apply all bt` layout:
//!
//! ```text
//! Thread 2 (LWP 4243):
//! #0  0x00007ffff7e4a9fc in __pthread_clock_nanosleep () from /usr/lib/libc.so.6
//! #1  0x000055555555a3c4 in crash_target::worker () at src/main.rs:41
//!
//! Thread 1 (LWP 4242):
//! #0  0x000055555555a1b2 in crash_target::fault () at src/main.rs:12
//! ```

use std::env;
use std::io::{self, BufRead, IsTerminal, Write};

use crate::types::{StackFrame, ThreadId};

/// Default screen height when `LINES` is unset.
pub const DEFAULT_SCREEN_ROWS: usize = 24;

const PAGER_PROMPT: &str = "--Type <RET> for more, q to quit--";

/// Stack of one thread.
#[derive(Debug, Clone)]
pub struct ThreadBacktrace
{
    /// Debugger-assigned thread number, starting at 1 for the main thread.
    pub number: usize,
    /// Kernel thread id.
    pub thread: ThreadId,
    /// Frames, innermost first.
    pub frames: Vec<StackFrame>,
    /// Set when the stack could not be read at all.
    pub error: Option<String>,
}

/// Stacks of every thread, highest thread number first.
#[derive(Debug, Clone, Default)]
pub struct Backtrace
{
    /// Per-thread stacks in print order.
    pub threads: Vec<ThreadBacktrace>,
}

impl Backtrace
{
    /// Render every thread as text lines (without trailing newlines).
    #[must_use]
    pub fn render(&self) -> Vec<String>
    {
        let mut lines = Vec::new();
        for (position, thread) in self.threads.iter().enumerate() {
            if position > 0 {
                lines.push(String::new());
            }
            lines.push(format!("Thread {} (LWP {}):", thread.number, thread.thread.raw()));
            if let Some(error) = &thread.error {
                lines.push(format!("<unavailable: {error}>"));
            }
            lines.extend(thread.frames.iter().map(format_frame));
        }
        lines
    }
}

/// Format one frame line.
#[must_use]
pub fn format_frame(frame: &StackFrame) -> String
{
    let name = frame.symbol.as_ref().map_or("??", |symbol| symbol.display_name());
    let mut line = format!("#{:<3}0x{:016x} in {name} ()", frame.index, frame.pc.value());

    if let Some(location) = &frame.location {
        line.push_str(&format!(" at {location}"));
    } else if let Some(module) = &frame.module {
        line.push_str(&format!(" from {module}"));
    }

    line
}

/// Writes long output one screenful at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager
{
    rows: Option<usize>,
}

impl Pager
{
    /// A pager that never pauses.
    #[must_use]
    pub fn disabled() -> Self
    {
        Self { rows: None }
    }

    /// A pager pausing every `rows` lines (the prompt takes one of them).
    #[must_use]
    pub fn with_rows(rows: usize) -> Self
    {
        Self { rows: Some(rows.max(2)) }
    }

    /// Pager for standard output
    ///
    /// Paging only happens when `enabled` is set and stdout is a terminal.
    /// The screen height comes from `LINES`.
    #[must_use]
    pub fn for_stdout(enabled: bool) -> Self
    {
        if !enabled || !io::stdout().is_terminal() {
            return Self::disabled();
        }

        let rows = env::var("LINES")
            .ok()
            .and_then(|value| value.trim().parse::<usize>().ok())
            .filter(|rows| *rows > 0)
            .unwrap_or(DEFAULT_SCREEN_ROWS);
        Self::with_rows(rows)
    }

    /// Write `lines` to `output`, pausing between screens
    ///
    /// Answering `q` at the prompt drops the remaining lines.
    ///
    /// ## Errors
    ///
    /// Propagates I/O failures on either stream.
    pub fn write_lines<W: Write, R: BufRead>(&self, output: &mut W, input: &mut R, lines: &[String]) -> io::Result<()>
    {
        let per_screen = self.rows.map(|rows| rows - 1);
        let mut on_screen = 0;

        for line in lines {
            if per_screen.is_some_and(|limit| on_screen == limit) {
                write!(output, "{PAGER_PROMPT}")?;
                output.flush()?;

                let mut answer = String::new();
                let read = input.read_line(&mut answer)?;
                if read > 0 && answer.trim().eq_ignore_ascii_case("q") {
                    writeln!(output)?;
                    return output.flush();
                }
                on_screen = 0;
            }

            writeln!(output, "{line}")?;
            on_screen += 1;
        }

        output.flush()
    }
}

#[cfg(test)]
mod tests
{
    use std::io::Cursor;

    use super::*;
    use crate::types::{Address, FrameStatus, SourceLocation, SymbolLanguage, SymbolName};

    fn frame(index: usize, pc: u64) -> StackFrame
    {
        StackFrame::bare(
            ThreadId::from(100),
            index,
            Address::from(pc),
            Address::ZERO,
            Address::ZERO,
            FrameStatus::FramePointer,
        )
    }

    #[test]
    fn test_format_frame_unknown_symbol()
    {
        assert_eq!(format_frame(&frame(0, 0x1234)), "#0  0x0000000000001234 in ?? ()");
    }

    #[test]
    fn test_format_frame_prefers_source_location_over_module()
    {
        let mut f = frame(3, 0x5555_5555_a1b2);
        f.symbol = Some(SymbolName::new(
            "_ZN12crash_target5fault17h0123456789abcdefE".into(),
            Some("crash_target::fault".into()),
            SymbolLanguage::Rust,
        ));
        f.module = Some("/tmp/crash_target".into());
        assert_eq!(
            format_frame(&f),
            "#3  0x000055555555a1b2 in crash_target::fault () from /tmp/crash_target"
        );

        f.location = Some(SourceLocation {
            file: "src/main.rs".into(),
            line: Some(12),
        });
        assert_eq!(
            format_frame(&f),
            "#3  0x000055555555a1b2 in crash_target::fault () at src/main.rs:12"
        );
    }

    #[test]
    fn test_render_separates_threads()
    {
        let backtrace = Backtrace {
            threads: vec![
                ThreadBacktrace {
                    number: 2,
                    thread: ThreadId::from(101),
                    frames: vec![frame(0, 0x10)],
                    error: None,
                },
                ThreadBacktrace {
                    number: 1,
                    thread: ThreadId::from(100),
                    frames: Vec::new(),
                    error: Some("registers unavailable".into()),
                },
            ],
        };

        let lines = backtrace.render();
        assert_eq!(lines[0], "Thread 2 (LWP 101):");
        assert!(lines[1].starts_with("#0"));
        assert_eq!(lines[2], "");
        assert_eq!(lines[3], "Thread 1 (LWP 100):");
        assert_eq!(lines[4], "<unavailable: registers unavailable>");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_disabled_pager_writes_everything_without_prompting()
    {
        let lines: Vec<String> = (0..50).map(|i| format!("line {i}")).collect();
        let mut out = Vec::new();
        Pager::disabled()
            .write_lines(&mut out, &mut Cursor::new("q\n"), &lines)
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 50);
        assert!(!text.contains(PAGER_PROMPT));
    }

    #[test]
    fn test_pager_prompts_every_screen()
    {
        let lines: Vec<String> = (0..7).map(|i| format!("line {i}")).collect();
        let mut out = Vec::new();
        Pager::with_rows(4)
            .write_lines(&mut out, &mut Cursor::new("\n\n"), &lines)
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches(PAGER_PROMPT).count(), 2);
        assert!(text.contains("line 6"));
    }

    #[test]
    fn test_pager_quit_drops_remaining_lines()
    {
        let lines: Vec<String> = (0..10).map(|i| format!("line {i}")).collect();
        let mut out = Vec::new();
        Pager::with_rows(4)
            .write_lines(&mut out, &mut Cursor::new("q\n"), &lines)
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("line 2"));
        assert!(!text.contains("line 3"));
    }
}
