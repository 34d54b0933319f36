use anyhow::{Context, bail};
use crossterm::{
    ExecutableCommand, cursor,
    terminal::{self, ClearType},
};
use std::io::{Stdout, Write, stdout};

/// Smallest grid the preview can lay out: a few cells of picture plus the HUD row.
pub const MIN_COLS: u16 = 4;
pub const MIN_ROWS: u16 = 2;

/// Ends synchronized output, re-enables autowrap and resets SGR colours; the
/// half-block renderer may leave any of these behind mid-frame.
const RENDER_RESET: &[u8] = b"\x1b[?2026l\x1b[?7h\x1b[0m";

/// Holds the preview's terminal state: raw mode, the alternate screen and a
/// hidden cursor. Dropping it puts the user's shell back.
pub struct TerminalGuard {
    restored: bool,
}

impl TerminalGuard {
    pub fn enter() -> anyhow::Result<Self> {
        terminal::enable_raw_mode().context("enable raw mode")?;
        let mut guard = Self { restored: false };
        if let Err(err) = guard.take_screen() {
            guard.restore();
            return Err(err);
        }
        Ok(guard)
    }

    fn take_screen(&mut self) -> anyhow::Result<()> {
        let mut out = stdout();
        out.execute(terminal::EnterAlternateScreen)
            .context("enter alternate screen")?;
        out.execute(terminal::Clear(ClearType::All)).context("clear screen")?;
        out.execute(cursor::Hide).context("hide cursor")?;
        Ok(())
    }

    pub fn stdout() -> Stdout {
        stdout()
    }

    /// Current size as `(cols, rows)`.
    pub fn size() -> anyhow::Result<(u16, u16)> {
        let (cols, rows) = terminal::size().context("get terminal size")?;
        check_size(cols, rows)
    }

    /// Leaves the preview screen. Safe to call more than once; errors are
    /// ignored since the terminal may already be gone.
    pub fn restore(&mut self) {
        if std::mem::replace(&mut self.restored, true) {
            return;
        }
        let _ = terminal::disable_raw_mode();
        let mut out = stdout();
        let _ = out.write_all(RENDER_RESET);
        let _ = out.flush();
        let _ = out.execute(cursor::Show);
        let _ = out.execute(terminal::LeaveAlternateScreen);
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        self.restore();
    }
}

pub fn check_size(cols: u16, rows: u16) -> anyhow::Result<(u16, u16)> {
    if cols < MIN_COLS || rows < MIN_ROWS {
        bail!("terminal too small (need at least {MIN_COLS}x{MIN_ROWS}, got {cols}x{rows})");
    }
    Ok((cols, rows))
}
