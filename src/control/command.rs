//! Commands understood by the dosdebug companion.

use std::fmt;

/// Prompt printed by dosdebug when it is ready for a command.
pub const DEFAULT_PROMPT: &str = "dosdebug> ";

/// ASCII ETX, the byte a terminal sends for Ctrl-C.
pub const INTERRUPT_BYTE: u8 = 3;

/// A single command written to the companion's stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// `?` lists the available commands; used to check the link is alive.
    Help,
    /// `kill` terminates the emulator.
    Kill,
    /// `quit` ends the debug session.
    Quit,
    /// A bare interrupt byte asking the companion itself to exit.
    Interrupt,
}

impl ControlCommand {
    /// Bytes written to the pipe for this command.
    #[must_use]
    pub fn wire_bytes(self) -> &'static [u8] {
        match self {
            Self::Help => b"?\n",
            Self::Kill => b"kill\n",
            Self::Quit => b"quit\n",
            Self::Interrupt => &[INTERRUPT_BYTE],
        }
    }

    /// Whether the companion answers this command with output.
    #[must_use]
    pub fn expects_response(self) -> bool {
        !matches!(self, Self::Interrupt)
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Help => f.write_str("?"),
            Self::Kill => f.write_str("kill"),
            Self::Quit => f.write_str("quit"),
            Self::Interrupt => f.write_str("^C"),
        }
    }
}
