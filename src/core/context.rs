//! Run context - run-wide settings passed explicitly to every component

use std::fmt;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Shell used to interpret command lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shell {
    /// POSIX-style shell invoked as `<program> -c <line>`
    Posix(String),
    /// `cmd /C <line>`
    Cmd,
    /// `powershell -NoProfile -Command <line>`
    PowerShell,
}

impl Shell {
    /// Platform default: `cmd` on Windows, `/bin/sh` elsewhere
    pub fn platform_default() -> Self {
        if cfg!(windows) {
            Shell::Cmd
        } else {
            Shell::Posix("/bin/sh".to_string())
        }
    }

    /// Resolve a `--shell` override
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "" => Self::platform_default(),
            "cmd" => Shell::Cmd,
            "powershell" | "pwsh" => Shell::PowerShell,
            "sh" => Shell::Posix("/bin/sh".to_string()),
            _ => Shell::Posix(name.to_string()),
        }
    }

    /// Program and leading arguments; the command line is appended last
    pub fn invocation(&self) -> (&str, &'static [&'static str]) {
        const POSIX_ARGS: &[&str] = &["-c"];
        const CMD_ARGS: &[&str] = &["/C"];
        const POWERSHELL_ARGS: &[&str] = &["-NoProfile", "-Command"];

        match self {
            Shell::Posix(program) => (program.as_str(), POSIX_ARGS),
            Shell::Cmd => ("cmd", CMD_ARGS),
            Shell::PowerShell => ("powershell", POWERSHELL_ARGS),
        }
    }
}

impl Default for Shell {
    fn default() -> Self {
        Self::platform_default()
    }
}

impl fmt::Display for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shell::Posix(program) => f.write_str(program),
            Shell::Cmd => f.write_str("cmd"),
            Shell::PowerShell => f.write_str("powershell"),
        }
    }
}

/// Settings shared by one pipeline run
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    /// Shell for every command of the run
    pub shell: Shell,

    /// Suppress command echo, output and non-critical diagnostics
    pub silent: bool,

    /// Directory to stream the run log into
    pub persist_dir: Option<PathBuf>,

    /// Cancels the running command and stops the run
    pub cancel: CancellationToken,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shell(mut self, shell: Shell) -> Self {
        self.shell = shell;
        self
    }

    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    pub fn with_persist_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.persist_dir = dir;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}
