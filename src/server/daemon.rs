//! Pidfile + daemonization hooks (§5 "the pidfile, if configured, is
//! rewritten with the live PID after daemonization; the logfile is
//! opened before daemonization and inherited by the child"). Actual
//! `fork()`-based daemonization is platform-specific; it's stubbed
//! behind [`Daemonize`] so a real implementation can be substituted
//! without touching server startup logic.

use std::io::Write;
use std::path::Path;

pub trait Daemonize {
    /// detaches the process from its controlling terminal. Must be
    /// called, if at all, *after* the logfile is opened and *before*
    /// [`write_pidfile`] runs, matching the happens-before the spec
    /// requires.
    fn daemonize(&self) -> crate::Result<()>;
}

/// the default: stays in the foreground. A real daemonizer (fork +
/// setsid + redirect stdio) is an environment-specific concern this
/// crate doesn't take a position on.
pub struct Foreground;

impl Daemonize for Foreground {
    fn daemonize(&self) -> crate::Result<()> {
        Ok(())
    }
}

pub fn write_pidfile(path: impl AsRef<Path>) -> crate::Result<()> {
    let mut file = std::fs::File::create(path)?;
    write!(file, "{}", std::process::id())?;
    Ok(())
}
