use std::fmt::Display;

/// Sink for the one-line progress messages printed by every operation.
///
/// In quiet mode the lines are demoted to debug logs instead of stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reporter {
    quiet: bool,
}

impl Reporter {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    /// A reporter that never prints, for library callers and tests.
    pub fn silent() -> Self {
        Self { quiet: true }
    }

    pub fn line(&self, message: impl Display) {
        if self.quiet {
            log::debug!("{message}");
        } else {
            println!("{message}");
        }
    }
}
