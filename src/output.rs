use std::io::Write;

/// Abstraction over user-facing output.
///
/// Command modules use this trait instead of `println!`/`eprintln!` so that
/// stdout carries only machine-readable results (handles, JSON) while
/// progress and warnings go to stderr.
pub trait UserOutput: Send + Sync {
    /// Result data for stdout (e.g., `export PG_HOST=127.0.0.1`)
    fn data(&self, message: &str);

    /// Informational status message (e.g., "Provisioning postgres...")
    fn status(&self, message: &str);

    /// Success message (e.g., "Configuration is valid")
    fn success(&self, message: &str);

    /// Warning message (e.g., "Candidate 'ci-postgres' unavailable")
    fn warning(&self, message: &str);

    /// Error message
    fn error(&self, message: &str);

    /// Inline progress (no trailing newline). Call `finish_progress` after.
    fn progress(&self, message: &str);

    /// Finish an inline progress line with a result.
    fn finish_progress(&self, result: &str);
}

/// Standard CLI output: data to stdout, everything else to stderr.
pub struct CliOutput;

impl UserOutput for CliOutput {
    fn data(&self, message: &str) {
        println!("{}", message);
    }

    fn status(&self, message: &str) {
        eprintln!("{}", message);
    }

    fn success(&self, message: &str) {
        eprintln!("\x1b[32m{}\x1b[0m", message);
    }

    fn warning(&self, message: &str) {
        eprintln!("\x1b[33m{}\x1b[0m", message);
    }

    fn error(&self, message: &str) {
        eprintln!("\x1b[31m{}\x1b[0m", message);
    }

    fn progress(&self, message: &str) {
        eprint!("{}", message);
        std::io::stderr().flush().ok();
    }

    fn finish_progress(&self, result: &str) {
        eprintln!("{}", result);
    }
}
