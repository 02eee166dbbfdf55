//! Command-line surface: flag union observed across historical
//! variants of the harness binary.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "tap-harness",
    about = "Runs a TAP test program (or a list of them) and reports pass/fail results"
)]
pub struct Opts {
    /// Increase verbosity; stackable (-vv, -vvv, ...).
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Debug output; implies an effective verbosity of at least 2.
    #[arg(short = 'd')]
    pub debug: bool,

    /// Append raw input lines to this log file. The names "stdout" and
    /// "stderr" route to those streams instead of a real file.
    #[arg(short = 'L', value_name = "PATH")]
    pub log: Option<String>,

    /// Open the log file for append instead of truncating it.
    #[arg(short = 'a')]
    pub append: bool,

    /// Treat FILE as a list of test names, one per line, rather than a
    /// single test binary.
    #[arg(short = 'l')]
    pub list: bool,

    /// Source directory: searched when resolving batch test binaries, and
    /// exported to the child as SOURCE/TAP_SOURCE.
    #[arg(short = 's', value_name = "DIR")]
    pub source_dir: Option<PathBuf>,

    /// Build directory: searched when resolving batch test binaries, and
    /// exported to the child as BUILD/TAP_BUILD.
    #[arg(short = 'b', value_name = "DIR")]
    pub build_dir: Option<PathBuf>,

    /// Merge the child's stderr into the same stream as its stdout.
    #[arg(short = 'e')]
    pub capture_stderr: bool,

    /// Emit the summary (and, in list mode, every per-test summary) as JSON
    /// instead of the human-readable rendering.
    #[arg(long = "json")]
    pub json: bool,

    /// Test binary to run, or the list file when -l is given.
    pub file: PathBuf,
}

impl Opts {
    /// Verbosity after folding in `-d`'s "implies at least 2" rule.
    pub fn effective_verbosity(&self) -> u8 {
        if self.debug {
            self.verbose.max(2)
        } else {
            self.verbose
        }
    }
}
