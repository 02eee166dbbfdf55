//! Raw-input log sink (`-L <path>` / `-a`): verbatim echo of whatever the
//! reader produced, terminator included, with `stdout`/`stderr` as special
//! destination names.

use std::fs::OpenOptions;
use std::io::{self, Stdout, Write};

use anyhow::{Context, Result};

enum Destination {
    Stdout(Stdout),
    Stderr(io::Stderr),
    File(std::fs::File),
}

/// A sink that tees every raw line the harness reads to a file or to one of
/// the process's standard streams.
pub struct LogSink {
    destination: Destination,
}

impl LogSink {
    /// Opens `path` for writing, unless it names one of the special streams.
    /// `append` mirrors the `-a` flag; a fresh file is truncated otherwise.
    pub fn open(path: &str, append: bool) -> Result<Self> {
        let destination = match path {
            "stdout" => Destination::Stdout(io::stdout()),
            "stderr" => Destination::Stderr(io::stderr()),
            _ => {
                let file = OpenOptions::new()
                    .create(true)
                    .write(true)
                    .append(append)
                    .truncate(!append)
                    .open(path)
                    .with_context(|| format!("opening log file {path}"))?;
                Destination::File(file)
            }
        };
        Ok(Self { destination })
    }

    /// Writes `raw_line` verbatim, including whatever terminator it carries.
    pub fn write_raw(&mut self, raw_line: &str) -> Result<()> {
        let bytes = raw_line.as_bytes();
        match &mut self.destination {
            Destination::Stdout(w) => w.write_all(bytes)?,
            Destination::Stderr(w) => w.write_all(bytes)?,
            Destination::File(w) => w.write_all(bytes)?,
        }
        Ok(())
    }
}
