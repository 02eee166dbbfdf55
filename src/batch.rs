//! Batch runner: runs every test named in a list file, locating each
//! binary on a small search path and accumulating cross-test totals.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::aggregate::{summarize, Summary, Verdict};
use crate::harness::{run_test, HarnessOptions, HarnessVerdict};
use crate::logsink::LogSink;
use crate::reader::DEFAULT_BUFFER_LEN;
use crate::session::Session;

/// Suffixes tried, in order, when resolving a bare test name to a binary.
const SUFFIXES: [&str; 2] = ["-t", ".t"];

/// One resolved-and-run entry in a batch.
pub struct BatchEntry {
    pub name: String,
    pub path: PathBuf,
    pub summary: Summary,
    pub harness_verdict: HarnessVerdict,
}

/// Cross-test totals accumulated over a batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchTotals {
    pub tests_run: i64,
    pub failed: i64,
    pub skipped: i64,
    pub todo: i64,
    pub aborted: i64,
    pub parse_errors: i64,
}

/// Reads a list file: one test name per line, blank lines and `#`-prefixed
/// comments skipped. A line that exceeds the harness's line buffer is
/// treated as fatal, matching the underlying reader's framing limit.
pub fn load_list(path: &Path) -> Result<Vec<String>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading test list {}", path.display()))?;

    let mut names = Vec::new();
    for line in contents.lines() {
        if line.len() >= DEFAULT_BUFFER_LEN {
            bail!(
                "line too long in test list {} ({} bytes)",
                path.display(),
                line.len()
            );
        }
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        names.push(trimmed.to_string());
    }
    Ok(names)
}

/// Resolves a bare test name to an existing regular file, trying `-t` then
/// `.t` across `./`, the build dir, and the source dir, in that order.
pub fn locate_binary(name: &str, build_dir: Option<&Path>, source_dir: Option<&Path>) -> Option<PathBuf> {
    let search_dirs: [Option<&Path>; 3] = [Some(Path::new("./")), build_dir, source_dir];

    for suffix in SUFFIXES {
        for dir in search_dirs.iter().flatten() {
            let candidate = dir.join(format!("{name}{suffix}"));
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

/// Runs every test named in `list_path`, in order, accumulating totals.
pub fn run_batch(
    list_path: &Path,
    options: &HarnessOptions,
    build_dir: Option<&Path>,
    source_dir: Option<&Path>,
    mut log: Option<&mut LogSink>,
) -> Result<(Vec<BatchEntry>, BatchTotals)> {
    let names = load_list(list_path)?;
    let mut entries = Vec::with_capacity(names.len());
    let mut totals = BatchTotals::default();

    for name in names {
        let path = locate_binary(&name, build_dir, source_dir)
            .with_context(|| format!("no test binary found for '{name}'"))?;

        let mut session = Session::new();
        let outcome = run_test(&path, options, &mut session, log.as_deref_mut())?;
        let summary = summarize(&session);

        totals.tests_run += session.tests_run;
        totals.failed += session.failed;
        totals.skipped += session.skipped;
        totals.todo += session.todo;
        totals.parse_errors += session.parse_errors;
        let aborted = matches!(summary.verdict, Verdict::Aborted(_))
            || matches!(outcome.verdict, HarnessVerdict::Aborted(_));
        if aborted {
            totals.aborted += 1;
        }

        entries.push(BatchEntry {
            name,
            path,
            summary,
            harness_verdict: outcome.verdict,
        });
    }

    Ok((entries, totals))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn skips_blank_and_comment_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tests.list");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "# a comment").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "foo").unwrap();
        writeln!(file, "  bar  ").unwrap();
        drop(file);

        let names = load_list(&path).unwrap();
        assert_eq!(names, vec!["foo".to_string(), "bar".to_string()]);
    }

    #[test]
    fn overlong_line_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tests.list");
        fs::write(&path, "x".repeat(DEFAULT_BUFFER_LEN + 1)).unwrap();

        assert!(load_list(&path).is_err());
    }

    #[test]
    fn locate_binary_tries_suffixes_across_dirs() {
        let build = tempfile::tempdir().unwrap();
        fs::write(build.path().join("widget.t"), b"").unwrap();

        let found = locate_binary("widget", Some(build.path()), None);
        assert_eq!(found, Some(build.path().join("widget.t")));
    }

    #[test]
    fn locate_binary_returns_none_when_missing() {
        assert_eq!(locate_binary("totally-missing-binary", None, None), None);
    }
}
