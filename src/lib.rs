//! A TAP (Test Anything Protocol) stream parser and the harness driver built
//! on top of it: run a test binary (or a list of them), classify its output
//! line by line, and report a pass/fail/aborted verdict.
//!
//! The parser (`session`) is a hand-written, stateful line classifier rather
//! than a one-shot document grammar: TAP's numbering rules (duplicate test
//! numbers, out-of-sequence recovery, a digit glued to trailing text) need a
//! running counter a pure grammar can't express. `session` still leans on a
//! `pest` grammar (`grammar.pest`) for the shape of each individual line;
//! the sequencing on top is plain Rust.

pub mod aggregate;
pub mod batch;
pub mod cli;
pub mod event;
pub mod harness;
pub mod lexical;
pub mod logsink;
pub mod reader;
pub mod session;

pub use aggregate::{summarize, AbortReason, Summary, Verdict};
pub use event::Event;
pub use harness::{run_test, HarnessOptions, HarnessOutcome, HarnessVerdict};
pub use session::Session;
