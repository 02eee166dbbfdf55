//! Typed output of the [`crate::session::Session`] classifier: a lazy
//! sequence of `Event` values rather than a callback table with defaults.

use serde::Serialize;

/// Outcome of a single TAP test line, stored densely in
/// [`crate::session::Session::results`]. `Invalid` marks a slot for which no
/// test line was ever accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TestOutcome {
    Invalid,
    Ok,
    NotOk,
    Todo,
    TodoPassed,
    Skip,
    SkipFailed,
}

/// A directive key (`# skip ...` / `# todo ...`), as raw text before the
/// `TestOutcome` is derived from it plus the test's pass/fail bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DirectiveKind {
    Skip,
    Todo,
}

/// The fully classified record for one accepted test line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestRecord {
    pub kind: TestOutcome,
    pub test_num: i64,
    pub reason: Option<String>,
    pub directive_kind: Option<DirectiveKind>,
    pub directive: Option<String>,
}

/// A TAP plan declaration: `1..<upper>` with an optional skip reason (only
/// meaningful when `upper == 0`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub upper: i64,
    pub skip_reason: Option<String>,
}

/// One `+name`/`-name` item out of a `pragma` line's comma-separated list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pragma {
    pub state: bool,
    pub name: String,
}

/// A `Bail out!` line, with everything after the token (trimmed) as the
/// optional reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BailOut {
    pub reason: Option<String>,
}

/// The error taxonomy for malformed or out-of-sequence TAP input. Every kind
/// increments `parse_errors` unconditionally; none of these are ever
/// surfaced as a Rust `Err`: they are in-band events, since a single
/// malformed line shouldn't abort a whole stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InvalidKind {
    VersionRange,
    PragmaUnknown,
    PragmaParse,
    PlanParse,
    PlanInval,
    PlanMulti,
    TestInval,
    TestDup,
    TestOrder,
    TestUnknown,
    TodoPass,
    SkipFail,
}

/// A single invalid-event occurrence, with a human-readable message for
/// logging/debugging (the message is not part of the taxonomy; `kind` is).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invalid {
    pub kind: InvalidKind,
    pub message: String,
}

/// Everything [`crate::session::Session::classify`] can produce for one
/// line. Consumers (the CLI's verbose tracer, the log sink, `--json`) match
/// on this rather than registering callbacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    Version(u32),
    Plan(Plan),
    Pragma(Pragma),
    BailOut(BailOut),
    Comment(String),
    Test(TestRecord),
    Unknown(String),
    Invalid(Invalid),
    /// A whitespace-only line: silently ignored, but still surfaced so a
    /// verbose tracer can account for every input line if it wants to.
    Blank,
}
