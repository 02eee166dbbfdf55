//! Result aggregator: turns final `Session` state into a verdict and a
//! compact missing/failed range rendering.

use std::fmt;

use serde::Serialize;

use crate::session::Session;

/// Overall disposition of a run. Variants are checked in this declaration
/// order: a skip-all plan or a bail-out take priority over a missing plan,
/// which in turn takes priority over counting failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Verdict {
    Skipped,
    Aborted(AbortReason),
    Ok,
    Dubious,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AbortReason {
    BailedOut,
    NoPlan,
    ExtraTests,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            AbortReason::BailedOut => "Bailed Out",
            AbortReason::NoPlan => "No Plan",
            AbortReason::ExtraTests => "Extra Tests",
        };
        write!(f, "{text}")
    }
}

/// A rendered summary: the verdict plus the missing/failed ranges that
/// produced it, ready to print or to serialize as `--json` output.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub verdict: Verdict,
    pub skip_reason: Option<String>,
    pub missing: Vec<(i64, i64)>,
    pub failed: Vec<(i64, i64)>,
    pub skipped: i64,
}

impl Summary {
    pub fn exit_code(&self) -> i32 {
        match self.verdict {
            Verdict::Ok | Verdict::Skipped => 0,
            Verdict::Aborted(_) => 1,
            Verdict::Dubious => 2,
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.verdict {
            Verdict::Skipped => match &self.skip_reason {
                Some(reason) if !reason.is_empty() => write!(f, "skipped ({reason})"),
                _ => write!(f, "skipped"),
            },
            Verdict::Aborted(reason) => write!(f, "aborted ({reason})"),
            Verdict::Ok | Verdict::Dubious => {
                let mut parts = Vec::new();
                if !self.missing.is_empty() {
                    parts.push(format!("MISSED {}", render_ranges(&self.missing)));
                }
                if !self.failed.is_empty() {
                    parts.push(format!("FAILED {}", render_ranges(&self.failed)));
                }
                if parts.is_empty() {
                    if self.verdict == Verdict::Dubious {
                        write!(f, "dubious")?;
                    } else {
                        write!(f, "ok")?;
                    }
                } else {
                    write!(f, "{}", parts.join("; "))?;
                }
                if self.skipped > 0 {
                    let noun = if self.skipped == 1 { "test" } else { "tests" };
                    write!(f, " (skipped {} {noun})", self.skipped)?;
                }
                Ok(())
            }
        }
    }
}

/// Renders `[(1,1), (4,6)]` as `"1, 4-6"`.
fn render_ranges(ranges: &[(i64, i64)]) -> String {
    ranges
        .iter()
        .map(|(lo, hi)| {
            if hi > lo {
                format!("{lo}-{hi}")
            } else {
                format!("{lo}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn collect_ranges(results: &[crate::event::TestOutcome], plan: i64, target_missing: bool) -> Vec<(i64, i64)> {
    let mut ranges = Vec::new();
    let mut run_start: Option<i64> = None;

    for i in 1..=plan {
        let is_target = match results.get(i as usize) {
            Some(crate::event::TestOutcome::Invalid) => target_missing,
            Some(crate::event::TestOutcome::NotOk) => !target_missing,
            _ => false,
        };

        match (is_target, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(start)) => {
                ranges.push((start, i - 1));
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = run_start {
        ranges.push((start, plan));
    }
    ranges
}

/// Computes the final verdict and range summary for a completed session.
pub fn summarize(session: &Session) -> Summary {
    if session.skip_all {
        return Summary {
            verdict: Verdict::Skipped,
            skip_reason: session.skip_all_reason.clone(),
            missing: Vec::new(),
            failed: Vec::new(),
            skipped: session.skipped,
        };
    }
    if session.bailed {
        return Summary {
            verdict: Verdict::Aborted(AbortReason::BailedOut),
            skip_reason: None,
            missing: Vec::new(),
            failed: Vec::new(),
            skipped: session.skipped,
        };
    }
    let Some(plan) = &session.plan else {
        return Summary {
            verdict: Verdict::Aborted(AbortReason::NoPlan),
            skip_reason: None,
            missing: Vec::new(),
            failed: Vec::new(),
            skipped: session.skipped,
        };
    };
    if session.tests_run > plan.upper {
        return Summary {
            verdict: Verdict::Aborted(AbortReason::ExtraTests),
            skip_reason: None,
            missing: Vec::new(),
            failed: Vec::new(),
            skipped: session.skipped,
        };
    }

    let missing = collect_ranges(&session.results, plan.upper, true);
    let failed = collect_ranges(&session.results, plan.upper, false);
    let dubious = session.todo_passed > 0 || session.skip_failed > 0;

    let verdict = if missing.is_empty() && failed.is_empty() && !dubious {
        Verdict::Ok
    } else {
        Verdict::Dubious
    };

    Summary {
        verdict,
        skip_reason: None,
        missing,
        failed,
        skipped: session.skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;

    fn run(lines: &[&str]) -> Session {
        let mut session = Session::new();
        for line in lines {
            session.classify(line);
        }
        session
    }

    #[test]
    fn s1_clean_run_is_ok() {
        let session = run(&["TAP version 13", "1..2", "ok 1", "ok 2"]);
        let summary = summarize(&session);
        assert_eq!(summary.verdict, Verdict::Ok);
        assert_eq!(summary.exit_code(), 0);
    }

    #[test]
    fn s2_single_failure_range() {
        let session = run(&["1..3", "ok 1", "not ok 2", "ok 3"]);
        let summary = summarize(&session);
        assert_eq!(summary.failed, vec![(2, 2)]);
        assert_eq!(summary.to_string(), "FAILED 2");
    }

    #[test]
    fn s3_skip_all_with_reason() {
        let session = run(&["1..0 # skip no env"]);
        let summary = summarize(&session);
        assert_eq!(summary.verdict, Verdict::Skipped);
        assert!(summary.to_string().contains("skipped (no env)"));
    }

    #[test]
    fn s4_bail_out_is_aborted() {
        let session = run(&["1..2", "ok 1", "Bail out! broken"]);
        let summary = summarize(&session);
        assert_eq!(summary.verdict, Verdict::Aborted(AbortReason::BailedOut));
    }

    #[test]
    fn s5_todo_passed_makes_it_dubious_but_no_failed_range() {
        let session = run(&[
            "TAP version 13",
            "1..2",
            "pragma +strict",
            "ok 1",
            "ok 2 # TODO fix",
        ]);
        let summary = summarize(&session);
        assert_eq!(summary.verdict, Verdict::Dubious);
    }

    #[test]
    fn s6_out_of_order_reports_missing_gap_only() {
        let session = run(&["1..3", "ok 1", "ok 3"]);
        let summary = summarize(&session);
        assert_eq!(summary.missing, vec![(2, 2)]);
        assert_eq!(summary.to_string(), "MISSED 2");
    }

    #[test]
    fn no_plan_is_aborted() {
        let session = run(&["ok 1"]);
        let summary = summarize(&session);
        assert_eq!(summary.verdict, Verdict::Aborted(AbortReason::NoPlan));
    }

    #[test]
    fn contiguous_failed_range_renders_as_a_dash_range() {
        let session = run(&["1..4", "ok 1", "not ok 2", "not ok 3", "ok 4"]);
        let summary = summarize(&session);
        assert_eq!(summary.to_string(), "FAILED 2-3");
    }

    #[test]
    fn skipped_tests_append_a_count_suffix() {
        let session = run(&["1..3", "ok 1", "ok 2 # skip no hardware", "ok 3"]);
        let summary = summarize(&session);
        assert_eq!(summary.to_string(), "ok (skipped 1 test)");
    }

    #[test]
    fn missing_and_failed_segments_join_with_a_semicolon() {
        let session = run(&["1..4", "ok 1", "not ok 2", "ok 4"]);
        let summary = summarize(&session);
        assert_eq!(summary.to_string(), "MISSED 3; FAILED 2");
    }
}
