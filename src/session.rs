//! Stateful line classifier: bookkeeping (counters, plan, strict flag) is
//! folded directly into `classify` rather than split across callbacks with
//! defaults (see [`Event`]).

use pest::Parser;
use pest_derive::Parser as PestDerive;

use crate::event::{
    BailOut, DirectiveKind, Event, Invalid, InvalidKind, Plan, Pragma, TestOutcome, TestRecord,
};
use crate::lexical::{parse_long, strip_left, trim, ParseLongStatus};

#[derive(PestDerive)]
#[grammar = "grammar.pest"]
struct TapLineGrammar;

const DEFAULT_TAP_VERSION: u32 = 12;
const MIN_TAP_VERSION: u32 = 13;
const MAX_TAP_VERSION: u32 = 13;

/// Running state for one TAP session. Grows its `results` mapping on
/// demand; index 0 is always `Invalid` and unused, preserving TAP's 1-based
/// test numbering without manual capacity bookkeeping.
#[derive(Debug, Clone)]
pub struct Session {
    pub version: u32,
    pub plan: Option<Plan>,
    pub skip_all: bool,
    pub skip_all_reason: Option<String>,
    pub strict: bool,
    pub bailed: bool,
    first_line: bool,

    pub test_num: i64,
    pub tests_run: i64,
    pub passed: i64,
    pub failed: i64,
    pub skipped: i64,
    pub todo: i64,
    pub todo_passed: i64,
    pub skip_failed: i64,
    pub parse_errors: i64,

    pub results: Vec<TestOutcome>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            version: DEFAULT_TAP_VERSION,
            plan: None,
            skip_all: false,
            skip_all_reason: None,
            strict: true,
            bailed: false,
            first_line: true,
            test_num: 0,
            tests_run: 0,
            passed: 0,
            failed: 0,
            skipped: 0,
            todo: 0,
            todo_passed: 0,
            skip_failed: 0,
            parse_errors: 0,
            results: vec![TestOutcome::Invalid],
        }
    }
}

fn invalid(kind: InvalidKind, message: impl Into<String>) -> Event {
    Event::Invalid(Invalid {
        kind,
        message: message.into(),
    })
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_capacity(&mut self, index: usize) {
        if self.results.len() <= index {
            self.results.resize(index + 1, TestOutcome::Invalid);
        }
    }

    /// Classify one already-chomped line (no trailing newline), mutating
    /// session state and returning the sequence of events it produced. Most
    /// lines produce exactly one event; a multi-item pragma line produces
    /// one per item, left to right.
    pub fn classify(&mut self, line: &str) -> Vec<Event> {
        if self.bailed {
            return Vec::new();
        }

        // 1. Bail-out scan: the substring may appear anywhere in the line.
        if let Some(pos) = line.find("Bail out!") {
            let rest = &line[pos + "Bail out!".len()..];
            let reason = trim(rest);
            let reason = if reason.is_empty() {
                None
            } else {
                Some(reason.to_string())
            };
            self.bailed = true;
            return vec![Event::BailOut(BailOut { reason })];
        }

        // 2. Whitespace-only line: ignored, doesn't consume `first_line`.
        if strip_left(line).is_empty() {
            return vec![Event::Blank];
        }

        let is_first = self.first_line;
        self.first_line = false;

        // 3. Version header, first non-blank line only.
        if is_first {
            if let Ok(mut pairs) = TapLineGrammar::parse(Rule::version_line, line) {
                let version_pair = pairs
                    .next()
                    .unwrap()
                    .into_inner()
                    .find(|p| p.as_rule() == Rule::version_number)
                    .unwrap();
                let (value, _, status) = parse_long(version_pair.as_str());
                return match status {
                    ParseLongStatus::Overflow => {
                        vec![invalid(InvalidKind::VersionRange, "TAP version too large")]
                    }
                    _ if !(MIN_TAP_VERSION as i64..=MAX_TAP_VERSION as i64).contains(&value) => {
                        vec![invalid(
                            InvalidKind::VersionRange,
                            format!(
                                "TAP version {} is outside the supported range [{}, {}]",
                                value, MIN_TAP_VERSION, MAX_TAP_VERSION
                            ),
                        )]
                    }
                    _ => {
                        self.version = value as u32;
                        vec![Event::Version(self.version)]
                    }
                };
            }
        }

        // 4. Pragma, only once TAP 13 semantics are in effect.
        if self.version >= MAX_TAP_VERSION && line.starts_with("pragma") {
            return self.classify_pragma(line);
        }

        // 5. Comment.
        if line.starts_with('#') {
            return vec![Event::Comment(line.to_string())];
        }

        // 6. Plan.
        if line.starts_with("1..") {
            return self.classify_plan(line);
        }

        // 7. Test line.
        if let Ok(mut pairs) = TapLineGrammar::parse(Rule::test_line, line) {
            let test_pair = pairs.next().unwrap();
            return self.classify_test(test_pair);
        }

        // 8. Unknown.
        self.parse_errors += 1;
        vec![Event::Unknown(line.to_string())]
    }

    fn classify_pragma(&mut self, line: &str) -> Vec<Event> {
        let pairs = match TapLineGrammar::parse(Rule::pragma_line, line) {
            Ok(p) => p,
            Err(_) => return vec![invalid(InvalidKind::PragmaParse, "malformed pragma line")],
        };

        let mut events = Vec::new();
        for pragma_item in pairs
            .into_iter()
            .next()
            .unwrap()
            .into_inner()
            .filter(|p| p.as_rule() == Rule::pragma_item)
        {
            let mut state = true;
            let mut name = String::new();
            for part in pragma_item.into_inner() {
                match part.as_rule() {
                    Rule::pragma_flag => state = part.as_str() == "+",
                    Rule::pragma_name => name = part.as_str().to_string(),
                    _ => {}
                }
            }

            events.push(Event::Pragma(Pragma {
                state,
                name: name.clone(),
            }));

            if name == "strict" {
                self.strict = state;
            } else {
                self.parse_errors += 1;
                events.push(invalid(
                    InvalidKind::PragmaUnknown,
                    format!("Invalid pragma: {}", name),
                ));
            }
        }
        events
    }

    fn classify_plan(&mut self, line: &str) -> Vec<Event> {
        let mut pairs = match TapLineGrammar::parse(Rule::plan_line, line) {
            Ok(p) => p,
            Err(_) => {
                return vec![invalid(
                    InvalidKind::PlanParse,
                    "Trailing characters in test plan",
                )]
            }
        };

        let plan_line_pair = pairs.next().unwrap();
        let mut upper: i64 = 0;
        let mut has_skip_kw = false;
        let mut skip_reason: Option<String> = None;

        for part in plan_line_pair.into_inner() {
            match part.as_rule() {
                Rule::plan_bound => {
                    let (value, _, status) = parse_long(part.as_str());
                    if status == ParseLongStatus::Overflow {
                        return vec![invalid(
                            InvalidKind::PlanInval,
                            "Test plan upper bound is too large",
                        )];
                    }
                    upper = value;
                }
                Rule::plan_directive => {
                    for d in part.into_inner() {
                        match d.as_rule() {
                            Rule::plan_skip_kw => has_skip_kw = true,
                            Rule::plan_reason => {
                                let r = trim(d.as_str());
                                skip_reason = Some(r.to_string());
                            }
                            _ => {}
                        }
                    }
                }
                _ => {}
            }
        }

        if self.plan.is_some() {
            return vec![invalid(InvalidKind::PlanMulti, "More than one plan given")];
        }

        if has_skip_kw && upper != 0 {
            // Spurious skip directive: record the bound but surface the error.
            self.plan = Some(Plan {
                upper,
                skip_reason: None,
            });
            self.ensure_capacity(upper.max(0) as usize);
            return vec![invalid(
                InvalidKind::PlanParse,
                "skip directive is only legal when the plan bound is 0",
            )];
        }

        let reason = if upper == 0 && has_skip_kw {
            Some(skip_reason.unwrap_or_default())
        } else {
            None
        };

        if upper == 0 {
            self.skip_all = true;
            self.skip_all_reason = reason.clone();
        }

        self.plan = Some(Plan {
            upper,
            skip_reason: reason.clone(),
        });
        self.ensure_capacity(upper.max(0) as usize);

        vec![Event::Plan(Plan {
            upper,
            skip_reason: reason,
        })]
    }

    fn classify_test(&mut self, test_pair: pest::iterators::Pair<Rule>) -> Vec<Event> {
        let mut inner = test_pair.into_inner();
        let result_pair = inner.next().unwrap();
        let not_ok = result_pair.as_str().trim_start().starts_with("not");

        let tail_pair = inner.next().unwrap();

        let mut explicit_number: Option<i64> = None;
        let mut description: Option<&str> = None;
        let mut directive_key: Option<DirectiveKind> = None;
        let mut directive_text: Option<&str> = None;

        for part in tail_pair.into_inner() {
            match part.as_rule() {
                Rule::test_number => {
                    let (value, _, status) = parse_long(part.as_str());
                    if status == ParseLongStatus::Overflow {
                        return vec![invalid(InvalidKind::TestInval, "Test number is too large")];
                    }
                    explicit_number = Some(value);
                }
                Rule::description => description = Some(part.as_str()),
                Rule::directive_clause => {
                    for d in part.into_inner() {
                        match d.as_rule() {
                            Rule::directive_key => {
                                directive_key = Some(if d.as_str().eq_ignore_ascii_case("skip") {
                                    DirectiveKind::Skip
                                } else {
                                    DirectiveKind::Todo
                                });
                            }
                            Rule::directive_text => directive_text = Some(d.as_str()),
                            _ => {}
                        }
                    }
                }
                _ => {}
            }
        }

        let expected = self.test_num + 1;
        let reported = explicit_number.unwrap_or(expected);

        let mut leading_invalid: Option<Event> = None;
        let accepted_num;

        if reported == expected {
            accepted_num = expected;
        } else if reported == self.test_num {
            return vec![invalid(
                InvalidKind::TestDup,
                format!("Duplicate test number {}", reported),
            )];
        } else {
            accepted_num = reported;
            leading_invalid = Some(invalid(InvalidKind::TestOrder, "Tests out of order?!"));
        }

        if let Some(plan) = &self.plan {
            if accepted_num > plan.upper {
                self.parse_errors += 1;
                return vec![invalid(
                    InvalidKind::TestInval,
                    format!("Test {} outside of plan bounds 1..{}", accepted_num, plan.upper),
                )];
            }
        }

        self.test_num = accepted_num;

        let reason = description.map(trim).filter(|s| !s.is_empty()).map(String::from);
        let directive = directive_text
            .map(trim)
            .filter(|s| !s.is_empty())
            .map(String::from);

        let base_ok = !not_ok;
        let kind = match (base_ok, directive_key) {
            (true, Some(DirectiveKind::Skip)) => TestOutcome::Skip,
            (false, Some(DirectiveKind::Skip)) => TestOutcome::SkipFailed,
            (true, Some(DirectiveKind::Todo)) => TestOutcome::TodoPassed,
            (false, Some(DirectiveKind::Todo)) => TestOutcome::Todo,
            (true, None) => TestOutcome::Ok,
            (false, None) => TestOutcome::NotOk,
        };

        self.record_test(accepted_num, kind);

        let mut events = Vec::new();
        if let Some(ev) = leading_invalid {
            events.push(ev);
        }
        events.push(Event::Test(TestRecord {
            kind,
            test_num: accepted_num,
            reason,
            directive_kind: directive_key,
            directive,
        }));

        match kind {
            TestOutcome::TodoPassed => events.push(invalid(
                InvalidKind::TodoPass,
                format!("Todo test {} unexpectedly passed", accepted_num),
            )),
            TestOutcome::SkipFailed => events.push(invalid(
                InvalidKind::SkipFail,
                format!("Skip test {} unexpectedly failed", accepted_num),
            )),
            _ => {}
        }

        events
    }

    fn record_test(&mut self, num: i64, kind: TestOutcome) {
        self.ensure_capacity(num.max(0) as usize);
        self.results[num as usize] = kind;
        self.tests_run += 1;

        match kind {
            TestOutcome::Ok => self.passed += 1,
            TestOutcome::NotOk => self.failed += 1,
            TestOutcome::Todo => self.todo += 1,
            TestOutcome::TodoPassed => {
                self.failed += 1;
                self.todo_passed += 1;
                self.parse_errors += 1;
            }
            TestOutcome::Skip => {
                self.passed += 1;
                self.skipped += 1;
            }
            TestOutcome::SkipFailed => {
                self.failed += 1;
                self.skip_failed += 1;
                self.parse_errors += 1;
            }
            TestOutcome::Invalid => {}
        }
    }
}
