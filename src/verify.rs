// vim: tw=80
//! Post-replay verification: unordered, ordered, and full modes.

use core::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::descriptor::{MethodSig, MockHandle, TargetPattern};
use crate::error::MockError;
use crate::matcher::{ArgMatcher, ClassLookup};
use crate::scope::{Attribution, LogEntry, ScopeInner};
use crate::value::Value;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum VerifyMode {
    Unordered,
    Ordered,
    Full,
}

/// One referenced expectation inside a verification block.  Bounds default
/// to min 1, max unbounded.
pub struct Clause {
    target: TargetPattern,
    method: Arc<MethodSig>,
    matchers: Vec<ArgMatcher>,
    args_pred: Option<Box<dyn Fn(&[Value]) -> bool + Send>>,
    min: usize,
    max: usize,
}

impl Clause {
    fn new(target: TargetPattern, method: Arc<MethodSig>) -> Self {
        Clause {
            target,
            method,
            matchers: Vec::new(),
            args_pred: None,
            min: 1,
            max: usize::MAX,
        }
    }

    /// Constrain arguments with per-position matchers.
    pub fn with(&mut self, matchers: impl Into<Vec<ArgMatcher>>) -> &mut Self {
        self.matchers = matchers.into();
        self
    }

    /// Constrain the whole argument list with a predicate.
    pub fn withf<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&[Value]) -> bool + Send + 'static,
    {
        self.args_pred = Some(Box::new(f));
        self
    }

    /// Require exactly `n` matching calls.
    pub fn times(&mut self, n: usize) -> &mut Self {
        self.min = n;
        self.max = n;
        self
    }

    /// Require at least `n` matching calls.
    pub fn min_times(&mut self, n: usize) -> &mut Self {
        self.min = n;
        self
    }

    /// Allow at most `n` matching calls.
    pub fn max_times(&mut self, n: usize) -> &mut Self {
        self.max = n;
        self
    }

    /// Shortcut for [`times(1)`](Self::times).
    pub fn once(&mut self) -> &mut Self {
        self.times(1)
    }

    /// Require that no matching call happened.
    pub fn never(&mut self) -> &mut Self {
        self.times(0)
    }

    fn matches_entry(&self, entry: &LogEntry, classes: &ClassLookup) -> bool {
        let call = &entry.call;
        if !self.target.accepts(&call.target, &call.class) {
            return false;
        }
        if !self.method.same_member(&call.method) {
            return false;
        }
        if !self.matchers.is_empty() {
            if self.matchers.len() != call.args.len() {
                return false;
            }
            if !self
                .matchers
                .iter()
                .zip(call.args.iter())
                .all(|(m, a)| m.matches_in(a, classes))
            {
                return false;
            }
        }
        match &self.args_pred {
            Some(p) => p(&call.args),
            None => true,
        }
    }

    /// Member-level match, used to explain near-misses: right member,
    /// wrong arguments.
    fn matches_member(&self, entry: &LogEntry) -> bool {
        self.target.accepts(&entry.call.target, &entry.call.class)
            && self.method.same_member(&entry.call.method)
    }

    fn run_captures(&self, args: &[Value]) {
        for (m, a) in self.matchers.iter().zip(args.iter()) {
            m.capture(a);
        }
    }

    fn render(&self) -> String {
        let mut s = format!("{}#{}(", self.target, self.method.name);
        if self.matchers.is_empty() {
            s.push_str("..");
        } else {
            for (i, m) in self.matchers.iter().enumerate() {
                if i > 0 {
                    s.push_str(", ");
                }
                s.push_str(&m.to_string());
            }
        }
        s.push(')');
        s
    }

    /// Explanation of why the nearest member-level match failed, rendered
    /// from the first failing matcher's case tree or expectation.
    fn explain_mismatch(
        &self,
        entry: &LogEntry,
        classes: &ClassLookup,
    ) -> String {
        for (m, a) in self.matchers.iter().zip(entry.call.args.iter()) {
            if !m.matches_in(a, classes) {
                return format!("\n{}", m.explain(a));
            }
        }
        String::new()
    }
}

impl fmt::Debug for Clause {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Clause({})", self.render())
    }
}

/// Accumulates the clauses of one verification block.  The block's
/// bookkeeping lives only for the block; only the counters and replay log
/// it reads survive across blocks.
#[derive(Default)]
pub struct VerifyBlock {
    clauses: Vec<Clause>,
}

impl VerifyBlock {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Reference calls on a specific mock instance.
    pub fn expect(
        &mut self,
        handle: &MockHandle,
        method: &Arc<MethodSig>,
    ) -> &mut Clause {
        self.push(TargetPattern::Instance(handle.id), method)
    }

    /// Reference calls on any instance of `class`.
    pub fn expect_any(
        &mut self,
        class: &str,
        method: &Arc<MethodSig>,
    ) -> &mut Clause {
        self.push(TargetPattern::AnyOfClass(Arc::from(class)), method)
    }

    /// Reference static-member calls on `class`.
    pub fn expect_static(
        &mut self,
        class: &str,
        method: &Arc<MethodSig>,
    ) -> &mut Clause {
        self.push(TargetPattern::Static(Arc::from(class)), method)
    }

    fn push(
        &mut self,
        target: TargetPattern,
        method: &Arc<MethodSig>,
    ) -> &mut Clause {
        self.clauses.push(Clause::new(target, Arc::clone(method)));
        let l = self.clauses.len();
        &mut self.clauses[l - 1]
    }
}

pub(crate) fn run(
    block: &VerifyBlock,
    mode: VerifyMode,
    inner: &ScopeInner,
) -> Result<(), MockError> {
    trace!(clauses = block.clauses.len(), ?mode, "verifying");
    match mode {
        VerifyMode::Unordered => {
            run_counting(block, inner)?;
        }
        VerifyMode::Ordered => {
            // Whole-log counting applies in ordered mode too; the cursor
            // walk only adds the sequencing requirement.
            run_counting(block, inner)?;
            run_ordered(block, inner)?;
        }
        VerifyMode::Full => {
            let matched = run_counting(block, inner)?;
            check_closure(&matched, inner)?;
        }
    }
    check_recorded_minimums(inner)
}

/// Count matching log entries per clause, in isolation from the other
/// clauses.  Returns the per-clause match bookkeeping, discarded at block
/// end.
fn run_counting(
    block: &VerifyBlock,
    inner: &ScopeInner,
) -> Result<Vec<Vec<usize>>, MockError> {
    let mut matched: Vec<Vec<usize>> = Vec::with_capacity(block.clauses.len());
    for clause in &block.clauses {
        let mut seqs = Vec::new();
        for entry in &inner.log {
            if clause.matches_entry(entry, &inner.classes) {
                clause.run_captures(&entry.call.args);
                seqs.push(entry.seq);
            }
        }
        matched.push(seqs);
    }

    for (clause, seqs) in block.clauses.iter().zip(matched.iter()) {
        if seqs.len() < clause.min {
            let detail = inner
                .log
                .iter()
                .find(|e| clause.matches_member(e))
                .map(|e| clause.explain_mismatch(e, &inner.classes))
                .unwrap_or_default();
            return Err(MockError::missing(
                clause.render(),
                clause.min,
                seqs.len(),
                detail,
            ));
        }
        if seqs.len() > clause.max {
            let excess = &inner.log[seqs[clause.max]];
            let detail = if clause.max == 0 {
                "expectation should not have been called".to_string()
            } else {
                format!("called more than {} times", clause.max)
            };
            return Err(MockError::unexpected(
                excess.call.to_string(),
                detail,
            ));
        }
    }
    Ok(matched)
}

/// Walk the clauses in written order with a log cursor.  Each clause
/// consumes its matching calls (up to its max) at or after the cursor; a
/// clause whose only matches lie before the cursor fails as an ordering
/// violation.  Counting against the whole log happens before this walk,
/// which is also where captures fire.
fn run_ordered(
    block: &VerifyBlock,
    inner: &ScopeInner,
) -> Result<(), MockError> {
    let mut cursor = 0usize;
    for clause in &block.clauses {
        let mut consumed = 0usize;
        let mut last_seq = None;
        for entry in &inner.log[cursor..] {
            if consumed == clause.max {
                break;
            }
            if clause.matches_entry(entry, &inner.classes) {
                consumed += 1;
                last_seq = Some(entry.seq);
            }
        }
        if consumed < clause.min {
            let skipped = inner.log[..cursor]
                .iter()
                .find(|e| clause.matches_entry(e, &inner.classes));
            if let Some(e) = skipped {
                return Err(MockError::unexpected(
                    e.call.to_string(),
                    format!(
                        "happened before the calls verified ahead of {}",
                        clause.render(),
                    ),
                ));
            }
            let detail = inner
                .log
                .iter()
                .find(|e| clause.matches_member(e))
                .map(|e| clause.explain_mismatch(e, &inner.classes))
                .unwrap_or_default();
            return Err(MockError::missing(
                clause.render(),
                clause.min,
                consumed,
                detail,
            ));
        }
        if let Some(seq) = last_seq {
            cursor = seq + 1;
        }
    }
    Ok(())
}

/// Full-verification closure: every replayed call must be matched by some
/// clause, or attributed to an expectation that declared explicit bounds
/// when it was recorded.
fn check_closure(
    matched: &[Vec<usize>],
    inner: &ScopeInner,
) -> Result<(), MockError> {
    let mut accounted = vec![false; inner.log.len()];
    for seqs in matched {
        for &s in seqs {
            accounted[s] = true;
        }
    }
    for entry in &inner.log {
        if accounted[entry.seq] {
            continue;
        }
        if let Attribution::Expectation(i) = entry.attribution {
            if inner.expectations.get(i).card.explicit {
                continue;
            }
        }
        return Err(MockError::unexpected(
            entry.call.to_string(),
            "call was not accounted for by the verification".to_string(),
        ));
    }
    Ok(())
}

/// Minimum bounds declared at recording time are a verification-time
/// failure, never a dispatch-time one.
pub(crate) fn check_recorded_minimums(
    inner: &ScopeInner,
) -> Result<(), MockError> {
    for e in inner.expectations.iter() {
        if e.superseded || e.card.is_satisfied() {
            continue;
        }
        return Err(MockError::missing(
            e.render(),
            e.card.min,
            e.card.observed(),
            String::new(),
        ));
    }
    Ok(())
}
