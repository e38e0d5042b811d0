// vim: tw=80
//! Recorded expectations: invocation patterns, result queues, cardinality.

use core::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use fragile::Fragile;

use crate::descriptor::{
    CallDescriptor, MethodSig, MockHandle, Outcome, Target, TargetPattern,
    Throwable,
};
use crate::error::MockError;
use crate::matcher::{ArgMatcher, ClassLookup};
use crate::produce;
use crate::value::{TypeDesc, Value};

/// Invocation bounds plus the observed-call counter.
///
/// The permissive default (min 0, max unbounded) is the record-once,
/// allow-many pattern; `times`/`min_times`/`max_times` tighten it and mark
/// the bounds as explicit for full-verification accounting.
#[derive(Debug)]
pub(crate) struct Cardinality {
    count: AtomicUsize,
    pub(crate) min: usize,
    pub(crate) max: usize,
    pub(crate) explicit: bool,
}

impl Default for Cardinality {
    fn default() -> Self {
        Cardinality {
            count: AtomicUsize::new(0),
            min: 0,
            max: usize::MAX,
            explicit: false,
        }
    }
}

impl Cardinality {
    /// Count one attributed call.  Returns the new 1-based count, or the
    /// failure detail when the maximum is exceeded.
    pub(crate) fn record_call(&self) -> Result<usize, String> {
        let count = self.count.fetch_add(1, Ordering::Relaxed) + 1;
        if count > self.max {
            if self.max == 0 {
                Err("expectation should not have been called".into())
            } else {
                Err(format!("called more than {} times", self.max))
            }
        } else {
            Ok(count)
        }
    }

    pub(crate) fn observed(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    pub(crate) fn is_satisfied(&self) -> bool {
        self.observed() >= self.min
    }
}

/// The call context handed to a delegate.
pub struct DelegateCall<'a> {
    pub args: &'a [Value],
    /// 1-based count of calls attributed to the matched expectation,
    /// including this one.
    pub invocation: usize,
    pub target: Target,
}

impl DelegateCall<'_> {
    /// Forward to the real, unmocked implementation.
    pub fn proceed(&self) -> Outcome {
        Outcome::Proceed { args: None }
    }

    /// Forward to the real implementation with substituted arguments.
    pub fn proceed_with(&self, args: impl Into<Vec<Value>>) -> Outcome {
        Outcome::Proceed { args: Some(args.into()) }
    }
}

/// A user-supplied computation invoked in place of a fixed result.
pub type DelegateFn = dyn Fn(&DelegateCall<'_>) -> Outcome + Send + Sync;

/// One entry of an expectation's result queue.
#[derive(Clone)]
pub enum ResultAction {
    Return(Value),
    Throw(Throwable),
    Delegate(Arc<DelegateFn>),
    Proceed(Option<Vec<Value>>),
}

impl fmt::Debug for ResultAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ResultAction::Return(v) => write!(f, "Return({v})"),
            ResultAction::Throw(t) => write!(f, "Throw({t})"),
            ResultAction::Delegate(_) => write!(f, "Delegate"),
            ResultAction::Proceed(_) => write!(f, "Proceed"),
        }
    }
}

/// One recorded invocation pattern with its result queue and bounds.
pub struct Expectation {
    pub(crate) target: TargetPattern,
    pub(crate) method: Arc<MethodSig>,
    pub(crate) matchers: Vec<ArgMatcher>,
    pub(crate) args_pred: Option<Box<dyn Fn(&[Value]) -> bool + Send>>,
    pub(crate) results: Vec<ResultAction>,
    pub(crate) card: Cardinality,
    /// Position in recording order, across all recording blocks.
    pub(crate) order: usize,
    /// Replaced by a later verbatim re-recording; unreachable for dispatch.
    pub(crate) superseded: bool,
}

impl Expectation {
    pub(crate) fn new(target: TargetPattern, method: Arc<MethodSig>) -> Self {
        Expectation {
            target,
            method,
            matchers: Vec::new(),
            args_pred: None,
            results: Vec::new(),
            card: Cardinality::default(),
            order: 0,
            superseded: false,
        }
    }

    /// Set per-argument matchers, one per parameter.
    pub fn with(&mut self, matchers: impl Into<Vec<ArgMatcher>>) -> &mut Self {
        self.matchers = matchers.into();
        self
    }

    /// Set a whole-argument-list predicate.
    pub fn withf<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&[Value]) -> bool + Send + 'static,
    {
        self.args_pred = Some(Box::new(f));
        self
    }

    /// Queue one return value.  Consecutive calls build the result sequence.
    pub fn result(&mut self, v: impl Into<Value>) -> &mut Self {
        self.results.push(ResultAction::Return(v.into()));
        self
    }

    /// Queue several return values at once.
    pub fn results<V, I>(&mut self, vs: I) -> &mut Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        for v in vs {
            self.result(v);
        }
        self
    }

    /// Queue an exception to be thrown in place of a return value.  It is
    /// raised mid-sequence without disturbing the indexing of later entries.
    pub fn throws(&mut self, t: Throwable) -> &mut Self {
        self.results.push(ResultAction::Throw(t));
        self
    }

    /// Queue a delegate computation.
    pub fn calls<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&DelegateCall<'_>) -> Outcome + Send + Sync + 'static,
    {
        self.results.push(ResultAction::Delegate(Arc::new(f)));
        self
    }

    /// Single-threaded version of [`calls`](Self::calls).  Can be used when
    /// the closure isn't `Send`.
    ///
    /// It is a runtime error for the mocked member to be dispatched from a
    /// different thread than the one that recorded the delegate.
    pub fn calls_st<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&DelegateCall<'_>) -> Outcome + 'static,
    {
        let fragile = Fragile::new(f);
        self.calls(move |call| (fragile.get())(call))
    }

    /// Queue a forward to the real implementation.
    pub fn proceeds(&mut self) -> &mut Self {
        self.results.push(ResultAction::Proceed(None));
        self
    }

    /// Queue a forward to the real implementation with substituted
    /// arguments.
    pub fn proceeds_with(&mut self, args: impl Into<Vec<Value>>) -> &mut Self {
        self.results.push(ResultAction::Proceed(Some(args.into())));
        self
    }

    /// Require exactly `n` attributed calls.
    pub fn times(&mut self, n: usize) -> &mut Self {
        self.card.min = n;
        self.card.max = n;
        self.card.explicit = true;
        self
    }

    /// Require at least `n` attributed calls (checked at verification).
    pub fn min_times(&mut self, n: usize) -> &mut Self {
        self.card.min = n;
        self.card.explicit = true;
        self
    }

    /// Allow at most `n` attributed calls.
    pub fn max_times(&mut self, n: usize) -> &mut Self {
        self.card.max = n;
        self.card.explicit = true;
        self
    }

    /// Shortcut for [`times(1)`](Self::times).
    pub fn once(&mut self) -> &mut Self {
        self.times(1)
    }

    /// Forbid this expectation from ever being called.
    pub fn never(&mut self) -> &mut Self {
        self.times(0)
    }

    pub(crate) fn matches_call(
        &self,
        call: &CallDescriptor,
        classes: &ClassLookup,
    ) -> bool {
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

    pub(crate) fn run_captures(&self, args: &[Value]) {
        for (m, a) in self.matchers.iter().zip(args.iter()) {
            m.capture(a);
        }
    }

    /// Only exact-value matchers, so this expectation outranks wildcard
    /// patterns of equal recency.
    pub(crate) fn is_exact(&self) -> bool {
        !self.matchers.is_empty()
            && self.args_pred.is_none()
            && self.matchers.iter().all(ArgMatcher::is_exact)
    }

    /// Whether the pattern contains any non-exact matcher.  Cascading keys
    /// on the member alone in that case.
    pub(crate) fn has_wildcards(&self) -> bool {
        self.matchers.is_empty()
            || self.args_pred.is_some()
            || self.matchers.iter().any(|m| !m.is_exact())
    }

    /// Rendered pattern for failure messages.
    pub(crate) fn render(&self) -> String {
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

    /// Whether a later-recorded expectation supersedes this one: a verbatim
    /// re-recording of the same (target, member, matcher pattern), or a
    /// pattern differing only by overlapping numeric tolerances
    /// (last-recorded-wins).
    fn superseded_by(&self, later: &Expectation) -> bool {
        if self.target != later.target
            || !self.method.same_member(&later.method)
            || self.matchers.len() != later.matchers.len()
            || self.args_pred.is_some()
            || later.args_pred.is_some()
        {
            return false;
        }
        // Every position must be a verbatim repeat or an overlapping
        // tolerance; two empty matcher lists are a verbatim re-recording.
        self.matchers
            .iter()
            .zip(later.matchers.iter())
            .all(|(a, b)| a.same_pattern(b) || a.tolerance_overlaps(b))
    }

    fn validate(&self) -> Result<(), MockError> {
        let sig = &self.method;
        if !self.matchers.is_empty() && self.matchers.len() != sig.params.len()
        {
            return Err(MockError::config(format!(
                "{} matchers recorded for {} parameter(s) of {}",
                self.matchers.len(),
                sig.params.len(),
                sig,
            )));
        }
        for (m, p) in self.matchers.iter().zip(sig.params.iter()) {
            check_matcher(m, p, sig)?;
        }
        for action in &self.results {
            if let ResultAction::Return(v) = action {
                produce::check_result(v, &sig.ret).map_err(|reason| {
                    MockError::config(format!(
                        "incompatible result for {}: declared return type \
                         {}, recorded value of type {} ({})",
                        sig,
                        sig.ret,
                        v.type_desc(),
                        reason,
                    ))
                })?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Expectation({})", self.render())
    }
}

/// Matcher-vs-parameter type check, performed at recording time.
fn check_matcher(
    m: &ArgMatcher,
    param: &TypeDesc,
    sig: &MethodSig,
) -> Result<(), MockError> {
    let bad = |kind: &dyn fmt::Display| {
        Err(MockError::config(format!(
            "matcher of type {kind} recorded for {param} parameter of {sig}",
        )))
    };
    match m {
        ArgMatcher::AnyOfKind(kind) => {
            if kind_fits_param(kind, param) {
                Ok(())
            } else {
                bad(kind)
            }
        }
        ArgMatcher::Capture { kind: Some(kind), .. } => {
            if kind_fits_param(kind, param) {
                Ok(())
            } else {
                bad(kind)
            }
        }
        ArgMatcher::Tolerance { .. } => {
            if param.is_numeric() {
                Ok(())
            } else {
                bad(&"numeric tolerance")
            }
        }
        ArgMatcher::Pattern(_) => {
            if param.is_textual() {
                Ok(())
            } else {
                bad(&"string pattern")
            }
        }
        ArgMatcher::Exact(v) => {
            if produce::value_fits_param(v, param) {
                Ok(())
            } else {
                bad(&v.type_desc())
            }
        }
        ArgMatcher::SameInstance(_) | ArgMatcher::InstanceOf(_) => {
            match param {
                TypeDesc::Object(_) | TypeDesc::Unresolved => Ok(()),
                _ => bad(&"instance"),
            }
        }
        ArgMatcher::Any | ArgMatcher::Pred(_)
        | ArgMatcher::Capture { kind: None, .. } => Ok(()),
    }
}

fn kind_fits_param(kind: &TypeDesc, param: &TypeDesc) -> bool {
    match (kind, param) {
        (TypeDesc::Object(_), TypeDesc::Object(_)) => true,
        (TypeDesc::Object(_), TypeDesc::Unresolved) => true,
        (k, p) => k == p,
    }
}

/// Insertion-ordered collection of all expectations recorded for one scope.
#[derive(Default)]
pub(crate) struct ExpectationSet {
    items: Vec<Expectation>,
}

impl ExpectationSet {
    /// Append an expectation, superseding any earlier one the new pattern
    /// re-records verbatim (or overlaps by tolerance).
    pub(crate) fn push(&mut self, mut e: Expectation) {
        e.order = self.items.len();
        for old in &mut self.items {
            if !old.superseded && old.superseded_by(&e) {
                old.superseded = true;
            }
        }
        self.items.push(e);
    }

    /// Find the single expectation an observed call is attributed to:
    /// exact-only patterns outrank wildcard patterns, and recording order
    /// breaks remaining ties in favor of the earliest.
    pub(crate) fn select(
        &self,
        call: &CallDescriptor,
        classes: &ClassLookup,
    ) -> Option<usize> {
        let mut best: Option<(usize, bool)> = None;
        for (i, e) in self.items.iter().enumerate() {
            if e.superseded || !e.matches_call(call, classes) {
                continue;
            }
            let exact = e.is_exact();
            match best {
                None => best = Some((i, exact)),
                Some((_, false)) if exact => best = Some((i, exact)),
                _ => {}
            }
        }
        best.map(|(i, _)| i)
    }

    pub(crate) fn get(&self, i: usize) -> &Expectation {
        &self.items[i]
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Expectation> {
        self.items.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }
}

/// Accumulates the expectations of one recording block; they are validated
/// and published into the scope when the block ends.
#[derive(Default)]
pub struct RecordingBlock {
    entries: Vec<Expectation>,
}

impl RecordingBlock {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record an expectation against a specific mock instance.
    pub fn expect(
        &mut self,
        handle: &MockHandle,
        method: &Arc<MethodSig>,
    ) -> &mut Expectation {
        self.push(TargetPattern::Instance(handle.id), method)
    }

    /// Record an expectation against any instance of `class`.
    pub fn expect_any(
        &mut self,
        class: &str,
        method: &Arc<MethodSig>,
    ) -> &mut Expectation {
        self.push(TargetPattern::AnyOfClass(Arc::from(class)), method)
    }

    /// Record an expectation against a static member of `class`.
    pub fn expect_static(
        &mut self,
        class: &str,
        method: &Arc<MethodSig>,
    ) -> &mut Expectation {
        self.push(TargetPattern::Static(Arc::from(class)), method)
    }

    fn push(
        &mut self,
        target: TargetPattern,
        method: &Arc<MethodSig>,
    ) -> &mut Expectation {
        self.entries.push(Expectation::new(target, Arc::clone(method)));
        let l = self.entries.len();
        &mut self.entries[l - 1]
    }

    /// Validate every recorded expectation against its member signature and
    /// hand them over for publication.
    pub(crate) fn finish(self) -> Result<Vec<Expectation>, MockError> {
        for e in &self.entries {
            e.validate()?;
        }
        Ok(self.entries)
    }
}
