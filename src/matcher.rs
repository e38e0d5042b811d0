// vim: tw=80
//! Argument matchers and their specificity rules.

use core::fmt::{self, Display};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use predicates::prelude::*;
use predicates_tree::CaseTreeExt;
use regex::Regex;

use crate::error::MockError;
use crate::value::{InstanceId, TypeDesc, Value};

/// Class registry used to resolve `InstanceOf` matchers against identity
/// tokens.  The scope owns the authoritative copy.
pub(crate) type ClassLookup = HashMap<InstanceId, Arc<str>>;

/// Shared sink for values observed by capture matchers.
#[derive(Clone, Debug, Default)]
pub struct Captor(Arc<Mutex<Vec<Value>>>);

impl Captor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all captured values, in observation order.
    pub fn values(&self) -> Vec<Value> {
        self.0.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, v: Value) {
        self.0.lock().unwrap().push(v);
    }
}

/// String-shape constraints, applied to the textual form of a value.
#[derive(Debug)]
pub enum StrPattern {
    Prefix(Arc<str>),
    Suffix(Arc<str>),
    Substring(Arc<str>),
    Regex(Regex),
}

impl StrPattern {
    fn matches(&self, text: &str) -> bool {
        match self {
            StrPattern::Prefix(p) => text.starts_with(&**p),
            StrPattern::Suffix(s) => text.ends_with(&**s),
            StrPattern::Substring(s) => text.contains(&**s),
            StrPattern::Regex(re) => re.is_match(text),
        }
    }
}

impl Display for StrPattern {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StrPattern::Prefix(p) => write!(f, "starts with \"{p}\""),
            StrPattern::Suffix(s) => write!(f, "ends with \"{s}\""),
            StrPattern::Substring(s) => write!(f, "contains \"{s}\""),
            StrPattern::Regex(re) => write!(f, "matches /{}/", re.as_str()),
        }
    }
}

/// One recorded constraint on one argument position.
pub enum ArgMatcher {
    /// Bitwise value equality.
    Exact(Value),
    /// Any value, including null.
    Any,
    /// Any value of the given kind, including null.  The kind is checked
    /// against the declared parameter type when the recording block ends.
    AnyOfKind(TypeDesc),
    /// Exactly this instance, by identity token.
    SameInstance(InstanceId),
    /// Any instance of the given class.
    InstanceOf(Arc<str>),
    /// A caller-supplied predicate, in the `predicates` crate's vocabulary.
    Pred(Box<dyn Predicate<Value> + Send>),
    /// `|observed - expected| <= delta` over numeric values.
    Tolerance { expected: f64, delta: f64 },
    Pattern(StrPattern),
    /// Always matches (unless kind-filtered); records the observed value
    /// into the captor as a side effect of a successful whole-call match.
    Capture { captor: Captor, kind: Option<TypeDesc> },
}

impl ArgMatcher {
    pub(crate) fn matches_in(&self, v: &Value, classes: &ClassLookup) -> bool {
        match self {
            ArgMatcher::Exact(e) => e.bit_eq(v),
            ArgMatcher::Any => true,
            ArgMatcher::AnyOfKind(kind) => {
                v.is_null() || kind_accepts(kind, v)
            }
            ArgMatcher::SameInstance(id) => {
                matches!(v, Value::Ref(other) if other == id)
            }
            ArgMatcher::InstanceOf(class) => match v {
                Value::Ref(id) => {
                    classes.get(id).is_some_and(|c| c == class)
                }
                _ => false,
            },
            ArgMatcher::Pred(p) => p.eval(v),
            ArgMatcher::Tolerance { expected, delta } => v
                .as_f64()
                .is_some_and(|n| (n - expected).abs() <= *delta),
            ArgMatcher::Pattern(p) => {
                v.as_text().is_some_and(|t| p.matches(t))
            }
            ArgMatcher::Capture { kind, .. } => match kind {
                None => true,
                Some(k) => v.is_null() || kind_accepts(k, v),
            },
        }
    }

    /// Record the observed value, if this is a capture matcher.  Called only
    /// after the whole call matched.
    pub(crate) fn capture(&self, v: &Value) {
        if let ArgMatcher::Capture { captor, .. } = self {
            captor.push(v.clone());
        }
    }

    /// Exact-value matchers outrank wildcards when breaking specificity
    /// ties between candidate expectations.
    pub(crate) fn is_exact(&self) -> bool {
        matches!(self, ArgMatcher::Exact(_) | ArgMatcher::SameInstance(_))
    }

    /// Verbatim pattern equality, used for the later-recording-overrides
    /// rule.  Opaque matchers (predicates, captures) never compare equal.
    pub(crate) fn same_pattern(&self, other: &ArgMatcher) -> bool {
        match (self, other) {
            (ArgMatcher::Exact(a), ArgMatcher::Exact(b)) => a.bit_eq(b),
            (ArgMatcher::Any, ArgMatcher::Any) => true,
            (ArgMatcher::AnyOfKind(a), ArgMatcher::AnyOfKind(b)) => a == b,
            (ArgMatcher::SameInstance(a), ArgMatcher::SameInstance(b)) => {
                a == b
            }
            (ArgMatcher::InstanceOf(a), ArgMatcher::InstanceOf(b)) => a == b,
            (
                ArgMatcher::Tolerance { expected: ea, delta: da },
                ArgMatcher::Tolerance { expected: eb, delta: db },
            ) => ea.to_bits() == eb.to_bits() && da.to_bits() == db.to_bits(),
            (ArgMatcher::Pattern(a), ArgMatcher::Pattern(b)) => {
                match (a, b) {
                    (StrPattern::Prefix(x), StrPattern::Prefix(y)) => x == y,
                    (StrPattern::Suffix(x), StrPattern::Suffix(y)) => x == y,
                    (StrPattern::Substring(x), StrPattern::Substring(y)) => {
                        x == y
                    }
                    (StrPattern::Regex(x), StrPattern::Regex(y)) => {
                        x.as_str() == y.as_str()
                    }
                    _ => false,
                }
            }
            _ => false,
        }
    }

    /// Whether two tolerance matchers admit a common value.  A later
    /// recording whose tolerance overlaps an earlier one supersedes it.
    pub(crate) fn tolerance_overlaps(&self, other: &ArgMatcher) -> bool {
        match (self, other) {
            (
                ArgMatcher::Tolerance { expected: ea, delta: da },
                ArgMatcher::Tolerance { expected: eb, delta: db },
            ) => (ea - eb).abs() <= da + db,
            _ => false,
        }
    }

    /// Human-readable mismatch explanation, used by verification
    /// diagnostics.  Predicate matchers render their case tree.
    pub(crate) fn explain(&self, v: &Value) -> String {
        match self {
            ArgMatcher::Pred(p) => match p.find_case(false, v) {
                Some(case) => format!("{}", case.tree()),
                None => String::new(),
            },
            other => format!("expected {other}, got {v}"),
        }
    }
}

impl Display for ArgMatcher {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ArgMatcher::Exact(v) => write!(f, "{v}"),
            ArgMatcher::Any => write!(f, "any"),
            ArgMatcher::AnyOfKind(k) => write!(f, "any {k}"),
            ArgMatcher::SameInstance(id) => write!(f, "same {id}"),
            ArgMatcher::InstanceOf(c) => write!(f, "instanceof {c}"),
            ArgMatcher::Pred(p) => write!(f, "{p}"),
            ArgMatcher::Tolerance { expected, delta } => {
                write!(f, "{expected} \u{00b1} {delta}")
            }
            ArgMatcher::Pattern(p) => write!(f, "{p}"),
            ArgMatcher::Capture { kind: None, .. } => write!(f, "capture"),
            ArgMatcher::Capture { kind: Some(k), .. } => {
                write!(f, "capture {k}")
            }
        }
    }
}

impl fmt::Debug for ArgMatcher {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ArgMatcher({self})")
    }
}

/// Kind acceptance for typed-any and kind-filtered capture matchers.
fn kind_accepts(kind: &TypeDesc, v: &Value) -> bool {
    match kind {
        TypeDesc::Object(_) | TypeDesc::Unresolved => {
            matches!(v, Value::Ref(_))
        }
        other => v.type_desc() == *other,
    }
}

/// Bitwise value equality.
pub fn eq(v: impl Into<Value>) -> ArgMatcher {
    ArgMatcher::Exact(v.into())
}

/// Any value, including null.
pub fn any() -> ArgMatcher {
    ArgMatcher::Any
}

/// Any value of the given kind (`anyInt`, `anyString`, ...), including null.
pub fn any_of(kind: TypeDesc) -> ArgMatcher {
    ArgMatcher::AnyOfKind(kind)
}

/// Exactly the instance behind `id`.
pub fn same(id: InstanceId) -> ArgMatcher {
    ArgMatcher::SameInstance(id)
}

/// Any instance of `class`.
pub fn instance_of(class: &str) -> ArgMatcher {
    ArgMatcher::InstanceOf(Arc::from(class))
}

/// Numeric equality within `delta`.
pub fn within(expected: f64, delta: f64) -> ArgMatcher {
    ArgMatcher::Tolerance { expected, delta }
}

pub fn starts_with(prefix: &str) -> ArgMatcher {
    ArgMatcher::Pattern(StrPattern::Prefix(Arc::from(prefix)))
}

pub fn ends_with(suffix: &str) -> ArgMatcher {
    ArgMatcher::Pattern(StrPattern::Suffix(Arc::from(suffix)))
}

pub fn contains(substring: &str) -> ArgMatcher {
    ArgMatcher::Pattern(StrPattern::Substring(Arc::from(substring)))
}

/// Regex match over the textual form of the value.
pub fn re_match(pattern: &str) -> Result<ArgMatcher, MockError> {
    let re = Regex::new(pattern)
        .map_err(|e| MockError::config(format!("bad regex: {e}")))?;
    Ok(ArgMatcher::Pattern(StrPattern::Regex(re)))
}

/// Capture every observed value for this position.
pub fn captures(captor: &Captor) -> ArgMatcher {
    ArgMatcher::Capture { captor: captor.clone(), kind: None }
}

/// Capture, restricted to values of the given kind.
pub fn captures_of(captor: &Captor, kind: TypeDesc) -> ArgMatcher {
    ArgMatcher::Capture { captor: captor.clone(), kind: Some(kind) }
}

/// Wrap a `predicates` predicate as a matcher.
pub fn pred<P>(p: P) -> ArgMatcher
where
    P: Predicate<Value> + Send + 'static,
{
    ArgMatcher::Pred(Box::new(p))
}

/// Wrap a plain function as a matcher.
pub fn where_fn<F>(f: F) -> ArgMatcher
where
    F: Fn(&Value) -> bool + Send + 'static,
{
    pred(predicate::function(f))
}

#[cfg(test)]
mod t {
    use super::*;

    fn no_classes() -> ClassLookup {
        ClassLookup::new()
    }

    #[test]
    fn exact_is_kind_strict() {
        let m = eq(5i32);
        assert!(m.matches_in(&Value::Int(5), &no_classes()));
        assert!(!m.matches_in(&Value::Long(5), &no_classes()));
        assert!(!m.matches_in(&Value::Int(6), &no_classes()));
    }

    #[test]
    fn typed_any_accepts_null() {
        let m = any_of(TypeDesc::Str);
        assert!(m.matches_in(&Value::Null, &no_classes()));
        assert!(m.matches_in(&Value::str("x"), &no_classes()));
        assert!(!m.matches_in(&Value::Int(1), &no_classes()));
    }

    #[test]
    fn tolerance() {
        let m = within(10.0, 0.5);
        assert!(m.matches_in(&Value::Double(10.4), &no_classes()));
        assert!(m.matches_in(&Value::Int(10), &no_classes()));
        assert!(!m.matches_in(&Value::Double(10.6), &no_classes()));
        assert!(!m.matches_in(&Value::str("10"), &no_classes()));
    }

    #[test]
    fn tolerance_overlap() {
        let a = within(10.0, 0.1);
        let b = within(10.15, 0.1);
        let c = within(11.0, 0.1);
        assert!(a.tolerance_overlaps(&b));
        assert!(!a.tolerance_overlaps(&c));
    }

    #[test]
    fn string_patterns() {
        let cl = no_classes();
        assert!(starts_with("ab").matches_in(&Value::str("abc"), &cl));
        assert!(ends_with("bc").matches_in(&Value::str("abc"), &cl));
        assert!(contains("b").matches_in(&Value::str("abc"), &cl));
        assert!(re_match("^a.c$").unwrap()
            .matches_in(&Value::str("abc"), &cl));
        assert!(!contains("z").matches_in(&Value::str("abc"), &cl));
        assert!(!contains("z").matches_in(&Value::Null, &cl));
    }

    #[test]
    fn capture_collects() {
        let c = Captor::new();
        let m = captures(&c);
        assert!(m.matches_in(&Value::Int(1), &no_classes()));
        m.capture(&Value::Int(1));
        m.capture(&Value::Int(2));
        assert_eq!(c.len(), 2);
        assert!(c.values()[1].bit_eq(&Value::Int(2)));
    }

    #[test]
    fn kind_filtered_capture_restricts() {
        let c = Captor::new();
        let m = captures_of(&c, TypeDesc::Int);
        assert!(m.matches_in(&Value::Int(1), &no_classes()));
        assert!(!m.matches_in(&Value::str("no"), &no_classes()));
    }

    #[test]
    fn instance_of_uses_registry() {
        let mut cl = ClassLookup::new();
        cl.insert(InstanceId(7), Arc::from("Service"));
        let m = instance_of("Service");
        assert!(m.matches_in(&Value::Ref(InstanceId(7)), &cl));
        assert!(!m.matches_in(&Value::Ref(InstanceId(8)), &cl));
    }

    #[test]
    fn verbatim_equality() {
        assert!(eq(1i32).same_pattern(&eq(1i32)));
        assert!(!eq(1i32).same_pattern(&eq(2i32)));
        assert!(any().same_pattern(&any()));
        assert!(!where_fn(|_| true).same_pattern(&where_fn(|_| true)));
    }

    #[test]
    fn predicate_matcher() {
        let m = where_fn(|v| matches!(v, Value::Int(n) if *n > 3));
        assert!(m.matches_in(&Value::Int(4), &no_classes()));
        assert!(!m.matches_in(&Value::Int(3), &no_classes()));
    }
}
