// vim: tw=80
//! A record/replay/verify expectation engine for mocking object-oriented
//! code under test.
//!
//! `mockling` is the language-neutral half of a mocking framework: it owns
//! expectations, argument matching, invocation accounting, result
//! production, and verification.  It never touches the mocked classes
//! themselves; an interception layer delivers each observed call as a
//! [`CallDescriptor`] and injects the [`Outcome`] the engine decides on.
//!
//! # Lifecycle
//!
//! Each test owns one [`TestScope`], which moves forward through three
//! phases and never back:
//!
//! * **Recording** - expectations are declared in [recording
//!   blocks](TestScope::record) against mock handles.
//! * **Replay** - entered by the first [`dispatch`](TestScope::dispatch).
//!   Every call is matched against the recorded expectations, counted, and
//!   answered.
//! * **Verification** - [`verify`](TestScope::verify) blocks (or a final
//!   [`finish`](TestScope::finish)) check the replay log against the
//!   stated requirements.
//!
//! # Getting started
//!
//! ```
//! use mockling::{matcher, CallDescriptor, MethodSig, TestScope, TypeDesc,
//!                Value};
//!
//! let scope = TestScope::new();
//! let dep = scope.new_mock("Dependency");
//! let greet = MethodSig::new("greet", [TypeDesc::Str], TypeDesc::Str);
//!
//! scope.record(|r| {
//!     r.expect(&dep, &greet)
//!         .with(vec![matcher::eq("world")])
//!         .result("hello");
//! }).unwrap();
//!
//! let call = CallDescriptor::on(&dep, &greet, [Value::str("world")]);
//! let out = scope.dispatch(call).unwrap();
//! assert!(out.returned().unwrap().bit_eq(&Value::str("hello")));
//!
//! scope.verify(|v| {
//!     v.expect(&dep, &greet).once();
//! }).unwrap();
//! ```
//!
//! # Matching arguments
//!
//! Each parameter position takes one [`ArgMatcher`](matcher::ArgMatcher):
//! exact values ([`matcher::eq`]), wildcards ([`matcher::any`],
//! [`matcher::any_of`]), identity ([`matcher::same`],
//! [`matcher::instance_of`]), numeric tolerance ([`matcher::within`]),
//! string shapes ([`matcher::starts_with`] and friends), captures
//! ([`matcher::captures`]), or arbitrary predicates from the `predicates`
//! crate ([`matcher::pred`], [`matcher::where_fn`]).  Alternatively
//! `withf` constrains the whole argument list at once.
//!
//! When several expectations match one call, patterns made only of exact
//! matchers outrank patterns containing any wildcard, and recording order
//! breaks the remaining ties in favor of the earliest.  Re-recording a
//! pattern verbatim replaces the earlier recording.
//!
//! # Results
//!
//! An expectation carries a queue of results: fixed values
//! ([`result`](Expectation::result)), exceptions
//! ([`throws`](Expectation::throws)), forwards to the real implementation
//! ([`proceeds`](Expectation::proceeds)), or delegate closures
//! ([`calls`](Expectation::calls)).  The n-th matched call consumes the
//! n-th entry; past the end, the last entry repeats.  Declared return
//! types drive value conversion, so an `i32` result recorded for a `long`
//! member widens on the way out.
//!
//! A matched expectation with an empty queue answers with the type's
//! default value, or with a *cascaded* stand-in instance when the return
//! type is itself mockable.  Cascaded instances are memoized per member
//! and argument list, so chained calls like `a.b().c()` see stable
//! intermediates without any stubbing.
//!
//! ```
//! use mockling::{CallDescriptor, MethodSig, TestScope, Throwable,
//!                TypeDesc, Value};
//!
//! let scope = TestScope::new();
//! let repo = scope.new_mock("Repo");
//! let find = MethodSig::new("find", [TypeDesc::Int], TypeDesc::Str);
//!
//! scope.record(|r| {
//!     r.expect(&repo, &find)
//!         .result("first")
//!         .throws(Throwable::new("NotFound", "gone"));
//! }).unwrap();
//!
//! let call = |n| CallDescriptor::on(&repo, &find, [Value::Int(n)]);
//! assert!(scope.dispatch(call(1)).unwrap().returned().is_some());
//! assert!(scope.dispatch(call(2)).unwrap().thrown().is_some());
//! // The queue tail repeats.
//! assert!(scope.dispatch(call(3)).unwrap().thrown().is_some());
//! scope.finish().unwrap();
//! ```
//!
//! # Verification
//!
//! [`verify`](TestScope::verify) checks call counts per clause,
//! [`verify_ordered`](TestScope::verify_ordered) additionally requires
//! clause order to agree with call chronology, and
//! [`verify_all`](TestScope::verify_all) requires every replayed call to
//! be accounted for.  Bounds recorded on expectations themselves
//! ([`times`](Expectation::times), [`min_times`](Expectation::min_times))
//! are enforced at verification too; maximums fail fast at dispatch.

pub mod matcher;

mod cascade;
mod descriptor;
mod error;
mod expectation;
mod produce;
mod scope;
mod value;
mod verify;

pub use crate::cascade::CascadeConfig;
pub use crate::descriptor::{
    CallDescriptor, MethodSig, MockHandle, Outcome, Target, TargetPattern,
    Throwable,
};
pub use crate::error::MockError;
pub use crate::expectation::{
    DelegateCall, DelegateFn, Expectation, RecordingBlock, ResultAction,
};
pub use crate::matcher::Captor;
pub use crate::scope::TestScope;
pub use crate::value::{
    InstanceId, MapKind, SeqKind, TextClass, TypeDesc, Value,
};
pub use crate::verify::{Clause, VerifyBlock};

pub use predicates::prelude::{predicate, Predicate};
