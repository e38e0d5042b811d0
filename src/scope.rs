// vim: tw=80
//! The per-test scope: phase lifecycle, the dispatcher, and the replay log.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, trace};

use crate::cascade::{CascadeConfig, CascadeKey};
use crate::descriptor::{CallDescriptor, MockHandle, Outcome, Target};
use crate::error::MockError;
use crate::expectation::{
    DelegateCall, DelegateFn, ExpectationSet, RecordingBlock, ResultAction,
};
use crate::matcher::ClassLookup;
use crate::produce::{self, Defaults};
use crate::value::{InstanceId, TypeDesc, Value};
use crate::verify::{self, VerifyBlock, VerifyMode};

/// Strictly forward-moving lifecycle of a scope.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Phase {
    Recording,
    Replay,
    Verification,
}

/// Which expectation a replayed call was attributed to, decided once at
/// dispatch and never revisited.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Attribution {
    /// Index into the scope's expectation set.
    Expectation(usize),
    /// No recorded expectation; serviced with the default return value.
    Implicit,
    /// No recorded expectation; serviced with a cascaded instance.
    Cascade,
}

/// One replayed call, in dispatch order.
pub(crate) struct LogEntry {
    pub(crate) seq: usize,
    pub(crate) call: CallDescriptor,
    pub(crate) attribution: Attribution,
}

pub(crate) struct ScopeInner {
    pub(crate) phase: Phase,
    pub(crate) expectations: ExpectationSet,
    pub(crate) log: Vec<LogEntry>,
    /// Classes of every known instance, mocks and cascades alike.
    pub(crate) classes: ClassLookup,
    cascades: HashMap<CascadeKey, InstanceId>,
    defaults: Defaults,
    config: CascadeConfig,
    next_id: u64,
}

/// A dispatch decision made under the scope lock.  Delegates run after the
/// lock is released, so a delegate may block, join threads, or reenter the
/// dispatcher without deadlocking the engine.
enum Decision {
    Ready(Outcome),
    RunDelegate {
        delegate: Arc<DelegateFn>,
        args: Vec<Value>,
        invocation: usize,
        target: Target,
    },
}

/// All engine state for one test execution.
///
/// Recording and verification happen on the test's main thread; `dispatch`
/// may be called concurrently from any thread during replay.  The scope is
/// discarded at the end of the test.
pub struct TestScope {
    inner: Mutex<ScopeInner>,
}

impl Default for TestScope {
    fn default() -> Self {
        Self::with_config(CascadeConfig::default())
    }
}

impl TestScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CascadeConfig) -> Self {
        TestScope {
            inner: Mutex::new(ScopeInner {
                phase: Phase::Recording,
                expectations: ExpectationSet::default(),
                log: Vec::new(),
                classes: ClassLookup::new(),
                cascades: HashMap::new(),
                defaults: Defaults::default(),
                config,
                next_id: 0,
            }),
        }
    }

    /// Create a mock target of `class` with a fresh identity token.
    pub fn new_mock(&self, class: &str) -> MockHandle {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.alloc_id();
        let class: Arc<str> = Arc::from(class);
        inner.classes.insert(id, Arc::clone(&class));
        MockHandle { id, class }
    }

    /// The class of a known instance, e.g. a cascaded one returned during
    /// replay.
    pub fn class_of(&self, id: InstanceId) -> Option<Arc<str>> {
        self.inner.lock().unwrap().classes.get(&id).cloned()
    }

    /// Run a recording block.  Expectations are validated against their
    /// member signatures when the block ends and published atomically.
    pub fn record<F>(&self, f: F) -> Result<(), MockError>
    where
        F: FnOnce(&mut RecordingBlock),
    {
        let mut block = RecordingBlock::new();
        f(&mut block);
        let entries = block.finish()?;
        let mut inner = self.inner.lock().unwrap();
        if inner.phase != Phase::Recording {
            return Err(MockError::config(
                "cannot record expectations after replay has begun",
            ));
        }
        for e in entries {
            trace!(pattern = %e.render(), "recorded expectation");
            inner.expectations.push(e);
        }
        Ok(())
    }

    /// Dispatch one observed call: match it to an expectation (or cascade,
    /// or implicit default) and produce the outcome to inject back.
    pub fn dispatch(
        &self,
        call: CallDescriptor,
    ) -> Result<Outcome, MockError> {
        let decision = {
            let mut inner = self.inner.lock().unwrap();
            inner.dispatch_locked(call)?
        };
        match decision {
            Decision::Ready(outcome) => Ok(outcome),
            Decision::RunDelegate { delegate, args, invocation, target } => {
                let ctx = DelegateCall { args: &args, invocation, target };
                // Lock already released; delegate failures propagate as-is
                // through the returned outcome.
                Ok(delegate(&ctx))
            }
        }
    }

    /// Unordered verification block.
    pub fn verify<F>(&self, f: F) -> Result<(), MockError>
    where
        F: FnOnce(&mut VerifyBlock),
    {
        self.run_verification(f, VerifyMode::Unordered)
    }

    /// Ordered verification: clause order must agree with call chronology.
    pub fn verify_ordered<F>(&self, f: F) -> Result<(), MockError>
    where
        F: FnOnce(&mut VerifyBlock),
    {
        self.run_verification(f, VerifyMode::Ordered)
    }

    /// Full verification: unordered, plus no replayed call may remain
    /// unaccounted for.
    pub fn verify_all<F>(&self, f: F) -> Result<(), MockError>
    where
        F: FnOnce(&mut VerifyBlock),
    {
        self.run_verification(f, VerifyMode::Full)
    }

    /// Check recorded minimum bounds for tests that never open a
    /// verification block.
    pub fn finish(&self) -> Result<(), MockError> {
        let mut inner = self.inner.lock().unwrap();
        inner.phase = Phase::Verification;
        verify::check_recorded_minimums(&inner)
    }

    fn run_verification<F>(
        &self,
        f: F,
        mode: VerifyMode,
    ) -> Result<(), MockError>
    where
        F: FnOnce(&mut VerifyBlock),
    {
        let mut block = VerifyBlock::new();
        f(&mut block);
        let mut inner = self.inner.lock().unwrap();
        inner.phase = Phase::Verification;
        verify::run(&block, mode, &inner)
    }
}

impl ScopeInner {
    fn alloc_id(&mut self) -> InstanceId {
        let id = InstanceId(self.next_id);
        self.next_id += 1;
        id
    }

    fn dispatch_locked(
        &mut self,
        call: CallDescriptor,
    ) -> Result<Decision, MockError> {
        match self.phase {
            Phase::Recording => {
                trace!("first dispatch, entering replay");
                self.phase = Phase::Replay;
            }
            Phase::Replay => {}
            Phase::Verification => {
                return Err(MockError::config(format!(
                    "dispatch of {call} after verification has begun",
                )));
            }
        }
        let seq = self.log.len();
        match self.expectations.select(&call, &self.classes) {
            Some(idx) => {
                let counted = self.expectations.get(idx).card.record_call();
                self.log.push(LogEntry {
                    seq,
                    call: call.clone(),
                    attribution: Attribution::Expectation(idx),
                });
                let k = match counted {
                    Ok(k) => k,
                    Err(detail) => {
                        debug!(%call, "unexpected invocation");
                        return Err(MockError::unexpected(
                            call.to_string(),
                            detail,
                        ));
                    }
                };
                let (action, ret, wildcard) = {
                    let e = self.expectations.get(idx);
                    trace!(pattern = %e.render(), invocation = k, "matched");
                    e.run_captures(&call.args);
                    (
                        produce::next_action(&e.results, k).cloned(),
                        e.method.ret.clone(),
                        e.has_wildcards(),
                    )
                };
                match action {
                    Some(ResultAction::Return(v)) => {
                        let out = produce::coerce(&v, &ret)
                            .map_err(MockError::Config)?;
                        Ok(Decision::Ready(Outcome::Return(out)))
                    }
                    Some(ResultAction::Throw(t)) => {
                        Ok(Decision::Ready(Outcome::Throw(t)))
                    }
                    Some(ResultAction::Proceed(args)) => {
                        Ok(Decision::Ready(Outcome::Proceed { args }))
                    }
                    Some(ResultAction::Delegate(delegate)) => {
                        Ok(Decision::RunDelegate {
                            delegate,
                            args: call.args,
                            invocation: k,
                            target: call.target,
                        })
                    }
                    None => {
                        let out = self.unrecorded_result(&call, &ret, wildcard);
                        Ok(Decision::Ready(out))
                    }
                }
            }
            None => {
                let ret = call.method.ret.clone();
                if self.config.mockable_return(&ret).is_some() {
                    let id = self.cascade_for(&call, false);
                    self.log.push(LogEntry {
                        seq,
                        call,
                        attribution: Attribution::Cascade,
                    });
                    Ok(Decision::Ready(Outcome::Return(Value::Ref(id))))
                } else {
                    let v = self.defaults.value_for(&ret);
                    trace!(%call, "implicit expectation, default result");
                    self.log.push(LogEntry {
                        seq,
                        call,
                        attribution: Attribution::Implicit,
                    });
                    Ok(Decision::Ready(Outcome::Return(v)))
                }
            }
        }
    }

    /// Result for a matched expectation with an empty result queue: cascade
    /// when the return type is mockable, default value otherwise.
    fn unrecorded_result(
        &mut self,
        call: &CallDescriptor,
        ret: &TypeDesc,
        wildcard_pattern: bool,
    ) -> Outcome {
        if self.config.mockable_return(ret).is_some() {
            let id = self.cascade_for(call, wildcard_pattern);
            Outcome::Return(Value::Ref(id))
        } else {
            Outcome::Return(self.defaults.value_for(ret))
        }
    }

    fn cascade_for(
        &mut self,
        call: &CallDescriptor,
        wildcard_pattern: bool,
    ) -> InstanceId {
        let key = if wildcard_pattern {
            CascadeKey::keyed_by_member(call)
        } else {
            CascadeKey::keyed_by_args(call)
        };
        if let Some(id) = self.cascades.get(&key) {
            return *id;
        }
        let class = self
            .config
            .mockable_return(&call.method.ret)
            .map(Arc::clone)
            .unwrap_or_else(|| Arc::clone(&call.class));
        let id = self.alloc_id();
        debug!(%call, instance = %id, %class, "cascaded new instance");
        self.classes.insert(id, class);
        self.cascades.insert(key, id);
        id
    }
}
