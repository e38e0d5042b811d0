// vim: tw=80
//! Call identity: who was called, which member, with what arguments.

use core::fmt::{self, Display};
use std::sync::Arc;

use crate::value::{InstanceId, TypeDesc, Value};

/// A member signature.  Member identity is `(name, params)`; the return type
/// drives result conversion and cascading.
#[derive(Clone, Debug)]
pub struct MethodSig {
    pub name: Arc<str>,
    pub params: Vec<TypeDesc>,
    pub ret: TypeDesc,
}

impl MethodSig {
    pub fn new(
        name: &str,
        params: impl Into<Vec<TypeDesc>>,
        ret: TypeDesc,
    ) -> Arc<Self> {
        Arc::new(MethodSig {
            name: Arc::from(name),
            params: params.into(),
            ret,
        })
    }

    /// Constructor signature for `class`.
    pub fn ctor(params: impl Into<Vec<TypeDesc>>) -> Arc<Self> {
        Self::new("<init>", params, TypeDesc::Void)
    }

    /// Member identity comparison: name and parameter types.
    pub fn same_member(&self, other: &MethodSig) -> bool {
        self.name == other.name && self.params == other.params
    }
}

impl Display for MethodSig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{p}")?;
        }
        write!(f, ")")
    }
}

/// A handle to a mock target created by the scope.  The identity token is
/// stable for the life of the scope.
#[derive(Clone, Debug)]
pub struct MockHandle {
    pub id: InstanceId,
    pub class: Arc<str>,
}

impl MockHandle {
    /// The handle's identity as an argument or result value.
    pub fn value(&self) -> Value {
        Value::Ref(self.id)
    }
}

/// The concrete target of an observed call.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Target {
    Instance(InstanceId),
    Static(Arc<str>),
}

/// The target constraint of a recorded expectation or verification clause.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TargetPattern {
    /// Exactly this instance.
    Instance(InstanceId),
    /// Any instance of the class.
    AnyOfClass(Arc<str>),
    /// The static side of the class.
    Static(Arc<str>),
}

impl TargetPattern {
    pub(crate) fn accepts(&self, target: &Target, class: &str) -> bool {
        match (self, target) {
            (TargetPattern::Instance(a), Target::Instance(b)) => a == b,
            (TargetPattern::AnyOfClass(c), Target::Instance(_)) => {
                &**c == class
            }
            (TargetPattern::Static(a), Target::Static(b)) => a == b,
            _ => false,
        }
    }
}

impl Display for TargetPattern {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TargetPattern::Instance(id) => write!(f, "{id}"),
            TargetPattern::AnyOfClass(c) => write!(f, "any {c}"),
            TargetPattern::Static(c) => write!(f, "{c}"),
        }
    }
}

/// One observed or recorded call, as delivered by the interception layer.
/// Immutable.
#[derive(Clone, Debug)]
pub struct CallDescriptor {
    pub target: Target,
    /// Runtime class of the target (declaring class for static members).
    pub class: Arc<str>,
    pub method: Arc<MethodSig>,
    pub args: Vec<Value>,
}

impl CallDescriptor {
    /// A call on a specific mock instance.
    pub fn on(
        handle: &MockHandle,
        method: &Arc<MethodSig>,
        args: impl Into<Vec<Value>>,
    ) -> Self {
        CallDescriptor {
            target: Target::Instance(handle.id),
            class: Arc::clone(&handle.class),
            method: Arc::clone(method),
            args: args.into(),
        }
    }

    /// A static-member call on `class`.
    pub fn on_static(
        class: &str,
        method: &Arc<MethodSig>,
        args: impl Into<Vec<Value>>,
    ) -> Self {
        let class: Arc<str> = Arc::from(class);
        CallDescriptor {
            target: Target::Static(Arc::clone(&class)),
            class,
            method: Arc::clone(method),
            args: args.into(),
        }
    }

    /// A call on an instance known only by identity token, e.g. a cascaded
    /// instance.
    pub fn on_instance(
        id: InstanceId,
        class: &Arc<str>,
        method: &Arc<MethodSig>,
        args: impl Into<Vec<Value>>,
    ) -> Self {
        CallDescriptor {
            target: Target::Instance(id),
            class: Arc::clone(class),
            method: Arc::clone(method),
            args: args.into(),
        }
    }
}

impl Display for CallDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}#{}(", self.class, self.method.name)?;
        for (i, a) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{a}")?;
        }
        write!(f, ")")
    }
}

/// An exception or error descriptor, thrown instead of returned.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Throwable {
    pub class: Arc<str>,
    pub message: Option<Arc<str>>,
}

impl Throwable {
    pub fn new(class: &str, message: &str) -> Self {
        Throwable {
            class: Arc::from(class),
            message: Some(Arc::from(message)),
        }
    }

    pub fn of(class: &str) -> Self {
        Throwable { class: Arc::from(class), message: None }
    }
}

impl Display for Throwable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.message {
            Some(m) => write!(f, "{}: {}", self.class, m),
            None => write!(f, "{}", self.class),
        }
    }
}

/// What the interception layer should inject back into the call frame.
#[derive(Clone, Debug)]
pub enum Outcome {
    Return(Value),
    Throw(Throwable),
    /// Forward to the real implementation, optionally with substituted
    /// arguments.
    Proceed { args: Option<Vec<Value>> },
}

impl Outcome {
    pub fn returned(&self) -> Option<&Value> {
        match self {
            Outcome::Return(v) => Some(v),
            _ => None,
        }
    }

    pub fn thrown(&self) -> Option<&Throwable> {
        match self {
            Outcome::Throw(t) => Some(t),
            _ => None,
        }
    }
}
