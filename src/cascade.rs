// vim: tw=80
//! Cascading: synthesizing stand-in instances for unmocked call chains.

use std::collections::HashSet;
use std::sync::Arc;

use crate::descriptor::CallDescriptor;
use crate::value::{TypeDesc, ValueKey};

/// Which reference types may be cascaded.
///
/// The engine cannot inspect external classes, so the interception layer
/// registers final and otherwise unmockable types here on top of the seeded
/// JRE denylist.  Collection and map types are excluded structurally (they
/// are not `TypeDesc::Object`), not through this list.
#[derive(Clone, Debug)]
pub struct CascadeConfig {
    denylist: HashSet<Arc<str>>,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        let seeded = [
            "Object",
            "Class",
            "ClassLoader",
            "Throwable",
            "Exception",
            "RuntimeException",
            "Error",
            "Thread",
            "ThreadGroup",
        ];
        CascadeConfig {
            denylist: seeded.iter().map(|s| Arc::from(*s)).collect(),
        }
    }
}

impl CascadeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a class unmockable (final types, system types).
    pub fn deny(&mut self, class: &str) -> &mut Self {
        self.denylist.insert(Arc::from(class));
        self
    }

    /// Remove a class from the denylist.
    pub fn allow(&mut self, class: &str) -> &mut Self {
        self.denylist.remove(class);
        self
    }

    /// The class to cascade into for a declared return type, if any.
    /// `Unresolved` generics fall back to a null return instead.
    pub(crate) fn mockable_return<'a>(
        &self,
        ret: &'a TypeDesc,
    ) -> Option<&'a Arc<str>> {
        match ret {
            TypeDesc::Object(class) if !self.denylist.contains(class) => {
                Some(class)
            }
            _ => None,
        }
    }
}

/// Memo key for cascaded instances: member identity plus the concrete
/// arguments (by bitwise value equality).  A wildcard-recorded pattern keys
/// on the member alone, so one instance services every call.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub(crate) struct CascadeKey {
    class: Arc<str>,
    member: Arc<str>,
    params: Vec<TypeDesc>,
    args: Option<ValueKey>,
}

impl CascadeKey {
    pub(crate) fn keyed_by_args(call: &CallDescriptor) -> Self {
        CascadeKey {
            class: Arc::clone(&call.class),
            member: Arc::clone(&call.method.name),
            params: call.method.params.clone(),
            args: Some(ValueKey(call.args.clone())),
        }
    }

    pub(crate) fn keyed_by_member(call: &CallDescriptor) -> Self {
        CascadeKey {
            class: Arc::clone(&call.class),
            member: Arc::clone(&call.method.name),
            params: call.method.params.clone(),
            args: None,
        }
    }
}
