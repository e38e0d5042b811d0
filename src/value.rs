// vim: tw=80
//! The dynamic value model.
//!
//! The interception layer delivers already-parsed argument and result values
//! to the engine.  `Value` is their runtime representation and `TypeDesc`
//! describes the declared types of a member's signature.  Container values
//! share their payload through an `Arc` so that identity-preserving returns
//! (and the empty-collection default singletons) are observable with
//! [`Value::same_identity`].

use core::fmt::{self, Display};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Opaque identity token assigned to every mock target and cascaded instance
/// at creation.  Compared by value, never dereferenced.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct InstanceId(pub(crate) u64);

impl Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Sequence-like container kinds.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SeqKind {
    List,
    Set,
    SortedSet,
    Iterator,
    ListIterator,
    Iterable,
}

/// Map-like container kinds.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MapKind {
    Map,
    SortedMap,
}

/// Reference types constructed from a single string, used for textual result
/// conversions.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TextClass {
    StringBuilder,
    StringReader,
    ByteArrayInputStream,
}

impl TextClass {
    fn name(&self) -> &'static str {
        match self {
            TextClass::StringBuilder => "StringBuilder",
            TextClass::StringReader => "StringReader",
            TextClass::ByteArrayInputStream => "ByteArrayInputStream",
        }
    }
}

/// A declared type in a member signature.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum TypeDesc {
    Void,
    Bool,
    Char,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Str,
    Text(TextClass),
    /// A reference type, by class name.  Mockable unless denylisted.
    Object(Arc<str>),
    Seq(SeqKind),
    Map(MapKind),
    /// Array with the given component type.  Nesting expresses
    /// multidimensional arrays.
    Array(Box<TypeDesc>),
    /// A generic type parameter that could not be resolved to a concrete
    /// class.  Cascading falls back to `Null` for these.
    Unresolved,
}

impl TypeDesc {
    /// Shorthand for `TypeDesc::Object`.
    pub fn object(class: &str) -> Self {
        TypeDesc::Object(Arc::from(class))
    }

    /// Shorthand for a one-dimensional array type.
    pub fn array(component: TypeDesc) -> Self {
        TypeDesc::Array(Box::new(component))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            TypeDesc::Byte
                | TypeDesc::Short
                | TypeDesc::Int
                | TypeDesc::Long
                | TypeDesc::Float
                | TypeDesc::Double
        )
    }

    pub fn is_textual(&self) -> bool {
        matches!(self, TypeDesc::Str | TypeDesc::Text(_))
    }
}

impl Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TypeDesc::Void => write!(f, "void"),
            TypeDesc::Bool => write!(f, "boolean"),
            TypeDesc::Char => write!(f, "char"),
            TypeDesc::Byte => write!(f, "byte"),
            TypeDesc::Short => write!(f, "short"),
            TypeDesc::Int => write!(f, "int"),
            TypeDesc::Long => write!(f, "long"),
            TypeDesc::Float => write!(f, "float"),
            TypeDesc::Double => write!(f, "double"),
            TypeDesc::Str => write!(f, "String"),
            TypeDesc::Text(t) => write!(f, "{}", t.name()),
            TypeDesc::Object(c) => write!(f, "{c}"),
            TypeDesc::Seq(SeqKind::List) => write!(f, "List"),
            TypeDesc::Seq(SeqKind::Set) => write!(f, "Set"),
            TypeDesc::Seq(SeqKind::SortedSet) => write!(f, "SortedSet"),
            TypeDesc::Seq(SeqKind::Iterator) => write!(f, "Iterator"),
            TypeDesc::Seq(SeqKind::ListIterator) => write!(f, "ListIterator"),
            TypeDesc::Seq(SeqKind::Iterable) => write!(f, "Iterable"),
            TypeDesc::Map(MapKind::Map) => write!(f, "Map"),
            TypeDesc::Map(MapKind::SortedMap) => write!(f, "SortedMap"),
            TypeDesc::Array(c) => write!(f, "{c}[]"),
            TypeDesc::Unresolved => write!(f, "?"),
        }
    }
}

/// A runtime value observed in a call or recorded as a result.
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Char(char),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(Arc<str>),
    /// A string-constructed stand-in object, e.g. a `StringReader` built
    /// from recorded text.
    Text(TextClass, Arc<str>),
    /// A mock target or cascaded instance, by identity token.
    Ref(InstanceId),
    Seq(SeqKind, Arc<Vec<Value>>),
    Map(MapKind, Arc<Vec<(Value, Value)>>),
    /// Array value: component type plus elements.
    Array(TypeDesc, Arc<Vec<Value>>),
}

impl Value {
    pub fn str(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }

    pub fn list(items: impl Into<Vec<Value>>) -> Self {
        Value::Seq(SeqKind::List, Arc::new(items.into()))
    }

    pub fn set(items: impl Into<Vec<Value>>) -> Self {
        Value::Seq(SeqKind::Set, Arc::new(items.into()))
    }

    pub fn map(entries: impl Into<Vec<(Value, Value)>>) -> Self {
        Value::Map(MapKind::Map, Arc::new(entries.into()))
    }

    pub fn array(component: TypeDesc, items: impl Into<Vec<Value>>) -> Self {
        Value::Array(component, Arc::new(items.into()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The numeric magnitude of this value, if it has one.  `Char` widens to
    /// its code point, matching primitive widening rules.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Byte(n) => Some(f64::from(*n)),
            Value::Short(n) => Some(f64::from(*n)),
            Value::Int(n) => Some(f64::from(*n)),
            Value::Long(n) => Some(*n as f64),
            Value::Float(n) => Some(f64::from(*n)),
            Value::Double(n) => Some(*n),
            Value::Char(c) => Some(f64::from(*c as u32)),
            _ => None,
        }
    }

    /// The integral magnitude, for exact widening/narrowing casts.
    pub(crate) fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Byte(n) => Some(i64::from(*n)),
            Value::Short(n) => Some(i64::from(*n)),
            Value::Int(n) => Some(i64::from(*n)),
            Value::Long(n) => Some(*n),
            Value::Char(c) => Some(i64::from(*c as u32)),
            _ => None,
        }
    }

    /// The textual form of string-like values.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            Value::Text(_, s) => Some(s),
            _ => None,
        }
    }

    /// The declared-type description best matching this value, used in
    /// configuration-error messages.
    pub fn type_desc(&self) -> TypeDesc {
        match self {
            Value::Null => TypeDesc::Unresolved,
            Value::Bool(_) => TypeDesc::Bool,
            Value::Char(_) => TypeDesc::Char,
            Value::Byte(_) => TypeDesc::Byte,
            Value::Short(_) => TypeDesc::Short,
            Value::Int(_) => TypeDesc::Int,
            Value::Long(_) => TypeDesc::Long,
            Value::Float(_) => TypeDesc::Float,
            Value::Double(_) => TypeDesc::Double,
            Value::Str(_) => TypeDesc::Str,
            Value::Text(t, _) => TypeDesc::Text(*t),
            Value::Ref(_) => TypeDesc::object("<mock>"),
            Value::Seq(k, _) => TypeDesc::Seq(*k),
            Value::Map(k, _) => TypeDesc::Map(*k),
            Value::Array(c, _) => TypeDesc::Array(Box::new(c.clone())),
        }
    }

    /// Structural equality with bit-for-bit float comparison.  Used by exact
    /// matchers and cascade memo keys, where `NaN == NaN` must hold so that
    /// repeated equal calls key identically.
    pub fn bit_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Short(a), Value::Short(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Text(ta, a), Value::Text(tb, b)) => ta == tb && a == b,
            (Value::Ref(a), Value::Ref(b)) => a == b,
            (Value::Seq(ka, a), Value::Seq(kb, b)) => {
                ka == kb
                    && a.len() == b.len()
                    && a.iter().zip(b.iter()).all(|(x, y)| x.bit_eq(y))
            }
            (Value::Map(ka, a), Value::Map(kb, b)) => {
                ka == kb
                    && a.len() == b.len()
                    && a.iter().zip(b.iter()).all(|((xk, xv), (yk, yv))| {
                        xk.bit_eq(yk) && xv.bit_eq(yv)
                    })
            }
            (Value::Array(ca, a), Value::Array(cb, b)) => {
                ca == cb
                    && a.len() == b.len()
                    && a.iter().zip(b.iter()).all(|(x, y)| x.bit_eq(y))
            }
            _ => false,
        }
    }

    /// Whether two container values share the same payload allocation.
    pub fn same_identity(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Seq(ka, a), Value::Seq(kb, b)) => {
                ka == kb && Arc::ptr_eq(a, b)
            }
            (Value::Map(ka, a), Value::Map(kb, b)) => {
                ka == kb && Arc::ptr_eq(a, b)
            }
            (Value::Array(ca, a), Value::Array(cb, b)) => {
                ca == cb && Arc::ptr_eq(a, b)
            }
            (Value::Ref(a), Value::Ref(b)) => a == b,
            _ => false,
        }
    }

    fn bit_hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Char(c) => c.hash(state),
            Value::Byte(n) => n.hash(state),
            Value::Short(n) => n.hash(state),
            Value::Int(n) => n.hash(state),
            Value::Long(n) => n.hash(state),
            Value::Float(n) => n.to_bits().hash(state),
            Value::Double(n) => n.to_bits().hash(state),
            Value::Str(s) => s.hash(state),
            Value::Text(t, s) => {
                t.hash(state);
                s.hash(state);
            }
            Value::Ref(id) => id.hash(state),
            Value::Seq(k, items) => {
                k.hash(state);
                for v in items.iter() {
                    v.bit_hash(state);
                }
            }
            Value::Map(k, entries) => {
                k.hash(state);
                for (ek, ev) in entries.iter() {
                    ek.bit_hash(state);
                    ev.bit_hash(state);
                }
            }
            Value::Array(c, items) => {
                c.hash(state);
                for v in items.iter() {
                    v.bit_hash(state);
                }
            }
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Char(c) => write!(f, "'{c}'"),
            Value::Byte(n) => write!(f, "{n}"),
            Value::Short(n) => write!(f, "{n}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Long(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Double(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "\"{s}\""),
            Value::Text(t, s) => write!(f, "{}(\"{s}\")", t.name()),
            Value::Ref(id) => write!(f, "{id}"),
            Value::Seq(_, items) => {
                write!(f, "[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Value::Map(_, entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}={v}")?;
                }
                write!(f, "}}")
            }
            Value::Array(_, items) => {
                write!(f, "[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<char> for Value {
    fn from(v: char) -> Self {
        Value::Char(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::Byte(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Short(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(Arc::from(v))
    }
}

impl From<InstanceId> for Value {
    fn from(v: InstanceId) -> Self {
        Value::Ref(v)
    }
}

/// Hashable key over a sequence of values, with bitwise float semantics.
/// Used by the cascade memo.
#[derive(Clone, Debug)]
pub(crate) struct ValueKey(pub Vec<Value>);

impl PartialEq for ValueKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len()
            && self.0.iter().zip(other.0.iter()).all(|(a, b)| a.bit_eq(b))
    }
}

impl Eq for ValueKey {}

impl Hash for ValueKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for v in &self.0 {
            v.bit_hash(state);
        }
    }
}
