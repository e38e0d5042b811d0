// vim: tw=80
//! Result production: queue indexing, type conversion, default values.

use std::collections::HashMap;
use std::sync::Arc;

use crate::expectation::ResultAction;
use crate::value::{SeqKind, TextClass, TypeDesc, Value};

/// The queue entry servicing the `k`-th (1-based) attributed call: entries
/// 1..N serve directly, and the last entry repeats for every later call.
pub(crate) fn next_action(
    results: &[ResultAction],
    k: usize,
) -> Option<&ResultAction> {
    if results.is_empty() {
        None
    } else {
        Some(&results[k.min(results.len()) - 1])
    }
}

/// Convert a recorded value into the declared return type.
///
/// The same conversion is run at recording time to reject incompatible
/// results, so replay-time failures indicate engine misuse rather than user
/// error.  The `Err` payload is a human-readable reason.
pub(crate) fn coerce(v: &Value, ret: &TypeDesc) -> Result<Value, String> {
    match ret {
        TypeDesc::Void => {
            Err("the member returns void".into())
        }
        TypeDesc::Bool => match v {
            Value::Bool(_) => Ok(v.clone()),
            _ => Err("only a boolean converts to boolean".into()),
        },
        TypeDesc::Char | TypeDesc::Byte | TypeDesc::Short | TypeDesc::Int
        | TypeDesc::Long | TypeDesc::Float | TypeDesc::Double => {
            cast_numeric(v, ret).ok_or_else(|| {
                format!("{} does not convert to {ret}", v.type_desc())
            })
        }
        TypeDesc::Str => match v {
            Value::Str(_) => Ok(v.clone()),
            _ => Err("only a String converts to String".into()),
        },
        TypeDesc::Text(class) => match v {
            Value::Text(c, _) if c == class => Ok(v.clone()),
            // Canonical string-based constructor.
            Value::Str(s) => Ok(Value::Text(*class, Arc::clone(s))),
            _ => Err(format!("only a String converts to {ret}")),
        },
        TypeDesc::Object(_) | TypeDesc::Unresolved => match v {
            Value::Null | Value::Ref(_) => Ok(v.clone()),
            _ => Err("a reference return needs a reference value".into()),
        },
        TypeDesc::Seq(kind) => match v {
            Value::Null => Ok(Value::Null),
            // A recorded container is returned as-is, identity preserved.
            Value::Seq(..) | Value::Array(..) => Ok(v.clone()),
            Value::Map(..) => {
                Err("a Map does not convert to a sequence".into())
            }
            element => {
                Ok(Value::Seq(*kind, Arc::new(vec![element.clone()])))
            }
        },
        TypeDesc::Map(kind) => match v {
            Value::Null => Ok(Value::Null),
            Value::Map(..) => Ok(v.clone()),
            Value::Seq(_, items) | Value::Array(_, items) => {
                let mut entries = Vec::with_capacity(items.len());
                for pair in items.iter() {
                    match pair {
                        Value::Seq(_, kv) | Value::Array(_, kv)
                            if kv.len() == 2 =>
                        {
                            entries.push((kv[0].clone(), kv[1].clone()));
                        }
                        _ => {
                            return Err(
                                "a Map result needs paired entries".into()
                            )
                        }
                    }
                }
                Ok(Value::Map(*kind, Arc::new(entries)))
            }
            _ => Err("a single element does not convert to a Map".into()),
        },
        TypeDesc::Array(component) => match v {
            Value::Null => Ok(Value::Null),
            Value::Array(..) | Value::Seq(..) => Ok(v.clone()),
            Value::Str(s) if **component == TypeDesc::Byte => {
                let bytes = s
                    .bytes()
                    .map(|b| Value::Byte(b as i8))
                    .collect::<Vec<_>>();
                Ok(Value::Array(TypeDesc::Byte, Arc::new(bytes)))
            }
            Value::Str(s) if **component == TypeDesc::Char => {
                let chars =
                    s.chars().map(Value::Char).collect::<Vec<_>>();
                Ok(Value::Array(TypeDesc::Char, Arc::new(chars)))
            }
            element => {
                let converted = coerce(element, component)?;
                Ok(Value::Array(
                    (**component).clone(),
                    Arc::new(vec![converted]),
                ))
            }
        },
    }
}

/// Recording-time compatibility check; shares the conversion code path so
/// the two can never disagree.
pub(crate) fn check_result(v: &Value, ret: &TypeDesc) -> Result<(), String> {
    coerce(v, ret).map(|_| ())
}

/// Whether an exact-matcher value is plausible for a declared parameter
/// type.  Null fits every reference-like parameter.
pub(crate) fn value_fits_param(v: &Value, param: &TypeDesc) -> bool {
    if v.is_null() {
        return !matches!(
            param,
            TypeDesc::Bool
                | TypeDesc::Char
                | TypeDesc::Byte
                | TypeDesc::Short
                | TypeDesc::Int
                | TypeDesc::Long
                | TypeDesc::Float
                | TypeDesc::Double
        );
    }
    match param {
        TypeDesc::Object(_) | TypeDesc::Unresolved => {
            matches!(v, Value::Ref(_))
        }
        p if p.is_numeric() => v.as_f64().is_some(),
        p => v.type_desc() == *p,
    }
}

/// Numeric widening (bit-preserving) and narrowing (`as`-cast truncation)
/// between primitive kinds, including `char` as an integral kind.
fn cast_numeric(v: &Value, ret: &TypeDesc) -> Option<Value> {
    if let Some(i) = v.as_i64() {
        Some(match ret {
            TypeDesc::Byte => Value::Byte(i as i8),
            TypeDesc::Short => Value::Short(i as i16),
            TypeDesc::Int => Value::Int(i as i32),
            TypeDesc::Long => Value::Long(i),
            TypeDesc::Float => Value::Float(i as f32),
            TypeDesc::Double => Value::Double(i as f64),
            TypeDesc::Char => Value::Char(char_from_bits(i)),
            _ => return None,
        })
    } else if let Some(f) = v.as_f64() {
        Some(match ret {
            TypeDesc::Byte => Value::Byte(f as i8),
            TypeDesc::Short => Value::Short(f as i16),
            TypeDesc::Int => Value::Int(f as i32),
            TypeDesc::Long => Value::Long(f as i64),
            TypeDesc::Float => match v {
                Value::Float(_) => v.clone(),
                _ => Value::Float(f as f32),
            },
            TypeDesc::Double => Value::Double(f),
            TypeDesc::Char => Value::Char(char_from_bits(f as i64)),
            _ => return None,
        })
    } else {
        None
    }
}

fn char_from_bits(i: i64) -> char {
    char::from_u32(u32::from(i as u16)).unwrap_or('\u{0}')
}

/// Default return values for calls with no recorded result.  Collection and
/// map defaults are per-scope singletons, so repeated calls observe the same
/// identity; arrays are freshly allocated zero-length instances every call.
#[derive(Default)]
pub(crate) struct Defaults {
    memo: HashMap<TypeDesc, Value>,
}

impl Defaults {
    pub(crate) fn value_for(&mut self, ret: &TypeDesc) -> Value {
        match ret {
            TypeDesc::Void => Value::Null,
            TypeDesc::Bool => Value::Bool(false),
            TypeDesc::Char => Value::Char('\u{0}'),
            TypeDesc::Byte => Value::Byte(0),
            TypeDesc::Short => Value::Short(0),
            TypeDesc::Int => Value::Int(0),
            TypeDesc::Long => Value::Long(0),
            TypeDesc::Float => Value::Float(0.0),
            TypeDesc::Double => Value::Double(0.0),
            TypeDesc::Str
            | TypeDesc::Text(_)
            | TypeDesc::Object(_)
            | TypeDesc::Unresolved => Value::Null,
            TypeDesc::Seq(kind) => {
                let kind = *kind;
                self.memo
                    .entry(ret.clone())
                    .or_insert_with(|| Value::Seq(kind, Arc::new(Vec::new())))
                    .clone()
            }
            TypeDesc::Map(kind) => {
                let kind = *kind;
                self.memo
                    .entry(ret.clone())
                    .or_insert_with(|| Value::Map(kind, Arc::new(Vec::new())))
                    .clone()
            }
            TypeDesc::Array(component) => {
                Value::Array((**component).clone(), Arc::new(Vec::new()))
            }
        }
    }
}
