//! Values produced by parsers and handed to command handlers.

use std::{collections::BTreeMap, fmt};

use serde::Serialize;

use crate::ty::{FloatTy, Ty};

#[derive(Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Not supplied, or a nullable value that did not parse.
    Absent,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Char(char),
    Str(String),
    Enum { ty: String, case: String, discriminant: i64 },
    Seq(Vec<Value>),
    Record { ty: String, fields: BTreeMap<String, Value> },
}

impl Value {
    pub fn str(s: impl Into<String>) -> Value {
        Value::Str(s.into())
    }

    pub fn record<I, K>(ty: impl Into<String>, fields: I) -> Value
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let fields = fields.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Value::Record { ty: ty.into(), fields }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(it) => Some(*it),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(it) => Some(it),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(it) => Some(*it),
            Value::UInt(it) => i64::try_from(*it).ok(),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::Seq(it) => Some(it),
            _ => None,
        }
    }

    /// Reads a member for property predicates. Strings and sequences expose
    /// `is_empty`, records expose their fields.
    pub fn property(&self, name: &str) -> Option<Value> {
        match (self, name) {
            (Value::Str(it), "is_empty") => Some(Value::Bool(it.is_empty())),
            (Value::Seq(it), "is_empty") => Some(Value::Bool(it.is_empty())),
            (Value::Record { fields, .. }, _) => fields.get(name).cloned(),
            _ => None,
        }
    }

    /// Applies the implicit conversion from a callable's return value to the
    /// member type. Only numeric representations change.
    pub(crate) fn coerce(self, to: &Ty) -> Value {
        match (self, to) {
            (it, Ty::Nullable(inner)) => it.coerce(inner),
            (Value::Int(it), Ty::Float(_)) => Value::Float(it as f64),
            (Value::UInt(it), Ty::Float(_)) => Value::Float(it as f64),
            (Value::UInt(it), Ty::Int(int)) if int.is_signed() => Value::Int(it as i64),
            (Value::Float(it), Ty::Float(FloatTy::F32)) => Value::Float(it as f32 as f64),
            (it, _) => it,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Absent => f.write_str("absent"),
            Value::Bool(it) => fmt::Debug::fmt(it, f),
            Value::Int(it) => fmt::Debug::fmt(it, f),
            Value::UInt(it) => fmt::Debug::fmt(it, f),
            Value::Float(it) => fmt::Debug::fmt(it, f),
            Value::Char(it) => fmt::Debug::fmt(it, f),
            Value::Str(it) => fmt::Debug::fmt(it, f),
            Value::Enum { ty, case, .. } => write!(f, "{ty}::{case}"),
            Value::Seq(it) => f.debug_list().entries(it).finish(),
            Value::Record { ty, fields } => {
                let mut s = f.debug_struct(ty);
                for (name, value) in fields {
                    s.field(name, value);
                }
                s.finish()
            }
        }
    }
}

/// The literal form used in diagnostics.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(it) => f.write_str(it),
            Value::Enum { case, .. } => f.write_str(case),
            Value::Seq(it) => {
                let items = it.iter().map(|it| it.to_string()).collect::<Vec<_>>();
                write!(f, "[{}]", items.join(", "))
            }
            _ => fmt::Debug::fmt(self, f),
        }
    }
}
