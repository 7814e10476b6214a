//! Type identities of option and argument targets.
//!
//! `Ty` is what the front-end hands over as "the type of this member". It has
//! a small text syntax (`i32`, `string?`, `[PathBuf]`, `Point`) so that
//! descriptors stay plain data.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Ty {
    String,
    Path,
    OsString,
    Bool,
    Char,
    Int(IntTy),
    Float(FloatTy),
    Nullable(Box<Ty>),
    Seq(Box<Ty>),
    /// An enumeration or a user type known to the candidate lookup.
    Named(String),
    /// Generic parameter of a callable signature, never a member type.
    Param(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IntTy {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FloatTy {
    F32,
    F64,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid type `{0}`")]
pub struct ParseTyError(String);

impl IntTy {
    pub const ALL: [IntTy; 8] = [
        IntTy::I8,
        IntTy::I16,
        IntTy::I32,
        IntTy::I64,
        IntTy::U8,
        IntTy::U16,
        IntTy::U32,
        IntTy::U64,
    ];

    pub fn bits(self) -> u32 {
        match self {
            IntTy::I8 | IntTy::U8 => 8,
            IntTy::I16 | IntTy::U16 => 16,
            IntTy::I32 | IntTy::U32 => 32,
            IntTy::I64 | IntTy::U64 => 64,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(self, IntTy::I8 | IntTy::I16 | IntTy::I32 | IntTy::I64)
    }

    pub fn name(self) -> &'static str {
        match self {
            IntTy::I8 => "i8",
            IntTy::I16 => "i16",
            IntTy::I32 => "i32",
            IntTy::I64 => "i64",
            IntTy::U8 => "u8",
            IntTy::U16 => "u16",
            IntTy::U32 => "u32",
            IntTy::U64 => "u64",
        }
    }

    /// Every value of `self` fits into `to`.
    pub fn widens_to(self, to: IntTy) -> bool {
        match (self.is_signed(), to.is_signed()) {
            (true, true) | (false, false) => self.bits() <= to.bits(),
            (false, true) => self.bits() < to.bits(),
            (true, false) => false,
        }
    }
}

impl FloatTy {
    pub fn name(self) -> &'static str {
        match self {
            FloatTy::F32 => "f32",
            FloatTy::F64 => "f64",
        }
    }
}

impl Ty {
    pub fn seq(elem: Ty) -> Ty {
        Ty::Seq(Box::new(elem))
    }

    pub fn nullable(inner: Ty) -> Ty {
        Ty::Nullable(Box::new(inner))
    }

    pub fn named(name: impl Into<String>) -> Ty {
        Ty::Named(name.into())
    }

    pub fn is_string_like(&self) -> bool {
        matches!(self, Ty::String | Ty::Path | Ty::OsString)
    }

    pub fn element(&self) -> Option<&Ty> {
        match self {
            Ty::Seq(it) => Some(it),
            _ => None,
        }
    }

    pub fn nullable_inner(&self) -> Option<&Ty> {
        match self {
            Ty::Nullable(it) => Some(it),
            _ => None,
        }
    }

    pub fn has_params(&self) -> bool {
        match self {
            Ty::Param(_) => true,
            Ty::Nullable(it) | Ty::Seq(it) => it.has_params(),
            _ => false,
        }
    }

    /// Binds the generic parameters of `self` (a signature type) so that it
    /// becomes `concrete`. Returns `false` on a structural mismatch or a
    /// conflicting binding.
    pub(crate) fn unify(&self, concrete: &Ty, bound: &mut [Option<Ty>]) -> bool {
        match (self, concrete) {
            (Ty::Param(i), _) => match bound.get_mut(*i as usize) {
                Some(Some(prev)) => prev == concrete,
                Some(slot) => {
                    *slot = Some(concrete.clone());
                    true
                }
                None => false,
            },
            (Ty::Nullable(a), Ty::Nullable(b)) | (Ty::Seq(a), Ty::Seq(b)) => a.unify(b, bound),
            _ => self == concrete,
        }
    }

    pub(crate) fn substitute(&self, bound: &[Option<Ty>]) -> Ty {
        match self {
            Ty::Param(i) => bound.get(*i as usize).cloned().flatten().unwrap_or_else(|| self.clone()),
            Ty::Nullable(it) => Ty::nullable(it.substitute(bound)),
            Ty::Seq(it) => Ty::seq(it.substitute(bound)),
            _ => self.clone(),
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::String => f.write_str("string"),
            Ty::Path => f.write_str("PathBuf"),
            Ty::OsString => f.write_str("OsString"),
            Ty::Bool => f.write_str("bool"),
            Ty::Char => f.write_str("char"),
            Ty::Int(it) => f.write_str(it.name()),
            Ty::Float(it) => f.write_str(it.name()),
            Ty::Nullable(it) => write!(f, "{it}?"),
            Ty::Seq(it) => write!(f, "[{it}]"),
            Ty::Named(name) => f.write_str(name),
            Ty::Param(0) => f.write_str("T"),
            Ty::Param(i) => write!(f, "T{i}"),
        }
    }
}

impl FromStr for Ty {
    type Err = ParseTyError;

    fn from_str(s: &str) -> Result<Ty, ParseTyError> {
        let err = || ParseTyError(s.to_string());
        let s = s.trim();
        if let Some(inner) = s.strip_suffix('?') {
            let inner = inner.parse::<Ty>().map_err(|_| err())?;
            if inner.nullable_inner().is_some() {
                return Err(err());
            }
            return Ok(Ty::nullable(inner));
        }
        if let Some(inner) = s.strip_prefix('[').and_then(|it| it.strip_suffix(']')) {
            return inner.parse::<Ty>().map(Ty::seq).map_err(|_| err());
        }
        let res = match s {
            "string" | "String" | "str" => Ty::String,
            "PathBuf" | "path" => Ty::Path,
            "OsString" => Ty::OsString,
            "bool" => Ty::Bool,
            "char" => Ty::Char,
            "f32" => Ty::Float(FloatTy::F32),
            "f64" => Ty::Float(FloatTy::F64),
            _ => match IntTy::ALL.iter().find(|it| it.name() == s) {
                Some(it) => Ty::Int(*it),
                None => {
                    let valid = s.chars().next().map_or(false, |c| c.is_ascii_alphabetic())
                        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':');
                    if !valid {
                        return Err(err());
                    }
                    Ty::Named(s.to_string())
                }
            },
        };
        Ok(res)
    }
}

impl TryFrom<String> for Ty {
    type Error = ParseTyError;

    fn try_from(value: String) -> Result<Ty, ParseTyError> {
        value.parse()
    }
}

impl From<Ty> for String {
    fn from(ty: Ty) -> String {
        ty.to_string()
    }
}
