//! Normalized declarations handed over by a front-end.
//!
//! Descriptors are plain data: every reference to code (parsers, validators,
//! handlers) is a name that the candidate lookup resolves later.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ty::Ty;

/// Identity of a group or command, used to bind children to parents and
/// members to owners.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeKey(pub String);

impl ScopeKey {
    pub fn new(key: impl Into<String>) -> ScopeKey {
        ScopeKey(key.into())
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Descriptor {
    Group(GroupDesc),
    Command(CommandDesc),
    Member(MemberDesc),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDesc {
    pub key: ScopeKey,
    pub name: String,
    #[serde(default)]
    pub parent: Option<ScopeKey>,
    #[serde(default)]
    pub default_command: Option<String>,
    #[serde(default)]
    pub doc: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandDesc {
    pub key: ScopeKey,
    pub name: String,
    #[serde(default)]
    pub parent: Option<ScopeKey>,
    /// Name of the handler the lookup provides.
    pub invoke: String,
    #[serde(default)]
    pub doc: Option<String>,
}

/// A parameter or field of a group or command. It becomes an option, an
/// argument, or nothing, depending on which mark it carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberDesc {
    pub owner: ScopeKey,
    pub name: String,
    pub ty: Ty,
    /// Echoed verbatim into help and diagnostics.
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub doc: Option<String>,
    #[serde(default)]
    pub option: Option<OptionMark>,
    #[serde(default)]
    pub argument: Option<ArgumentMark>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionMark {
    /// Defaults to the kebab-cased member name.
    #[serde(default)]
    pub long: Option<String>,
    #[serde(default)]
    pub alias: Option<char>,
    #[serde(default)]
    pub global: bool,
    #[serde(default)]
    pub parse: Option<String>,
    #[serde(default)]
    pub validate: Vec<ValidatorRef>,
    /// Flags only: a bare occurrence yields the opposite of the default.
    #[serde(default)]
    pub invert: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArgumentMark {
    #[serde(default)]
    pub parse: Option<String>,
    #[serde(default)]
    pub validate: Vec<ValidatorRef>,
    #[serde(default)]
    pub variadic: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ValidatorRef {
    Method {
        name: String,
        #[serde(default)]
        message: Option<String>,
    },
    Property {
        name: String,
        #[serde(default)]
        expected: Option<bool>,
        #[serde(default)]
        message: Option<String>,
    },
}

impl ValidatorRef {
    pub fn method(name: impl Into<String>) -> ValidatorRef {
        ValidatorRef::Method { name: name.into(), message: None }
    }

    pub fn property(name: impl Into<String>, expected: bool) -> ValidatorRef {
        ValidatorRef::Property { name: name.into(), expected: Some(expected), message: None }
    }

    pub fn with_message(mut self, text: impl Into<String>) -> ValidatorRef {
        match &mut self {
            ValidatorRef::Method { message, .. } | ValidatorRef::Property { message, .. } => {
                *message = Some(text.into())
            }
        }
        self
    }

    pub fn name(&self) -> &str {
        match self {
            ValidatorRef::Method { name, .. } | ValidatorRef::Property { name, .. } => name,
        }
    }
}

impl Descriptor {
    pub fn group(key: &str, name: &str, parent: Option<&str>) -> Descriptor {
        Descriptor::Group(GroupDesc {
            key: ScopeKey::new(key),
            name: name.to_string(),
            parent: parent.map(ScopeKey::new),
            default_command: None,
            doc: None,
        })
    }

    pub fn command(key: &str, name: &str, parent: Option<&str>, invoke: &str) -> Descriptor {
        Descriptor::Command(CommandDesc {
            key: ScopeKey::new(key),
            name: name.to_string(),
            parent: parent.map(ScopeKey::new),
            invoke: invoke.to_string(),
            doc: None,
        })
    }

    pub fn option(owner: &str, name: &str, ty: Ty, mark: OptionMark) -> Descriptor {
        Descriptor::Member(MemberDesc {
            owner: ScopeKey::new(owner),
            name: name.to_string(),
            ty,
            default: None,
            doc: None,
            option: Some(mark),
            argument: None,
        })
    }

    pub fn argument(owner: &str, name: &str, ty: Ty, mark: ArgumentMark) -> Descriptor {
        Descriptor::Member(MemberDesc {
            owner: ScopeKey::new(owner),
            name: name.to_string(),
            ty,
            default: None,
            doc: None,
            option: None,
            argument: Some(mark),
        })
    }

    /// Sets the default expression of a member or the default command of a
    /// group.
    pub fn with_default(mut self, expr: &str) -> Descriptor {
        match &mut self {
            Descriptor::Group(it) => it.default_command = Some(expr.to_string()),
            Descriptor::Member(it) => it.default = Some(expr.to_string()),
            Descriptor::Command(_) => (),
        }
        self
    }

    pub fn with_doc(mut self, text: &str) -> Descriptor {
        let doc = match &mut self {
            Descriptor::Group(it) => &mut it.doc,
            Descriptor::Command(it) => &mut it.doc,
            Descriptor::Member(it) => &mut it.doc,
        };
        *doc = Some(text.to_string());
        self
    }
}

pub fn from_json(text: &str) -> serde_json::Result<Vec<Descriptor>> {
    serde_json::from_str(text)
}

pub fn to_json(descriptors: &[Descriptor]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(descriptors)
}
