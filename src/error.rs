//! Build-time and run-time diagnostics.
//!
//! The two never mix: a [`DeclError`] means the declarations are wrong and no
//! tree is produced, an [`Error`] means the user typed something the tree
//! does not accept.

use std::fmt;

use crate::{binding::BindError, ty::Ty};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DeclError {
    #[error("invalid name `{name}` in `{scope}`: names use `[A-Za-z0-9_-]` and cannot start with `-` or `_`")]
    InvalidName { scope: String, name: String },
    #[error("invalid alias `{alias}` for `--{long}` in `{scope}`: an alias is a single ASCII letter")]
    InvalidAlias { scope: String, long: String, alias: char },
    #[error("`{name}` in `{scope}` is reserved for help")]
    ReservedName { scope: String, name: String },
    #[error("duplicate command `{name}`: declared by `{first}` and `{second}`")]
    DuplicateCommand { name: String, first: String, second: String },
    #[error("duplicate declaration key `{key}`")]
    DuplicateKey { key: String },
    #[error("`{scope}` has more than one child named `{name}`")]
    DuplicateChild { scope: String, name: String },
    #[error("duplicate option `{name}` in `{scope}`")]
    DuplicateOption { scope: String, name: String },
    #[error("global option `{name}` in `{scope}` is already declared globally by `{first}`")]
    GlobalConflict { scope: String, name: String, first: String },
    #[error("option `{name}` in `{scope}` shadows the global option of `{first}`")]
    ShadowsGlobal { scope: String, name: String, first: String },
    #[error("command `{scope}` cannot declare the global option `{name}`")]
    GlobalOnCommand { scope: String, name: String },
    #[error("option `{name}` of the default command `{scope}` is also an option of `{group}`")]
    DefaultOptionConflict { scope: String, name: String, group: String },
    #[error("option `{name}` in `{scope}` stores into `{member}`, which `{first}` already uses")]
    DuplicateMember { scope: String, name: String, member: String, first: String },
    #[error("member `{member}` of `{scope}` is marked both as an option and as an argument")]
    AmbiguousMember { scope: String, member: String },
    #[error("group `{scope}` cannot take the positional argument `{member}`")]
    ArgumentOnGroup { scope: String, member: String },
    #[error("variadic argument `{member}` of `{scope}` must be the last argument")]
    VariadicNotLast { scope: String, member: String },
    #[error("variadic argument `{member}` of `{scope}` must collect strings, found `{ty}`")]
    VariadicElement { scope: String, member: String, ty: Ty },
    #[error("argument `{member}` of `{scope}` cannot be a sequence (`{ty}`)")]
    SequenceArgument { scope: String, member: String, ty: Ty },
    #[error("`{member}` of `{scope}`: {source}")]
    Binding {
        scope: String,
        member: String,
        #[source]
        source: BindError,
    },
    #[error("invalid default `{expr}` for `{member}` of `{scope}`: {reason}")]
    InvalidDefault { scope: String, member: String, expr: String, reason: String },
    #[error("default command `{name}` of `{scope}` is not one of its commands")]
    MissingDefaultCommand { scope: String, name: String },
    #[error("hidden command of `{scope}` is unreachable: its default command is not `_`")]
    UnreachableHiddenCommand { scope: String },
    #[error("more than one root group: {}", .roots.join(", "))]
    MultipleRoots { roots: Vec<String> },
    #[error("no root group: every group declares a parent")]
    NoRoot,
    #[error("`{key}` declares unknown parent `{parent}`")]
    UnknownParent { key: String, parent: String },
    #[error("parent chain of `{key}` never reaches the root")]
    ParentCycle { key: String },
    #[error("member `{member}` declares unknown owner `{owner}`")]
    UnknownOwner { owner: String, member: String },
    #[error("command `{scope}` invokes `{handler}`, which is not provided")]
    MissingHandler { scope: String, handler: String },
}

impl DeclError {
    /// Stable identifier of the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            DeclError::InvalidName { .. } => "invalid-name",
            DeclError::InvalidAlias { .. } => "invalid-alias",
            DeclError::ReservedName { .. } => "reserved-name",
            DeclError::DuplicateCommand { .. } => "duplicate-command",
            DeclError::DuplicateKey { .. } => "duplicate-key",
            DeclError::DuplicateChild { .. } => "duplicate-child",
            DeclError::DuplicateOption { .. } => "duplicate-option",
            DeclError::GlobalConflict { .. } => "global-conflict",
            DeclError::ShadowsGlobal { .. } => "shadows-global",
            DeclError::GlobalOnCommand { .. } => "global-on-command",
            DeclError::DefaultOptionConflict { .. } => "default-option-conflict",
            DeclError::DuplicateMember { .. } => "duplicate-member",
            DeclError::AmbiguousMember { .. } => "ambiguous-member",
            DeclError::ArgumentOnGroup { .. } => "argument-on-group",
            DeclError::VariadicNotLast { .. } => "variadic-not-last",
            DeclError::VariadicElement { .. } => "variadic-element",
            DeclError::SequenceArgument { .. } => "sequence-argument",
            DeclError::Binding { source, .. } => match source {
                BindError::NotFound { .. } => "binding-not-found",
                BindError::Ambiguous { .. } => "binding-ambiguous",
                BindError::UnknownReference { .. } => "unknown-reference",
                BindError::ShapeMismatch { .. } => "shape-mismatch",
                BindError::ValidatorMismatch { .. } => "validator-mismatch",
                BindError::TooManyGenerics { .. } => "too-many-generics",
                BindError::UninferableGeneric { .. } => "uninferable-generic",
                BindError::UnknownProperty { .. } => "unknown-property",
                BindError::NotBoolProperty { .. } => "not-bool-property",
            },
            DeclError::InvalidDefault { .. } => "invalid-default",
            DeclError::MissingDefaultCommand { .. } => "missing-default-command",
            DeclError::UnreachableHiddenCommand { .. } => "unreachable-hidden-command",
            DeclError::MultipleRoots { .. } => "multiple-roots",
            DeclError::NoRoot => "no-root",
            DeclError::UnknownParent { .. } => "unknown-parent",
            DeclError::ParentCycle { .. } => "parent-cycle",
            DeclError::UnknownOwner { .. } => "unknown-owner",
            DeclError::MissingHandler { .. } => "missing-handler",
        }
    }
}

/// Every declaration error of one build, in discovery order.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostics {
    errors: Vec<DeclError>,
}

impl Diagnostics {
    pub(crate) fn new(errors: Vec<DeclError>) -> Diagnostics {
        Diagnostics { errors }
    }

    pub fn errors(&self) -> &[DeclError] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn codes(&self) -> Vec<&'static str> {
        self.errors.iter().map(DeclError::code).collect()
    }
}

impl From<DeclError> for Diagnostics {
    fn from(err: DeclError) -> Diagnostics {
        Diagnostics { errors: vec![err] }
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "error[{}]: {err}", err.code())?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostics {}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ErrorKind {
    #[error("unknown option `{flag}`{}", did_you_mean(.suggestion))]
    UnknownOption { flag: String, suggestion: Option<String> },
    #[error("unknown command `{name}`{}", did_you_mean(.suggestion))]
    UnknownCommand { name: String, suggestion: Option<String> },
    #[error("expected a value for `{flag}`")]
    MissingValue { flag: String },
    #[error("can't parse `{name}` from `{value}`: {reason}")]
    InvalidValue { name: String, value: String, reason: String },
    #[error("invalid value `{value}` for `{name}`: {reason}")]
    Rejected { name: String, value: String, reason: String },
    #[error("unexpected argument `{value}`")]
    SurplusArgument { value: String },
    #[error("missing required {}", missing_list(.names))]
    MissingArguments { names: Vec<String> },
    #[error("cannot run `{command}` after arguments for the default command `{default}`")]
    PositionalThenSubcommand { command: String, default: String },
    #[error("help requested")]
    Help,
}

fn did_you_mean(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(it) => format!(" (did you mean `{it}`?)"),
        None => String::new(),
    }
}

fn missing_list(names: &[String]) -> String {
    let noun = if names.len() == 1 { "argument" } else { "arguments" };
    let names = names.iter().map(|it| format!("<{it}>")).collect::<Vec<_>>();
    format!("{noun}: {}", names.join(" "))
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::UnknownOption { .. } => "unknown-option",
            ErrorKind::UnknownCommand { .. } => "unknown-command",
            ErrorKind::MissingValue { .. } => "missing-value",
            ErrorKind::InvalidValue { .. } => "invalid-value",
            ErrorKind::Rejected { .. } => "rejected",
            ErrorKind::SurplusArgument { .. } => "surplus-argument",
            ErrorKind::MissingArguments { .. } => "missing-arguments",
            ErrorKind::PositionalThenSubcommand { .. } => "positional-then-subcommand",
            ErrorKind::Help => "help",
        }
    }
}

/// A run-time error, qualified by the scope it happened in and carrying that
/// scope's help text.
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    pub kind: ErrorKind,
    /// Path of the scope, e.g. `app remote add`.
    pub scope: String,
    pub help: String,
}

impl Error {
    pub fn is_help(&self) -> bool {
        self.kind == ErrorKind::Help
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.scope, self.kind)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}
