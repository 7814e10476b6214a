//! The dispatcher: runs one argument vector against a command tree.
//!
//! The tree is only read. Everything that changes while tokens are consumed
//! (the current scope, the positional cursor, the values bound so far) lives
//! in a per-run state that is dropped when the run ends.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    io::{self, Write},
};

use serde::{ser::SerializeStruct, Serialize, Serializer};

use crate::{
    binding::ValidatorTarget,
    error::{Error, ErrorKind},
    help,
    model::{Arg, CommandTree, FlagId, ScopeId},
    rt::{Token, Tokens},
    ty::Ty,
    value::Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Exit code after printing help.
    pub help_exit_code: i32,
    /// Exit code of every run-time error, including a failing handler.
    pub error_exit_code: i32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        DispatchConfig { help_exit_code: 2, error_exit_code: 1 }
    }
}

impl DispatchConfig {
    pub fn help_exit_code(mut self, code: i32) -> Self {
        self.help_exit_code = code;
        self
    }

    pub fn error_exit_code(mut self, code: i32) -> Self {
        self.error_exit_code = code;
        self
    }
}

/// The single command an argument vector resolved to, with every value it
/// runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    command: ScopeId,
    handler: String,
    /// Names from the root to the command; the hidden marker is left out.
    pub path: Vec<String>,
    /// Every option visible along the path, by member name.
    pub options: BTreeMap<String, Value>,
    /// Positional arguments in declaration order.
    pub args: Vec<(String, Value)>,
    /// The variadic tail, when the command has one.
    pub rest: Option<Vec<String>>,
}

impl Invocation {
    pub fn command(&self) -> ScopeId {
        self.command
    }

    pub fn handler(&self) -> &str {
        &self.handler
    }

    pub fn option(&self, name: &str) -> Option<&Value> {
        self.options.get(name)
    }

    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.args.iter().find(|(it, _)| it == name).map(|(_, value)| value)
    }

    pub fn rest(&self) -> &[String] {
        self.rest.as_deref().unwrap_or_default()
    }
}

impl Serialize for Invocation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        struct Args<'a>(&'a [(String, Value)]);

        impl Serialize for Args<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_map(self.0.iter().map(|(name, value)| (name, value)))
            }
        }

        let mut s = serializer.serialize_struct("Invocation", 5)?;
        s.serialize_field("path", &self.path)?;
        s.serialize_field("handler", &self.handler)?;
        s.serialize_field("options", &self.options)?;
        s.serialize_field("args", &Args(&self.args))?;
        s.serialize_field("rest", &self.rest)?;
        s.end()
    }
}

pub struct Dispatcher<'t> {
    tree: &'t CommandTree,
    config: DispatchConfig,
}

impl<'t> Dispatcher<'t> {
    pub fn new(tree: &'t CommandTree) -> Self {
        Dispatcher { tree, config: DispatchConfig::default() }
    }

    pub fn with_config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> DispatchConfig {
        self.config
    }

    /// Consumes `args` and resolves them to an invocation without calling
    /// anything. A help request comes back as an error of kind
    /// [`ErrorKind::Help`].
    pub fn parse<I>(&self, args: I) -> Result<Invocation, Error>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut tokens = Tokens::new(args.into_iter().map(Into::into).collect());
        let mut run = Run::new(self.tree);
        while let Some(token) = tokens.next() {
            tracing::trace!(?token, state = ?run.state, scope = %self.tree.scope(run.scope).name, "token");
            match token {
                Token::Terminator => run.state = State::ArgsOnly,
                Token::Flag { flag, .. } if flag == "--help" || flag == "-h" => {
                    return Err(run.error(run.scope, ErrorKind::Help))
                }
                Token::Flag { flag, value } => run.flag(&mut tokens, flag, value)?,
                Token::Positional(word) => run.positional(word)?,
            }
        }
        run.finish()
    }

    /// Parses `args`, prints help or the diagnostic on the process streams,
    /// calls the handler and returns the exit code.
    pub fn dispatch<I>(&self, args: I) -> i32
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let stdout = io::stdout();
        let stderr = io::stderr();
        self.dispatch_to(args, &mut stdout.lock(), &mut stderr.lock())
    }

    pub fn dispatch_to<I>(&self, args: I, out: &mut dyn Write, err: &mut dyn Write) -> i32
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let invocation = match self.parse(args) {
            Ok(it) => it,
            Err(e) if e.is_help() => {
                let _ = write!(out, "{}", e.help);
                return self.config.help_exit_code;
            }
            Err(e) => {
                tracing::debug!(code = e.kind.code(), "dispatch failed");
                let _ = writeln!(err, "error: {e}\n");
                let _ = write!(err, "{}", e.help);
                return self.config.error_exit_code;
            }
        };
        let Some(cmd) = self.tree.scope(invocation.command).cmd() else {
            return self.config.error_exit_code;
        };
        match (cmd.handler.f)(&invocation) {
            Ok(()) => 0,
            Err(e) => {
                let _ = writeln!(err, "error: {}: {e:#}", self.tree.path(invocation.command));
                self.config.error_exit_code
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitingToken,
    /// After `--`: every token is positional.
    ArgsOnly,
}

struct Run<'t> {
    tree: &'t CommandTree,
    state: State,
    scope: ScopeId,
    values: HashMap<FlagId, Value>,
    /// Positionals bound to the command that will run.
    cursor: usize,
    args: Vec<Value>,
    rest: Vec<String>,
    /// A positional or a local option of the current group's default
    /// command was bound; descending is no longer possible.
    bound_default: bool,
}

impl<'t> Run<'t> {
    fn new(tree: &'t CommandTree) -> Self {
        Run {
            tree,
            state: State::AwaitingToken,
            scope: tree.root(),
            values: HashMap::new(),
            cursor: 0,
            args: Vec::new(),
            rest: Vec::new(),
            bound_default: false,
        }
    }

    fn error(&self, scope: ScopeId, kind: ErrorKind) -> Error {
        Error { kind, scope: self.tree.path(scope), help: help::render(self.tree, scope) }
    }

    /// The command positionals and default-command options bind to.
    fn target(&self) -> Option<ScopeId> {
        match self.tree.scope(self.scope).is_group() {
            true => self.tree.default_command(self.scope),
            false => Some(self.scope),
        }
    }

    fn lookup(&self, flag: &str) -> Option<(FlagId, bool)> {
        if let Some(id) = self.tree.lookup_flag(self.scope, flag) {
            return Some((id, false));
        }
        let default = self.tree.default_command(self.scope)?;
        let id = self.tree.lookup_flag(default, flag)?;
        Some((id, self.tree.flag(id).owner == default))
    }

    fn flag(&mut self, tokens: &mut Tokens, flag: String, value: Option<String>) -> Result<(), Error> {
        let tree = self.tree;
        let Some((id, local_to_default)) = self.lookup(&flag) else {
            return Err(self.unknown_option(flag));
        };
        self.bound_default |= local_to_default;
        let at = if local_to_default { self.target().unwrap_or(self.scope) } else { self.scope };
        let spec = tree.flag(id);
        let name = spec.spelling();

        if spec.is_switch() {
            let on = match value {
                None => true,
                Some(raw) => match spec.parser.parse(&raw, &Ty::Bool) {
                    Ok(Value::Bool(it)) => it,
                    Ok(other) => {
                        let reason = format!("expected a boolean, got {other:?}");
                        return Err(self.error(at, ErrorKind::InvalidValue { name, value: raw, reason }));
                    }
                    Err(reason) => {
                        return Err(self.error(at, ErrorKind::InvalidValue { name, value: raw, reason }))
                    }
                },
            };
            let on = if spec.invert { on ^ spec.default.as_bool().unwrap_or(false) } else { on };
            self.values.insert(id, Value::Bool(on));
            return Ok(());
        }

        let raw = match value {
            Some(it) => it,
            None => match tokens.next_value() {
                Some(it) => it,
                None => return Err(self.error(at, ErrorKind::MissingValue { flag })),
            },
        };
        let parsed = match spec.parser.parse(&raw, spec.value_ty()) {
            Ok(it) => it,
            Err(reason) => return Err(self.error(at, ErrorKind::InvalidValue { name, value: raw, reason })),
        };
        for validator in &spec.validators {
            if validator.target() == Some(ValidatorTarget::Whole) {
                continue;
            }
            if let Err(reason) = validator.check(&parsed) {
                return Err(self.error(at, ErrorKind::Rejected { name, value: raw, reason }));
            }
        }

        if spec.repeatable {
            match self.values.entry(id).or_insert_with(|| Value::Seq(Vec::new())) {
                Value::Seq(items) => items.push(parsed),
                other => *other = Value::Seq(vec![parsed]),
            }
        } else {
            self.values.insert(id, parsed);
        }
        Ok(())
    }

    fn unknown_option(&self, flag: String) -> Error {
        let scope = self.target().unwrap_or(self.scope);
        let mut known = self
            .tree
            .visible_flags(scope)
            .iter()
            .chain(self.tree.visible_flags(self.scope))
            .map(|&it| self.tree.flag(it).spelling())
            .collect::<Vec<_>>();
        known.push("--help".to_string());
        let suggestion = suggest(&flag, known.iter().map(String::as_str));
        self.error(scope, ErrorKind::UnknownOption { flag, suggestion })
    }

    fn positional(&mut self, word: String) -> Result<(), Error> {
        let tree = self.tree;
        if tree.scope(self.scope).is_group() {
            if self.state == State::AwaitingToken {
                if let Some(child) = tree.find_child(self.scope, &word) {
                    if self.bound_default {
                        let default = self.target().map(|it| tree.scope(it).name.clone()).unwrap_or_default();
                        let kind = ErrorKind::PositionalThenSubcommand { command: word, default };
                        return Err(self.error(self.scope, kind));
                    }
                    tracing::trace!(scope = %tree.scope(child).name, "descending");
                    self.scope = child;
                    self.cursor = 0;
                    self.args.clear();
                    self.rest.clear();
                    return Ok(());
                }
            }
            if tree.default_command(self.scope).is_none() {
                if self.state == State::ArgsOnly {
                    return Err(self.error(self.scope, ErrorKind::SurplusArgument { value: word }));
                }
                let names = tree.children(self.scope).iter().map(|&it| tree.scope(it)).filter(|it| !it.is_hidden());
                let suggestion = suggest(&word, names.map(|it| it.name.as_str()));
                return Err(self.error(self.scope, ErrorKind::UnknownCommand { name: word, suggestion }));
            }
            self.bound_default = true;
        }

        let Some(target) = self.target() else {
            return Err(self.error(self.scope, ErrorKind::SurplusArgument { value: word }));
        };
        let args = tree.scope(target).cmd().map(|it| it.args.as_slice()).unwrap_or_default();
        let fixed = args.iter().take_while(|it| !it.variadic).count();
        let arg = match args.get(self.cursor.min(fixed)) {
            Some(arg) if self.cursor < fixed || arg.variadic => arg,
            _ => return Err(self.error(self.scope, ErrorKind::SurplusArgument { value: word })),
        };
        let value = self.bind_arg(arg, &word)?;
        if arg.variadic {
            self.rest.push(word);
        } else {
            self.args.push(value);
            self.cursor += 1;
        }
        Ok(())
    }

    fn bind_arg(&self, arg: &Arg, raw: &str) -> Result<Value, Error> {
        let name = format!("<{}>", arg.name);
        let at = self.target().unwrap_or(self.scope);
        let value = match arg.parser.parse(raw, arg.value_ty()) {
            Ok(it) => it,
            Err(reason) => {
                let kind = ErrorKind::InvalidValue { name, value: raw.to_string(), reason };
                return Err(self.error(at, kind));
            }
        };
        for validator in &arg.validators {
            if validator.target() == Some(ValidatorTarget::Whole) {
                continue;
            }
            if let Err(reason) = validator.check(&value) {
                let kind = ErrorKind::Rejected { name, value: raw.to_string(), reason };
                return Err(self.error(at, kind));
            }
        }
        Ok(value)
    }

    fn finish(self) -> Result<Invocation, Error> {
        let tree = self.tree;
        let Some(command) = self.target() else {
            return Err(self.error(self.scope, ErrorKind::Help));
        };
        let Some(cmd) = tree.scope(command).cmd() else {
            return Err(self.error(self.scope, ErrorKind::Help));
        };

        let fixed = cmd.args.iter().filter(|it| !it.variadic).collect::<Vec<_>>();
        let missing = fixed
            .iter()
            .skip(self.cursor)
            .filter(|it| it.is_required())
            .map(|it| it.name.clone())
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(self.error(command, ErrorKind::MissingArguments { names: missing }));
        }

        let mut ids = self.values.keys().copied().collect::<Vec<_>>();
        ids.sort();
        for id in ids {
            let spec = tree.flag(id);
            let value = &self.values[&id];
            for validator in spec.validators.iter().filter(|it| it.target() == Some(ValidatorTarget::Whole)) {
                if let Err(reason) = validator.check(value) {
                    let kind = ErrorKind::Rejected { name: spec.spelling(), value: value.to_string(), reason };
                    return Err(self.error(command, kind));
                }
            }
        }
        let variadic = cmd.args.iter().find(|it| it.variadic);
        if let Some(arg) = variadic {
            let rest = Value::Seq(self.rest.iter().map(Value::str).collect());
            for validator in arg.validators.iter().filter(|it| it.target() == Some(ValidatorTarget::Whole)) {
                if let Err(reason) = validator.check(&rest) {
                    let kind = ErrorKind::Rejected { name: format!("<{}>", arg.name), value: rest.to_string(), reason };
                    return Err(self.error(command, kind));
                }
            }
        }

        let ancestry = tree.ancestry(command);
        let path = tree.path_names(command).map(str::to_string).collect();
        let mut seen = HashSet::new();
        let mut options = BTreeMap::new();
        for &scope in &ancestry {
            for &id in tree.visible_flags(scope) {
                if !seen.insert(id) {
                    continue;
                }
                let spec = tree.flag(id);
                let value = self.values.get(&id).unwrap_or(&spec.default).clone();
                options.insert(spec.name.clone(), value);
            }
        }
        let mut bound = self.args.into_iter();
        let args = fixed
            .iter()
            .map(|it| {
                let value = bound.next().or_else(|| it.default.clone()).unwrap_or(Value::Absent);
                (it.name.clone(), value)
            })
            .collect();
        let rest = variadic.map(|_| self.rest);

        tracing::debug!(command = %tree.path(command), handler = %cmd.handler.name, "resolved invocation");
        Ok(Invocation { command, handler: cmd.handler.name.clone(), path, options, args, rest })
    }
}

/// The closest candidate within an edit distance of two.
fn suggest<'a>(given: &str, candidates: impl Iterator<Item = &'a str>) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;
    for candidate in candidates {
        let distance = strsim::levenshtein(given, candidate);
        if distance <= 2 && best.map_or(true, |(_, it)| distance < it) {
            best = Some((candidate, distance));
        }
    }
    best.map(|(it, _)| it.to_string())
}
