//! Model builder: turns descriptors into a [`CommandTree`].
//!
//! Declaration errors are collected rather than returned one by one, so a
//! single build reports every unrelated mistake. Only once the declarations
//! are individually sound does the tree-wide validator run, and that one
//! stops at the first violation.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use crate::{
    binding::{ParserBinding, Resolved, Resolver, ValidatorBinding},
    descriptor::{ArgumentMark, CommandDesc, Descriptor, GroupDesc, MemberDesc, OptionMark, ValidatorRef},
    dispatch::Invocation,
    error::{DeclError, Diagnostics},
    lookup::{CandidateLookup, Handler},
    model::{Arg, Cmd, CommandTree, Flag, Group, HandlerRef, Scope, ScopeId, ScopeKind, HIDDEN_MARKER},
    ty::Ty,
    validate,
    value::Value,
};

#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Name of the root group synthesized when no group is declared.
    pub program: String,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions { program: "app".to_string() }
    }
}

impl BuildOptions {
    pub fn program(mut self, name: impl Into<String>) -> Self {
        self.program = name.into();
        self
    }
}

pub fn build<L: CandidateLookup + ?Sized>(
    descriptors: &[Descriptor],
    lookup: &L,
) -> Result<CommandTree, Diagnostics> {
    build_with(descriptors, lookup, &BuildOptions::default())
}

pub fn build_with<L: CandidateLookup + ?Sized>(
    descriptors: &[Descriptor],
    lookup: &L,
    options: &BuildOptions,
) -> Result<CommandTree, Diagnostics> {
    let mut members: HashMap<&str, Vec<&MemberDesc>> = HashMap::new();
    let mut owners = HashSet::new();
    for desc in descriptors {
        match desc {
            Descriptor::Member(it) => members.entry(it.owner.0.as_str()).or_default().push(it),
            Descriptor::Group(it) => {
                owners.insert(it.key.0.as_str());
            }
            Descriptor::Command(it) => {
                owners.insert(it.key.0.as_str());
            }
        }
    }

    let mut builder = Builder::new(lookup, options);
    for desc in descriptors {
        if let Descriptor::Member(it) = desc {
            if !owners.contains(it.owner.0.as_str()) {
                builder.error(DeclError::UnknownOwner { owner: it.owner.to_string(), member: it.name.clone() });
            }
        }
    }
    let members_of = |key: &str| members.get(key).map(Vec::as_slice).unwrap_or_default();
    for desc in descriptors {
        if let Descriptor::Group(it) = desc {
            builder.build_group(it, members_of(&it.key.0));
        }
    }
    for desc in descriptors {
        if let Descriptor::Command(it) = desc {
            builder.build_command(it, members_of(&it.key.0));
        }
    }
    builder.bind_tree();
    builder.finish()
}

pub struct Builder<'a, L: ?Sized> {
    resolver: Resolver<'a, L>,
    program: String,
    tree: CommandTree,
    errors: Vec<DeclError>,
    keys: HashMap<String, ScopeId>,
    /// Every built scope with its declared parent key, in declaration order.
    parents: Vec<(ScopeId, Option<String>)>,
    /// Command name to the key that claimed it first.
    command_names: HashMap<String, String>,
}

impl<'a, L: CandidateLookup + ?Sized> Builder<'a, L> {
    pub fn new(lookup: &'a L, options: &BuildOptions) -> Self {
        Builder {
            resolver: Resolver::new(lookup),
            program: options.program.clone(),
            tree: CommandTree::new(),
            errors: Vec::new(),
            keys: HashMap::new(),
            parents: Vec::new(),
            command_names: HashMap::new(),
        }
    }

    fn error(&mut self, err: DeclError) {
        tracing::debug!(code = err.code(), "{err}");
        self.errors.push(err);
    }

    fn claim_key(&mut self, key: &str) -> bool {
        if self.keys.contains_key(key) {
            self.error(DeclError::DuplicateKey { key: key.to_string() });
            return false;
        }
        true
    }

    pub fn build_group(&mut self, desc: &GroupDesc, members: &[&MemberDesc]) -> Option<ScopeId> {
        let key = desc.key.0.as_str();
        if !self.claim_key(key) {
            return None;
        }
        if !valid_name(&desc.name) {
            self.error(DeclError::InvalidName { scope: key.to_string(), name: desc.name.clone() });
        }
        let group = Group { default_name: desc.default_command.clone(), ..Group::default() };
        let id = self.tree.push_scope(Scope {
            name: desc.name.clone(),
            key: key.to_string(),
            doc: desc.doc.clone(),
            parent: None,
            flags: Vec::new(),
            kind: ScopeKind::Group(group),
        });
        self.keys.insert(key.to_string(), id);
        self.parents.push((id, desc.parent.as_ref().map(|it| it.0.clone())));

        for member in members {
            match (&member.option, &member.argument) {
                (Some(_), Some(_)) => self.error(DeclError::AmbiguousMember {
                    scope: key.to_string(),
                    member: member.name.clone(),
                }),
                (Some(mark), None) => self.build_option(id, true, member, mark),
                (None, Some(_)) => self.error(DeclError::ArgumentOnGroup {
                    scope: key.to_string(),
                    member: member.name.clone(),
                }),
                (None, None) => tracing::trace!(member = %member.name, "skipping unmarked member"),
            }
        }
        tracing::debug!(key, name = %desc.name, "built group");
        Some(id)
    }

    pub fn build_command(&mut self, desc: &CommandDesc, members: &[&MemberDesc]) -> Option<ScopeId> {
        let key = desc.key.0.as_str();
        if !self.claim_key(key) {
            return None;
        }
        let hidden = desc.name == HIDDEN_MARKER;
        if !hidden && !valid_name(&desc.name) {
            self.error(DeclError::InvalidName { scope: key.to_string(), name: desc.name.clone() });
        }
        if !hidden {
            match self.command_names.get(&desc.name) {
                Some(first) => {
                    let err = DeclError::DuplicateCommand {
                        name: desc.name.clone(),
                        first: first.clone(),
                        second: key.to_string(),
                    };
                    self.error(err)
                }
                None => {
                    self.command_names.insert(desc.name.clone(), key.to_string());
                }
            }
        }

        let handler = match self.resolver.lookup().handler(&desc.invoke) {
            Some(f) => f,
            None => {
                self.error(DeclError::MissingHandler { scope: key.to_string(), handler: desc.invoke.clone() });
                unbound(&desc.invoke)
            }
        };
        let cmd = Cmd { args: Vec::new(), handler: HandlerRef { name: desc.invoke.clone(), f: handler } };
        let id = self.tree.push_scope(Scope {
            name: desc.name.clone(),
            key: key.to_string(),
            doc: desc.doc.clone(),
            parent: None,
            flags: Vec::new(),
            kind: ScopeKind::Cmd(cmd),
        });
        self.keys.insert(key.to_string(), id);
        self.parents.push((id, desc.parent.as_ref().map(|it| it.0.clone())));

        let mut args = Vec::new();
        for member in members {
            match (&member.option, &member.argument) {
                (Some(_), Some(_)) => self.error(DeclError::AmbiguousMember {
                    scope: key.to_string(),
                    member: member.name.clone(),
                }),
                (Some(mark), None) => self.build_option(id, false, member, mark),
                (None, Some(mark)) => args.extend(self.build_argument(key, member, mark)),
                (None, None) => tracing::trace!(member = %member.name, "skipping unmarked member"),
            }
        }
        let last = args.len().saturating_sub(1);
        for (i, arg) in args.iter().enumerate() {
            if arg.variadic && i != last {
                let err = DeclError::VariadicNotLast { scope: key.to_string(), member: arg.name.clone() };
                self.error(err);
            }
        }
        if let ScopeKind::Cmd(cmd) = &mut self.tree.scope_mut(id).kind {
            cmd.args = args;
        }
        tracing::debug!(key, name = %desc.name, handler = %desc.invoke, "built command");
        Some(id)
    }

    fn build_option(&mut self, owner: ScopeId, on_group: bool, member: &MemberDesc, mark: &OptionMark) {
        let scope = self.tree.scope(owner).key.clone();
        let long = mark.long.clone().unwrap_or_else(|| kebab(&member.name));
        if !valid_name(&long) {
            self.error(DeclError::InvalidName { scope: scope.clone(), name: long.clone() });
        } else if long == "help" {
            self.error(DeclError::ReservedName { scope: scope.clone(), name: "--help".to_string() });
        }
        if let Some(alias) = mark.alias {
            if !alias.is_ascii_alphabetic() {
                let err = DeclError::InvalidAlias { scope: scope.clone(), long: long.clone(), alias };
                self.error(err);
            } else if alias == 'h' {
                self.error(DeclError::ReservedName { scope: scope.clone(), name: "-h".to_string() });
            }
        }
        if mark.global && !on_group {
            self.error(DeclError::GlobalOnCommand { scope: scope.clone(), name: format!("--{long}") });
        }

        let Resolved { parser, element_wise } = self.resolver.resolve_parser(&member.ty, mark.parse.as_deref());
        let repeatable = element_wise && member.ty.element().is_some();
        self.check_parser(&scope, &member.name, &parser);
        let validators = self.resolve_validators(&scope, member, &mark.validate, repeatable);

        let default = match &member.default {
            Some(expr) if !parser.is_invalid() => {
                match eval_default(&parser, &member.ty, repeatable, expr) {
                    Ok(it) => it,
                    Err(reason) => {
                        self.error(DeclError::InvalidDefault {
                            scope: scope.clone(),
                            member: member.name.clone(),
                            expr: expr.clone(),
                            reason,
                        });
                        Value::Absent
                    }
                }
            }
            _ if member.ty == Ty::Bool => Value::Bool(false),
            _ if repeatable => Value::Seq(Vec::new()),
            _ => Value::Absent,
        };
        tracing::trace!(scope = %scope, long = %long, ?default, repeatable, "built option");

        self.tree.push_flag(Flag {
            name: member.name.clone(),
            long,
            alias: mark.alias,
            global: mark.global,
            owner,
            ty: member.ty.clone(),
            parser,
            validators,
            default_expr: member.default.clone(),
            default,
            repeatable,
            invert: mark.invert,
            doc: member.doc.clone(),
        });
    }

    fn build_argument(&mut self, scope: &str, member: &MemberDesc, mark: &ArgumentMark) -> Option<Arg> {
        let ty = &member.ty;
        if !valid_name(&member.name) {
            self.error(DeclError::InvalidName { scope: scope.to_string(), name: member.name.clone() });
        }
        if mark.variadic {
            if !ty.element().map_or(false, Ty::is_string_like) {
                let err = DeclError::VariadicElement {
                    scope: scope.to_string(),
                    member: member.name.clone(),
                    ty: ty.clone(),
                };
                self.error(err);
                return None;
            }
        } else if ty.element().is_some() {
            let err =
                DeclError::SequenceArgument { scope: scope.to_string(), member: member.name.clone(), ty: ty.clone() };
            self.error(err);
            return None;
        }

        let parser = self.resolver.resolve_parser(ty, mark.parse.as_deref()).parser;
        self.check_parser(scope, &member.name, &parser);
        let validators = self.resolve_validators(scope, member, &mark.validate, mark.variadic);

        let default = match &member.default {
            _ if mark.variadic => Some(Value::Seq(Vec::new())),
            Some(expr) if !parser.is_invalid() => match eval_default(&parser, ty, false, expr) {
                Ok(it) => Some(it),
                Err(reason) => {
                    self.error(DeclError::InvalidDefault {
                        scope: scope.to_string(),
                        member: member.name.clone(),
                        expr: expr.clone(),
                        reason,
                    });
                    None
                }
            },
            _ if ty.nullable_inner().is_some() => Some(Value::Absent),
            _ => None,
        };

        Some(Arg {
            name: member.name.clone(),
            ty: ty.clone(),
            parser,
            validators,
            default_expr: member.default.clone(),
            default,
            variadic: mark.variadic,
            doc: member.doc.clone(),
        })
    }

    fn check_parser(&mut self, scope: &str, member: &str, parser: &ParserBinding) {
        if let ParserBinding::Invalid(source) = parser {
            let err =
                DeclError::Binding { scope: scope.to_string(), member: member.to_string(), source: source.clone() };
            self.error(err);
        }
    }

    fn resolve_validators(
        &mut self,
        scope: &str,
        member: &MemberDesc,
        refs: &[ValidatorRef],
        repeatable: bool,
    ) -> Vec<ValidatorBinding> {
        let mut res = Vec::with_capacity(refs.len());
        for reference in refs {
            let binding = self.resolver.resolve_validator(reference, &member.ty, repeatable);
            if let ValidatorBinding::Invalid(source) = &binding {
                let err = DeclError::Binding {
                    scope: scope.to_string(),
                    member: member.name.clone(),
                    source: source.clone(),
                };
                self.error(err);
            }
            res.push(binding);
        }
        res
    }

    /// Attaches every scope to its parent, picks the root and resolves
    /// default commands. Returns the root.
    pub fn bind_tree(&mut self) -> Option<ScopeId> {
        let groups = self.parents.iter().filter(|(id, _)| self.tree.scope(*id).is_group()).collect::<Vec<_>>();
        let roots = groups.iter().filter(|(_, parent)| parent.is_none()).map(|(id, _)| *id).collect::<Vec<_>>();
        let root = match roots.as_slice() {
            [] if groups.is_empty() => self.synthetic_root(),
            [] => {
                self.error(DeclError::NoRoot);
                return None;
            }
            [root] => *root,
            _ => {
                let roots = roots.iter().map(|it| self.tree.scope(*it).key.clone()).collect();
                self.error(DeclError::MultipleRoots { roots });
                return None;
            }
        };
        self.tree.root = root;

        for (id, parent) in std::mem::take(&mut self.parents) {
            if id == root {
                continue;
            }
            let parent_id = match &parent {
                None => root,
                Some(parent_key) => match self.keys.get(parent_key) {
                    Some(&it) if self.tree.scope(it).is_group() => it,
                    _ => {
                        let key = self.tree.scope(id).key.clone();
                        self.error(DeclError::UnknownParent { key, parent: parent_key.clone() });
                        continue;
                    }
                },
            };
            self.tree.scope_mut(id).parent = Some(parent_id);
            if let ScopeKind::Group(group) = &mut self.tree.scope_mut(parent_id).kind {
                group.children.push(id);
            }
        }

        let ids = self.tree.scope_ids().collect::<Vec<_>>();
        let mut cyclic = false;
        for &id in &ids {
            // Unattached scopes were already reported as `UnknownParent`.
            if self.tree.scope(id).parent.is_none() {
                continue;
            }
            if !self.reaches_root(id) {
                let key = self.tree.scope(id).key.clone();
                self.error(DeclError::ParentCycle { key });
                cyclic = true;
            }
        }
        if cyclic {
            return None;
        }

        for id in ids {
            if self.tree.scope(id).is_group() {
                self.bind_children(id);
            }
        }
        Some(root)
    }

    fn synthetic_root(&mut self) -> ScopeId {
        let commands = self.parents.iter().filter(|(id, _)| !self.tree.scope(*id).is_hidden()).count();
        let default_name = match commands {
            1 => self
                .parents
                .iter()
                .map(|(id, _)| self.tree.scope(*id))
                .find(|it| !it.is_hidden())
                .map(|it| it.name.clone()),
            _ => None,
        };
        tracing::debug!(program = %self.program, ?default_name, "synthesizing root group");
        let group = Group { default_name, ..Group::default() };
        self.tree.push_scope(Scope {
            name: self.program.clone(),
            key: self.program.clone(),
            doc: None,
            parent: None,
            flags: Vec::new(),
            kind: ScopeKind::Group(group),
        })
    }

    fn reaches_root(&self, id: ScopeId) -> bool {
        let mut cur = id;
        for _ in 0..=self.tree.scopes.len() {
            if cur == self.tree.root {
                return true;
            }
            match self.tree.scope(cur).parent {
                Some(parent) => cur = parent,
                None => return false,
            }
        }
        false
    }

    fn bind_children(&mut self, id: ScopeId) {
        let scope = self.tree.scope(id);
        let key = scope.key.clone();
        let children = self.tree.children(id).to_vec();
        let default_name = scope.group().and_then(|it| it.default_name.clone());

        let mut seen = HashSet::new();
        let mut hidden: Option<ScopeId> = None;
        for &child in &children {
            let child_scope = self.tree.scope(child);
            if child_scope.is_hidden() {
                match hidden {
                    Some(first) => {
                        let err = DeclError::DuplicateCommand {
                            name: HIDDEN_MARKER.to_string(),
                            first: self.tree.scope(first).key.clone(),
                            second: child_scope.key.clone(),
                        };
                        self.error(err);
                    }
                    None => hidden = Some(child),
                }
            } else if !seen.insert(child_scope.name.clone()) {
                let err = DeclError::DuplicateChild { scope: key.clone(), name: child_scope.name.clone() };
                self.error(err);
            }
        }

        let default_command = match default_name.as_deref() {
            Some(HIDDEN_MARKER) => {
                if hidden.is_none() {
                    let err = DeclError::MissingDefaultCommand { scope: key.clone(), name: HIDDEN_MARKER.to_string() };
                    self.error(err);
                }
                hidden
            }
            Some(name) => {
                if hidden.is_some() {
                    self.error(DeclError::UnreachableHiddenCommand { scope: key.clone() });
                }
                let found = children.iter().copied().find(|&it| {
                    let child = self.tree.scope(it);
                    !child.is_group() && !child.is_hidden() && child.name == name
                });
                if found.is_none() {
                    let err = DeclError::MissingDefaultCommand { scope: key.clone(), name: name.to_string() };
                    self.error(err);
                }
                found
            }
            None => {
                if hidden.is_some() {
                    self.error(DeclError::UnreachableHiddenCommand { scope: key.clone() });
                }
                None
            }
        };
        if let ScopeKind::Group(group) = &mut self.tree.scope_mut(id).kind {
            group.default_command = default_command;
        }
    }

    /// Returns the tree once every declaration is sound and the tree-wide
    /// invariants hold.
    pub fn finish(self) -> Result<CommandTree, Diagnostics> {
        let Builder { mut tree, errors, .. } = self;
        if !errors.is_empty() {
            return Err(Diagnostics::new(errors));
        }
        validate::validate(&tree)?;
        tree.link_tables();
        tracing::debug!(scopes = tree.scopes.len(), options = tree.flags.len(), "built command tree");
        Ok(tree)
    }
}

/// Stands in for a handler the lookup does not know. The build fails with
/// `MissingHandler`, so it is never called from a finished tree.
fn unbound(name: &str) -> Handler {
    let name = name.to_string();
    Arc::new(move |_: &Invocation| -> anyhow::Result<()> { anyhow::bail!("handler `{name}` is not provided") })
}

/// Evaluates a default expression through the member's parser.
fn eval_default(parser: &ParserBinding, ty: &Ty, repeatable: bool, expr: &str) -> Result<Value, String> {
    if repeatable {
        let elem = ty.element().unwrap_or(ty);
        let expr = expr.trim();
        let items = expr.strip_prefix('[').and_then(|it| it.strip_suffix(']')).unwrap_or(expr);
        if items.trim().is_empty() {
            return Ok(Value::Seq(Vec::new()));
        }
        let values = items.split(',').map(|it| parser.parse(it.trim(), elem)).collect::<Result<Vec<_>, _>>()?;
        return Ok(Value::Seq(values));
    }
    match parser {
        ParserBinding::Nullable(inner) => {
            if expr.is_empty() || expr == "null" {
                return Ok(Value::Absent);
            }
            inner.parse(expr, ty.nullable_inner().unwrap_or(ty))
        }
        _ => parser.parse(expr, ty),
    }
}

pub(crate) fn valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        }
        _ => false,
    }
}

/// `intOpt` and `int_opt` both become `int-opt`.
pub(crate) fn kebab(name: &str) -> String {
    let mut res = String::with_capacity(name.len() + 2);
    for c in name.chars() {
        if c == '_' {
            res.push('-');
        } else if c.is_ascii_uppercase() {
            if !res.is_empty() && !res.ends_with('-') {
                res.push('-');
            }
            res.push(c.to_ascii_lowercase());
        } else {
            res.push(c);
        }
    }
    res
}
