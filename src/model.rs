//! The command tree: groups, commands, options and arguments after binding
//! resolution.
//!
//! Scopes and options live in two arenas and refer to each other through
//! [`ScopeId`] and [`FlagId`]. Parent links are plain indices, so the tree
//! has no ownership cycles and is `Send + Sync` once built.

use std::{collections::HashMap, fmt};

use crate::{
    binding::{ParserBinding, ValidatorBinding},
    lookup::Handler,
    ty::Ty,
    value::Value,
};

/// The name of a command that is only reachable as a group's default.
pub const HIDDEN_MARKER: &str = "_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlagId(pub(crate) usize);

#[derive(Debug)]
pub struct CommandTree {
    pub(crate) scopes: Vec<Scope>,
    pub(crate) flags: Vec<Flag>,
    pub(crate) root: ScopeId,
    tables: Vec<Table>,
}

#[derive(Debug)]
pub struct Scope {
    pub name: String,
    /// Declaration key the scope was built from.
    pub key: String,
    pub doc: Option<String>,
    pub parent: Option<ScopeId>,
    /// Options owned by this scope, in declaration order.
    pub flags: Vec<FlagId>,
    pub kind: ScopeKind,
}

#[derive(Debug)]
pub enum ScopeKind {
    Group(Group),
    Cmd(Cmd),
}

#[derive(Debug, Default)]
pub struct Group {
    /// Sub-groups and commands in declaration order.
    pub children: Vec<ScopeId>,
    pub default_command: Option<ScopeId>,
    /// The default as declared, before resolution.
    pub default_name: Option<String>,
}

#[derive(Debug)]
pub struct Cmd {
    /// Positional arguments; only the last one may be variadic.
    pub args: Vec<Arg>,
    pub handler: HandlerRef,
}

#[derive(Clone)]
pub struct HandlerRef {
    pub name: String,
    pub f: Handler,
}

impl fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug)]
pub struct Flag {
    /// Member name, the key of the value in an invocation.
    pub name: String,
    pub long: String,
    pub alias: Option<char>,
    pub global: bool,
    pub owner: ScopeId,
    pub ty: Ty,
    pub parser: ParserBinding,
    pub validators: Vec<ValidatorBinding>,
    pub default_expr: Option<String>,
    pub default: Value,
    /// The parser binds to the element type and occurrences accumulate.
    pub repeatable: bool,
    pub invert: bool,
    pub doc: Option<String>,
}

#[derive(Debug)]
pub struct Arg {
    pub name: String,
    pub ty: Ty,
    pub parser: ParserBinding,
    pub validators: Vec<ValidatorBinding>,
    pub default_expr: Option<String>,
    /// `None` for a required argument.
    pub default: Option<Value>,
    pub variadic: bool,
    pub doc: Option<String>,
}

/// Options visible in one scope: its own plus every ancestor's globals.
#[derive(Debug, Default)]
struct Table {
    visible: Vec<FlagId>,
    longs: HashMap<String, FlagId>,
    aliases: HashMap<char, FlagId>,
}

impl Flag {
    /// A flag is an option of type `bool`: it needs no value token.
    pub fn is_switch(&self) -> bool {
        self.ty == Ty::Bool
    }

    /// The value type a single token parses into.
    pub fn value_ty(&self) -> &Ty {
        match (self.repeatable, self.ty.element()) {
            (true, Some(elem)) => elem,
            _ => &self.ty,
        }
    }

    pub fn spelling(&self) -> String {
        format!("--{}", self.long)
    }
}

impl Arg {
    pub fn is_required(&self) -> bool {
        self.default.is_none() && !self.variadic
    }

    pub fn value_ty(&self) -> &Ty {
        match (self.variadic, self.ty.element()) {
            (true, Some(elem)) => elem,
            _ => &self.ty,
        }
    }
}

impl Scope {
    pub fn is_group(&self) -> bool {
        matches!(self.kind, ScopeKind::Group(_))
    }

    pub fn is_hidden(&self) -> bool {
        !self.is_group() && self.name == HIDDEN_MARKER
    }

    pub fn group(&self) -> Option<&Group> {
        match &self.kind {
            ScopeKind::Group(it) => Some(it),
            ScopeKind::Cmd(_) => None,
        }
    }

    pub fn cmd(&self) -> Option<&Cmd> {
        match &self.kind {
            ScopeKind::Cmd(it) => Some(it),
            ScopeKind::Group(_) => None,
        }
    }
}

impl CommandTree {
    pub(crate) fn new() -> CommandTree {
        CommandTree { scopes: Vec::new(), flags: Vec::new(), root: ScopeId(0), tables: Vec::new() }
    }

    pub(crate) fn push_scope(&mut self, scope: Scope) -> ScopeId {
        self.scopes.push(scope);
        ScopeId(self.scopes.len() - 1)
    }

    pub(crate) fn push_flag(&mut self, flag: Flag) -> FlagId {
        let id = FlagId(self.flags.len());
        self.scopes[flag.owner.0].flags.push(id);
        self.flags.push(flag);
        id
    }

    pub(crate) fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0]
    }

    pub fn root(&self) -> ScopeId {
        self.root
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    pub fn flag(&self, id: FlagId) -> &Flag {
        &self.flags[id.0]
    }

    pub fn scope_ids(&self) -> impl Iterator<Item = ScopeId> {
        (0..self.scopes.len()).map(ScopeId)
    }

    pub fn children(&self, id: ScopeId) -> &[ScopeId] {
        self.scope(id).group().map(|it| it.children.as_slice()).unwrap_or_default()
    }

    pub fn default_command(&self, id: ScopeId) -> Option<ScopeId> {
        self.scope(id).group().and_then(|it| it.default_command)
    }

    /// A child reachable by typing its name. Hidden commands never are.
    pub fn find_child(&self, id: ScopeId, name: &str) -> Option<ScopeId> {
        self.children(id).iter().copied().find(|&it| {
            let scope = self.scope(it);
            !scope.is_hidden() && scope.name == name
        })
    }

    /// Scopes from the root down to `id`, inclusive.
    pub fn ancestry(&self, id: ScopeId) -> Vec<ScopeId> {
        let mut res = vec![id];
        let mut cur = id;
        while let Some(parent) = self.scope(cur).parent {
            res.push(parent);
            cur = parent;
        }
        res.reverse();
        res
    }

    /// Space separated names from the root, e.g. `app remote add`. The
    /// hidden marker is never part of a path.
    pub fn path(&self, id: ScopeId) -> String {
        self.path_names(id).collect::<Vec<_>>().join(" ")
    }

    pub fn path_names(&self, id: ScopeId) -> impl Iterator<Item = &str> {
        self.ancestry(id).into_iter().map(|it| self.scope(it)).filter(|it| !it.is_hidden()).map(|it| it.name.as_str())
    }

    /// Looks up `--long` or `-a` in the merged table of `scope`.
    pub fn lookup_flag(&self, scope: ScopeId, flag: &str) -> Option<FlagId> {
        let table = self.tables.get(scope.0)?;
        if let Some(long) = flag.strip_prefix("--") {
            return table.longs.get(long).copied();
        }
        let mut chars = flag.strip_prefix('-')?.chars();
        match (chars.next(), chars.next()) {
            (Some(alias), None) => table.aliases.get(&alias).copied(),
            _ => None,
        }
    }

    /// Inherited globals first, then the scope's own options.
    pub fn visible_flags(&self, scope: ScopeId) -> &[FlagId] {
        self.tables.get(scope.0).map(|it| it.visible.as_slice()).unwrap_or_default()
    }

    /// Precomputes the merged option table of every scope. Runs once, after
    /// the tree was validated.
    pub(crate) fn link_tables(&mut self) {
        let mut tables = Vec::with_capacity(self.scopes.len());
        for id in self.scope_ids() {
            let mut table = Table::default();
            let ancestry = self.ancestry(id);
            let ancestors = &ancestry[..ancestry.len() - 1];
            let inherited = ancestors
                .iter()
                .flat_map(|&it| self.scope(it).flags.iter().copied())
                .filter(|&it| self.flag(it).global);
            for flag_id in inherited.chain(self.scope(id).flags.iter().copied()) {
                let flag = self.flag(flag_id);
                table.visible.push(flag_id);
                table.longs.insert(flag.long.clone(), flag_id);
                if let Some(alias) = flag.alias {
                    table.aliases.insert(alias, flag_id);
                }
            }
            tables.push(table);
        }
        tracing::trace!(scopes = tables.len(), "linked option tables");
        self.tables = tables;
    }
}
