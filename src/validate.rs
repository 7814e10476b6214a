//! Tree-wide invariants that no single declaration can check by itself.

use std::collections::{HashMap, HashSet};

use crate::{
    error::DeclError,
    model::{CommandTree, ScopeId},
};

/// Global option names and aliases claimed by the ancestors of a scope.
#[derive(Debug, Clone, Default)]
struct Globals {
    longs: HashMap<String, ScopeId>,
    aliases: HashMap<char, ScopeId>,
}

/// Walks the tree depth-first and stops at the first violation.
pub fn validate(tree: &CommandTree) -> Result<(), DeclError> {
    validate_scope(tree, tree.root(), &Globals::default(), &HashMap::new())
}

/// `members` maps the member name of every option owned along the path from
/// the root to `id`'s parent.
fn validate_scope(
    tree: &CommandTree,
    id: ScopeId,
    inherited: &Globals,
    members: &HashMap<String, ScopeId>,
) -> Result<(), DeclError> {
    let scope = tree.scope(id);
    let path = tree.path(id);
    let mut globals = inherited.clone();
    let mut members = members.clone();
    let mut longs = HashSet::new();
    let mut aliases = HashSet::new();

    for &flag_id in &scope.flags {
        let flag = tree.flag(flag_id);
        let long = flag.spelling();
        if !longs.insert(flag.long.as_str()) {
            return Err(DeclError::DuplicateOption { scope: path, name: long });
        }
        if let Some(alias) = flag.alias {
            if !aliases.insert(alias) {
                return Err(DeclError::DuplicateOption { scope: path, name: format!("-{alias}") });
            }
        }

        if flag.global {
            if !scope.is_group() {
                return Err(DeclError::GlobalOnCommand { scope: path, name: long });
            }
            if let Some(&first) = globals.longs.get(&flag.long) {
                return Err(DeclError::GlobalConflict { scope: path, name: long, first: tree.path(first) });
            }
            if let Some(&first) = flag.alias.and_then(|it| globals.aliases.get(&it)) {
                let name = format!("-{}", flag.alias.unwrap_or_default());
                return Err(DeclError::GlobalConflict { scope: path, name, first: tree.path(first) });
            }
            globals.longs.insert(flag.long.clone(), id);
            if let Some(alias) = flag.alias {
                globals.aliases.insert(alias, id);
            }
        } else {
            if let Some(&first) = inherited.longs.get(&flag.long) {
                return Err(DeclError::ShadowsGlobal { scope: path, name: long, first: tree.path(first) });
            }
            if let Some(&first) = flag.alias.and_then(|it| inherited.aliases.get(&it)) {
                let name = format!("-{}", flag.alias.unwrap_or_default());
                return Err(DeclError::ShadowsGlobal { scope: path, name, first: tree.path(first) });
            }
        }

        if let Some(&first) = members.get(&flag.name) {
            let member = flag.name.clone();
            return Err(DeclError::DuplicateMember { scope: path, name: long, member, first: tree.path(first) });
        }
        members.insert(flag.name.clone(), id);
    }

    if let Some(group) = scope.group() {
        if let Some(default) = group.default_command {
            if !group.children.contains(&default) || tree.scope(default).is_group() {
                let name = tree.scope(default).name.clone();
                return Err(DeclError::MissingDefaultCommand { scope: path, name });
            }
            check_default_options(tree, id, default)?;
        }
        for &child in &group.children {
            validate_scope(tree, child, &globals, &members)?;
        }
    }
    Ok(())
}

/// A default command's options are looked up from its group as well.
fn check_default_options(tree: &CommandTree, group: ScopeId, default: ScopeId) -> Result<(), DeclError> {
    let local = tree.scope(group).flags.iter().map(|&it| tree.flag(it)).filter(|it| !it.global).collect::<Vec<_>>();
    for &flag_id in &tree.scope(default).flags {
        let flag = tree.flag(flag_id);
        let name = if local.iter().any(|it| it.long == flag.long) {
            flag.spelling()
        } else if let Some(alias) = flag.alias.filter(|&alias| local.iter().any(|it| it.alias == Some(alias))) {
            format!("-{alias}")
        } else {
            continue;
        };
        return Err(DeclError::DefaultOptionConflict { scope: tree.path(default), name, group: tree.path(group) });
    }
    Ok(())
}
