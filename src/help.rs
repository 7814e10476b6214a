//! Help text of a single scope.

use std::fmt::Write;

use crate::model::{Arg, CommandTree, Flag, ScopeId};

macro_rules! w {
    ($($tt:tt)*) => {
        drop(write!($($tt)*))
    };
}

/// Renders the help of `id`. A group with a default command also lists the
/// arguments and options of that command, since they are accepted at the
/// group level.
pub fn render(tree: &CommandTree, id: ScopeId) -> String {
    let mut buf = String::new();
    let scope = tree.scope(id);
    w!(buf, "{}\n", tree.path(id));
    if let Some(doc) = &scope.doc {
        write_lines_indented(&mut buf, doc, 2);
    }

    let default = tree.default_command(id);
    let args = match (scope.cmd(), default.and_then(|it| tree.scope(it).cmd())) {
        (Some(cmd), _) | (None, Some(cmd)) => cmd.args.iter().collect::<Vec<_>>(),
        (None, None) => Vec::new(),
    };
    if !args.is_empty() {
        blank_line(&mut buf);
        w!(buf, "ARGS:\n");
        let mut blank = "";
        for arg in args {
            w!(buf, "{blank}");
            blank = "\n";
            arg_help(&mut buf, arg);
        }
    }

    let mut flags = tree.visible_flags(id).iter().map(|&it| tree.flag(it)).collect::<Vec<_>>();
    if let Some(default) = default {
        flags.extend(tree.scope(default).flags.iter().map(|&it| tree.flag(it)));
    }
    blank_line(&mut buf);
    w!(buf, "OPTIONS:\n");
    for flag in flags {
        flag_help(&mut buf, flag);
        blank_line(&mut buf);
    }
    w!(buf, "    -h, --help\n");
    w!(buf, "      Prints help information.\n");

    let commands = tree
        .children(id)
        .iter()
        .map(|&it| tree.scope(it))
        .filter(|it| !it.is_hidden())
        .collect::<Vec<_>>();
    if !commands.is_empty() {
        blank_line(&mut buf);
        w!(buf, "COMMANDS:\n");
        let mut blank = "";
        for command in commands {
            w!(buf, "{blank}");
            blank = "\n";
            let marker = if Some(command.name.as_str()) == default.map(|it| tree.scope(it).name.as_str()) {
                " (default)"
            } else {
                ""
            };
            w!(buf, "    {}{marker}\n", command.name);
            if let Some(line) = command.doc.as_deref().and_then(|it| it.lines().next()) {
                write_lines_indented(&mut buf, line, 6);
            }
        }
    }
    buf
}

fn arg_help(buf: &mut String, arg: &Arg) {
    let (l, r) = if arg.variadic {
        ("<", ">...")
    } else if arg.is_required() {
        ("<", ">")
    } else {
        ("[", "]")
    };
    w!(buf, "    {l}{}{r}", arg.name);
    if let Some(expr) = &arg.default_expr {
        w!(buf, "  [default: {expr}]");
    }
    w!(buf, "\n");
    if let Some(doc) = &arg.doc {
        write_lines_indented(buf, doc, 6);
    }
}

fn flag_help(buf: &mut String, flag: &Flag) {
    let short = flag.alias.map(|it| format!("-{it}, ")).unwrap_or_default();
    let value = if flag.is_switch() {
        String::new()
    } else {
        let ty = flag.value_ty();
        let ty = ty.nullable_inner().unwrap_or(ty);
        let repeat = if flag.repeatable { "..." } else { "" };
        format!(" <{ty}>{repeat}")
    };
    w!(buf, "    {short}--{}{value}", flag.long);
    if let Some(expr) = &flag.default_expr {
        w!(buf, "  [default: {expr}]");
    }
    w!(buf, "\n");
    if let Some(doc) = &flag.doc {
        write_lines_indented(buf, doc, 6);
    }
}

fn write_lines_indented(buf: &mut String, multiline_str: &str, indent: usize) {
    for line in multiline_str.split('\n').map(str::trim_end) {
        if line.is_empty() {
            w!(buf, "\n")
        } else {
            w!(buf, "{blank:indent$}{line}\n", blank = "");
        }
    }
}

fn blank_line(buf: &mut String) {
    w!(buf, "\n");
}
