//! A compact text front-end producing descriptors.
//!
//! ```text
//! /// Manage the things.
//! group app {
//!     default status
//!     global flag -v, --verbose
//!
//!     /// Print the status.
//!     cmd status => show_status {
//!         option -n, --count: u32 = "1" check positive "must be positive"
//!         flag --all
//!         arg path: PathBuf?
//!         params rest: [string]
//!     }
//! }
//! ```
//!
//! The text is tokenized with `proc-macro2`, so comments, string literals and
//! `///` doc comments follow Rust's lexical rules.

use std::{fmt, mem, str::FromStr};

use proc_macro2::{Delimiter, TokenStream, TokenTree};

use crate::{
    descriptor::{
        ArgumentMark, CommandDesc, Descriptor, GroupDesc, MemberDesc, OptionMark, ScopeKey, ValidatorRef,
    },
    model::HIDDEN_MARKER,
    ty::Ty,
};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    msg: String,
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.msg, f)
    }
}

macro_rules! format_err {
    ($($tt:tt)*) => {
        Error { msg: format!($($tt)*) }
    };
}

macro_rules! bail {
    ($($tt:tt)*) => {
        return Err(format_err!($($tt)*))
    };
}

pub fn parse(text: &str) -> Result<Vec<Descriptor>> {
    let ts = TokenStream::from_str(text).map_err(|err| format_err!("invalid tokens: {err}"))?;
    let p = &mut Parser::new(ts);
    let mut res = Vec::new();
    while !p.end() {
        let doc = opt_doc(p)?;
        if p.at_keyword("group") {
            group(p, None, doc, &mut res)?;
        } else if p.at_keyword("cmd") {
            cmd(p, None, doc, &mut res)?;
        } else {
            bail!("expected `group` or `cmd`, got `{}`", p.peek_text())
        }
    }
    Ok(res)
}

fn group(p: &mut Parser, parent: Option<&str>, doc: Option<String>, out: &mut Vec<Descriptor>) -> Result<()> {
    p.expect_keyword("group")?;
    let name = cmd_name(p)?;
    let key = scope_key(parent, &name);
    let idx = out.len();
    out.push(Descriptor::Group(GroupDesc {
        key: ScopeKey::new(&key),
        name,
        parent: parent.map(ScopeKey::new),
        default_command: None,
        doc,
    }));

    let mut default = None;
    p.enter_delim(Delimiter::Brace)?;
    while !p.end() {
        let doc = opt_doc(p)?;
        let is_default = p.eat_keyword("default");
        if is_default && default.is_some() {
            bail!("only one command can be default in `{key}`")
        }
        if p.at_keyword("cmd") {
            let name = cmd(p, Some(&key), doc, out)?;
            if is_default {
                default = Some(name);
            }
        } else if is_default {
            default = Some(cmd_name(p)?);
        } else if p.at_keyword("group") {
            group(p, Some(&key), doc, out)?;
        } else {
            let global = p.eat_keyword("global");
            member(p, &key, global, doc, out)?;
        }
    }
    p.exit_delim()?;

    if let Descriptor::Group(it) = &mut out[idx] {
        it.default_command = default;
    }
    Ok(())
}

fn cmd(p: &mut Parser, parent: Option<&str>, doc: Option<String>, out: &mut Vec<Descriptor>) -> Result<String> {
    p.expect_keyword("cmd")?;
    let name = cmd_name(p)?;
    let invoke = if p.eat_punct('=') {
        p.expect_punct('>')?;
        p.expect_path()?
    } else if name == HIDDEN_MARKER {
        match parent {
            Some(parent) => snake(parent.rsplit('.').next().unwrap_or(parent)),
            None => bail!("hidden command needs a handler: `cmd _ => handler`"),
        }
    } else {
        snake(&name)
    };
    let key = scope_key(parent, &name);
    out.push(Descriptor::Command(CommandDesc {
        key: ScopeKey::new(&key),
        name: name.clone(),
        parent: parent.map(ScopeKey::new),
        invoke,
        doc,
    }));

    if p.at_delim(Delimiter::Brace) {
        p.enter_delim(Delimiter::Brace)?;
        while !p.end() {
            let doc = opt_doc(p)?;
            let global = p.eat_keyword("global");
            member(p, &key, global, doc, out)?;
        }
        p.exit_delim()?;
    } else {
        p.eat_punct(';');
    }
    Ok(name)
}

const MEMBER_KINDS: [&str; 4] = ["flag", "option", "arg", "params"];

fn member(p: &mut Parser, owner: &str, global: bool, doc: Option<String>, out: &mut Vec<Descriptor>) -> Result<()> {
    let Some(kind) = MEMBER_KINDS.into_iter().find(|kw| p.eat_keyword(kw)) else {
        bail!("expected `flag`, `option`, `arg` or `params`, got `{}`", p.peek_text())
    };
    let (name, ty, mut option, mut argument) = if kind == "flag" || kind == "option" {
        let (alias, long) = flag_names(p)?;
        let ty = if kind == "flag" {
            Ty::Bool
        } else {
            p.expect_punct(':')?;
            ty(p)?
        };
        let mark = OptionMark { long: Some(long.clone()), alias, global, ..OptionMark::default() };
        (snake(&long), ty, Some(mark), None)
    } else {
        if global {
            bail!("positional argument cannot be global")
        }
        let name = p.expect_ident()?;
        p.expect_punct(':')?;
        let ty = ty(p)?;
        let mark = ArgumentMark { variadic: kind == "params", ..ArgumentMark::default() };
        (snake(&name), ty, None, Some(mark))
    };
    let default = if p.eat_punct('=') { Some(p.expect_string()?) } else { None };

    loop {
        if p.eat_keyword("parse") {
            let path = p.expect_path()?;
            match (&mut option, &mut argument) {
                (Some(OptionMark { parse, .. }), _) | (_, Some(ArgumentMark { parse, .. })) => *parse = Some(path),
                (None, None) => (),
            }
        } else if p.eat_keyword("check") {
            let mut check = ValidatorRef::method(p.expect_path()?);
            if let Some(msg) = p.eat_string() {
                check = check.with_message(msg);
            }
            push_validator(&mut option, &mut argument, check);
        } else if p.eat_keyword("require") {
            let expected = !p.eat_punct('!');
            let mut check = ValidatorRef::property(p.expect_ident()?, expected);
            if let Some(msg) = p.eat_string() {
                check = check.with_message(msg);
            }
            push_validator(&mut option, &mut argument, check);
        } else if p.eat_keyword("invert") {
            match &mut option {
                Some(mark) if kind == "flag" => mark.invert = true,
                _ => bail!("only flags can be inverted: `{name}`"),
            }
        } else {
            break;
        }
    }
    p.eat_punct(';');

    out.push(Descriptor::Member(MemberDesc {
        owner: ScopeKey::new(owner),
        name,
        ty,
        default,
        doc,
        option,
        argument,
    }));
    Ok(())
}

fn push_validator(option: &mut Option<OptionMark>, argument: &mut Option<ArgumentMark>, check: ValidatorRef) {
    match (option, argument) {
        (Some(OptionMark { validate, .. }), _) | (_, Some(ArgumentMark { validate, .. })) => validate.push(check),
        (None, None) => (),
    }
}

/// `-v, --verbose` or `--verbose`.
fn flag_names(p: &mut Parser) -> Result<(Option<char>, String)> {
    let name = flag_name(p)?;
    if let Some(long) = name.strip_prefix("--") {
        return Ok((None, long.to_string()));
    }
    let mut chars = name[1..].chars();
    let alias = match (chars.next(), chars.next()) {
        (Some(c), None) => c,
        _ => bail!("short option must be a single character: `{name}`"),
    };
    if !p.eat_punct(',') {
        bail!("long option is required for `{name}`");
    }
    let long = flag_name(p)?;
    match long.strip_prefix("--") {
        Some(long) => Ok((Some(alias), long.to_string())),
        None => bail!("long name must begin with `--`: `{long}`"),
    }
}

fn ty(p: &mut Parser) -> Result<Ty> {
    let base = if p.at_delim(Delimiter::Bracket) {
        p.enter_delim(Delimiter::Bracket)?;
        let elem = ty(p)?;
        p.exit_delim()?;
        Ty::seq(elem)
    } else {
        let name = p.expect_path()?;
        name.parse::<Ty>().map_err(|err| format_err!("{err}"))?
    };
    if p.eat_punct('?') {
        return Ok(Ty::nullable(base));
    }
    Ok(base)
}

/// `///` comments arrive as `#[doc = " text"]` attributes.
fn opt_doc(p: &mut Parser) -> Result<Option<String>> {
    let mut lines = Vec::new();
    while p.eat_punct('#') {
        p.enter_delim(Delimiter::Bracket)?;
        p.expect_keyword("doc")?;
        p.expect_punct('=')?;
        let line = p.expect_string()?;
        lines.push(line.strip_prefix(' ').unwrap_or(&line).to_string());
        p.exit_delim()?;
    }
    Ok((!lines.is_empty()).then(|| lines.join("\n")))
}

fn cmd_name(p: &mut Parser) -> Result<String> {
    let name = p.expect_name()?;
    if name.starts_with('-') {
        bail!("command name can't begin with `-`: `{name}`");
    }
    Ok(name)
}

fn flag_name(p: &mut Parser) -> Result<String> {
    let name = p.expect_name()?;
    if !name.starts_with('-') {
        bail!("flag name should begin with `-`: `{name}`");
    }
    Ok(name)
}

fn scope_key(parent: Option<&str>, name: &str) -> String {
    match parent {
        Some(parent) => format!("{parent}.{name}"),
        None => name.to_string(),
    }
}

fn snake(s: &str) -> String {
    s.replace('-', "_")
}

struct Parser {
    stack: Vec<Vec<TokenTree>>,
    ts: Vec<TokenTree>,
}

impl Parser {
    fn new(ts: TokenStream) -> Self {
        let mut ts = ts.into_iter().collect::<Vec<_>>();
        ts.reverse();
        Self { stack: Vec::new(), ts }
    }

    fn at_delim(&self, delimiter: Delimiter) -> bool {
        matches!(self.ts.last(), Some(TokenTree::Group(g)) if g.delimiter() == delimiter)
    }
    fn enter_delim(&mut self, delimiter: Delimiter) -> Result<()> {
        match self.ts.pop() {
            Some(TokenTree::Group(g)) if g.delimiter() == delimiter => {
                let mut ts = g.stream().into_iter().collect::<Vec<_>>();
                ts.reverse();
                let ts = mem::replace(&mut self.ts, ts);
                self.stack.push(ts);
            }
            _ => match delimiter {
                Delimiter::Brace => bail!("expected `{{`"),
                Delimiter::Bracket => bail!("expected `[`"),
                Delimiter::Parenthesis => bail!("expected `(`"),
                Delimiter::None => bail!("expected a group"),
            },
        }
        Ok(())
    }
    fn exit_delim(&mut self) -> Result<()> {
        if !self.end() {
            bail!("unexpected `{}`", self.peek_text())
        }
        self.ts = self.stack.pop().ok_or_else(|| format_err!("unbalanced delimiters"))?;
        Ok(())
    }
    fn end(&mut self) -> bool {
        self.ts.last().is_none()
    }
    fn peek_text(&self) -> String {
        self.ts.last().map(|it| it.to_string()).unwrap_or_default()
    }

    fn expect_keyword(&mut self, kw: &str) -> Result<()> {
        if !self.eat_keyword(kw) {
            bail!("expected `{kw}`, got `{}`", self.peek_text())
        }
        Ok(())
    }
    fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.at_keyword(kw) {
            self.ts.pop();
            true
        } else {
            false
        }
    }
    fn at_keyword(&self, kw: &str) -> bool {
        matches!(self.ts.last(), Some(TokenTree::Ident(ident)) if ident == kw)
    }

    /// A dashed name such as `remote-add`, `-v` or `--int-opt`.
    fn expect_name(&mut self) -> Result<String> {
        let mut res = String::new();
        while self.eat_punct('-') {
            res.push('-');
        }
        loop {
            match self.ts.pop() {
                Some(TokenTree::Ident(ident)) => res.push_str(&ident.to_string()),
                other => {
                    let got = other.map(|it| it.to_string()).unwrap_or_default();
                    bail!("expected a name, got: `{res}{got}`")
                }
            }
            if !(self.lookahead_punct('-', 0) && self.lookahead_ident(1)) {
                return Ok(res);
            }
            self.ts.pop();
            res.push('-');
        }
    }

    /// `name` or `Type::name`.
    fn expect_path(&mut self) -> Result<String> {
        let mut res = self.expect_ident()?;
        while self.lookahead_punct(':', 0) && self.lookahead_punct(':', 1) {
            self.ts.pop();
            self.ts.pop();
            res.push_str("::");
            res.push_str(&self.expect_ident()?);
        }
        Ok(res)
    }
    fn expect_ident(&mut self) -> Result<String> {
        match self.ts.pop() {
            Some(TokenTree::Ident(ident)) => Ok(ident.to_string()),
            other => bail!("expected an identifier, got `{}`", other.map(|it| it.to_string()).unwrap_or_default()),
        }
    }

    fn expect_punct(&mut self, punct: char) -> Result<()> {
        if !self.eat_punct(punct) {
            bail!("expected `{punct}`, got `{}`", self.peek_text())
        }
        Ok(())
    }
    fn eat_punct(&mut self, punct: char) -> bool {
        match self.ts.last() {
            Some(TokenTree::Punct(p)) if p.as_char() == punct => {
                self.ts.pop();
                true
            }
            _ => false,
        }
    }
    fn lookahead_punct(&self, punct: char, n: usize) -> bool {
        matches!(self.ts.iter().rev().nth(n), Some(TokenTree::Punct(p)) if p.as_char() == punct)
    }
    fn lookahead_ident(&self, n: usize) -> bool {
        matches!(self.ts.iter().rev().nth(n), Some(TokenTree::Ident(_)))
    }

    fn expect_string(&mut self) -> Result<String> {
        match self.eat_string() {
            Some(it) => Ok(it),
            None => bail!("expected a string, got `{}`", self.peek_text()),
        }
    }
    fn eat_string(&mut self) -> Option<String> {
        let res = match self.ts.last() {
            Some(TokenTree::Literal(lit)) => str_lit_value(&lit.to_string())?,
            _ => return None,
        };
        self.ts.pop();
        Some(res)
    }
}

/// The value of a `"..."`, `r"..."` or `r#"..."#` literal; `None` for any
/// other literal.
fn str_lit_value(lit: &str) -> Option<String> {
    if let Some(raw) = lit.strip_prefix('r') {
        let hashes = raw.len() - raw.trim_start_matches('#').len();
        let inner = raw.get(hashes..raw.len() - hashes)?;
        return inner.strip_prefix('"')?.strip_suffix('"').map(str::to_string);
    }
    let inner = lit.strip_prefix('"')?.strip_suffix('"')?;
    let mut res = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            res.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => res.push('\n'),
            Some('t') => res.push('\t'),
            Some('r') => res.push('\r'),
            Some('0') => res.push('\0'),
            Some('x') => {
                let code = chars.by_ref().take(2).collect::<String>();
                res.extend(u8::from_str_radix(&code, 16).ok().filter(u8::is_ascii).map(char::from));
            }
            Some('u') => {
                let code = chars.by_ref().skip(1).take_while(|&it| it != '}').collect::<String>();
                res.extend(u32::from_str_radix(&code, 16).ok().and_then(char::from_u32));
            }
            // Line continuation.
            Some('\n') => chars = chars.as_str().trim_start().chars(),
            Some(other) => res.push(other),
            None => (),
        }
    }
    Some(res)
}
