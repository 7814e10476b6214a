mod build_errors;
mod dsl;
mod flags;
mod options;
mod properties;
mod subcommands;

use std::fmt::Write;

use argtree::{ty::IntTy, CommandTree, Dispatcher, Invocation, Registry, Ty, Value};
use expect_test::Expect;

/// The prelude plus the user types and checks the tests refer to. Every
/// handler succeeds except `explode`; `yes_no` hands back any other word
/// unparsed.
fn registry() -> Registry {
    let mut res = Registry::with_prelude();
    res.predicate("no_spaces", Ty::String, |v| !v.as_str().unwrap_or_default().contains(' '))
        .predicate("positive", Ty::Int(IntTy::I64), |v| v.as_i64().map_or(false, |it| it > 0))
        .parse_fn("parse_hex", Ty::Int(IntTy::U32), |s| {
            u32::from_str_radix(s.trim_start_matches("0x"), 16)
                .map(|it| Value::UInt(it.into()))
                .map_err(|err| err.to_string())
        })
        .parse_fn("yes_no", Ty::Bool, |s| {
            Ok(match s {
                "yes" => Value::Bool(true),
                "no" => Value::Bool(false),
                other => Value::str(other),
            })
        })
        .enumeration("Color", &[("Red", 1), ("Green", 2)])
        .constructor("Point", |s| {
            let (x, y) = s.split_once(',').ok_or("expected `x,y`")?;
            let x = x.trim().parse::<i64>().map_err(|err| err.to_string())?;
            let y = y.trim().parse::<i64>().map_err(|err| err.to_string())?;
            let fields = [("x", Value::Int(x)), ("y", Value::Int(y)), ("is_origin", Value::Bool(x == 0 && y == 0))];
            Ok(Value::record("Point", fields))
        })
        .record_type(
            "Point",
            None,
            &[("x", Ty::Int(IntTy::I64)), ("y", Ty::Int(IntTy::I64)), ("is_origin", Ty::Bool)],
        )
        .handler("explode", |_| Err(anyhow::anyhow!("boom")))
        .fallback_handler(|_| Ok(()));
    res
}

fn tree(text: &str) -> CommandTree {
    argtree::compile(text, &registry()).unwrap_or_else(|err| panic!("{err}"))
}

/// One line for the command, then options, arguments and the variadic tail.
fn show(invocation: &Invocation) -> String {
    let mut buf = String::new();
    let _ = writeln!(buf, "{} => {}", invocation.path.join(" "), invocation.handler());
    for (name, value) in &invocation.options {
        let _ = writeln!(buf, "  {name}: {value:?}");
    }
    for (name, value) in &invocation.args {
        let _ = writeln!(buf, "  <{name}>: {value:?}");
    }
    if let Some(rest) = &invocation.rest {
        let _ = writeln!(buf, "  ...: {rest:?}");
    }
    buf
}

fn check(tree: &CommandTree, args: &str, expect: Expect) {
    check_args(tree, &args.split_ascii_whitespace().collect::<Vec<_>>(), expect)
}

fn check_args(tree: &CommandTree, args: &[&str], expect: Expect) {
    match Dispatcher::new(tree).parse(args.iter().copied()) {
        Ok(invocation) => expect.assert_eq(&show(&invocation)),
        Err(err) => expect.assert_eq(&err.to_string()),
    }
}
