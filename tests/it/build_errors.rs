use argtree::{ArgumentMark, Descriptor, OptionMark, Registry, Ty};
use expect_test::{expect, Expect};

use crate::registry;

fn check_build(text: &str, expect: Expect) {
    match argtree::compile(text, &registry()) {
        Ok(tree) => panic!("declarations were accepted: {tree:?}"),
        Err(err) => expect.assert_eq(&format!("{err}\n")),
    }
}

#[test]
fn every_declaration_error_is_reported() {
    check_build(
        r#"
        group app {
            option --help: bool
            cmd run {
                global flag --all
                option --level: Level
                option --n: i32 = "x"
                option --tag: string check nonexistent
                params rest: [i32]
            }
        }
        "#,
        expect![[r#"
            error[reserved-name]: `--help` in `app` is reserved for help
            error[global-on-command]: command `app.run` cannot declare the global option `--all`
            error[binding-not-found]: `level` of `app.run`: no parser for `Level`: expected `Level::new(string)`, `Level::parse(string)` or `Level::try_parse(string, out Level)`
            error[invalid-default]: invalid default `x` for `n` of `app.run`: invalid digit found in string
            error[unknown-reference]: `tag` of `app.run`: `nonexistent` does not name a function or constructor
            error[variadic-element]: variadic argument `rest` of `app.run` must collect strings, found `[i32]`
        "#]],
    );
}

#[test]
fn command_names_are_unique_across_the_tree() {
    check_build(
        r#"
        group app {
            cmd run {}
            group sub {
                cmd run {}
            }
        }
        "#,
        expect![[r#"
            error[duplicate-command]: duplicate command `run`: declared by `app.run` and `app.sub.run`
        "#]],
    );
}

#[test]
fn default_commands() {
    check_build(
        r#"
        group app {
            default missing
            cmd _ => hidden {}
        }
        "#,
        expect![[r#"
            error[unreachable-hidden-command]: hidden command of `app` is unreachable: its default command is not `_`
            error[missing-default-command]: default command `missing` of `app` is not one of its commands
        "#]],
    );
    check_build(
        r#"
        group app {
            default _
            cmd run {}
        }
        "#,
        expect![[r#"
            error[missing-default-command]: default command `_` of `app` is not one of its commands
        "#]],
    );
}

#[test]
fn option_names_in_reach() {
    check_build(
        r#"
        group app {
            global flag -v, --verbose
            group sub {
                global option --verbose: string
            }
        }
        "#,
        expect![[r#"
            error[global-conflict]: global option `--verbose` in `app sub` is already declared globally by `app`
        "#]],
    );
    check_build(
        r#"
        group app {
            global flag -v, --verbose
            cmd run {
                flag -v, --version
            }
        }
        "#,
        expect![[r#"
            error[shadows-global]: option `-v` in `app run` shadows the global option of `app`
        "#]],
    );
    check_build(
        r#"
        cmd run {
            flag --x
            option --x: string
        }
        "#,
        expect![[r#"
            error[duplicate-option]: duplicate option `--x` in `app run`
        "#]],
    );
}

#[test]
fn default_command_options_stay_apart_from_the_group() {
    check_build(
        r#"
        group app {
            option --x: string
            default status
            cmd status {
                option --x: string
            }
        }
        "#,
        expect![[r#"
            error[default-option-conflict]: option `--x` of the default command `app status` is also an option of `app`
        "#]],
    );
    check_build(
        r#"
        group app {
            option -o, --out: PathBuf
            default status
            cmd status {
                flag -o, --oneline
            }
        }
        "#,
        expect![[r#"
            error[default-option-conflict]: option `-o` of the default command `app status` is also an option of `app`
        "#]],
    );
}

#[test]
fn member_names_are_unique_along_a_path() {
    check_build(
        r#"
        group app {
            option --x: string
            cmd run {
                option --x: i32
            }
        }
        "#,
        expect![[r#"
            error[duplicate-member]: option `--x` in `app run` stores into `x`, which `app` already uses
        "#]],
    );

    let descriptors = [
        Descriptor::group("app", "app", None),
        Descriptor::command("app.run", "run", Some("app"), "run"),
        Descriptor::option("app.run", "level", Ty::Bool, OptionMark::default()),
        Descriptor::option(
            "app.run",
            "level",
            Ty::Bool,
            OptionMark { long: Some("lvl".to_string()), ..OptionMark::default() },
        ),
    ];
    let diagnostics = argtree::build(&descriptors, &registry()).unwrap_err();
    assert_eq!(diagnostics.codes(), ["duplicate-member"]);
}

#[test]
fn positional_arguments() {
    check_build(
        r#"
        group app {
            arg file: string
            cmd run {
                params rest: [string]
                arg last: string
                arg many: [i32]
            }
        }
        "#,
        expect![[r#"
            error[argument-on-group]: group `app` cannot take the positional argument `file`
            error[sequence-argument]: argument `many` of `app.run` cannot be a sequence (`[i32]`)
            error[variadic-not-last]: variadic argument `rest` of `app.run` must be the last argument
        "#]],
    );
}

#[test]
fn malformed_descriptors() {
    let mut both = Descriptor::option("app.run", "both", Ty::String, OptionMark::default());
    if let Descriptor::Member(it) = &mut both {
        it.argument = Some(ArgumentMark::default());
    }
    let descriptors = [
        Descriptor::group("app", "app", None),
        Descriptor::group("app.tools", "run", Some("app")),
        Descriptor::command("app.run", "run", Some("app"), "run"),
        Descriptor::command("app.bad", "bad name", Some("app"), "run"),
        Descriptor::option("app.run", "level", Ty::Bool, OptionMark { alias: Some('1'), ..OptionMark::default() }),
        both,
    ];
    let diagnostics = argtree::build(&descriptors, &registry()).unwrap_err();
    assert_eq!(diagnostics.codes(), ["invalid-alias", "ambiguous-member", "invalid-name", "duplicate-child"]);
    expect![[r#"
        error[invalid-alias]: invalid alias `1` for `--level` in `app.run`: an alias is a single ASCII letter
        error[ambiguous-member]: member `both` of `app.run` is marked both as an option and as an argument
        error[invalid-name]: invalid name `bad name` in `app.bad`: names use `[A-Za-z0-9_-]` and cannot start with `-` or `_`
        error[duplicate-child]: `app` has more than one child named `run`
    "#]]
    .assert_eq(&format!("{diagnostics}\n"));
}

#[test]
fn roots() {
    check_build(
        "group app { cmd run {} } group other {}",
        expect![[r#"
            error[multiple-roots]: more than one root group: app, other
        "#]],
    );

    let descriptors = [Descriptor::group("a", "a", Some("b")), Descriptor::group("b", "b", Some("a"))];
    let diagnostics = argtree::build(&descriptors, &registry()).unwrap_err();
    assert_eq!(diagnostics.codes(), ["no-root"]);
}

#[test]
fn handlers_must_exist() {
    let err = argtree::compile("cmd run {}", &Registry::with_prelude()).unwrap_err();
    assert_eq!(err.to_string(), "error[missing-handler]: command `run` invokes `run`, which is not provided");
}

#[test]
fn descriptor_graph_errors() {
    let descriptors = [
        Descriptor::group("a", "a", None),
        Descriptor::group("b", "b", Some("c")),
        Descriptor::group("c", "c", Some("b")),
        Descriptor::command("a.x", "x", Some("nowhere"), "x"),
        Descriptor::command("a.x", "y", Some("a"), "y"),
        Descriptor::option("ghost", "flag", Ty::Bool, OptionMark::default()),
    ];
    let diagnostics = argtree::build(&descriptors, &registry()).unwrap_err();
    assert_eq!(
        diagnostics.codes(),
        ["unknown-owner", "duplicate-key", "unknown-parent", "parent-cycle", "parent-cycle"]
    );
    assert_eq!(diagnostics.errors()[0].to_string(), "member `flag` declares unknown owner `ghost`");
}
