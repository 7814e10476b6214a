use std::fmt::Write;

use argtree::{descriptor, dsl, help, Descriptor, OptionMark, ValidatorRef};
use expect_test::{expect, Expect};

use crate::{registry, subcommands::GIT};

fn outline(descriptors: &[Descriptor]) -> String {
    let mut buf = String::new();
    for desc in descriptors {
        let _ = match desc {
            Descriptor::Group(it) => writeln!(buf, "group {} default={:?}", it.key, it.default_command),
            Descriptor::Command(it) => writeln!(buf, "cmd {} => {}", it.key, it.invoke),
            Descriptor::Member(it) => {
                let kind = match (&it.option, &it.argument) {
                    (Some(mark), _) => {
                        let global = if mark.global { "global " } else { "" };
                        format!("{global}--{}", mark.long.as_deref().unwrap_or_default())
                    }
                    (_, Some(mark)) if mark.variadic => "params".to_string(),
                    _ => "arg".to_string(),
                };
                writeln!(buf, "  {}: {} [{kind}]", it.name, it.ty)
            }
        };
    }
    buf
}

fn check_error(text: &str, expect: Expect) {
    let err = dsl::parse(text).unwrap_err();
    expect.assert_eq(&err.to_string());
}

#[test]
fn keys_follow_nesting() {
    let descriptors = dsl::parse(GIT).unwrap();
    expect![[r#"
        group git default=Some("status")
          verbose: bool [global --verbose]
          dir: PathBuf? [--dir]
        cmd git.status => status
          short: bool [--short]
          path: PathBuf? [arg]
        cmd git.commit => commit
          message: string [--message]
          paths: [string] [params]
        group git.remote default=Some("_")
          timeout: u32 [global --timeout]
        cmd git.remote._ => remote_list
          long_format: bool [--long-format]
        cmd git.remote.add => remote_add
          name: string [arg]
          url: string [arg]
        group git.config default=None
        cmd git.config.get => get
          key: string [arg]
        cmd git.config.set => set
          key: string [arg]
          value: string [arg]
    "#]]
    .assert_eq(&outline(&descriptors));
}

#[test]
fn member_clauses() {
    let descriptors = dsl::parse(
        r#"
        cmd run-all {
            /// Number of things.
            option -n, --int-opt: i32 = "0" parse i32::parse check positive "must be positive" require !is_empty
            default cmd nope {}
        }
        "#,
    );
    assert_eq!(descriptors.unwrap_err().to_string(), "expected `flag`, `option`, `arg` or `params`, got `default`");

    let descriptors = dsl::parse(
        r#"
        cmd run-all {
            /// Number of things.
            option -n, --int-opt: i32 = "0" parse i32::parse check positive "must be positive" require !is_empty
            flag --dry-run = "true" invert
        }
        "#,
    )
    .unwrap();
    let [Descriptor::Command(cmd), Descriptor::Member(count), Descriptor::Member(dry_run)] = descriptors.as_slice()
    else {
        panic!("unexpected descriptors: {descriptors:?}")
    };
    assert_eq!(cmd.invoke, "run_all");
    assert_eq!(count.name, "int_opt");
    assert_eq!(count.default.as_deref(), Some("0"));
    assert_eq!(count.doc.as_deref(), Some("Number of things."));
    assert_eq!(
        count.option,
        Some(OptionMark {
            long: Some("int-opt".to_string()),
            alias: Some('n'),
            parse: Some("i32::parse".to_string()),
            validate: vec![
                ValidatorRef::method("positive").with_message("must be positive"),
                ValidatorRef::property("is_empty", false),
            ],
            ..OptionMark::default()
        })
    );
    assert_eq!(dry_run.option.as_ref().map(|it| it.invert), Some(true));
    assert_eq!(dry_run.default.as_deref(), Some("true"));
}

#[test]
fn default_can_declare_the_command() {
    let descriptors = dsl::parse("group app { default cmd run {} cmd stop {} }").unwrap();
    match &descriptors[0] {
        Descriptor::Group(it) => assert_eq!(it.default_command.as_deref(), Some("run")),
        other => panic!("expected a group, got {other:?}"),
    }
}

#[test]
fn syntax_errors() {
    check_error("group app { cmd x { arg a b } }", expect!["expected `:`, got `b`"]);
    check_error("group app { default x default y }", expect!["only one command can be default in `app`"]);
    check_error("group app { flag -v }", expect!["long option is required for `-v`"]);
    check_error("group app { option --x: i32 invert }", expect!["only flags can be inverted: `x`"]);
    check_error("group app { global arg a: string }", expect!["positional argument cannot be global"]);
    check_error("group app { cmd -x {} }", expect!["command name can't begin with `-`: `-x`"]);
    check_error(r#"group app { option --x: i32 = 0 }"#, expect!["expected a string, got `0`"]);
    check_error("group app { option --x: 3 }", expect!["expected an identifier, got `3`"]);
    check_error("group app { frob }", expect!["expected `flag`, `option`, `arg` or `params`, got `frob`"]);
    check_error("cmd _ {}", expect!["hidden command needs a handler: `cmd _ => handler`"]);
    assert!(dsl::parse("group app { option --x: [i32 }").unwrap_err().to_string().starts_with("invalid tokens"));
}

#[test]
fn compile_reports_syntax_errors() {
    let err = argtree::compile("group app {", &registry()).unwrap_err();
    assert!(matches!(err, argtree::Error::Syntax(_)), "{err}");
    assert!(err.to_string().starts_with("syntax error: invalid tokens"));
}

#[test]
fn json_and_text_build_the_same_tree() {
    let descriptors = dsl::parse(GIT).unwrap();
    let json = descriptor::to_json(&descriptors).unwrap();
    assert_eq!(descriptor::from_json(&json).unwrap(), descriptors);

    let registry = registry();
    let from_text = argtree::compile(GIT, &registry).unwrap();
    let from_json = argtree::build(&descriptor::from_json(&json).unwrap(), &registry).unwrap();
    assert_eq!(
        help::render(&from_text, from_text.root()),
        help::render(&from_json, from_json.root())
    );
}
