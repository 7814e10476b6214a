use argtree::{ty::IntTy, Descriptor, DispatchConfig, Dispatcher, OptionMark, Registry, Ty, Value};
use expect_test::expect;

use crate::{check, check_args, registry, tree};

const OPTIONS: &str = r#"
    cmd test {
        option --int-opt: i32 = "0"
        option --opt: string check no_spaces "must not contain spaces"
        option --repeatable-str-opt: [string]
        option --hex: u32 parse parse_hex
        option --color: Color = "Red"
        option --point: Point? require !is_origin "must not be the origin"
    }
"#;

#[test]
fn defaults() {
    check(
        &tree(OPTIONS),
        "",
        expect![[r#"
            app test => test
              color: Color::Red
              hex: absent
              int_opt: 0
              opt: absent
              point: absent
              repeatable_str_opt: []
        "#]],
    );
}

#[test]
fn values() {
    let tree = tree(OPTIONS);
    check(
        &tree,
        "--int-opt -12 --hex 0xff --color Green --point 1,2",
        expect![[r#"
            app test => test
              color: Color::Green
              hex: 255
              int_opt: -12
              opt: absent
              point: Point { is_origin: false, x: 1, y: 2 }
              repeatable_str_opt: []
        "#]],
    );
    check(
        &tree,
        "--int-opt=-7 --opt=a=b",
        expect![[r#"
            app test => test
              color: Color::Red
              hex: absent
              int_opt: -7
              opt: "a=b"
              point: absent
              repeatable_str_opt: []
        "#]],
    );
    check(
        &tree,
        "--repeatable-str-opt hello --repeatable-str-opt world",
        expect![[r#"
            app test => test
              color: Color::Red
              hex: absent
              int_opt: 0
              opt: absent
              point: absent
              repeatable_str_opt: ["hello", "world"]
        "#]],
    );
}

#[test]
fn nullable_values_that_do_not_parse_are_absent() {
    let invocation = Dispatcher::new(&tree(OPTIONS)).parse(["--point", "nowhere"]).unwrap();
    assert_eq!(invocation.option("point"), Some(&Value::Absent));
}

#[test]
fn bad_values() {
    let tree = tree(OPTIONS);
    check(&tree, "--int-opt", expect!["app test: expected a value for `--int-opt`"]);
    check(&tree, "--int-opt --opt x", expect!["app test: expected a value for `--int-opt`"]);
    check(
        &tree,
        "--int-opt nope",
        expect!["app test: can't parse `--int-opt` from `nope`: invalid digit found in string"],
    );
    check(
        &tree,
        "--color Blue",
        expect!["app test: can't parse `--color` from `Blue`: unknown variant `Blue`, expected one of `Red`, `Green`"],
    );
    check(
        &tree,
        "--point 0,0",
        expect!["app test: invalid value `0,0` for `--point`: must not be the origin"],
    );
    check_args(
        &tree,
        &["--opt", "a i"],
        expect!["app test: invalid value `a i` for `--opt`: must not contain spaces"],
    );
}

#[test]
fn validation_failure_exits_with_the_error_code() {
    let tree = tree(OPTIONS);
    let dispatcher = Dispatcher::new(&tree).with_config(DispatchConfig::default().error_exit_code(3));
    let (mut out, mut err) = (Vec::new(), Vec::new());
    let code = dispatcher.dispatch_to(["--opt", "a i"], &mut out, &mut err);
    assert_eq!(code, 3);
    assert!(out.is_empty());
    let err = String::from_utf8(err).unwrap();
    assert!(err.starts_with("error: app test: invalid value `a i` for `--opt`: must not contain spaces\n\n"));
    assert!(err.contains("OPTIONS:"));
}

#[test]
fn member_names_become_kebab_case_options() {
    let descriptors = [
        Descriptor::command("test", "test", None, "test"),
        Descriptor::option("test", "intOpt", Ty::Int(IntTy::I32), OptionMark {
            parse: Some("i32::parse".to_string()),
            ..OptionMark::default()
        }),
        Descriptor::option("test", "repeatableStrOpt", Ty::seq(Ty::String), OptionMark::default()),
    ];
    let mut registry = Registry::with_prelude();
    registry.fallback_handler(|_| Ok(()));
    let tree = argtree::build(&descriptors, &registry).unwrap();

    let invocation = Dispatcher::new(&tree).parse(["--int-opt", "-12"]).unwrap();
    assert_eq!(invocation.option("intOpt"), Some(&Value::Int(-12)));
    assert_eq!(invocation.option("repeatableStrOpt"), Some(&Value::Seq(vec![])));

    let invocation = Dispatcher::new(&tree)
        .parse(["--repeatable-str-opt", "hello", "--repeatable-str-opt", "world"])
        .unwrap();
    assert_eq!(
        invocation.option("repeatableStrOpt"),
        Some(&Value::Seq(vec![Value::str("hello"), Value::str("world")]))
    );
}

#[test]
fn handler_failures_use_the_error_code() {
    let tree = argtree::compile("cmd boom => explode {}", &registry()).unwrap();
    let (mut out, mut err) = (Vec::new(), Vec::new());
    let code = Dispatcher::new(&tree).dispatch_to(Vec::<String>::new(), &mut out, &mut err);
    assert_eq!(code, 1);
    assert_eq!(String::from_utf8(err).unwrap(), "error: app boom: boom\n");
}
