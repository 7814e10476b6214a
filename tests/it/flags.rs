use expect_test::expect;

use crate::{check, tree};

const SWITCHES: &str = r#"
    cmd test {
        flag --switch
        flag --true-switch = "true"
        /// Turned off by `-q`.
        flag -q, --quiet = "true" invert
    }
"#;

#[test]
fn switches() {
    let tree = tree(SWITCHES);
    check(
        &tree,
        "",
        expect![[r#"
            app test => test
              quiet: true
              switch: false
              true_switch: true
        "#]],
    );
    check(
        &tree,
        "--switch",
        expect![[r#"
            app test => test
              quiet: true
              switch: true
              true_switch: true
        "#]],
    );
    check(
        &tree,
        "--switch=false",
        expect![[r#"
            app test => test
              quiet: true
              switch: false
              true_switch: true
        "#]],
    );
    check(
        &tree,
        "test --switch --switch",
        expect![[r#"
            app test => test
              quiet: true
              switch: true
              true_switch: true
        "#]],
    );
}

#[test]
fn true_by_default() {
    let tree = tree(SWITCHES);
    check(
        &tree,
        "--true-switch",
        expect![[r#"
            app test => test
              quiet: true
              switch: false
              true_switch: true
        "#]],
    );
    check(
        &tree,
        "--true-switch=false",
        expect![[r#"
            app test => test
              quiet: true
              switch: false
              true_switch: false
        "#]],
    );
    check(
        &tree,
        "-q",
        expect![[r#"
            app test => test
              quiet: false
              switch: false
              true_switch: true
        "#]],
    );
}

#[test]
fn bad_switches() {
    let tree = tree(SWITCHES);
    check(
        &tree,
        "--switch=maybe",
        expect!["app test: can't parse `--switch` from `maybe`: expected `true` or `false`, got `maybe`"],
    );
    check(&tree, "--does-not-exist", expect!["app test: unknown option `--does-not-exist`"]);
    check(&tree, "test --does-not-exist", expect!["app test: unknown option `--does-not-exist`"]);
    check(&tree, "--swich", expect!["app test: unknown option `--swich` (did you mean `--switch`?)"]);
}

#[test]
fn custom_switch_parser() {
    let tree = tree("cmd test { flag --x parse yes_no }");
    check(
        &tree,
        "--x=yes",
        expect![[r#"
            app test => test
              x: true
        "#]],
    );
    check(
        &tree,
        "--x=no",
        expect![[r#"
            app test => test
              x: false
        "#]],
    );
    check(
        &tree,
        "--x=maybe",
        expect![[r#"app test: can't parse `--x` from `maybe`: expected a boolean, got "maybe""#]],
    );
}
