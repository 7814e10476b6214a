use argtree::{Dispatcher, Value};
use expect_test::expect;

use crate::{check, tree};

pub(crate) const GIT: &str = r#"
    /// A tiny version control system.
    group git {
        /// Print more.
        global flag -v, --verbose
        option --dir: PathBuf?
        default status

        /// Show the working tree status.
        cmd status {
            flag -s, --short
            arg path: PathBuf?
        }

        /// Record changes.
        cmd commit {
            option -m, --message: string
            params paths: [string]
        }

        /// Manage remotes.
        group remote {
            global option --timeout: u32 = "30"
            default _

            cmd _ => remote_list {
                flag --long-format
            }

            /// Add a remote.
            cmd add => remote_add {
                arg name: string
                arg url: string
            }
        }

        /// Read and write settings.
        group config {
            cmd get {
                arg key: string
            }
            cmd set {
                arg key: string
                arg value: string
            }
        }
    }
"#;

#[test]
fn default_command() {
    let tree = tree(GIT);
    check(
        &tree,
        "",
        expect![[r#"
            git status => status
              dir: absent
              short: false
              verbose: false
              <path>: absent
        "#]],
    );
    check(
        &tree,
        "-v src",
        expect![[r#"
            git status => status
              dir: absent
              short: false
              verbose: true
              <path>: "src"
        "#]],
    );
    check(
        &tree,
        "--dir /tmp -s",
        expect![[r#"
            git status => status
              dir: "/tmp"
              short: true
              verbose: false
              <path>: absent
        "#]],
    );
    check(
        &tree,
        "-- commit",
        expect![[r#"
            git status => status
              dir: absent
              short: false
              verbose: false
              <path>: "commit"
        "#]],
    );
    check(&tree, "-s commit", expect!["git: cannot run `commit` after arguments for the default command `status`"]);
    check(&tree, "src commit", expect!["git: cannot run `commit` after arguments for the default command `status`"]);
}

#[test]
fn named_commands() {
    let tree = tree(GIT);
    check(
        &tree,
        "commit -m hi a b --verbose",
        expect![[r#"
            git commit => commit
              dir: absent
              message: "hi"
              verbose: true
              ...: ["a", "b"]
        "#]],
    );
    check(
        &tree,
        "commit -- -m x",
        expect![[r#"
            git commit => commit
              dir: absent
              message: absent
              verbose: false
              ...: ["-m", "x"]
        "#]],
    );
    check(
        &tree,
        "-v remote add origin https://example.com",
        expect![[r#"
            git remote add => remote_add
              dir: absent
              timeout: 30
              verbose: true
              <name>: "origin"
              <url>: "https://example.com"
        "#]],
    );
}

#[test]
fn hidden_default() {
    let tree = tree(GIT);
    check(
        &tree,
        "remote",
        expect![[r#"
            git remote => remote_list
              dir: absent
              long_format: false
              timeout: 30
              verbose: false
        "#]],
    );
    check(
        &tree,
        "remote --long-format --timeout 5 -v",
        expect![[r#"
            git remote => remote_list
              dir: absent
              long_format: true
              timeout: 5
              verbose: true
        "#]],
    );
    check(&tree, "remote _", expect!["git remote: unexpected argument `_`"]);
}

#[test]
fn errors() {
    let tree = tree(GIT);
    check(&tree, "config", expect!["git config: help requested"]);
    check(&tree, "config sett", expect!["git config: unknown command `sett` (did you mean `set`?)"]);
    check(&tree, "config get", expect!["git config get: missing required argument: <key>"]);
    check(&tree, "config set", expect!["git config set: missing required arguments: <key> <value>"]);
    check(&tree, "config get a b", expect!["git config get: unexpected argument `b`"]);
    check(&tree, "remote add origin", expect!["git remote add: missing required argument: <url>"]);
    check(&tree, "--verbos", expect!["git status: unknown option `--verbos` (did you mean `--verbose`?)"]);
    check(&tree, "commit --short", expect!["git commit: unknown option `--short`"]);
    check(&tree, "--timeout 5", expect!["git status: unknown option `--timeout`"]);
    check(&tree, "commit --dir x", expect!["git commit: unknown option `--dir`"]);
    check(&tree, "remote --bogus", expect!["git remote: unknown option `--bogus`"]);
    check(
        &tree,
        "remote --long-format=maybe",
        expect!["git remote: can't parse `--long-format` from `maybe`: expected `true` or `false`, got `maybe`"],
    );
}

#[test]
fn globals_are_inherited() {
    let tree = tree(GIT);
    let dispatcher = Dispatcher::new(&tree);
    for args in [
        &["-v", "remote", "add", "o", "u"][..],
        &["remote", "-v", "add", "o", "u"],
        &["remote", "add", "o", "u", "--verbose"],
        &["remote", "add", "--verbose=true", "o", "u"],
    ] {
        let invocation = dispatcher.parse(args.iter().copied()).unwrap();
        assert_eq!(invocation.option("verbose"), Some(&Value::Bool(true)), "{args:?}");
    }

    let err = dispatcher.parse(["remote", "add", "o", "u", "--", "-v"]).unwrap_err();
    assert_eq!(err.to_string(), "git remote add: unexpected argument `-v`");
}

#[test]
fn help_goes_to_stdout() {
    let tree = tree(GIT);
    let (mut out, mut err) = (Vec::new(), Vec::new());
    let code = Dispatcher::new(&tree).dispatch_to(["remote", "--help"], &mut out, &mut err);
    assert_eq!(code, 2);
    assert!(err.is_empty());
    assert!(String::from_utf8(out).unwrap().starts_with("git remote\n  Manage remotes.\n"));
}
