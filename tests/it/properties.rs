//! Property tests over generated declarations and argument vectors.

use std::collections::HashSet;

use argtree::{Descriptor, Dispatcher, OptionMark, Ty, Value};
use proptest::prelude::*;

use crate::{registry, subcommands::GIT, tree};

fn word() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9 ._]{0,11}"
}

proptest! {
    /// Every occurrence of a repeatable option lands in the sequence, in order.
    #[test]
    fn repeatable_options_accumulate(values in prop::collection::vec(word(), 0..8)) {
        let tree = tree("cmd run { option --tag: [string] }");
        let args = values.iter().flat_map(|it| ["--tag", it.as_str()]).collect::<Vec<_>>();
        let invocation = Dispatcher::new(&tree).parse(args).unwrap();
        let expected = Value::Seq(values.iter().map(Value::str).collect());
        prop_assert_eq!(invocation.option("tag"), Some(&expected));
    }

    /// An empty vector leaves every option at its declared default.
    #[test]
    fn defaults_are_idempotent(n in any::<i32>(), on in any::<bool>(), name in word()) {
        let text = format!(
            r#"cmd run {{
                option --n: i32 = "{n}"
                flag --on = "{on}"
                option --name: string = "{name}"
                option --tags: [string] = "[]"
            }}"#
        );
        let tree = tree(&text);
        let invocation = Dispatcher::new(&tree).parse(Vec::<String>::new()).unwrap();
        prop_assert_eq!(invocation.option("n"), Some(&Value::Int(n.into())));
        prop_assert_eq!(invocation.option("on"), Some(&Value::Bool(on)));
        prop_assert_eq!(invocation.option("name"), Some(&Value::str(name)));
        prop_assert_eq!(invocation.option("tags"), Some(&Value::Seq(Vec::new())));
    }

    /// The string form of a value parses back into the same value.
    #[test]
    fn values_round_trip(n in any::<i64>(), text in word()) {
        let tree = tree("cmd run { option --n: i64  option --text: string }");
        let n_text = n.to_string();
        let invocation = Dispatcher::new(&tree).parse(["--n", n_text.as_str(), "--text", text.as_str()]).unwrap();
        let parsed = invocation.option("n").cloned().unwrap();
        prop_assert_eq!(parsed.to_string(), n_text);
        prop_assert_eq!(invocation.option("text"), Some(&Value::str(text)));
    }

    /// A global option reaches the same slot before and after sub-commands.
    #[test]
    fn globals_are_position_independent(at in 0usize..5) {
        let tree = tree(GIT);
        let mut args = vec!["remote", "add", "origin", "url"];
        args.insert(at.min(args.len()), "-v");
        let invocation = Dispatcher::new(&tree).parse(args).unwrap();
        prop_assert_eq!(invocation.option("verbose"), Some(&Value::Bool(true)));
        prop_assert_eq!(invocation.path.join(" "), "git remote add");
    }

    /// Built trees never offer two options with the same spelling from one
    /// scope, counting the default command's options a group falls back to.
    #[test]
    fn option_names_stay_unique(
        names in prop::collection::vec("[a-d]", 1..6),
        global in any::<bool>(),
        fallback in any::<bool>()
    ) {
        let root = Descriptor::group("app", "app", None);
        let root = if fallback { root.with_default("run") } else { root };
        let mut descriptors = vec![
            root,
            Descriptor::command("app.run", "run", Some("app"), "run"),
            Descriptor::option("app", "d", Ty::Bool, OptionMark { global, ..OptionMark::default() }),
        ];
        for (i, name) in names.iter().enumerate() {
            let mark = OptionMark { long: Some(name.clone()), ..OptionMark::default() };
            descriptors.push(Descriptor::option("app.run", &format!("m{i}"), Ty::Bool, mark));
        }

        let duplicated = names.len() != names.iter().collect::<HashSet<_>>().len();
        let clashes = duplicated || ((global || fallback) && names.iter().any(|it| it == "d"));
        match argtree::build(&descriptors, &registry()) {
            Ok(tree) => {
                prop_assert!(!clashes);
                for id in tree.scope_ids() {
                    let default = tree.default_command(id).map(|it| tree.scope(it).flags.as_slice());
                    let spellings = tree
                        .visible_flags(id)
                        .iter()
                        .chain(default.unwrap_or_default())
                        .map(|&it| tree.flag(it).spelling())
                        .collect::<Vec<_>>();
                    let unique = spellings.iter().collect::<HashSet<_>>();
                    prop_assert_eq!(unique.len(), spellings.len());
                }
            }
            Err(diagnostics) => {
                prop_assert!(clashes);
                let codes = diagnostics.codes();
                let expected = ["duplicate-option", "shadows-global", "default-option-conflict"];
                prop_assert!(codes.len() == 1 && expected.contains(&codes[0]), "{:?}", codes);
            }
        }
    }
}
