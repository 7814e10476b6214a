//! `argtree check` and `argtree run`, declared with argtree itself.

use std::{
    fs,
    path::Path,
    process,
    sync::{
        atomic::{AtomicI32, Ordering},
        Arc,
    },
};

use anyhow::{bail, Context};
use argtree::{descriptor, dsl, help, BuildOptions, CommandTree, Descriptor, Dispatcher, Invocation, Registry};
use tracing_subscriber::EnvFilter;

const CLI: &str = r#"
/// Checks and runs argtree declaration files.
///
/// Files ending in `.json` are read as descriptors, anything else as the
/// argtree text format. Set ARGTREE_LOG=debug to trace the compiler.
group argtree {
    /// Compile a declaration file and print the help of its root.
    cmd check {
        arg spec: PathBuf
    }

    /// Compile a declaration file and run arguments against it.
    ///
    /// Put `--` before arguments that look like options.
    cmd run {
        arg spec: PathBuf
        params args: [string]
    }
}
"#;

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_env("ARGTREE_LOG").unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    process::exit(try_main());
}

fn try_main() -> i32 {
    let exit = Arc::new(AtomicI32::new(0));
    let mut registry = Registry::with_prelude();
    registry.handler("check", |invocation| check(spec_path(invocation)?));
    registry.handler("run", {
        let exit = Arc::clone(&exit);
        move |invocation| {
            let code = run(spec_path(invocation)?, invocation.rest())?;
            exit.store(code, Ordering::Relaxed);
            Ok(())
        }
    });

    let tree = match argtree::compile(CLI, &registry) {
        Ok(it) => it,
        Err(err) => {
            eprintln!("error: {err}");
            return 1;
        }
    };
    match Dispatcher::new(&tree).dispatch(std::env::args().skip(1)) {
        0 => exit.load(Ordering::Relaxed),
        code => code,
    }
}

fn spec_path(invocation: &Invocation) -> anyhow::Result<&Path> {
    let path = invocation.arg("spec").and_then(|it| it.as_str()).context("no declaration file given")?;
    Ok(Path::new(path))
}

fn check(path: &Path) -> anyhow::Result<()> {
    let tree = compile(path)?;
    print!("{}", help::render(&tree, tree.root()));
    Ok(())
}

fn run(path: &Path, args: &[String]) -> anyhow::Result<i32> {
    let tree = compile(path)?;
    Ok(Dispatcher::new(&tree).dispatch(args.iter().cloned()))
}

fn compile(path: &Path) -> anyhow::Result<CommandTree> {
    let descriptors = load(path)?;
    let program = path.file_stem().and_then(|it| it.to_str()).unwrap_or("app");
    let options = BuildOptions::default().program(program);
    match argtree::build_with(&descriptors, &target_registry(), &options) {
        Ok(it) => Ok(it),
        Err(diagnostics) => {
            eprintln!("{diagnostics}");
            bail!("{} declaration error(s) in {}", diagnostics.len(), path.display())
        }
    }
}

fn load(path: &Path) -> anyhow::Result<Vec<Descriptor>> {
    let text = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let descriptors = if path.extension().map_or(false, |it| it == "json") {
        descriptor::from_json(&text).with_context(|| format!("invalid descriptors in {}", path.display()))?
    } else {
        dsl::parse(&text).with_context(|| format!("invalid declarations in {}", path.display()))?
    };
    tracing::debug!(path = %path.display(), descriptors = descriptors.len(), "loaded");
    Ok(descriptors)
}

/// The primitive parsers, and a handler that echoes every invocation as JSON.
fn target_registry() -> Registry {
    let mut res = Registry::with_prelude();
    res.fallback_handler(|invocation| {
        println!("{}", serde_json::to_string_pretty(invocation)?);
        Ok(())
    });
    res
}
