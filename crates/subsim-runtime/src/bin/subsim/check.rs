//! `subsim check`.

use std::path::Path;

use anyhow::{bail, Context};
use subsim_runtime::compiler::compile;

pub fn check_program(path: &Path, listing: bool) -> anyhow::Result<()> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let routine = match compile(&source) {
        Ok(routine) => routine,
        Err(err) => bail!("{}: {err}", path.display()),
    };
    if listing {
        print!("{}", routine.listing());
    } else {
        println!(
            "{}: ok ({} statements, {} variables)",
            path.display(),
            routine.statement_lines().len(),
            routine.slots().len()
        );
    }
    Ok(())
}
