// build.rs
use anyhow::{Context, Result};
use std::path::PathBuf;

#[path = "grammar/var2.rs"]
mod var2;

fn main() -> Result<()> {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").context("CARGO_MANIFEST_DIR")?;
    let out_dir = PathBuf::from(std::env::var("OUT_DIR").context("OUT_DIR")?);

    let grammar_file = PathBuf::from(&manifest_dir).join("grammar/var2.rs");
    println!("cargo:rerun-if-changed={}", grammar_file.display());
    println!("cargo:rerun-if-changed=build.rs");

    let table = out_dir.join("var2.bin");
    sylva_gen::write_table(&var2::grammar(), &table)
        .with_context(|| format!("compiling {}", grammar_file.display()))?;
    Ok(())
}
