//! Command-line interface for sylva-var2
//!
//! Parses var2 source files and prints the resulting concrete syntax tree,
//! either as an indented listing with positions or as an S-expression. The
//! `edit` command splices new text into a file, reparses incrementally and
//! checks the result against a fresh parse.

use anyhow::{Context, Result, bail};
use clap::{Args as ClapArgs, Parser as ClapParser, Subcommand};
use smartstring::alias::String;
use std::io::{self, Read};
use std::time::Instant;
use sylva::{Edit, ParserConfig, Tree};

#[derive(ClapParser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Command
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Prints the syntax tree with positions
    Parse {
        /// Input file with var2 source, `-` for standard input
        #[arg(short, long)]
        input: String,
        /// Also list anonymous nodes
        #[arg(short, long)]
        all: bool,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Prints the syntax tree as an S-expression
    Sexp {
        /// Input file with var2 source, `-` for standard input
        #[arg(short, long)]
        input: String,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Replaces a byte range, reparses and compares with a fresh parse
    Edit {
        /// Input file with var2 source
        #[arg(short, long)]
        input: String,
        /// First byte to replace
        #[arg(long)]
        start: usize,
        /// End of the replaced range (exclusive)
        #[arg(long)]
        end: usize,
        /// Replacement text
        #[arg(long, default_value = "")]
        text: String,
        #[command(flatten)]
        config: ConfigArgs,
    },
}

#[derive(ClapArgs, Debug)]
struct ConfigArgs {
    /// Maximum number of live GLR stack heads
    #[arg(long, default_value_t = ParserConfig::default().max_stacks)]
    max_stacks: usize,
    /// Tokens examined when looking for a place to resume after an error
    #[arg(long, default_value_t = ParserConfig::default().recovery_lookahead)]
    recovery_lookahead: usize,
    /// Recoveries allowed at one position before tokens are skipped outright
    #[arg(long, default_value_t = ParserConfig::default().max_recovery_attempts)]
    max_recovery_attempts: usize,
}

impl ConfigArgs {
    fn to_config(&self) -> ParserConfig {
        ParserConfig::default()
            .with_max_stacks(self.max_stacks)
            .with_recovery_lookahead(self.recovery_lookahead)
            .with_max_recovery_attempts(self.max_recovery_attempts)
    }
}

fn read_input(path: &str) -> Result<Vec<u8>> {
    if path == "-" {
        let mut buf = Vec::new();
        io::stdin()
            .read_to_end(&mut buf)
            .context("can't read standard input")?;
        Ok(buf)
    } else {
        std::fs::read(path).with_context(|| format!("can't open {path:?}"))
    }
}

fn report_errors(tree: &Tree) {
    if tree.root_node().has_error() {
        eprintln!("warning: the tree contains syntax errors");
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    match args.command {
        Commands::Parse { input, all, config } => {
            let source = read_input(&input)?;
            let mut parser = sylva_var2::parser(config.to_config());
            let tree = parser.parse(&source)?;
            println!("{}", tree.print(&source, all));
            report_errors(&tree);
        }
        Commands::Sexp { input, config } => {
            let source = read_input(&input)?;
            let mut parser = sylva_var2::parser(config.to_config());
            let tree = parser.parse(&source)?;
            println!("{}", tree.root_node().to_sexp());
            report_errors(&tree);
        }
        Commands::Edit {
            input,
            start,
            end,
            text,
            config,
        } => {
            let source = read_input(&input)?;
            let mut parser = sylva_var2::parser(config.to_config());
            let old_tree = parser.parse(&source)?;

            let (new_source, edit): (Vec<u8>, Edit) =
                Edit::splice(&source, start..end, text.as_bytes())?;
            let started = Instant::now();
            let tree = parser.reparse(&old_tree, &edit, &new_source)?;
            let incremental = started.elapsed();
            let stats = parser.stats();

            let started = Instant::now();
            let fresh = parser.parse(&new_source)?;
            let full = started.elapsed();

            println!("{}", tree.root_node().to_sexp());
            eprintln!(
                "reparse: {incremental:?} ({} tokens, {} reused nodes), full parse: {full:?}",
                stats.tokens, stats.reused_nodes
            );
            if !tree.same_structure(&fresh) {
                bail!("incremental parse differs from a fresh parse");
            }
            report_errors(&tree);
        }
    }
    Ok(())
}
