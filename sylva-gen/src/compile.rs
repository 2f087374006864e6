use crate::grammar::Grammar;
use crate::lr::build_table;
use crate::prepare::prepare;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use sylva::{FieldId, Language, LanguageDef, ProductionDef, Symbol};

/// Compiles `grammar` into a [`LanguageDef`], checked by loading it.
pub fn build(grammar: &Grammar) -> Result<LanguageDef> {
    let prepared = prepare(grammar).with_context(|| format!("grammar {:?}", grammar.name))?;
    let table = build_table(&prepared)
        .with_context(|| format!("building the table of {:?}", grammar.name))?;

    let productions = prepared
        .productions
        .iter()
        .map(|p| ProductionDef {
            lhs: Symbol(p.lhs as u16),
            rhs_len: p.rhs.len() as u16,
            precedence: p.precedence,
            dynamic_precedence: p.dynamic_precedence,
            fields: p
                .fields
                .iter()
                .map(|&(pos, f)| (pos, FieldId(f as u16 + 1)))
                .collect(),
            aliases: p
                .aliases
                .iter()
                .map(|&(pos, a)| (pos, Symbol(a as u16)))
                .collect(),
        })
        .collect();

    log::info!(
        "{}: {} terminals, {} nonterminals, {} fields, {} productions, {} states, {} conflicts",
        prepared.name,
        prepared.terminal_count,
        prepared.nonterminal_count,
        prepared.fields.len(),
        prepared.productions.len(),
        table.states.len(),
        table.conflicts
    );

    let def = LanguageDef {
        name: prepared.name,
        symbols: prepared.symbols,
        fields: prepared.fields,
        productions,
        states: table.states,
        start_symbol: Symbol(prepared.start as u16),
        word_token: prepared.word.map(|w| Symbol(w as u16)),
    };
    Language::from_def(def.clone()).context("compiled table does not load")?;
    Ok(def)
}

/// Compiles `grammar` into the binary table format.
pub fn compile(grammar: &Grammar) -> Result<Vec<u8>> {
    Ok(build(grammar)?.to_bytes())
}

/// Compiles `grammar` and writes the binary table to `path`.
pub fn write_table(grammar: &Grammar, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let bytes = compile(grammar)?;
    fs::write(path, &bytes).with_context(|| format!("writing {}", path.display()))?;
    log::info!("wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::*;
    use sylva::{Edit, Parser, ParserConfig};

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn arithmetic() -> Grammar {
        Grammar::new("arith")
            .rule("source", repeat(seq([field("stmt", sym("expr")), string(";")])))
            .rule(
                "expr",
                choice([
                    prec_left(1, seq([field("left", sym("expr")), string("+"), field("right", sym("expr"))])),
                    prec_left(2, seq([field("left", sym("expr")), string("*"), field("right", sym("expr"))])),
                    seq([string("("), sym("expr"), string(")")]),
                    sym("number"),
                    sym("identifier"),
                ]),
            )
            .rule("number", pattern("[0-9]+"))
            .rule("identifier", pattern("[a-z]+"))
            .rule("comment", token(seq([string("#"), pattern("[^\n]*")])))
            .extra(pattern(r"\s+"))
            .extra(sym("comment"))
            .word("identifier")
    }

    #[test]
    fn compiled_table_loads_and_parses() {
        init_logger();
        let bytes = compile(&arithmetic()).unwrap();
        let lang = Language::load(&bytes).unwrap();
        assert_eq!(lang.name(), "arith");
        assert!(lang.field_id("left").is_some());

        let tree = sylva::parse(&lang, b"1 + 2 * x;\n").unwrap();
        let root = tree.root_node();
        assert!(!root.has_error());
        assert_eq!(
            root.to_sexp(),
            "(source stmt: (expr left: (expr (number)) right: (expr left: (expr (number)) right: (expr (identifier)))))"
        );
    }

    #[test]
    fn visible_extras_and_errors() {
        init_logger();
        let lang = Language::from_def(build(&arithmetic()).unwrap()).unwrap();
        let tree = sylva::parse(&lang, b"1 # one\n;").unwrap();
        let root = tree.root_node();
        assert!(!root.has_error());
        assert!(root.to_sexp().contains("(comment)"));

        let tree = sylva::parse(&lang, b"1 + ;").unwrap();
        assert!(tree.root_node().has_error());
        assert_eq!(tree.root_node().byte_range(), 0..5);
    }

    #[test]
    fn reparse_matches_fresh_parse() {
        init_logger();
        let lang = Language::from_def(build(&arithmetic()).unwrap()).unwrap();
        let mut parser = Parser::with_config(lang, ParserConfig::default());
        let old = b"a + b;\nc * d;\n".to_vec();
        let tree = parser.parse(&old).unwrap();
        let (new, edit) = Edit::splice(&old, 7..8, b"(e + f)").unwrap();
        let incremental = parser.reparse(&tree, &edit, &new).unwrap();
        let fresh = parser.parse(&new).unwrap();
        assert_eq!(incremental.root_node().to_sexp(), fresh.root_node().to_sexp());
        assert_eq!(incremental.root_node().byte_range(), 0..new.len());
    }

    #[test]
    fn write_table_creates_the_file() {
        init_logger();
        let path = std::env::temp_dir().join(format!("sylva-gen-{}.bin", std::process::id()));
        write_table(&arithmetic(), &path).unwrap();
        let bytes = fs::read(&path).unwrap();
        let _ = fs::remove_file(&path);
        assert!(Language::load(&bytes).is_ok());
    }

    #[test]
    fn errors_carry_context() {
        let g = Grammar::new("bad").rule("s", sym("nowhere"));
        let err = compile(&g).unwrap_err();
        let text = format!("{err:#}");
        assert!(text.contains("bad"));
        assert!(text.contains("nowhere"));
    }
}
