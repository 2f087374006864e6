//! Copyright (c) 2005–2025 IKH Software, Inc.
//!
//! Released under the terms of the GNU Lesser General Public License, version 3.0
//! or (at your option) any later version (LGPL-3.0-or-later).
//!
//! # sylva-var2
//!
//! The "var2" teaching language compiled for the `sylva` runtime. The grammar
//! lives in `grammar/var2.rs` and is turned into a binary table by `build.rs`;
//! this crate embeds that table and hands out a shared [`Language`].
//!
//! The language has type references (`int`, `array [,] of T`, custom names),
//! structured statements (`if`, `begin … end;`, `while`, `repeat … until`,
//! `break;`) and C-like expressions with fourteen precedence levels.
//!
//! ```rust
//! let tree = sylva_var2::parse(b"begin x := f(1, 2)[0]; end;").unwrap();
//! let root = tree.root_node();
//! assert_eq!(root.kind(), "source");
//! assert!(!root.has_error());
//! ```

use once_cell::sync::Lazy;
use sylva::{Language, LoadError, ParseError, Parser, ParserConfig, Tree};

static TABLE: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/var2.bin"));

static LANGUAGE: Lazy<Result<Language, LoadError>> = Lazy::new(|| {
    let language = Language::load(TABLE);
    if let Ok(lang) = &language {
        log::debug!(
            "loaded {}: {} symbols, {} states, {} lex modes",
            lang.name(),
            lang.symbol_count(),
            lang.state_count(),
            lang.lex_mode_count()
        );
    }
    language
});

/// The embedded table, or why it failed to load.
pub fn try_language() -> Result<&'static Language, &'static LoadError> {
    LANGUAGE.as_ref()
}

/// The var2 language.
///
/// # Panics
///
/// If the embedded table does not load. `build.rs` loads every table it
/// writes, so this only happens with a corrupted build directory.
pub fn language() -> &'static Language {
    match try_language() {
        Ok(lang) => lang,
        Err(e) => panic!("embedded var2 table does not load: {e}"),
    }
}

/// A parser for var2 with the given settings.
pub fn parser(config: ParserConfig) -> Parser {
    Parser::with_config(language().clone(), config)
}

/// Parses var2 source with default settings.
pub fn parse(input: &[u8]) -> Result<Tree, ParseError> {
    sylva::parse(language(), input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_loads_once() {
        let a = language();
        let b = language();
        assert!(a.ptr_eq(b));
        assert_eq!(a.name(), "var2");
        assert!(a.word_token().is_some());
        assert!(a.field_id("typeRef").is_some());
        assert!(a.symbol_for_name("bin_op", true).is_some());
    }
}
