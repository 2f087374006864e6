//! Copyright (c) 2005–2025 IKH Software, Inc.
//!
//! Released under the terms of the GNU Lesser General Public License, version 3.0
//! or (at your option) any later version (LGPL-3.0-or-later).
//!
//! Incremental, error-tolerant GLR parsing runtime.
//!
//! `sylva` turns text into concrete syntax trees using a grammar compiled ahead
//! of time into a binary table (see `sylva-gen`). Its main pieces are:
//!  * **[`Language`]**: the loaded, validated table, shared across threads;
//!  * **[`Lexer`]**: a context-aware scanner driven by the current parse state;
//!  * **[`Parser`]**: a GLR automaton that forks on conflicts and merges heads;
//!  * **[`Tree`]** / **[`Node`]**: immutable, structurally shared syntax trees;
//!  * **[`Edit`]**: describes a text change so [`Parser::reparse`] can reuse
//!    the unchanged parts of a previous tree.
//!
//! Malformed input never fails a parse: the result is always a complete tree
//! whose `ERROR` and missing nodes mark the damage.
//!
//! ```ignore
//! let tree = sylva::parse(language, b"begin x := 1; end;")?;
//! println!("{}", tree.root_node().to_sexp());
//! ```

mod cursor;
mod edit;
mod error;
mod language;
mod lexer;
mod parser;
mod recovery;
mod reuse;
mod stack;
#[cfg(test)]
mod test_language;
mod tree;
mod wire;

pub use crate::cursor::{LineIndex, Point, ScanCursor, Span};
pub use crate::edit::Edit;
pub use crate::error::{LoadError, ParseError};
pub use crate::language::{
    FORMAT_VERSION, FieldId, Language, LanguageDef, LexMode, LexRule, MIN_FORMAT_VERSION,
    ParseAction, ProductionDef, ProductionId, StateDef, StateId, Symbol, SymbolDef, SymbolKind,
    TerminalSet,
};
pub use crate::lexer::{ExternalScanner, Lexeme, Lexer, LexerStats};
pub use crate::parser::{CancellationFlag, Parser, ParserConfig, ParserStats};
pub use crate::tree::{Node, Tree, TreeCursor};

/// Parses `input` with default settings.
pub fn parse(language: &Language, input: &[u8]) -> Result<Tree, ParseError> {
    Parser::new(language.clone()).parse(input)
}

/// Reparses `input`, the text of `previous` after `edit`, with default
/// settings.
pub fn reparse(previous: &Tree, edit: &Edit, input: &[u8]) -> Result<Tree, ParseError> {
    Parser::new(previous.language().clone()).reparse(previous, edit, input)
}
