//! # Grammar Table Loader
//!
//! A compiled grammar arrives as an opaque byte string. [`Language::load`]
//! checks the format version and the structural consistency of the automaton
//! before anything is exposed. The result is an immutable, cheaply cloned
//! handle that any number of parses may share across threads.
//!
//! The binary layout (all integers little-endian):
//!
//! ```text
//! magic "SYLV", version u16, name
//! symbols:     count u16, terminal count u16, { name, kind u8, named, visible, extra, [lex rule] }
//! fields:      count u16, { name }
//! productions: count u16, { lhs, rhs_len, precedence i32, dynamic i32, fields[(pos, field)], aliases[(pos, symbol)] }
//! states:      count u16, { cells[(terminal, actions[(tag u8, value u16)])], gotos[(nonterminal, state)] }
//! start symbol u16, word token u16 (0xFFFF = none)
//! ```
//!
//! [`LanguageDef`] is the plain-data form of the same table; the table
//! compiler fills one in and calls [`LanguageDef::to_bytes`].

use crate::lexer::LexicalAutomaton;
use crate::wire::{Reader, Writer};
use crate::{ExternalScanner, LoadError};
use smartstring::alias::String;
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::sync::Arc;

/// Table format version written by this runtime.
pub const FORMAT_VERSION: u16 = 1;
/// Oldest table format version this runtime still reads.
pub const MIN_FORMAT_VERSION: u16 = 1;
/// Upper bound on the number of automaton states.
pub const MAX_STATES: usize = u16::MAX as usize - 1;

const MAGIC: &[u8; 4] = b"SYLV";
const NONE16: u16 = u16::MAX;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u16);

        impl $name {
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl From<$name> for usize {
            fn from(id: $name) -> Self {
                id.0 as usize
            }
        }
    };
}

id_type!(
    /// A grammar symbol: terminal, external terminal, nonterminal or alias.
    Symbol
);
id_type!(
    /// An automaton state.
    StateId
);
id_type!(
    /// A production (rule alternative) in declaration order.
    ProductionId
);
id_type!(
    /// A field name; ids start at 1.
    FieldId
);
id_type!(
    /// A group of states sharing the same set of lexable terminals.
    LexMode
);

impl Symbol {
    /// End of input. Always the first terminal.
    pub const END: Symbol = Symbol(0);
    /// Error nodes synthesized by recovery and the lexer.
    pub const ERROR: Symbol = Symbol(u16::MAX);
}

/// What a symbol is, as recorded in the table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Terminal,
    External,
    NonTerminal,
    /// A name that only ever appears through a production alias.
    Alias,
}

impl SymbolKind {
    fn to_u8(self) -> u8 {
        match self {
            SymbolKind::Terminal => 0,
            SymbolKind::External => 1,
            SymbolKind::NonTerminal => 2,
            SymbolKind::Alias => 3,
        }
    }

    fn from_u8(v: u8) -> Result<Self, LoadError> {
        Ok(match v {
            0 => SymbolKind::Terminal,
            1 => SymbolKind::External,
            2 => SymbolKind::NonTerminal,
            3 => SymbolKind::Alias,
            _ => return Err(LoadError::malformed(format!("unknown symbol kind {v}"))),
        })
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SymbolKind::Terminal | SymbolKind::External)
    }
}

/// Lexical rule of a terminal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LexRule {
    /// Regular expression in `regex-syntax` dialect.
    pub pattern: String,
    /// Higher wins between equally long matches.
    pub priority: i32,
    /// Literal that the word token also matches; loses to a longer word.
    pub keyword: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolDef {
    pub name: String,
    pub kind: SymbolKind,
    pub named: bool,
    pub visible: bool,
    pub extra: bool,
    pub lex: Option<LexRule>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProductionDef {
    pub lhs: Symbol,
    pub rhs_len: u16,
    pub precedence: i32,
    pub dynamic_precedence: i32,
    /// `(rhs position, field)` pairs.
    pub fields: Vec<(u16, FieldId)>,
    /// `(rhs position, alias symbol)` pairs.
    pub aliases: Vec<(u16, Symbol)>,
}

impl ProductionDef {
    pub fn field_at(&self, pos: usize) -> Option<FieldId> {
        self.fields
            .iter()
            .find(|&&(p, _)| p as usize == pos)
            .map(|&(_, f)| f)
    }

    pub fn alias_at(&self, pos: usize) -> Option<Symbol> {
        self.aliases
            .iter()
            .find(|&&(p, _)| p as usize == pos)
            .map(|&(_, s)| s)
    }
}

/// One entry of an action cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParseAction {
    Shift(StateId),
    Reduce(ProductionId),
    Accept,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StateDef {
    /// Action cells sorted by terminal. A cell with several actions is a
    /// conflict the automaton resolves by forking.
    pub actions: Vec<(Symbol, Vec<ParseAction>)>,
    /// Goto entries sorted by nonterminal.
    pub gotos: Vec<(Symbol, StateId)>,
}

/// Plain-data form of a compiled grammar table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LanguageDef {
    pub name: String,
    /// Terminals first (`symbols[0]` is end of input), then nonterminals and aliases.
    pub symbols: Vec<SymbolDef>,
    /// Field names; `fields[i]` has id `i + 1`.
    pub fields: Vec<String>,
    pub productions: Vec<ProductionDef>,
    /// `states[0]` is the start state.
    pub states: Vec<StateDef>,
    pub start_symbol: Symbol,
    pub word_token: Option<Symbol>,
}

impl LanguageDef {
    /// Serializes the table in the current format version.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.bytes(MAGIC);
        w.u16(FORMAT_VERSION);
        w.str(&self.name);

        let terminal_count = self
            .symbols
            .iter()
            .take_while(|s| s.kind.is_terminal())
            .count();
        w.len16(self.symbols.len());
        w.len16(terminal_count);
        for s in &self.symbols {
            w.str(&s.name);
            w.u8(s.kind.to_u8());
            w.u8(s.named as u8);
            w.u8(s.visible as u8);
            w.u8(s.extra as u8);
            match &s.lex {
                Some(lex) => {
                    w.u8(1);
                    w.str(&lex.pattern);
                    w.i32(lex.priority);
                    w.u8(lex.keyword as u8);
                }
                None => w.u8(0),
            }
        }

        w.len16(self.fields.len());
        for f in &self.fields {
            w.str(f);
        }

        w.len16(self.productions.len());
        for p in &self.productions {
            w.u16(p.lhs.0);
            w.u16(p.rhs_len);
            w.i32(p.precedence);
            w.i32(p.dynamic_precedence);
            w.len16(p.fields.len());
            for &(pos, field) in &p.fields {
                w.u16(pos);
                w.u16(field.0);
            }
            w.len16(p.aliases.len());
            for &(pos, alias) in &p.aliases {
                w.u16(pos);
                w.u16(alias.0);
            }
        }

        w.len16(self.states.len());
        for st in &self.states {
            w.len16(st.actions.len());
            for (sym, actions) in &st.actions {
                w.u16(sym.0);
                w.u8(u8::try_from(actions.len()).unwrap_or(u8::MAX));
                for action in actions {
                    match *action {
                        ParseAction::Shift(s) => {
                            w.u8(0);
                            w.u16(s.0);
                        }
                        ParseAction::Reduce(p) => {
                            w.u8(1);
                            w.u16(p.0);
                        }
                        ParseAction::Accept => {
                            w.u8(2);
                            w.u16(0);
                        }
                    }
                }
            }
            w.len16(st.gotos.len());
            for &(sym, state) in &st.gotos {
                w.u16(sym.0);
                w.u16(state.0);
            }
        }

        w.u16(self.start_symbol.0);
        w.u16(self.word_token.map_or(NONE16, |s| s.0));
        w.finish()
    }

    /// Decodes the byte layout without checking the automaton's consistency.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LoadError> {
        let mut r = Reader::new(bytes);
        if r.bytes(MAGIC.len()).ok() != Some(&MAGIC[..]) {
            return Err(LoadError::malformed("missing table signature"));
        }
        let version = r.u16()?;
        if !(MIN_FORMAT_VERSION..=FORMAT_VERSION).contains(&version) {
            return Err(LoadError::IncompatibleVersion {
                found: version,
                min: MIN_FORMAT_VERSION,
                max: FORMAT_VERSION,
            });
        }
        let name = r.str()?.into();

        let symbol_count = r.u16()? as usize;
        let terminal_count = r.u16()? as usize;
        let mut symbols = Vec::with_capacity(symbol_count);
        for _ in 0..symbol_count {
            let name = r.str()?.into();
            let kind = SymbolKind::from_u8(r.u8()?)?;
            let named = r.bool()?;
            let visible = r.bool()?;
            let extra = r.bool()?;
            let lex = if r.bool()? {
                Some(LexRule {
                    pattern: r.str()?.into(),
                    priority: r.i32()?,
                    keyword: r.bool()?,
                })
            } else {
                None
            };
            symbols.push(SymbolDef {
                name,
                kind,
                named,
                visible,
                extra,
                lex,
            });
        }
        let actual_terminals = symbols.iter().take_while(|s| s.kind.is_terminal()).count();
        if actual_terminals != terminal_count {
            return Err(LoadError::malformed(format!(
                "terminal count {terminal_count} does not match symbol table ({actual_terminals})"
            )));
        }

        let field_count = r.u16()? as usize;
        let mut fields = Vec::with_capacity(field_count);
        for _ in 0..field_count {
            fields.push(r.str()?.into());
        }

        let production_count = r.u16()? as usize;
        let mut productions = Vec::with_capacity(production_count);
        for _ in 0..production_count {
            let lhs = Symbol(r.u16()?);
            let rhs_len = r.u16()?;
            let precedence = r.i32()?;
            let dynamic_precedence = r.i32()?;
            let n = r.u16()? as usize;
            let mut pfields = Vec::with_capacity(n);
            for _ in 0..n {
                pfields.push((r.u16()?, FieldId(r.u16()?)));
            }
            let n = r.u16()? as usize;
            let mut aliases = Vec::with_capacity(n);
            for _ in 0..n {
                aliases.push((r.u16()?, Symbol(r.u16()?)));
            }
            productions.push(ProductionDef {
                lhs,
                rhs_len,
                precedence,
                dynamic_precedence,
                fields: pfields,
                aliases,
            });
        }

        let state_count = r.u16()? as usize;
        let mut states = Vec::with_capacity(state_count);
        for _ in 0..state_count {
            let n = r.u16()? as usize;
            let mut actions = Vec::with_capacity(n);
            for _ in 0..n {
                let sym = Symbol(r.u16()?);
                let k = r.u8()? as usize;
                let mut cell = Vec::with_capacity(k);
                for _ in 0..k {
                    let at = r.position();
                    let tag = r.u8()?;
                    let value = r.u16()?;
                    cell.push(match tag {
                        0 => ParseAction::Shift(StateId(value)),
                        1 => ParseAction::Reduce(ProductionId(value)),
                        2 => ParseAction::Accept,
                        _ => {
                            return Err(LoadError::malformed(format!(
                                "unknown action tag {tag} at byte {at}"
                            )));
                        }
                    });
                }
                actions.push((sym, cell));
            }
            let n = r.u16()? as usize;
            let mut gotos = Vec::with_capacity(n);
            for _ in 0..n {
                gotos.push((Symbol(r.u16()?), StateId(r.u16()?)));
            }
            states.push(StateDef { actions, gotos });
        }

        let start_symbol = Symbol(r.u16()?);
        let word_token = match r.u16()? {
            NONE16 => None,
            w => Some(Symbol(w)),
        };
        if !r.is_empty() {
            return Err(LoadError::malformed(format!(
                "trailing bytes after table end at byte {}",
                r.position()
            )));
        }

        Ok(LanguageDef {
            name,
            symbols,
            fields,
            productions,
            states,
            start_symbol,
            word_token,
        })
    }
}

/// A set of terminals, stored as a bitset over terminal ids.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct TerminalSet {
    words: Vec<u64>,
}

impl TerminalSet {
    pub fn new(terminal_count: usize) -> Self {
        Self {
            words: vec![0; terminal_count.div_ceil(64)],
        }
    }

    pub fn insert(&mut self, sym: Symbol) {
        let i = sym.index();
        if i / 64 >= self.words.len() {
            self.words.resize(i / 64 + 1, 0);
        }
        self.words[i / 64] |= 1 << (i % 64);
    }

    #[inline]
    pub fn contains(&self, sym: Symbol) -> bool {
        let i = sym.index();
        self.words
            .get(i / 64)
            .is_some_and(|w| w & (1 << (i % 64)) != 0)
    }

    pub fn union_with(&mut self, other: &TerminalSet) {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a |= b;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &w)| {
            (0..64)
                .filter(move |b| w & (1 << b) != 0)
                .map(move |b| Symbol((i * 64 + b) as u16))
        })
    }
}

struct Table {
    name: String,
    symbols: Vec<SymbolDef>,
    terminal_count: usize,
    fields: Vec<String>,
    field_ids: HashMap<String, FieldId>,
    productions: Vec<ProductionDef>,
    state_count: usize,
    /// `(offset into action_pool, len)` for `state * terminal_count + terminal`.
    action_index: Vec<(u32, u16)>,
    action_pool: Vec<ParseAction>,
    /// Goto target for `state * nonterminal_slots + (symbol - terminal_count)`.
    gotos: Vec<u16>,
    nonterminal_slots: usize,
    state_modes: Vec<LexMode>,
    modes: Vec<TerminalSet>,
    all_terminals: TerminalSet,
    externals: TerminalSet,
    start_symbol: Symbol,
    word_token: Option<Symbol>,
    lexer: LexicalAutomaton,
}

/// Shared, immutable handle to a loaded grammar table.
#[derive(Clone)]
pub struct Language {
    table: Arc<Table>,
    scanner: Option<Arc<dyn ExternalScanner>>,
}

impl Debug for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Language")
            .field("name", &self.table.name)
            .field("symbols", &self.table.symbols.len())
            .field("states", &self.table.state_count)
            .field("productions", &self.table.productions.len())
            .field("external_scanner", &self.scanner.is_some())
            .finish()
    }
}

impl Language {
    /// Loads and validates a compiled table.
    pub fn load(bytes: &[u8]) -> Result<Self, LoadError> {
        let def = LanguageDef::from_bytes(bytes)?;
        Self::from_def(def)
    }

    /// Validates an in-memory table.
    pub fn from_def(def: LanguageDef) -> Result<Self, LoadError> {
        let table = Table::build(def)?;
        log::debug!(
            "loaded language {:?}: {} symbols, {} states, {} lex modes",
            table.name,
            table.symbols.len(),
            table.state_count,
            table.modes.len()
        );
        Ok(Self {
            table: Arc::new(table),
            scanner: None,
        })
    }

    /// Attaches the scanner responsible for the table's external terminals.
    pub fn with_external_scanner(mut self, scanner: Arc<dyn ExternalScanner>) -> Self {
        self.scanner = Some(scanner);
        self
    }

    pub fn external_scanner(&self) -> Option<&Arc<dyn ExternalScanner>> {
        self.scanner.as_ref()
    }

    /// True when both handles refer to the same loaded table.
    pub fn ptr_eq(&self, other: &Language) -> bool {
        Arc::ptr_eq(&self.table, &other.table)
    }

    pub fn name(&self) -> &str {
        &self.table.name
    }

    pub fn symbol_count(&self) -> usize {
        self.table.symbols.len()
    }

    pub fn terminal_count(&self) -> usize {
        self.table.terminal_count
    }

    pub fn state_count(&self) -> usize {
        self.table.state_count
    }

    pub fn production_count(&self) -> usize {
        self.table.productions.len()
    }

    pub fn field_count(&self) -> usize {
        self.table.fields.len()
    }

    pub fn lex_mode_count(&self) -> usize {
        self.table.modes.len()
    }

    pub fn start_state(&self) -> StateId {
        StateId(0)
    }

    pub fn start_symbol(&self) -> Symbol {
        self.table.start_symbol
    }

    pub fn word_token(&self) -> Option<Symbol> {
        self.table.word_token
    }

    fn symbol(&self, sym: Symbol) -> Option<&SymbolDef> {
        self.table.symbols.get(sym.index())
    }

    pub fn symbol_name(&self, sym: Symbol) -> &str {
        if sym == Symbol::ERROR {
            return "ERROR";
        }
        self.symbol(sym).map_or("", |s| s.name.as_str())
    }

    /// Looks a symbol up by name; `named` separates `identifier` from `"identifier"`.
    pub fn symbol_for_name(&self, name: &str, named: bool) -> Option<Symbol> {
        if named && name == "ERROR" {
            return Some(Symbol::ERROR);
        }
        self.table
            .symbols
            .iter()
            .position(|s| s.name == name && s.named == named)
            .map(|i| Symbol(i as u16))
    }

    pub fn symbol_kind(&self, sym: Symbol) -> Option<SymbolKind> {
        self.symbol(sym).map(|s| s.kind)
    }

    pub fn is_terminal(&self, sym: Symbol) -> bool {
        sym.index() < self.table.terminal_count
    }

    pub fn is_named(&self, sym: Symbol) -> bool {
        sym == Symbol::ERROR || self.symbol(sym).is_some_and(|s| s.named)
    }

    pub fn is_visible(&self, sym: Symbol) -> bool {
        sym == Symbol::ERROR || self.symbol(sym).is_some_and(|s| s.visible)
    }

    pub fn is_extra(&self, sym: Symbol) -> bool {
        self.symbol(sym).is_some_and(|s| s.extra)
    }

    pub fn lex_rule(&self, sym: Symbol) -> Option<&LexRule> {
        self.symbol(sym).and_then(|s| s.lex.as_ref())
    }

    pub fn field_name(&self, field: FieldId) -> Option<&str> {
        field
            .index()
            .checked_sub(1)
            .and_then(|i| self.table.fields.get(i))
            .map(|s| s.as_str())
    }

    pub fn field_id(&self, name: &str) -> Option<FieldId> {
        self.table.field_ids.get(name).copied()
    }

    pub fn production(&self, id: ProductionId) -> &ProductionDef {
        &self.table.productions[id.index()]
    }

    /// The action cell for a terminal; empty means a syntax error.
    #[inline]
    pub fn actions(&self, state: StateId, sym: Symbol) -> &[ParseAction] {
        let t = &self.table;
        if sym.index() >= t.terminal_count || state.index() >= t.state_count {
            return &[];
        }
        let (offset, len) = t.action_index[state.index() * t.terminal_count + sym.index()];
        &t.action_pool[offset as usize..offset as usize + len as usize]
    }

    #[inline]
    pub fn goto(&self, state: StateId, sym: Symbol) -> Option<StateId> {
        let t = &self.table;
        let slot = sym.index().checked_sub(t.terminal_count)?;
        if slot >= t.nonterminal_slots || state.index() >= t.state_count {
            return None;
        }
        match t.gotos[state.index() * t.nonterminal_slots + slot] {
            NONE16 => None,
            s => Some(StateId(s)),
        }
    }

    /// Nonterminals with a goto out of `state`, in symbol order.
    pub fn gotos(&self, state: StateId) -> impl Iterator<Item = (Symbol, StateId)> + '_ {
        let t = &self.table;
        let row = state.index() * t.nonterminal_slots;
        (0..t.nonterminal_slots).filter_map(move |slot| match t.gotos.get(row + slot) {
            Some(&NONE16) | None => None,
            Some(&s) => Some((Symbol((t.terminal_count + slot) as u16), StateId(s))),
        })
    }

    pub fn lex_mode(&self, state: StateId) -> LexMode {
        self.table.state_modes[state.index()]
    }

    /// Terminals lexable in a mode, extras included.
    pub fn mode_terminals(&self, mode: LexMode) -> &TerminalSet {
        &self.table.modes[mode.index()]
    }

    /// Every terminal; the lexer's view while recovering from errors.
    pub fn all_terminals(&self) -> &TerminalSet {
        &self.table.all_terminals
    }

    pub fn external_terminals(&self) -> &TerminalSet {
        &self.table.externals
    }

    pub(crate) fn lexer_automaton(&self) -> &LexicalAutomaton {
        &self.table.lexer
    }
}

impl Table {
    fn build(def: LanguageDef) -> Result<Self, LoadError> {
        let LanguageDef {
            name,
            symbols,
            fields,
            productions,
            states,
            start_symbol,
            word_token,
        } = def;

        if symbols.is_empty() || symbols.len() >= NONE16 as usize {
            return Err(LoadError::malformed(format!(
                "symbol count {} out of bounds",
                symbols.len()
            )));
        }
        let end = &symbols[0];
        if end.kind != SymbolKind::Terminal || end.lex.is_some() {
            return Err(LoadError::malformed(
                "first symbol must be the end-of-input terminal",
            ));
        }
        let terminal_count = symbols.iter().take_while(|s| s.kind.is_terminal()).count();
        for (i, s) in symbols.iter().enumerate() {
            if i >= terminal_count && s.kind.is_terminal() {
                return Err(LoadError::malformed(format!(
                    "terminal {:?} declared after nonterminals",
                    s.name
                )));
            }
            let wants_lex = s.kind == SymbolKind::Terminal && i != 0;
            if wants_lex != s.lex.is_some() {
                return Err(LoadError::malformed(format!(
                    "symbol {:?} has an inconsistent lexical rule",
                    s.name
                )));
            }
            if s.extra && !s.kind.is_terminal() {
                return Err(LoadError::malformed(format!(
                    "extra symbol {:?} is not a terminal",
                    s.name
                )));
            }
        }
        let nonterminal_slots = symbols.len() - terminal_count;
        let is_nonterminal = |sym: Symbol| {
            symbols
                .get(sym.index())
                .is_some_and(|s| s.kind == SymbolKind::NonTerminal)
        };

        let mut field_ids = HashMap::new();
        for (i, f) in fields.iter().enumerate() {
            if f.is_empty() || field_ids.insert(f.clone(), FieldId(i as u16 + 1)).is_some() {
                return Err(LoadError::malformed(format!("invalid field name {f:?}")));
            }
        }

        for (i, p) in productions.iter().enumerate() {
            if !is_nonterminal(p.lhs) {
                return Err(LoadError::malformed(format!(
                    "production {i} has a non-nonterminal left-hand side"
                )));
            }
            for &(pos, field) in &p.fields {
                if pos >= p.rhs_len || field.0 == 0 || field.index() > fields.len() {
                    return Err(LoadError::malformed(format!(
                        "production {i} has an invalid field entry"
                    )));
                }
            }
            for &(pos, alias) in &p.aliases {
                if pos >= p.rhs_len || alias.index() >= symbols.len() {
                    return Err(LoadError::malformed(format!(
                        "production {i} has an invalid alias entry"
                    )));
                }
            }
        }

        let state_count = states.len();
        if state_count == 0 || state_count > MAX_STATES {
            return Err(LoadError::malformed(format!(
                "state count {state_count} out of bounds"
            )));
        }

        let mut action_index = vec![(0u32, 0u16); state_count * terminal_count];
        let mut action_pool = Vec::new();
        let mut gotos = vec![NONE16; state_count * nonterminal_slots];
        let mut accepts = 0;
        for (si, st) in states.iter().enumerate() {
            if st.actions.is_empty() && st.gotos.is_empty() {
                return Err(LoadError::malformed(format!("state {si} has no actions")));
            }
            let mut last = None;
            for (sym, cell) in &st.actions {
                if sym.index() >= terminal_count {
                    return Err(LoadError::malformed(format!(
                        "state {si} has an action on non-terminal {}",
                        sym.0
                    )));
                }
                if last.is_some_and(|l| l >= *sym) {
                    return Err(LoadError::malformed(format!(
                        "state {si} action cells are not sorted"
                    )));
                }
                last = Some(*sym);
                if cell.is_empty() {
                    return Err(LoadError::malformed(format!(
                        "state {si} has an empty action cell"
                    )));
                }
                for action in cell {
                    match *action {
                        ParseAction::Shift(s) if s.index() >= state_count => {
                            return Err(LoadError::malformed(format!(
                                "state {si} shifts to missing state {}",
                                s.0
                            )));
                        }
                        ParseAction::Reduce(p) if p.index() >= productions.len() => {
                            return Err(LoadError::malformed(format!(
                                "state {si} reduces missing production {}",
                                p.0
                            )));
                        }
                        ParseAction::Accept => accepts += 1,
                        _ => {}
                    }
                }
                action_index[si * terminal_count + sym.index()] =
                    (action_pool.len() as u32, cell.len() as u16);
                action_pool.extend_from_slice(cell);
            }
            let mut last = None;
            for &(sym, target) in &st.gotos {
                if !is_nonterminal(sym) || last.is_some_and(|l| l >= sym) {
                    return Err(LoadError::malformed(format!(
                        "state {si} has an invalid goto on symbol {}",
                        sym.0
                    )));
                }
                last = Some(sym);
                if target.index() >= state_count {
                    return Err(LoadError::malformed(format!(
                        "state {si} goes to missing state {}",
                        target.0
                    )));
                }
                gotos[si * nonterminal_slots + sym.index() - terminal_count] = target.0;
            }
        }
        if accepts == 0 {
            return Err(LoadError::malformed("table has no accepting state"));
        }
        if !is_nonterminal(start_symbol) {
            return Err(LoadError::malformed("start symbol is not a nonterminal"));
        }
        if let Some(w) = word_token {
            if symbols.get(w.index()).and_then(|s| s.lex.as_ref()).is_none() {
                return Err(LoadError::malformed("word token has no lexical rule"));
            }
        }

        let mut all_terminals = TerminalSet::new(terminal_count);
        let mut externals = TerminalSet::new(terminal_count);
        let mut extras = TerminalSet::new(terminal_count);
        for (i, s) in symbols.iter().enumerate().take(terminal_count) {
            let sym = Symbol(i as u16);
            all_terminals.insert(sym);
            if s.kind == SymbolKind::External {
                externals.insert(sym);
            }
            if s.extra {
                extras.insert(sym);
            }
        }

        let mut modes: Vec<TerminalSet> = Vec::new();
        let mut mode_ids: HashMap<TerminalSet, LexMode> = HashMap::new();
        let mut state_modes = Vec::with_capacity(state_count);
        for st in &states {
            let mut valid = extras.clone();
            for (sym, _) in &st.actions {
                valid.insert(*sym);
            }
            let mode = *mode_ids.entry(valid.clone()).or_insert_with(|| {
                modes.push(valid);
                LexMode((modes.len() - 1) as u16)
            });
            state_modes.push(mode);
        }

        let rules: Vec<(Symbol, &LexRule)> = symbols
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.lex.as_ref().map(|lex| (Symbol(i as u16), lex)))
            .collect();
        let lexer = LexicalAutomaton::build(&rules)?;

        Ok(Self {
            name,
            symbols,
            terminal_count,
            fields,
            field_ids,
            productions,
            state_count,
            action_index,
            action_pool,
            gotos,
            nonterminal_slots,
            state_modes,
            modes,
            all_terminals,
            externals,
            start_symbol,
            word_token,
            lexer,
        })
    }
}
