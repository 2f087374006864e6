//! # GLR Automaton
//!
//! The driver keeps a set of stack heads and advances all of them one token
//! at a time. A conflict cell forks the head once per action, heads that reach
//! the same state sequence are merged, and the survivors are sorted by the
//! selection policy so that the result never depends on the order in which
//! forks happened. When no head can act, control passes to the recovery
//! controller (see `recovery.rs`), which always makes progress.
//!
//! During a reparse the driver consults a [`ReuseCursor`] over the previous
//! tree before lexing, and again before shifting, so unchanged regions are
//! taken over by reference.

use crate::ParseError;
use crate::edit::Edit;
use crate::language::{Language, LexMode, ParseAction, ProductionId, StateId, Symbol, TerminalSet};
use crate::lexer::{Lexeme, Lexer, LexerStats};
use crate::recovery::RecoveryBudget;
use crate::reuse::ReuseCursor;
use crate::stack::{Head, compare_heads, condense};
use crate::tree::{LeafSpec, Subtree, Tree};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Upper bound on reductions performed for a single lookahead. Only cyclic
/// grammars get near it.
const MAX_REDUCTIONS_PER_TOKEN: usize = 100_000;

/// Tunables for one [`Parser`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
    /// Most stack heads kept alive after each token.
    pub max_stacks: usize,
    /// Tokens lexed ahead while looking for a place to resynchronize.
    pub recovery_lookahead: usize,
    /// Recoveries allowed at one position before the token is skipped.
    pub max_recovery_attempts: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_stacks: 16,
            recovery_lookahead: 8,
            max_recovery_attempts: 8,
        }
    }
}

impl ParserConfig {
    pub fn with_max_stacks(mut self, max_stacks: usize) -> Self {
        self.max_stacks = max_stacks;
        self
    }

    pub fn with_recovery_lookahead(mut self, tokens: usize) -> Self {
        self.recovery_lookahead = tokens;
        self
    }

    pub fn with_max_recovery_attempts(mut self, attempts: usize) -> Self {
        self.max_recovery_attempts = attempts;
        self
    }
}

/// Shared flag checked between automaton steps. Raising it makes the running
/// parse return [`ParseError::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Counters for the most recent parse.
#[derive(Debug, Clone, Default)]
pub struct ParserStats {
    pub tokens: usize,
    pub shifts: usize,
    pub reductions: usize,
    pub forks: usize,
    pub merges: usize,
    pub reused_nodes: usize,
    pub recoveries: usize,
    /// Peak number of live stack heads.
    pub max_stacks: usize,
}

/// A GLR parser bound to one language.
#[derive(Debug)]
pub struct Parser {
    language: Language,
    config: ParserConfig,
    cancellation: Option<CancellationFlag>,
    stats: ParserStats,
    lexer_stats: LexerStats,
}

impl Parser {
    pub fn new(language: Language) -> Self {
        Self::with_config(language, ParserConfig::default())
    }

    pub fn with_config(language: Language, config: ParserConfig) -> Self {
        Self {
            language,
            config,
            cancellation: None,
            stats: ParserStats::default(),
            lexer_stats: LexerStats::default(),
        }
    }

    pub fn set_cancellation_flag(&mut self, flag: Option<CancellationFlag>) {
        self.cancellation = flag;
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn stats(&self) -> ParserStats {
        self.stats.clone()
    }

    pub fn lexer_stats(&self) -> LexerStats {
        self.lexer_stats.clone()
    }

    /// Parses `input` from scratch. Syntax errors become `ERROR` nodes, so
    /// this only fails when cancelled.
    pub fn parse(&mut self, input: &[u8]) -> Result<Tree, ParseError> {
        self.run(input, None)
    }

    /// Parses `input`, which is `previous`'s input with `edit` applied,
    /// reusing every part of `previous` the edit cannot have affected.
    pub fn reparse(&mut self, previous: &Tree, edit: &Edit, input: &[u8]) -> Result<Tree, ParseError> {
        if !self.language.ptr_eq(previous.language()) {
            return Err(ParseError::LanguageMismatch {
                expected: self.language.name().into(),
                found: previous.language().name().into(),
            });
        }
        edit.validate(previous.len(), input.len())?;
        if edit.is_empty() && previous.len() == input.len() {
            log::debug!("empty edit, keeping previous tree");
            self.stats = ParserStats::default();
            self.lexer_stats = LexerStats::default();
            return Ok(previous.clone());
        }
        self.run(input, Some(ReuseCursor::new(previous, *edit)))
    }

    fn run(&mut self, input: &[u8], reuse: Option<ReuseCursor<'_>>) -> Result<Tree, ParseError> {
        let mut run = Run::new(
            &self.language,
            &self.config,
            self.cancellation.as_ref(),
            input,
            reuse,
        );
        let result = run.execute();
        self.stats = run.stats.clone();
        self.lexer_stats = run.lexer.stats();
        let root = result?;
        log::debug!(
            "parsed {} bytes: {} tokens, {} shifts, {} reductions, {} reused, {} recoveries",
            input.len(),
            self.stats.tokens,
            self.stats.shifts,
            self.stats.reductions,
            self.stats.reused_nodes,
            self.stats.recoveries,
        );
        Ok(Tree::new(root, self.language.clone(), input.len()))
    }
}

/// The token the heads are about to consume.
pub(crate) enum Lookahead {
    Lexed(Lexeme),
    /// A leaf taken over from the previous tree.
    Reused(Subtree),
}

impl Lookahead {
    pub fn symbol(&self) -> Symbol {
        match self {
            Lookahead::Lexed(t) => t.symbol,
            Lookahead::Reused(leaf) => leaf.symbol(),
        }
    }

    pub fn padding(&self) -> usize {
        match self {
            Lookahead::Lexed(t) => t.padding,
            Lookahead::Reused(leaf) => leaf.padding(),
        }
    }

    pub fn size(&self) -> usize {
        match self {
            Lookahead::Lexed(t) => t.size,
            Lookahead::Reused(leaf) => leaf.size(),
        }
    }

    pub fn total(&self) -> usize {
        self.padding() + self.size()
    }

    /// Bytes examined past the end of the token.
    pub fn lookahead(&self) -> usize {
        match self {
            Lookahead::Lexed(t) => t.lookahead,
            Lookahead::Reused(leaf) => leaf.lookahead(),
        }
    }

    /// The mode the token was lexed in.
    pub fn mode(&self) -> Option<LexMode> {
        match self {
            Lookahead::Lexed(t) => t.mode,
            Lookahead::Reused(leaf) => leaf.lex_mode(),
        }
    }

    pub fn is_extra(&self) -> bool {
        match self {
            Lookahead::Lexed(t) => t.extra,
            Lookahead::Reused(leaf) => leaf.is_extra(),
        }
    }

    pub fn to_leaf(&self, lang: &Language, parse_state: StateId) -> Subtree {
        match self {
            Lookahead::Lexed(t) => lexeme_leaf(lang, t, parse_state),
            Lookahead::Reused(leaf) => leaf.clone(),
        }
    }
}

pub(crate) fn lexeme_leaf(lang: &Language, t: &Lexeme, parse_state: StateId) -> Subtree {
    Subtree::leaf(
        lang,
        LeafSpec {
            symbol: t.symbol,
            padding: t.padding,
            size: t.size,
            lookahead: t.lookahead,
            parse_state,
            lex_mode: t.mode,
            extra: t.extra,
            lex_error: t.lex_error,
        },
    )
}

/// True when the token after `node` lexes the same in `goto`'s mode as it
/// did when `node` was reduced. Otherwise a fresh parse could see another
/// token there, such as a keyword instead of the word token.
fn follows_alike(
    lang: &Language,
    lexer: &mut Lexer<'_>,
    input: &[u8],
    end: usize,
    node: &Subtree,
    goto: StateId,
) -> bool {
    let Some(before) = node.follow_mode() else {
        return false;
    };
    let after = lang.lex_mode(goto);
    if before == after {
        return true;
    }
    let then = lexer.next_token(input, end, lang.mode_terminals(before), Some(before));
    let now = lexer.next_token(input, end, lang.mode_terminals(after), Some(after));
    !then.extra
        && !now.extra
        && then.symbol == now.symbol
        && then.padding == now.padding
        && then.size == now.size
        && then.lex_error == now.lex_error
}

/// State of one parse.
pub(crate) struct Run<'a> {
    pub lang: &'a Language,
    pub config: &'a ParserConfig,
    pub input: &'a [u8],
    pub lexer: Lexer<'a>,
    pub heads: Vec<Head>,
    /// Byte offset where the next lookahead starts, padding included.
    pub pos: usize,
    pub stats: ParserStats,
    pub budget: RecoveryBudget,
    cancellation: Option<&'a CancellationFlag>,
    reuse: Option<ReuseCursor<'a>>,
}

impl<'a> Run<'a> {
    fn new(
        lang: &'a Language,
        config: &'a ParserConfig,
        cancellation: Option<&'a CancellationFlag>,
        input: &'a [u8],
        reuse: Option<ReuseCursor<'a>>,
    ) -> Self {
        Self {
            lang,
            config,
            input,
            lexer: Lexer::new(lang),
            heads: vec![Head::new(lang.start_state())],
            pos: 0,
            stats: ParserStats {
                max_stacks: 1,
                ..ParserStats::default()
            },
            budget: RecoveryBudget::default(),
            cancellation,
            reuse,
        }
    }

    fn execute(&mut self) -> Result<Subtree, ParseError> {
        loop {
            if self.cancellation.is_some_and(CancellationFlag::is_cancelled) {
                log::debug!("cancelled at byte {}", self.pos);
                return Err(ParseError::Cancelled);
            }
            let la = self.next_lookahead();
            self.stats.tokens += 1;
            if log::log_enabled!(log::Level::Trace) {
                self.dump(&la);
            }
            if la.is_extra() {
                self.push_extra(&la);
                continue;
            }
            if let Some(root) = self.step(&la) {
                return Ok(root);
            }
        }
    }

    fn dump(&self, la: &Lookahead) {
        let name = self.lang.symbol_name(la.symbol());
        for head in &self.heads {
            log::trace!("{}  <-  {} @{}", head.describe(self.lang), name, self.pos);
        }
    }

    /// Lex mode shared by every head, if there is one.
    fn common_mode(&self) -> Option<LexMode> {
        let lang = self.lang;
        let first = lang.lex_mode(self.heads.first()?.state());
        self.heads
            .iter()
            .all(|h| lang.lex_mode(h.state()) == first)
            .then_some(first)
    }

    fn next_lookahead(&mut self) -> Lookahead {
        let lang = self.lang;
        let mode = self.common_mode();
        if let Some(leaf) = self.reusable_leaf(mode) {
            log::trace!("reusing token {} at byte {}", lang.symbol_name(leaf.kind_id()), self.pos);
            self.stats.reused_nodes += 1;
            return Lookahead::Reused(leaf);
        }
        let lexeme = match mode {
            Some(mode) => {
                self.lexer
                    .next_token(self.input, self.pos, lang.mode_terminals(mode), Some(mode))
            }
            None => {
                let mut valid = TerminalSet::new(lang.terminal_count());
                for head in &self.heads {
                    valid.union_with(lang.mode_terminals(lang.lex_mode(head.state())));
                }
                self.lexer.next_token(self.input, self.pos, &valid, None)
            }
        };
        Lookahead::Lexed(lexeme)
    }

    /// An old leaf that the lexer would reproduce at the current position.
    fn reusable_leaf(&mut self, mode: Option<LexMode>) -> Option<Subtree> {
        if self.heads.len() != 1 || self.budget.active_at(self.pos) {
            return None;
        }
        let mode = mode?;
        let node = self.reuse.as_mut()?.peek(self.pos)?;
        let leaf = node.first_leaf()?;
        let fits = leaf.lex_mode() == Some(mode)
            && !leaf.has_error()
            && leaf.total() > 0
            && leaf.data().alias.is_none();
        fits.then(|| leaf.clone())
    }

    /// An old internal node that can stand in for shifting `la` on `head`,
    /// with the state it is pushed at.
    fn reusable_node(&mut self, head: &Head, la: &Lookahead) -> Option<(Subtree, StateId)> {
        if self.budget.active_at(self.pos) {
            return None;
        }
        let lang = self.lang;
        let state = head.state();
        let pos = self.pos;
        let cursor = self.reuse.as_mut()?;
        loop {
            let node = cursor.peek(pos)?;
            if node.is_leaf() {
                return None;
            }
            let fits = !node.has_error()
                && !node.is_fragile()
                && !node.is_extra()
                && node.data().alias.is_none()
                && node.total() > 0
                && node.parse_state() == state
                && node.first_leaf().is_some_and(|leaf| {
                    leaf.symbol() == la.symbol()
                        && leaf.padding() == la.padding()
                        && leaf.size() == la.size()
                });
            if fits {
                if let Some(goto) = lang.goto(state, node.symbol()) {
                    let end = pos + node.total();
                    if follows_alike(lang, &mut self.lexer, self.input, end, node, goto) {
                        return Some((node.clone(), goto));
                    }
                }
            }
            cursor.descend();
        }
    }

    /// Visible extras ride on every head without a state change.
    fn push_extra(&mut self, la: &Lookahead) {
        let state = self.heads.first().map_or(self.lang.start_state(), Head::state);
        let leaf = la.to_leaf(self.lang, state);
        self.pos += leaf.total();
        self.stats.shifts += 1;
        self.heads = self
            .heads
            .iter()
            .map(|h| h.push(h.state(), leaf.clone()))
            .collect();
    }

    /// Runs every head against `la`. Returns the root once the input is
    /// accepted.
    fn step(&mut self, la: &Lookahead) -> Option<Subtree> {
        let lang = self.lang;
        let symbol = la.symbol();
        let heads = std::mem::take(&mut self.heads);
        let multi = heads.len() > 1;
        let mut queue: Vec<(Head, bool)> = heads.into_iter().rev().map(|h| (h, false)).collect();
        let mut shifts: Vec<(Head, StateId)> = Vec::new();
        let mut accepted = Vec::new();
        let mut failed = Vec::new();
        let mut reductions = 0;

        while let Some((head, forked)) = queue.pop() {
            let actions = lang.actions(head.state(), symbol);
            if actions.is_empty() {
                failed.push(head);
                continue;
            }
            let forking = forked || actions.len() > 1;
            self.stats.forks += actions.len() - 1;
            for action in actions {
                match *action {
                    ParseAction::Shift(state) => shifts.push((head.clone(), state)),
                    ParseAction::Accept if symbol == Symbol::END => accepted.push(head.clone()),
                    ParseAction::Accept => failed.push(head.clone()),
                    ParseAction::Reduce(production) => {
                        reductions += 1;
                        if reductions > MAX_REDUCTIONS_PER_TOKEN {
                            log::warn!("reduction limit reached at byte {}", self.pos);
                            failed.push(head.clone());
                            continue;
                        }
                        match self.reduce(&head, production, la, multi || forking) {
                            Some(next) => queue.push((next, forking)),
                            None => failed.push(head.clone()),
                        }
                    }
                }
            }
        }

        if let Some(best) = accepted.into_iter().min_by(|a, b| compare_heads(lang, a, b)) {
            log::trace!("accept");
            return Some(self.accept(&best));
        }
        if shifts.is_empty() {
            return self.recover(failed, la);
        }
        self.shift(shifts, la);
        None
    }

    fn reduce(
        &mut self,
        head: &Head,
        production: ProductionId,
        la: &Lookahead,
        fragile: bool,
    ) -> Option<Head> {
        let lang = self.lang;
        let prod = lang.production(production);
        let popped = head.pop(prod.rhs_len as usize);
        let base_state = popped.base.state();
        let Some(state) = lang.goto(base_state, prod.lhs) else {
            log::debug!("no goto from state {} on {}", base_state.0, lang.symbol_name(prod.lhs));
            return None;
        };
        let trailing: usize = popped.trailing.iter().map(Subtree::total).sum();
        let node = Subtree::reduce(
            lang,
            production,
            popped.nodes,
            base_state,
            fragile,
            trailing + la.total() + la.lookahead(),
            la.mode(),
        );
        log::trace!("reduce {} -> <{}>", lang.symbol_name(prod.lhs), state.0);
        self.stats.reductions += 1;
        let mut next = popped.base.push(state, node);
        for extra in popped.trailing {
            next = next.push(state, extra);
        }
        Some(next)
    }

    fn shift(&mut self, shifts: Vec<(Head, StateId)>, la: &Lookahead) {
        self.stats.shifts += 1;
        if let [(head, _)] = shifts.as_slice() {
            if let Some((node, state)) = self.reusable_node(head, la) {
                log::debug!(
                    "reusing {} at byte {} ({} bytes)",
                    self.lang.symbol_name(node.kind_id()),
                    self.pos,
                    node.total()
                );
                self.pos += node.total();
                self.stats.reused_nodes += 1;
                self.heads = vec![head.push(state, node)];
                return;
            }
        }
        let state = shifts.first().map_or(self.lang.start_state(), |(h, _)| h.state());
        let leaf = la.to_leaf(self.lang, state);
        self.pos += leaf.total();
        let heads = shifts
            .into_iter()
            .map(|(head, state)| head.push(state, leaf.clone()))
            .collect();
        self.set_heads(heads);
    }

    pub(crate) fn set_heads(&mut self, heads: Vec<Head>) {
        let (heads, merges) = condense(self.lang, heads, self.config.max_stacks);
        self.stats.merges += merges;
        self.stats.max_stacks = self.stats.max_stacks.max(heads.len());
        self.heads = heads;
    }

    /// The root of an accepted stack: the start symbol's node is opened up so
    /// that extras around it become siblings of its children.
    fn accept(&self, head: &Head) -> Subtree {
        let lang = self.lang;
        let start = lang.start_symbol();
        let mut children = Vec::new();
        let mut fields = Vec::new();
        let mut opened = false;
        for node in head.nodes() {
            if !opened && node.symbol() == start && node.is_counted() {
                opened = true;
                for (i, child) in node.children().iter().enumerate() {
                    children.push(child.clone());
                    fields.push(node.field(i));
                }
            } else {
                children.push(node);
                fields.push(None);
            }
        }
        Subtree::root(lang, start, children, fields, self.input.len())
    }
}
