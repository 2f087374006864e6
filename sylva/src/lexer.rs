//! # Lexer
//!
//! Tokens are produced on demand, one per parser step, against the set of
//! terminals the active parse states can accept. All lexical rules of a
//! language share one anchored DFA built with [`MatchKind::All`], so a
//! single walk reports every rule that matches at every length; the set of
//! valid terminals only decides which of those matches is taken.
//!
//! Selection order for a position:
//!
//! 1. the external scanner, when a valid terminal is external;
//! 2. the longest valid match, then the higher priority, then the lower
//!    symbol id;
//! 3. a keyword loses to the word token when the word matches more bytes;
//! 4. with no valid match, the best invalid match;
//! 5. with no match at all, a one-character `ERROR` token.
//!
//! Hidden extras (whitespace) are folded into the next token's padding.

use crate::cursor::ScanCursor;
use crate::language::{Language, LexMode, LexRule, Symbol, TerminalSet};
use crate::LoadError;
use regex_automata::{
    Anchored, Input, MatchKind,
    dfa::{Automaton, StartKind, dense},
    nfa::thompson::{Config as ThomConfig, NFA},
    util::{primitives::StateID, syntax},
};
use std::cmp::Reverse;

/// Recognizer for externally scanned terminals.
///
/// The scanner is consulted before the built-in rules whenever at least one
/// external terminal is valid. It returns the terminal it recognized, or
/// `None` to defer to the built-in rules. Every byte the scanner looks at is
/// recorded so edits near the token invalidate it.
pub trait ExternalScanner: Send + Sync {
    fn scan(&self, cursor: &mut ScanCursor<'_>, valid: &TerminalSet) -> Option<Symbol>;
}

/// One token as seen by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lexeme {
    pub symbol: Symbol,
    /// Skipped hidden extras before the token.
    pub padding: usize,
    pub size: usize,
    /// Bytes past the token end that influenced the lexing decision.
    pub lookahead: usize,
    /// A visible extra, such as a comment.
    pub extra: bool,
    /// No rule matched; the token covers one character.
    pub lex_error: bool,
    /// The mode the token was lexed in; `None` while recovering.
    pub mode: Option<LexMode>,
}

impl Lexeme {
    pub fn total(&self) -> usize {
        self.padding + self.size
    }
}

#[derive(Debug, Clone, Default)]
pub struct LexerStats {
    pub tokens: usize,
    pub walks: usize,
    pub bytes: usize,
    pub external_calls: usize,
    pub lex_errors: usize,
}

#[derive(Debug, Clone, Copy)]
struct Rule {
    symbol: Symbol,
    priority: i32,
    keyword: bool,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    rule: usize,
    end: usize,
    /// DFA state after consuming the candidate's bytes.
    state: StateID,
}

/// Outcome of one DFA walk.
#[derive(Debug, Clone, Copy)]
struct Walk {
    token: Option<(Symbol, usize)>,
    /// End of the bytes the decision depended on.
    examined: usize,
    bytes: usize,
}

/// Compiled lexical rules of a language.
pub(crate) struct LexicalAutomaton {
    dfa: Option<(dense::DFA<Vec<u32>>, StateID)>,
    rules: Vec<Rule>,
}

impl LexicalAutomaton {
    pub(crate) fn build(rules: &[(Symbol, &LexRule)]) -> Result<Self, LoadError> {
        if rules.is_empty() {
            return Ok(Self {
                dfa: None,
                rules: Vec::new(),
            });
        }
        let conf = syntax::Config::new().utf8(false);
        let mut hirs = Vec::with_capacity(rules.len());
        for (symbol, rule) in rules {
            let hir = syntax::parse_with(&rule.pattern, &conf).map_err(|e| {
                LoadError::malformed(format!(
                    "pattern {:?} of symbol {} does not compile: {e}",
                    rule.pattern, symbol.0
                ))
            })?;
            if hir.properties().minimum_len() == Some(0) {
                return Err(LoadError::malformed(format!(
                    "pattern {:?} of symbol {} matches the empty string",
                    rule.pattern, symbol.0
                )));
            }
            hirs.push(hir);
        }

        let nfa = NFA::compiler()
            .configure(ThomConfig::new().utf8(false))
            .build_many_from_hir(&hirs)
            .map_err(|e| LoadError::malformed(format!("lexical rules do not compile: {e}")))?;
        let dfa = dense::Builder::new()
            .configure(
                dense::DFA::config()
                    .match_kind(MatchKind::All)
                    .start_kind(StartKind::Anchored),
            )
            .build_from_nfa(&nfa)
            .map_err(|e| LoadError::malformed(format!("lexical automaton too large: {e}")))?;
        let start = dfa
            .start_state_forward(&Input::new(&[] as &[u8]).anchored(Anchored::Yes))
            .map_err(|e| LoadError::malformed(format!("lexical automaton has no start: {e}")))?;
        log::debug!(
            "lexical automaton: {} rules, {} bytes",
            rules.len(),
            dfa.memory_usage()
        );

        Ok(Self {
            dfa: Some((dfa, start)),
            rules: rules
                .iter()
                .map(|(symbol, rule)| Rule {
                    symbol: *symbol,
                    priority: rule.priority,
                    keyword: rule.keyword,
                })
                .collect(),
        })
    }

    /// Walks the DFA from `start` and picks the best match.
    fn walk(&self, input: &[u8], start: usize, valid: &TerminalSet, word: Option<Symbol>) -> Walk {
        let Some((dfa, start_state)) = &self.dfa else {
            return Walk {
                token: None,
                examined: start,
                bytes: 0,
            };
        };

        let rank = |c: &Candidate| {
            let rule = &self.rules[c.rule];
            (c.end, rule.priority, Reverse(rule.symbol))
        };
        let mut best_valid: Option<Candidate> = None;
        let mut best_invalid: Option<Candidate> = None;
        let mut word_end: Option<usize> = None;

        let mut state = *start_state;
        let mut i = start;
        let examined;
        loop {
            let at_eoi = i >= input.len();
            let next = if at_eoi {
                dfa.next_eoi_state(state)
            } else {
                dfa.next_state(state, input[i])
            };
            if dfa.is_match_state(next) {
                for k in 0..dfa.match_len(next) {
                    let rule = dfa.match_pattern(next, k).as_usize();
                    let c = Candidate {
                        rule,
                        end: i,
                        state,
                    };
                    let symbol = self.rules[rule].symbol;
                    if Some(symbol) == word {
                        word_end = Some(i);
                    }
                    let slot = if valid.contains(symbol) {
                        &mut best_valid
                    } else {
                        &mut best_invalid
                    };
                    if slot.as_ref().is_none_or(|b| rank(&c) > rank(b)) {
                        *slot = Some(c);
                    }
                }
            }
            // A sink reports its match on any byte, so the byte read after
            // it does not take part in the decision.
            if at_eoi {
                examined = if self.is_sink(state) { i } else { i + 1 };
                break;
            }
            if dfa.is_dead_state(next) {
                log::trace!("DEAD: i={}, b={:?}", i - start, input[i] as char);
                examined = if self.is_sink(state) { i } else { i + 1 };
                break;
            }
            state = next;
            i += 1;
        }

        let chosen = best_valid.or(best_invalid);
        let examined = match chosen {
            Some(c) if !self.can_extend(c.state) => c.end,
            _ => examined,
        };
        let mut token = chosen.map(|c| (self.rules[c.rule].symbol, c.end));
        if let (Some(c), Some(w), Some(wend)) = (chosen, word, word_end) {
            if self.rules[c.rule].keyword && wend > c.end {
                token = Some((w, wend));
            }
        }
        Walk {
            token,
            examined,
            bytes: i.min(input.len()) - start,
        }
    }

    /// A state whose every byte transition is dead.
    fn is_sink(&self, state: StateID) -> bool {
        let Some((dfa, _)) = &self.dfa else {
            return true;
        };
        (0..=255u8).all(|b| dfa.is_dead_state(dfa.next_state(state, b)))
    }

    /// True when some continuation of the bytes that led to `state` keeps
    /// the automaton alive past an immediate match report.
    fn can_extend(&self, state: StateID) -> bool {
        let Some((dfa, _)) = &self.dfa else {
            return false;
        };
        let mut seen: Vec<StateID> = Vec::new();
        for b in 0..=255u8 {
            let next = dfa.next_state(state, b);
            if dfa.is_dead_state(next) || seen.contains(&next) {
                continue;
            }
            seen.push(next);
            if !self.is_sink(next) {
                return true;
            }
        }
        false
    }
}

/// Produces [`Lexeme`]s for one language.
pub struct Lexer<'a> {
    language: &'a Language,
    stats: LexerStats,
}

impl<'a> Lexer<'a> {
    pub fn new(language: &'a Language) -> Self {
        Self {
            language,
            stats: LexerStats::default(),
        }
    }

    pub fn stats(&self) -> LexerStats {
        self.stats.clone()
    }

    /// Lexes the token starting at or after `pos`, skipping hidden extras.
    pub fn next_token(
        &mut self,
        input: &[u8],
        pos: usize,
        valid: &TerminalSet,
        mode: Option<LexMode>,
    ) -> Lexeme {
        let lang = self.language;
        let mut cur = pos;
        let mut examined = pos;
        self.stats.tokens += 1;

        let lexeme = |symbol: Symbol, start: usize, end: usize, examined: usize, lex_error: bool| Lexeme {
            symbol,
            padding: start - pos,
            size: end - start,
            lookahead: examined.saturating_sub(end),
            extra: !lex_error && lang.is_extra(symbol),
            lex_error,
            mode,
        };

        loop {
            if let Some((symbol, end, seen)) = self.scan_external(input, cur, valid) {
                examined = examined.max(seen);
                match end {
                    Some(end) if lang.is_extra(symbol) && !lang.is_visible(symbol) => {
                        cur = end;
                        continue;
                    }
                    Some(end) => {
                        self.trace_token(input, symbol, cur, end);
                        return lexeme(symbol, cur, end, examined, false);
                    }
                    None => {}
                }
            }

            if cur >= input.len() {
                return lexeme(Symbol::END, cur, cur, examined.max(cur + 1), false);
            }

            self.stats.walks += 1;
            let walk = lang
                .lexer_automaton()
                .walk(input, cur, valid, lang.word_token());
            self.stats.bytes += walk.bytes;
            examined = examined.max(walk.examined);

            match walk.token {
                Some((symbol, end))
                    if lang.is_extra(symbol) && !lang.is_visible(symbol) && valid.contains(symbol) =>
                {
                    cur = end;
                }
                Some((symbol, end)) => {
                    self.trace_token(input, symbol, cur, end);
                    return lexeme(symbol, cur, end, examined, false);
                }
                None => {
                    self.stats.lex_errors += 1;
                    let end = cur + char_len(&input[cur..]);
                    log::trace!(
                        "LEX ERROR: at={}, bytes={}",
                        cur,
                        hex::encode(&input[cur..end])
                    );
                    return lexeme(Symbol::ERROR, cur, end, examined.max(end), true);
                }
            }
        }
    }

    /// Runs the external scanner. Returns the scanner's symbol together with
    /// the token end (if it produced a usable token) and the examined extent.
    fn scan_external(
        &mut self,
        input: &[u8],
        pos: usize,
        valid: &TerminalSet,
    ) -> Option<(Symbol, Option<usize>, usize)> {
        let scanner = self.language.external_scanner()?;
        let externals = self.language.external_terminals();
        if !externals.iter().any(|s| valid.contains(s)) {
            return None;
        }
        self.stats.external_calls += 1;
        let mut cursor = ScanCursor::new(input, pos);
        let result = scanner.scan(&mut cursor, valid);
        let seen = cursor.examined_end();
        let end = cursor.token_end();
        match result {
            Some(symbol) if externals.contains(symbol) && valid.contains(symbol) && end > pos => {
                Some((symbol, Some(end), seen))
            }
            Some(symbol) => {
                log::debug!(
                    "external scanner result {} at {} rejected",
                    self.language.symbol_name(symbol),
                    pos
                );
                Some((symbol, None, seen))
            }
            None => Some((Symbol::ERROR, None, seen)),
        }
    }

    fn trace_token(&self, input: &[u8], symbol: Symbol, start: usize, end: usize) {
        if log::log_enabled!(log::Level::Trace) {
            let bytes = &input[start..end];
            log::trace!(
                "MATCHED: symbol={} ({}), range={}..{}, text={:?}",
                self.language.symbol_name(symbol),
                symbol.0,
                start,
                end,
                match std::str::from_utf8(bytes) {
                    Ok(s) => s.to_owned(),
                    Err(_) => hex::encode(bytes),
                },
            );
        }
    }
}

/// Length of the UTF-8 character at the start of `bytes`; 1 for invalid input.
pub(crate) fn char_len(bytes: &[u8]) -> usize {
    let n = match bytes.first() {
        Some(b) if *b >= 0xF0 => 4,
        Some(b) if *b >= 0xE0 => 3,
        Some(b) if *b >= 0xC0 => 2,
        _ => 1,
    };
    if bytes.len() >= n && std::str::from_utf8(&bytes[..n]).is_ok() {
        n
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::{LanguageDef, SymbolKind};
    use crate::test_language::{keywords, parens};
    use std::sync::Arc;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn load(def: LanguageDef) -> Language {
        Language::from_def(def).unwrap()
    }

    fn sym(lang: &Language, name: &str) -> Symbol {
        lang.symbol_for_name(name, true)
            .or_else(|| lang.symbol_for_name(name, false))
            .unwrap()
    }

    #[test]
    fn skips_whitespace_into_padding() {
        init_logger();
        let lang = load(parens());
        let mut lexer = Lexer::new(&lang);
        let valid = lang.mode_terminals(lang.lex_mode(crate::StateId(2))).clone();
        let t = lexer.next_token(b"(  42 )", 1, &valid, None);
        assert_eq!(t.symbol, sym(&lang, "dec"));
        assert_eq!((t.padding, t.size), (2, 2));
        // The space after the number was read to end the match.
        assert_eq!(t.lookahead, 1);
        assert!(!t.extra && !t.lex_error);
    }

    #[test]
    fn punctuation_has_no_lookahead() {
        init_logger();
        let lang = load(parens());
        let mut lexer = Lexer::new(&lang);
        let t = lexer.next_token(b"(12)", 0, lang.all_terminals(), None);
        assert_eq!(t.symbol, sym(&lang, "("));
        assert_eq!((t.padding, t.size, t.lookahead), (0, 1, 0));
    }

    #[test]
    fn end_of_input() {
        init_logger();
        let lang = load(parens());
        let mut lexer = Lexer::new(&lang);
        let t = lexer.next_token(b"(1) \n", 3, lang.all_terminals(), None);
        assert_eq!(t.symbol, Symbol::END);
        assert_eq!((t.padding, t.size, t.lookahead), (2, 0, 1));
    }

    #[test]
    fn digits_at_end_see_end_of_input() {
        let lang = load(parens());
        let mut lexer = Lexer::new(&lang);
        let t = lexer.next_token(b"12", 0, lang.all_terminals(), None);
        assert_eq!((t.size, t.lookahead), (2, 1));
    }

    #[test]
    fn invalid_match_when_nothing_valid() {
        let lang = load(parens());
        let mut lexer = Lexer::new(&lang);
        let mut valid = TerminalSet::new(lang.terminal_count());
        valid.insert(sym(&lang, "("));
        let t = lexer.next_token(b"7", 0, &valid, None);
        assert_eq!(t.symbol, sym(&lang, "dec"));
        assert!(!t.lex_error);
    }

    #[test]
    fn unknown_character_is_lex_error() {
        init_logger();
        let lang = load(parens());
        let mut lexer = Lexer::new(&lang);
        let t = lexer.next_token("é)".as_bytes(), 0, lang.all_terminals(), None);
        assert_eq!(t.symbol, Symbol::ERROR);
        assert!(t.lex_error);
        assert_eq!(t.size, 2);
        assert_eq!(lexer.stats().lex_errors, 1);
    }

    #[test]
    fn keyword_beats_word_of_equal_length() {
        let lang = load(keywords());
        let mut lexer = Lexer::new(&lang);
        let t = lexer.next_token(b"if x", 0, lang.all_terminals(), None);
        assert_eq!(t.symbol, sym(&lang, "if"));
        assert_eq!(t.size, 2);
    }

    #[test]
    fn longer_word_beats_keyword() {
        let lang = load(keywords());
        let mut lexer = Lexer::new(&lang);
        let mut valid = TerminalSet::new(lang.terminal_count());
        valid.insert(sym(&lang, "if"));
        let t = lexer.next_token(b"iffy", 0, &valid, None);
        assert_eq!(t.symbol, sym(&lang, "identifier"));
        assert_eq!(t.size, 4);
    }

    #[test]
    fn word_wins_when_keyword_invalid() {
        let lang = load(keywords());
        let mut lexer = Lexer::new(&lang);
        let mut valid = TerminalSet::new(lang.terminal_count());
        valid.insert(sym(&lang, "identifier"));
        let t = lexer.next_token(b"if", 0, &valid, None);
        assert_eq!(t.symbol, sym(&lang, "identifier"));
    }

    #[test]
    fn visible_extra_is_returned() {
        let lang = load(keywords());
        let mut lexer = Lexer::new(&lang);
        let t = lexer.next_token(b"  # note\nif", 0, lang.all_terminals(), None);
        assert_eq!(t.symbol, sym(&lang, "comment"));
        assert!(t.extra);
        assert_eq!((t.padding, t.size), (2, 6));
    }

    struct Heredoc(Symbol);

    impl ExternalScanner for Heredoc {
        fn scan(&self, cursor: &mut ScanCursor<'_>, valid: &TerminalSet) -> Option<Symbol> {
            if !valid.contains(self.0) {
                return None;
            }
            while cursor.lookahead() == Some(b'<') {
                cursor.advance();
            }
            cursor.mark_end();
            let _ = cursor.lookahead();
            (!cursor.consumed().is_empty()).then_some(self.0)
        }
    }

    #[test]
    fn external_scanner_runs_first() {
        init_logger();
        let mut def = parens();
        def.symbols.insert(
            5,
            crate::language::SymbolDef {
                name: "heredoc".into(),
                kind: SymbolKind::External,
                named: true,
                visible: true,
                extra: false,
                lex: None,
            },
        );
        // Shift symbol ids of the nonterminals past the new terminal.
        for p in &mut def.productions {
            p.lhs.0 += 1;
        }
        for st in &mut def.states {
            for (s, _) in &mut st.gotos {
                s.0 += 1;
            }
        }
        def.start_symbol.0 += 1;
        let heredoc = Symbol(5);
        let lang = load(def).with_external_scanner(Arc::new(Heredoc(heredoc)));
        let mut lexer = Lexer::new(&lang);

        let t = lexer.next_token(b" <<<x", 0, lang.all_terminals(), None);
        assert_eq!(t.symbol, heredoc);
        assert_eq!((t.padding, t.size, t.lookahead), (1, 3, 1));
        assert!(lexer.stats().external_calls >= 1);

        // Zero-length results fall through to the built-in rules.
        let t = lexer.next_token(b"12", 0, lang.all_terminals(), None);
        assert_eq!(t.symbol, sym(&lang, "dec"));
    }

    #[test]
    fn char_len_handles_invalid_utf8() {
        assert_eq!(char_len(b"a"), 1);
        assert_eq!(char_len("ж".as_bytes()), 2);
        assert_eq!(char_len(&[0xE2, 0x28]), 1);
        assert_eq!(char_len(&[0xFF]), 1);
    }
}
