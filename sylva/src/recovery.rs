//! # Error Recovery
//!
//! Entered when no head has an action for the lookahead. Recovery works on
//! the best failed head and always leaves the parse able to continue:
//!
//! 1. synchronize: pop entries and skip tokens, cheapest combination first,
//!    until the remaining state can act on a token;
//! 2. force-reduce: close a nonterminal over the top of the stack so that its
//!    goto state can act on the lookahead;
//! 3. skip the lookahead;
//! 4. at end of input, wrap everything into an `ERROR` root.
//!
//! Every recovery at the same position is counted, and once the budget is
//! spent the lookahead is skipped outright.

use crate::language::Symbol;
use crate::lexer::{Lexeme, char_len};
use crate::parser::{Lookahead, Run, lexeme_leaf};
use crate::stack::{Head, compare_heads};
use crate::tree::{LeafSpec, Subtree};

/// Recoveries made at one position.
#[derive(Debug, Default)]
pub(crate) struct RecoveryBudget {
    position: usize,
    attempts: usize,
}

impl RecoveryBudget {
    /// Records an attempt at `pos` and returns the attempt number there.
    fn charge(&mut self, pos: usize) -> usize {
        if self.attempts == 0 || self.position != pos {
            self.position = pos;
            self.attempts = 0;
        }
        self.attempts += 1;
        self.attempts
    }

    /// True when a recovery already happened at `pos`.
    pub fn active_at(&self, pos: usize) -> bool {
        self.attempts > 0 && self.position == pos
    }
}

impl Run<'_> {
    /// Returns the root when the input ended and the stack had to be wrapped.
    pub(crate) fn recover(&mut self, failed: Vec<Head>, la: &Lookahead) -> Option<Subtree> {
        let lang = self.lang;
        self.stats.recoveries += 1;
        let head = failed
            .into_iter()
            .min_by(|a, b| compare_heads(lang, a, b))
            .unwrap_or_else(|| Head::new(lang.start_state()));
        let attempt = self.budget.charge(self.pos);
        log::debug!(
            "recovering at byte {} on {} (attempt {})",
            self.pos,
            lang.symbol_name(la.symbol()),
            attempt
        );
        if log::log_enabled!(log::Level::Trace) {
            log::trace!("{}", head.describe(lang));
        }

        if attempt <= self.config.max_recovery_attempts
            && (self.synchronize(&head, la) || self.force_reduce(&head, la))
        {
            return None;
        }
        if la.symbol() == Symbol::END || (la.total() == 0 && self.pos >= self.input.len()) {
            return Some(self.wrap(&head));
        }
        self.skip(&head, la);
        None
    }

    /// Finds the cheapest `(skipped tokens, popped entries)` pair after which
    /// the stack can act on the next unskipped token.
    fn synchronize(&mut self, head: &Head, la: &Lookahead) -> bool {
        let lang = self.lang;
        let mut ahead: Vec<Lexeme> = Vec::new();
        if la.symbol() != Symbol::END {
            let mut pos = self.pos + la.total();
            while ahead.len() < self.config.recovery_lookahead {
                let t = self
                    .lexer
                    .next_token(self.input, pos, lang.all_terminals(), None);
                pos += t.total();
                let end = t.symbol == Symbol::END;
                ahead.push(t);
                if end {
                    break;
                }
            }
        }

        let states: Vec<_> = head.states().collect();
        let mut best: Option<(usize, usize)> = None;
        for skipped in 0..=ahead.len() {
            let (symbol, extra) = match skipped {
                0 => (la.symbol(), la.is_extra()),
                s => (ahead[s - 1].symbol, ahead[s - 1].extra),
            };
            if extra {
                continue;
            }
            let first = usize::from(skipped == 0);
            let popped = (first..states.len()).find(|&d| !lang.actions(states[d], symbol).is_empty());
            if let Some(popped) = popped {
                let better = best.is_none_or(|(s, d)| {
                    (skipped + popped, popped) < (s + d, d)
                });
                if better {
                    best = Some((skipped, popped));
                }
            }
        }
        let Some((skipped, popped)) = best else {
            return false;
        };

        let (base, mut raw) = head.pop_entries(popped);
        let mut resume = self.pos;
        if skipped > 0 {
            resume += la.total();
            raw.push(la.to_leaf(lang, base.state()));
            for t in &ahead[..skipped - 1] {
                resume += t.total();
                raw.push(lexeme_leaf(lang, t, base.state()));
            }
        }
        log::debug!(
            "synchronized: popped {popped}, skipped {skipped}, resuming at byte {resume}"
        );
        self.heads = vec![push_error(&base, raw)];
        self.pos = resume;
        true
    }

    /// Closes the innermost nonterminal whose goto state accepts the lookahead.
    fn force_reduce(&mut self, head: &Head, la: &Lookahead) -> bool {
        let lang = self.lang;
        let symbol = la.symbol();
        let states: Vec<_> = head.states().collect();
        for (depth, &state) in states.iter().enumerate().skip(1) {
            let Some((lhs, goto)) = lang
                .gotos(state)
                .find(|&(_, goto)| !lang.actions(goto, symbol).is_empty())
            else {
                continue;
            };
            let (base, nodes) = head.pop_entries(depth);
            if !nodes.iter().any(Subtree::is_counted) {
                continue;
            }
            let mut nodes = nodes.into_iter();
            let Some(first) = nodes.next() else {
                continue;
            };
            let rest: Vec<_> = nodes.collect();
            let tail = if rest.is_empty() {
                Subtree::missing(goto)
            } else {
                Subtree::error(rest, state)
            };
            let node = Subtree::forced(lang, lhs, vec![first, tail], state);
            log::debug!(
                "forced {} over {} entries -> <{}>",
                lang.symbol_name(lhs),
                depth,
                goto.0
            );
            self.heads = vec![base.push(goto, node)];
            return true;
        }
        false
    }

    fn skip(&mut self, head: &Head, la: &Lookahead) {
        let lang = self.lang;
        let state = head.state();
        let leaf = if la.total() > 0 {
            la.to_leaf(lang, state)
        } else {
            // A zero-width token would be produced again; consume one character.
            let size = char_len(&self.input[self.pos..]).max(1);
            Subtree::leaf(
                lang,
                LeafSpec {
                    symbol: Symbol::ERROR,
                    padding: 0,
                    size,
                    lookahead: 0,
                    parse_state: state,
                    lex_mode: None,
                    extra: false,
                    lex_error: true,
                },
            )
        };
        log::debug!("skipping {} at byte {}", lang.symbol_name(leaf.symbol()), self.pos);
        self.pos += leaf.total();
        self.heads = vec![push_error(head, vec![leaf])];
    }

    /// The whole stack as the children of an `ERROR` root.
    fn wrap(&self, head: &Head) -> Subtree {
        log::debug!("wrapping {} stack entries at end of input", head.depth());
        let mut children = Vec::new();
        for node in head.nodes() {
            if node.is_error() && !node.is_leaf() {
                children.extend(node.children().iter().cloned());
            } else {
                children.push(node);
            }
        }
        let fields = vec![None; children.len()];
        Subtree::root(self.lang, Symbol::ERROR, children, fields, self.input.len())
    }
}

/// Pushes `raw` as an `ERROR` node without changing state, folding it into an
/// `ERROR` node already on top.
fn push_error(head: &Head, mut raw: Vec<Subtree>) -> Head {
    if let Some(top) = head.top_node().filter(|n| n.is_error() && !n.is_leaf()) {
        let (below, _) = head.pop_entries(1);
        let mut children = top.children().to_vec();
        children.append(&mut raw);
        return below.push(below.state(), Subtree::error(children, below.state()));
    }
    head.push(head.state(), Subtree::error(raw, head.state()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_language::parens;
    use crate::{Language, Parser, ParserConfig};

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn budget_counts_per_position() {
        let mut budget = RecoveryBudget::default();
        assert!(!budget.active_at(0));
        assert_eq!(budget.charge(3), 1);
        assert_eq!(budget.charge(3), 2);
        assert!(budget.active_at(3));
        assert!(!budget.active_at(4));
        assert_eq!(budget.charge(4), 1);
    }

    #[test]
    fn leading_garbage_becomes_error_root() {
        init_logger();
        let lang = Language::from_def(parens()).unwrap();
        let tree = crate::parse(&lang, b"12)").unwrap();
        let root = tree.root_node();
        assert!(root.is_error());
        assert_eq!(root.byte_range(), 0..3);
        assert_eq!(root.to_sexp(), "(ERROR (dec))");
        assert_eq!(root.child_count(), 2);
    }

    #[test]
    fn stray_numbers_prefer_fewer_pops() {
        init_logger();
        let lang = Language::from_def(parens()).unwrap();
        let tree = crate::parse(&lang, b"(1 2 3)").unwrap();
        let root = tree.root_node();
        // `2` pops `1`; on `3`, skipping it ties with popping `2` and wins.
        assert_eq!(
            root.to_sexp(),
            "(source (ERROR (dec)) inner: (expr (dec) (ERROR (dec))))"
        );
        let error = root.named_child(0).unwrap();
        assert_eq!(error.byte_range(), 1..2);
    }

    #[test]
    fn repeated_skips_share_one_error() {
        init_logger();
        let lang = Language::from_def(parens()).unwrap();
        let config = ParserConfig::default().with_recovery_lookahead(1);
        let mut parser = Parser::with_config(lang, config);
        let tree = parser.parse(b"(1 @ @)").unwrap();
        let root = tree.root_node();
        assert_eq!(root.byte_range(), 0..7);
        let expr = root.child_by_field_name("inner").unwrap();
        assert_eq!(expr.child_count(), 2);
        let error = expr.child(1).unwrap();
        assert!(error.is_error());
        assert_eq!(error.child_count(), 2);
        assert_eq!(error.byte_range(), 3..6);
        assert_eq!(parser.stats().recoveries, 2);
    }

    #[test]
    fn spent_budget_wraps_at_end() {
        init_logger();
        let lang = Language::from_def(parens()).unwrap();
        let config = ParserConfig::default().with_max_recovery_attempts(0);
        let mut parser = Parser::with_config(lang, config);
        let tree = parser.parse(b"(1").unwrap();
        assert_eq!(tree.root_node().to_sexp(), "(ERROR (dec))");
        assert_eq!(tree.root_node().byte_range(), 0..2);

        let tree = parser.parse(b"(1 2)").unwrap();
        assert_eq!(
            tree.root_node().to_sexp(),
            "(source inner: (expr (dec) (ERROR (dec))))"
        );
    }

    #[test]
    fn missing_marker_when_nothing_to_wrap() {
        init_logger();
        let lang = Language::from_def(parens()).unwrap();
        let tree = crate::parse(&lang, b"((").unwrap();
        let root = tree.root_node();
        assert_eq!(root.byte_range(), 0..2);
        assert!(root.has_error());
        assert!(root.children().any(|c| c.is_missing()));
    }
}
