// This module defines LR(0) item machinery, FIRST/FOLLOW computations,
// and SLR(1) parse table construction with GLR conflict cells.
//
// Productions are integer vectors with the left-hand side at index `0`.
// Production `0` is the augmented start `S' -> S`; grammar production `p`
// is stored at index `p + 1`. Symbols below `n_term` are terminals.

use crate::prepare::{Assoc, Prepared};
use anyhow::{Result, bail};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fmt::Write as _;
use sylva::{ParseAction, ProductionId, StateDef, StateId, Symbol};

/// An LR(0) item: a production and how much of its right-hand side has been
/// recognized. `dot` counts from `1` because index `0` holds the left-hand side.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Item {
    pub prod: usize,
    pub dot: usize,
}

/// A set of LR(0) items
pub type ItemSet = BTreeSet<Item>;

/// The canonical collection with its transitions, in discovery order. State
/// `0` is the closure of the augmented start item.
#[derive(Debug)]
pub struct Automaton {
    pub states: Vec<ItemSet>,
    pub transitions: Vec<BTreeMap<usize, usize>>,
}

fn productions_by_lhs(prods: &[Vec<usize>]) -> HashMap<usize, Vec<usize>> {
    let mut by_lhs: HashMap<usize, Vec<usize>> = HashMap::new();
    for (i, p) in prods.iter().enumerate() {
        by_lhs.entry(p[0]).or_default().push(i);
    }
    by_lhs
}

/// Computes the LR(0) closure of a set of items.
///
/// For each item whose dot stands before a nonterminal, the items for that
/// nonterminal's productions are added, until nothing new appears.
pub fn closure(
    items: &ItemSet,
    prods: &[Vec<usize>],
    by_lhs: &HashMap<usize, Vec<usize>>,
    n_term: usize,
) -> ItemSet {
    let mut c = items.clone();
    let mut work: Vec<Item> = items.iter().cloned().collect();
    while let Some(item) = work.pop() {
        let Some(&sym) = prods[item.prod].get(item.dot) else {
            continue;
        };
        if sym < n_term {
            continue;
        }
        for &j in by_lhs.get(&sym).into_iter().flatten() {
            let new_item = Item { prod: j, dot: 1 };
            if c.insert(new_item.clone()) {
                work.push(new_item);
            }
        }
    }
    c
}

/// Builds the canonical collection of LR(0) item sets over a worklist.
///
/// States are identified by their kernels. Successors of a state are found by
/// advancing every item over the symbol after its dot and closing the result.
pub fn construct_states(prods: &[Vec<usize>], n_term: usize) -> Automaton {
    let by_lhs = productions_by_lhs(prods);
    let start = ItemSet::from([Item { prod: 0, dot: 1 }]);
    let mut index = HashMap::from([(start.clone(), 0)]);
    let mut states = vec![closure(&start, prods, &by_lhs, n_term)];
    let mut transitions = vec![BTreeMap::new()];
    let mut queue = VecDeque::from([0]);

    while let Some(i) = queue.pop_front() {
        let mut kernels: BTreeMap<usize, ItemSet> = BTreeMap::new();
        for item in &states[i] {
            if let Some(&sym) = prods[item.prod].get(item.dot) {
                kernels.entry(sym).or_default().insert(Item {
                    prod: item.prod,
                    dot: item.dot + 1,
                });
            }
        }
        for (sym, kernel) in kernels {
            let j = match index.get(&kernel) {
                Some(&j) => j,
                None => {
                    let j = states.len();
                    states.push(closure(&kernel, prods, &by_lhs, n_term));
                    transitions.push(BTreeMap::new());
                    index.insert(kernel, j);
                    queue.push_back(j);
                    j
                }
            };
            transitions[i].insert(sym, j);
        }
    }
    Automaton {
        states,
        transitions,
    }
}

/// Computes FIRST sets and nullability for all `n_sym` symbols.
pub fn first_sets(
    prods: &[Vec<usize>],
    n_term: usize,
    n_sym: usize,
) -> (Vec<BTreeSet<usize>>, Vec<bool>) {
    let mut first: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n_sym];
    let mut nullable = vec![false; n_sym];
    for (t, set) in first.iter_mut().enumerate().take(n_term) {
        set.insert(t);
    }
    let mut changed = true;
    while changed {
        changed = false;
        for prod in prods {
            let lhs = prod[0];
            let mut all_nullable = true;
            for &sym in &prod[1..] {
                // Clone FIRST(sym) to avoid simultaneous borrow
                let first_sym = first[sym].clone();
                for f in first_sym {
                    changed |= first[lhs].insert(f);
                }
                if !nullable[sym] {
                    all_nullable = false;
                    break;
                }
            }
            if all_nullable && !nullable[lhs] {
                nullable[lhs] = true;
                changed = true;
            }
        }
    }
    (first, nullable)
}

/// Computes FOLLOW sets, indexed by symbol. The augmented start symbol is
/// followed by the end of input (`0`).
pub fn follow_sets(
    prods: &[Vec<usize>],
    n_term: usize,
    n_sym: usize,
    first: &[BTreeSet<usize>],
    nullable: &[bool],
) -> Vec<BTreeSet<usize>> {
    let mut follow: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n_sym];
    if let Some(start) = prods.first() {
        follow[start[0]].insert(Symbol::END.index());
    }
    let mut changed = true;
    while changed {
        changed = false;
        for prod in prods {
            let lhs = prod[0];
            let rhs = &prod[1..];
            for (i, &b) in rhs.iter().enumerate() {
                if b < n_term {
                    continue;
                }
                let mut beta_nullable = true;
                let mut first_beta = BTreeSet::new();
                for &sym in &rhs[i + 1..] {
                    first_beta.extend(first[sym].iter().copied());
                    if !nullable[sym] {
                        beta_nullable = false;
                        break;
                    }
                }
                for f in first_beta {
                    changed |= follow[b].insert(f);
                }
                if beta_nullable && b != lhs {
                    let follow_lhs = follow[lhs].clone();
                    for f in follow_lhs {
                        changed |= follow[b].insert(f);
                    }
                }
            }
        }
    }
    follow
}

/// The finished action and goto table.
#[derive(Debug)]
pub(crate) struct Table {
    pub states: Vec<StateDef>,
    /// Cells left with more than one action.
    pub conflicts: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Candidate {
    Shift(usize),
    Reduce(usize),
    Accept,
}

struct TableBuilder<'a> {
    grammar: &'a Prepared,
    prods: Vec<Vec<usize>>,
}

impl TableBuilder<'_> {
    fn name(&self, sym: usize) -> &str {
        if sym == self.grammar.symbols.len() {
            "start'"
        } else {
            self.grammar.symbol_name(sym)
        }
    }

    fn describe_item(&self, item: &Item) -> String {
        let p = &self.prods[item.prod];
        let mut out = format!("{} ->", self.name(p[0]));
        for (j, &sym) in p.iter().enumerate().skip(1) {
            if j == item.dot {
                out.push_str(" .");
            }
            let _ = write!(out, " {}", self.name(sym));
        }
        if item.dot == p.len() {
            out.push_str(" .");
        }
        out
    }

    fn describe(&self, c: Candidate) -> String {
        match c {
            Candidate::Shift(s) => format!("shift {s}"),
            Candidate::Accept => "accept".to_string(),
            Candidate::Reduce(p) => {
                self.describe_item(&Item {
                    prod: p + 1,
                    dot: self.prods[p + 1].len(),
                })
            }
        }
    }

    /// Precedence a shift on `t` carries in a state: the highest precedence
    /// among productions whose dot stands before `t`.
    fn shift_precedence(&self, items: &ItemSet, t: usize) -> i32 {
        items
            .iter()
            .filter(|item| item.prod > 0 && self.prods[item.prod].get(item.dot) == Some(&t))
            .map(|item| self.grammar.productions[item.prod - 1].precedence)
            .max()
            .unwrap_or(0)
    }

    /// Applies precedence and associativity. What survives is ordered by
    /// precedence (descending), then production id.
    fn resolve(&self, shift_prec: i32, mut cell: Vec<Candidate>) -> Vec<Candidate> {
        let productions = &self.grammar.productions;
        let reduce_prec = |c: &Candidate| match *c {
            Candidate::Reduce(p) => Some(productions[p].precedence),
            _ => None,
        };
        if cell.len() > 1 {
            if let Some(top) = cell.iter().filter_map(reduce_prec).max() {
                cell.retain(|c| reduce_prec(c).is_none_or(|p| p == top));
            }
        }

        let has_shift = cell.iter().any(|c| matches!(c, Candidate::Shift(_)));
        if has_shift && cell.len() > 1 {
            let mut keep_shift = true;
            cell.retain(|c| {
                let Candidate::Reduce(p) = *c else {
                    return true;
                };
                let prod = &productions[p];
                if prod.precedence > shift_prec {
                    keep_shift = false;
                    true
                } else if prod.precedence < shift_prec {
                    false
                } else {
                    match prod.assoc {
                        Assoc::Left => {
                            keep_shift = false;
                            true
                        }
                        Assoc::Right => false,
                        Assoc::None => true,
                    }
                }
            });
            if !keep_shift {
                cell.retain(|c| !matches!(c, Candidate::Shift(_)));
            }
        }

        cell.sort_by_key(|c| match *c {
            Candidate::Accept => (Reverse(i32::MAX), 0),
            Candidate::Shift(_) => (Reverse(shift_prec), 0),
            Candidate::Reduce(p) => (Reverse(productions[p].precedence), p + 1),
        });
        cell
    }
}

/// Builds the SLR(1) table for a prepared grammar.
pub(crate) fn build_table(grammar: &Prepared) -> Result<Table> {
    let n_term = grammar.terminal_count;
    let accept = grammar.symbols.len();
    let mut prods = Vec::with_capacity(grammar.productions.len() + 1);
    prods.push(vec![accept, grammar.start]);
    for p in &grammar.productions {
        let mut v = Vec::with_capacity(p.rhs.len() + 1);
        v.push(p.lhs);
        v.extend_from_slice(&p.rhs);
        prods.push(v);
    }
    let cx = TableBuilder { grammar, prods };

    let automaton = construct_states(&cx.prods, n_term);
    if automaton.states.len() >= u16::MAX as usize {
        bail!("grammar needs {} states", automaton.states.len());
    }
    let (first, nullable) = first_sets(&cx.prods, n_term, accept + 1);
    let follow = follow_sets(&cx.prods, n_term, accept + 1, &first, &nullable);

    let mut states = Vec::with_capacity(automaton.states.len());
    let mut conflicts = 0;
    for (i, items) in automaton.states.iter().enumerate() {
        if log::log_enabled!(log::Level::Trace) {
            let mut dump = format!("state {i}:");
            for item in items {
                let _ = write!(dump, "\n  {}", cx.describe_item(item));
            }
            log::trace!("{dump}");
        }

        let mut cells: BTreeMap<usize, Vec<Candidate>> = BTreeMap::new();
        let mut gotos = Vec::new();
        for (&sym, &j) in &automaton.transitions[i] {
            if sym < n_term {
                cells.entry(sym).or_default().push(Candidate::Shift(j));
            } else {
                gotos.push((Symbol(sym as u16), StateId(j as u16)));
            }
        }
        for item in items {
            if item.dot != cx.prods[item.prod].len() {
                continue;
            }
            if item.prod == 0 {
                cells
                    .entry(Symbol::END.index())
                    .or_default()
                    .push(Candidate::Accept);
                continue;
            }
            for &t in &follow[cx.prods[item.prod][0]] {
                cells
                    .entry(t)
                    .or_default()
                    .push(Candidate::Reduce(item.prod - 1));
            }
        }

        let mut actions = Vec::with_capacity(cells.len());
        for (t, cell) in cells {
            let cell = cx.resolve(cx.shift_precedence(items, t), cell);
            if cell.is_empty() {
                continue;
            }
            if cell.len() > 1 {
                conflicts += 1;
                let options: Vec<_> = cell.iter().map(|&c| cx.describe(c)).collect();
                log::warn!(
                    "state {i}: unresolved conflict on {:?}: {}",
                    cx.name(t),
                    options.join(" | ")
                );
            }
            let cell = cell
                .into_iter()
                .map(|c| match c {
                    Candidate::Shift(s) => ParseAction::Shift(StateId(s as u16)),
                    Candidate::Reduce(p) => ParseAction::Reduce(ProductionId(p as u16)),
                    Candidate::Accept => ParseAction::Accept,
                })
                .collect();
            actions.push((Symbol(t as u16), cell));
        }
        if actions.is_empty() && gotos.is_empty() {
            bail!("state {i} has no actions left after precedence resolution");
        }
        states.push(StateDef { actions, gotos });
    }
    Ok(Table { states, conflicts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::*;
    use crate::prepare::prepare;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    // S' -> E ; E -> E + n | n   with terminals end=0, +=1, n=2, E=3, S'=4
    fn sum_prods() -> Vec<Vec<usize>> {
        vec![vec![4, 3], vec![3, 3, 1, 2], vec![3, 2]]
    }

    #[test]
    fn closure_adds_productions_of_the_next_nonterminal() {
        let prods = sum_prods();
        let by_lhs = productions_by_lhs(&prods);
        let c = closure(&ItemSet::from([Item { prod: 0, dot: 1 }]), &prods, &by_lhs, 3);
        let expected = ItemSet::from([
            Item { prod: 0, dot: 1 },
            Item { prod: 1, dot: 1 },
            Item { prod: 2, dot: 1 },
        ]);
        assert_eq!(c, expected);
    }

    #[test]
    fn canonical_collection_of_a_sum() {
        let a = construct_states(&sum_prods(), 3);
        // start, after E, after n, after E +, after E + n
        assert_eq!(a.states.len(), 5);
        let after_e = a.transitions[0][&3];
        let after_plus = a.transitions[after_e][&1];
        assert!(a.transitions[after_plus].contains_key(&2));
        assert!(!a.transitions[after_plus].contains_key(&3));
    }

    #[test]
    fn first_and_follow() {
        let prods = vec![
            vec![4, 3],
            vec![3, 3, 1],
            vec![3],
        ];
        let (first, nullable) = first_sets(&prods, 3, 5);
        assert!(nullable[3]);
        assert_eq!(first[3], BTreeSet::from([1]));
        let follow = follow_sets(&prods, 3, 5, &first, &nullable);
        assert_eq!(follow[3], BTreeSet::from([0, 1]));
    }

    fn table_for(g: &Grammar) -> (Prepared, Table) {
        init_logger();
        let p = prepare(g).unwrap();
        let t = build_table(&p).unwrap();
        (p, t)
    }

    fn expr_grammar(op_prec: Rule) -> Grammar {
        Grammar::new("t")
            .rule("e", choice([op_prec, sym("n")]))
            .rule("n", pattern("[0-9]+"))
    }

    fn conflict_cells(t: &Table) -> Vec<&Vec<ParseAction>> {
        t.states
            .iter()
            .flat_map(|s| s.actions.iter().map(|(_, cell)| cell))
            .filter(|cell| cell.len() > 1)
            .collect()
    }

    #[test]
    fn left_associativity_reduces() {
        let g = expr_grammar(prec_left(1, seq([sym("e"), string("-"), sym("e")])));
        let (_, t) = table_for(&g);
        assert_eq!(t.conflicts, 0);
        let reduces_on_minus = t.states.iter().any(|s| {
            s.actions.iter().any(|(_, cell)| {
                matches!(cell[..], [ParseAction::Reduce(ProductionId(0))])
            })
        });
        assert!(reduces_on_minus);
    }

    #[test]
    fn right_associativity_shifts() {
        let g = expr_grammar(prec_right(1, seq([sym("e"), string("^"), sym("e")])));
        let (p, t) = table_for(&g);
        assert_eq!(t.conflicts, 0);
        let caret = p.symbols.iter().position(|s| s.name.as_str() == "^").unwrap();
        // The state after `e ^ e` shifts `^` instead of reducing.
        let after_rhs = t.states.iter().find(|s| {
            s.actions
                .iter()
                .any(|(sym, cell)| sym.index() == 0 && cell == &[ParseAction::Reduce(ProductionId(0))])
        });
        let after_rhs = after_rhs.unwrap();
        let on_caret = after_rhs
            .actions
            .iter()
            .find(|(sym, _)| sym.index() == caret)
            .map(|(_, cell)| cell.clone())
            .unwrap();
        assert!(matches!(on_caret[..], [ParseAction::Shift(_)]));
    }

    #[test]
    fn unresolved_conflicts_stay_as_cells() {
        let g = expr_grammar(seq([sym("e"), string("+"), sym("e")]));
        let (_, t) = table_for(&g);
        assert_eq!(t.conflicts, 1);
        let cells = conflict_cells(&t);
        assert!(matches!(
            cells[0][..],
            [ParseAction::Shift(_), ParseAction::Reduce(ProductionId(0))]
        ));
    }

    #[test]
    fn higher_precedence_binds_tighter() {
        let g = Grammar::new("t")
            .rule(
                "e",
                choice([
                    prec_left(1, seq([sym("e"), string("+"), sym("e")])),
                    prec_left(2, seq([sym("e"), string("*"), sym("e")])),
                    sym("n"),
                ]),
            )
            .rule("n", pattern("[0-9]+"));
        let (_, t) = table_for(&g);
        assert_eq!(t.conflicts, 0);
    }

    #[test]
    fn accepts_on_end_only() {
        let g = expr_grammar(prec_left(1, seq([sym("e"), string("-"), sym("e")])));
        let (_, t) = table_for(&g);
        let accepts: Vec<_> = t
            .states
            .iter()
            .flat_map(|s| s.actions.iter())
            .filter(|(_, cell)| cell.contains(&ParseAction::Accept))
            .map(|(sym, _)| *sym)
            .collect();
        assert_eq!(accepts, vec![Symbol::END]);
    }
}
