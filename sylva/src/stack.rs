//! Persistent parse stacks.
//!
//! Every stack head is a pointer to the top entry of a singly linked list of
//! `(state, node)` pairs. Pushing allocates one entry and shares the rest, so
//! forking a head is a pointer copy. Error cost and dynamic precedence are
//! accumulated along the list so that comparing heads is O(1) up to the
//! node-by-node tie-break.

use crate::language::{Language, StateId};
use crate::tree::{Subtree, compare_subtrees};
use std::cmp::Ordering;
use std::sync::Arc;

pub(crate) struct StackEntry {
    state: StateId,
    /// `None` only for the bottom entry.
    node: Option<Subtree>,
    prev: Option<Arc<StackEntry>>,
    depth: usize,
    error_cost: u32,
    dynamic_precedence: i32,
}

impl Drop for StackEntry {
    fn drop(&mut self) {
        let mut prev = self.prev.take();
        while let Some(entry) = prev {
            match Arc::try_unwrap(entry) {
                Ok(mut entry) => prev = entry.prev.take(),
                Err(_) => break,
            }
        }
    }
}

#[derive(Clone)]
pub(crate) struct Head {
    top: Arc<StackEntry>,
}

/// Result of popping entries for a reduction.
pub(crate) struct Popped {
    pub base: Head,
    /// Popped nodes, bottom to top.
    pub nodes: Vec<Subtree>,
    /// Extras that were on top of the stack, bottom to top. They belong
    /// after the reduced node.
    pub trailing: Vec<Subtree>,
}

impl Head {
    pub fn new(state: StateId) -> Self {
        Self {
            top: Arc::new(StackEntry {
                state,
                node: None,
                prev: None,
                depth: 0,
                error_cost: 0,
                dynamic_precedence: 0,
            }),
        }
    }

    #[inline]
    pub fn state(&self) -> StateId {
        self.top.state
    }

    pub fn depth(&self) -> usize {
        self.top.depth
    }

    pub fn error_cost(&self) -> u32 {
        self.top.error_cost
    }

    pub fn dynamic_precedence(&self) -> i32 {
        self.top.dynamic_precedence
    }

    pub fn top_node(&self) -> Option<&Subtree> {
        self.top.node.as_ref()
    }

    pub fn push(&self, state: StateId, node: Subtree) -> Head {
        let error_cost = self.top.error_cost.saturating_add(node.error_cost());
        let dynamic_precedence = self.top.dynamic_precedence + node.dynamic_precedence();
        Head {
            top: Arc::new(StackEntry {
                state,
                node: Some(node),
                prev: Some(self.top.clone()),
                depth: self.top.depth + 1,
                error_cost,
                dynamic_precedence,
            }),
        }
    }

    /// The head below the top `n` entries, and the nodes of those entries.
    pub fn pop_entries(&self, n: usize) -> (Head, Vec<Subtree>) {
        let mut nodes = Vec::with_capacity(n);
        let mut entry = &self.top;
        while nodes.len() < n {
            match (&entry.node, &entry.prev) {
                (Some(node), Some(prev)) => {
                    nodes.push(node.clone());
                    entry = prev;
                }
                _ => break,
            }
        }
        nodes.reverse();
        (Head { top: entry.clone() }, nodes)
    }

    /// Pops `count` counted entries; uncounted entries between them come
    /// along, uncounted entries on top are set aside.
    pub fn pop(&self, count: usize) -> Popped {
        let mut entry = &self.top;
        let mut trailing = Vec::new();
        while let (Some(node), Some(prev)) = (&entry.node, &entry.prev) {
            if !node.is_extra() {
                break;
            }
            trailing.push(node.clone());
            entry = prev;
        }
        trailing.reverse();

        let mut nodes = Vec::new();
        let mut counted = 0;
        while counted < count {
            match (&entry.node, &entry.prev) {
                (Some(node), Some(prev)) => {
                    if node.is_counted() {
                        counted += 1;
                    }
                    nodes.push(node.clone());
                    entry = prev;
                }
                _ => break,
            }
        }
        nodes.reverse();
        Popped {
            base: Head { top: entry.clone() },
            nodes,
            trailing,
        }
    }

    /// All nodes, bottom to top.
    pub fn nodes(&self) -> Vec<Subtree> {
        let mut nodes = Vec::with_capacity(self.top.depth);
        let mut entry = &self.top;
        while let (Some(node), Some(prev)) = (&entry.node, &entry.prev) {
            nodes.push(node.clone());
            entry = prev;
        }
        nodes.reverse();
        nodes
    }

    /// States from the top down.
    pub fn states(&self) -> impl Iterator<Item = StateId> + '_ {
        let mut entry = Some(&self.top);
        std::iter::from_fn(move || {
            let e = entry?;
            entry = e.prev.as_ref();
            Some(e.state)
        })
    }

    pub fn same_states(&self, other: &Head) -> bool {
        if self.top.depth != other.top.depth {
            return false;
        }
        let (mut a, mut b) = (&self.top, &other.top);
        loop {
            if Arc::ptr_eq(a, b) {
                return true;
            }
            if a.state != b.state {
                return false;
            }
            match (&a.prev, &b.prev) {
                (Some(pa), Some(pb)) => {
                    a = pa;
                    b = pb;
                }
                (None, None) => return true,
                _ => return false,
            }
        }
    }

    /// `<state> node` pairs, bottom to top, for trace output.
    pub fn describe(&self, lang: &Language) -> String {
        let mut parts = Vec::new();
        let mut entry = Some(&self.top);
        while let Some(e) = entry {
            parts.push(match &e.node {
                Some(node) => format!("<{}> {}", e.state.0, lang.symbol_name(node.kind_id())),
                None => format!("<{}>", e.state.0),
            });
            entry = e.prev.as_ref();
        }
        parts.reverse();
        parts.join("  ")
    }
}

/// Orders heads by preference; `Less` means `a` is preferred. Ties are
/// broken by stack contents from the top down, then by state sequence, so
/// the order never depends on the order in which heads were forked.
pub(crate) fn compare_heads(lang: &Language, a: &Head, b: &Head) -> Ordering {
    let order = a
        .error_cost()
        .cmp(&b.error_cost())
        .then_with(|| b.dynamic_precedence().cmp(&a.dynamic_precedence()));
    if order != Ordering::Equal {
        return order;
    }
    let (mut ea, mut eb) = (&a.top, &b.top);
    loop {
        if Arc::ptr_eq(ea, eb) {
            return Ordering::Equal;
        }
        let order = match (&ea.node, &eb.node) {
            (Some(na), Some(nb)) => compare_subtrees(lang, na, nb),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
        .then_with(|| ea.state.cmp(&eb.state));
        if order != Ordering::Equal {
            return order;
        }
        match (&ea.prev, &eb.prev) {
            (Some(pa), Some(pb)) => {
                ea = pa;
                eb = pb;
            }
            _ => return ea.depth.cmp(&eb.depth),
        }
    }
}

/// Merges heads with equal state sequences, keeping the preferred one,
/// then sorts by preference and keeps at most `max_stacks`. Returns the
/// surviving heads and the number of merges.
pub(crate) fn condense(lang: &Language, heads: Vec<Head>, max_stacks: usize) -> (Vec<Head>, usize) {
    let mut kept: Vec<Head> = Vec::with_capacity(heads.len());
    let mut merges = 0;
    'heads: for head in heads {
        for k in kept.iter_mut() {
            if k.same_states(&head) {
                merges += 1;
                if compare_heads(lang, &head, k) == Ordering::Less {
                    *k = head;
                }
                continue 'heads;
            }
        }
        kept.push(head);
    }
    kept.sort_by(|a, b| compare_heads(lang, a, b));
    if kept.len() > max_stacks.max(1) {
        log::debug!("dropping {} stack heads", kept.len() - max_stacks.max(1));
        kept.truncate(max_stacks.max(1));
    }
    (kept, merges)
}
