//! # Syntax Tree Builder
//!
//! A [`Subtree`] is an immutable, reference-counted node that stores only
//! relative extents (`padding` + `size`). Absolute positions appear when a
//! subtree is viewed through a [`Node`], which carries the offset at which the
//! subtree starts. Because of this, an old subtree can be placed at a new
//! offset after an edit without being copied.
//!
//! Hidden nonterminals (names starting with `_`, repetition helpers) keep
//! their raw children while they sit on the parse stack. The children are
//! spliced into the nearest visible parent at the moment that parent is
//! built, and fields on a hidden child are inherited by the spliced nodes.

use crate::cursor::{LineIndex, Point};
use crate::language::{FieldId, Language, LexMode, ProductionId, StateId, Symbol};
use std::cmp::Ordering;
use std::fmt::Write as _;
use std::ops::Range;
use std::sync::Arc;

/// Cost of starting a recovery.
pub(crate) const ERROR_COST_PER_RECOVERY: u32 = 500;
/// Cost of each tree skipped or popped into an `ERROR` node.
pub(crate) const ERROR_COST_PER_SKIPPED_TREE: u32 = 100;
/// Cost of each byte covered by an `ERROR` node.
pub(crate) const ERROR_COST_PER_SKIPPED_BYTE: u32 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Flags(u16);

impl Flags {
    pub const NAMED: Flags = Flags(1);
    pub const VISIBLE: Flags = Flags(1 << 1);
    pub const EXTRA: Flags = Flags(1 << 2);
    pub const ERROR: Flags = Flags(1 << 3);
    pub const MISSING: Flags = Flags(1 << 4);
    pub const LEX_ERROR: Flags = Flags(1 << 5);
    pub const HAS_ERROR: Flags = Flags(1 << 6);
    pub const FRAGILE: Flags = Flags(1 << 7);

    /// Flags that take part in structural comparison.
    const STRUCTURAL: Flags = Flags(
        Self::NAMED.0 | Self::VISIBLE.0 | Self::EXTRA.0 | Self::ERROR.0 | Self::MISSING.0,
    );

    #[inline]
    pub fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn set(&mut self, other: Flags, on: bool) {
        if on {
            self.0 |= other.0;
        } else {
            self.0 &= !other.0;
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct SubtreeData {
    pub symbol: Symbol,
    pub alias: Option<Symbol>,
    pub padding: usize,
    pub size: usize,
    pub lookahead: usize,
    pub parse_state: StateId,
    pub lex_mode: Option<LexMode>,
    /// Mode of the lookahead a reduced node was closed on.
    pub follow_mode: Option<LexMode>,
    pub production: Option<ProductionId>,
    pub children: Vec<Subtree>,
    /// Parallel to `children`, or empty when no child has a field.
    pub fields: Vec<Option<FieldId>>,
    pub flags: Flags,
    pub error_cost: u32,
    pub dynamic_precedence: i32,
}

impl Drop for SubtreeData {
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(child) = stack.pop() {
            if let Ok(mut data) = Arc::try_unwrap(child.0) {
                stack.append(&mut data.children);
            }
        }
    }
}

/// Shared syntax node with relative extents.
#[derive(Debug, Clone)]
pub(crate) struct Subtree(Arc<SubtreeData>);

/// Inputs of a leaf.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LeafSpec {
    pub symbol: Symbol,
    pub padding: usize,
    pub size: usize,
    pub lookahead: usize,
    pub parse_state: StateId,
    pub lex_mode: Option<LexMode>,
    pub extra: bool,
    pub lex_error: bool,
}

impl Subtree {
    pub fn leaf(lang: &Language, spec: LeafSpec) -> Self {
        let mut flags = Flags::default();
        flags.set(Flags::NAMED, lang.is_named(spec.symbol));
        flags.set(Flags::VISIBLE, lang.is_visible(spec.symbol));
        flags.set(Flags::EXTRA, spec.extra);
        flags.set(Flags::ERROR, spec.symbol == Symbol::ERROR);
        flags.set(Flags::LEX_ERROR, spec.lex_error);
        flags.set(Flags::HAS_ERROR, spec.symbol == Symbol::ERROR || spec.lex_error);
        Subtree(Arc::new(SubtreeData {
            symbol: spec.symbol,
            alias: None,
            padding: spec.padding,
            size: spec.size,
            lookahead: spec.lookahead,
            parse_state: spec.parse_state,
            lex_mode: spec.lex_mode,
            follow_mode: None,
            production: None,
            children: Vec::new(),
            fields: Vec::new(),
            flags,
            error_cost: 0,
            dynamic_precedence: 0,
        }))
    }

    /// A zero-width marker for input that should have been there.
    pub fn missing(parse_state: StateId) -> Self {
        let mut flags = Flags::NAMED;
        flags.set(Flags::VISIBLE, true);
        flags.set(Flags::ERROR, true);
        flags.set(Flags::MISSING, true);
        flags.set(Flags::HAS_ERROR, true);
        Subtree(Arc::new(SubtreeData {
            symbol: Symbol::ERROR,
            alias: None,
            padding: 0,
            size: 0,
            lookahead: 0,
            parse_state,
            lex_mode: None,
            follow_mode: None,
            production: None,
            children: Vec::new(),
            fields: Vec::new(),
            flags,
            error_cost: ERROR_COST_PER_RECOVERY,
            dynamic_precedence: 0,
        }))
    }

    /// Reduces `raw` by `production`. `la_extent` is how far past the new
    /// node's end the lookahead that triggered the reduction reaches.
    pub fn reduce(
        lang: &Language,
        production: ProductionId,
        raw: Vec<Subtree>,
        parse_state: StateId,
        fragile: bool,
        la_extent: usize,
        follow_mode: Option<LexMode>,
    ) -> Self {
        let prod = lang.production(production);
        let mut children = Vec::with_capacity(raw.len());
        let mut fields = Vec::with_capacity(raw.len());
        let mut pos = 0;
        for child in raw {
            if child.is_counted() {
                fields.push(prod.field_at(pos));
                children.push(match prod.alias_at(pos) {
                    Some(alias) => child.aliased(lang, alias),
                    None => child,
                });
                pos += 1;
            } else {
                fields.push(None);
                children.push(child);
            }
        }
        let mut flags = Flags::default();
        flags.set(Flags::NAMED, lang.is_named(prod.lhs));
        flags.set(Flags::VISIBLE, lang.is_visible(prod.lhs));
        flags.set(Flags::FRAGILE, fragile);
        let mut data = SubtreeData {
            symbol: prod.lhs,
            alias: None,
            padding: 0,
            size: 0,
            lookahead: 0,
            parse_state,
            lex_mode: None,
            follow_mode,
            production: Some(production),
            children,
            fields,
            flags,
            error_cost: 0,
            dynamic_precedence: prod.dynamic_precedence,
        };
        if flags.contains(Flags::VISIBLE) {
            data.splice_hidden();
        }
        data.summarize(la_extent);
        Subtree(Arc::new(data))
    }

    /// A nonterminal closed by recovery over whatever the stack held.
    pub fn forced(lang: &Language, symbol: Symbol, raw: Vec<Subtree>, parse_state: StateId) -> Self {
        let mut flags = Flags::default();
        flags.set(Flags::NAMED, lang.is_named(symbol));
        flags.set(Flags::VISIBLE, lang.is_visible(symbol));
        flags.set(Flags::HAS_ERROR, true);
        let fields = vec![None; raw.len()];
        let mut data = SubtreeData {
            symbol,
            alias: None,
            padding: 0,
            size: 0,
            lookahead: 0,
            parse_state,
            lex_mode: None,
            follow_mode: None,
            production: None,
            children: raw,
            fields,
            flags,
            error_cost: 0,
            dynamic_precedence: 0,
        };
        if flags.contains(Flags::VISIBLE) {
            data.splice_hidden();
        }
        data.summarize(0);
        data.flags.set(Flags::HAS_ERROR, true);
        Subtree(Arc::new(data))
    }

    /// Wraps skipped or popped trees in an `ERROR` node.
    pub fn error(raw: Vec<Subtree>, parse_state: StateId) -> Self {
        let fields = vec![None; raw.len()];
        let mut data = SubtreeData {
            symbol: Symbol::ERROR,
            alias: None,
            padding: 0,
            size: 0,
            lookahead: 0,
            parse_state,
            lex_mode: None,
            follow_mode: None,
            production: None,
            children: raw,
            fields,
            flags: Flags::NAMED,
            error_cost: 0,
            dynamic_precedence: 0,
        };
        data.flags.set(Flags::VISIBLE, true);
        data.flags.set(Flags::ERROR, true);
        data.splice_hidden();
        data.summarize(0);
        let skipped_trees = data.children.len() as u32;
        let skipped_bytes = data.size as u32;
        data.error_cost = data
            .error_cost
            .saturating_add(ERROR_COST_PER_RECOVERY)
            .saturating_add(ERROR_COST_PER_SKIPPED_TREE.saturating_mul(skipped_trees))
            .saturating_add(ERROR_COST_PER_SKIPPED_BYTE.saturating_mul(skipped_bytes));
        data.flags.set(Flags::HAS_ERROR, true);
        Subtree(Arc::new(data))
    }

    /// The root: spans `[0, len)` regardless of leading whitespace.
    pub fn root(
        lang: &Language,
        symbol: Symbol,
        children: Vec<Subtree>,
        fields: Vec<Option<FieldId>>,
        len: usize,
    ) -> Self {
        let mut flags = Flags::default();
        flags.set(Flags::NAMED, lang.is_named(symbol));
        flags.set(Flags::VISIBLE, true);
        flags.set(Flags::ERROR, symbol == Symbol::ERROR);
        let mut data = SubtreeData {
            symbol,
            alias: None,
            padding: 0,
            size: 0,
            lookahead: 0,
            parse_state: lang.start_state(),
            lex_mode: None,
            follow_mode: None,
            production: None,
            children,
            fields,
            flags,
            error_cost: 0,
            dynamic_precedence: 0,
        };
        data.splice_hidden();
        data.summarize(0);
        if symbol == Symbol::ERROR {
            data.error_cost += ERROR_COST_PER_RECOVERY;
            data.flags.set(Flags::HAS_ERROR, true);
        }
        data.padding = 0;
        data.size = len;
        Subtree(Arc::new(data))
    }

    fn aliased(self, lang: &Language, alias: Symbol) -> Self {
        let was_visible = self.is_visible();
        let mut data = (*self.0).clone();
        data.alias = Some(alias);
        data.flags.set(Flags::NAMED, lang.is_named(alias));
        data.flags.set(Flags::VISIBLE, lang.is_visible(alias));
        if !was_visible && data.flags.contains(Flags::VISIBLE) {
            data.splice_hidden();
        }
        Subtree(Arc::new(data))
    }

    #[inline]
    pub fn data(&self) -> &SubtreeData {
        &self.0
    }

    #[inline]
    pub fn ptr_eq(&self, other: &Subtree) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    pub fn symbol(&self) -> Symbol {
        self.0.symbol
    }

    /// The symbol shown to users.
    pub fn kind_id(&self) -> Symbol {
        self.0.alias.unwrap_or(self.0.symbol)
    }

    pub fn padding(&self) -> usize {
        self.0.padding
    }

    pub fn size(&self) -> usize {
        self.0.size
    }

    pub fn total(&self) -> usize {
        self.0.padding + self.0.size
    }

    pub fn lookahead(&self) -> usize {
        self.0.lookahead
    }

    pub fn parse_state(&self) -> StateId {
        self.0.parse_state
    }

    pub fn lex_mode(&self) -> Option<LexMode> {
        self.0.lex_mode
    }

    pub fn follow_mode(&self) -> Option<LexMode> {
        self.0.follow_mode
    }

    pub fn children(&self) -> &[Subtree] {
        &self.0.children
    }

    pub fn field(&self, i: usize) -> Option<FieldId> {
        self.0.fields.get(i).copied().flatten()
    }

    pub fn error_cost(&self) -> u32 {
        self.0.error_cost
    }

    pub fn dynamic_precedence(&self) -> i32 {
        self.0.dynamic_precedence
    }

    pub fn is_leaf(&self) -> bool {
        self.0.production.is_none() && self.0.children.is_empty()
    }

    pub fn is_visible(&self) -> bool {
        self.0.flags.contains(Flags::VISIBLE)
    }

    pub fn is_named(&self) -> bool {
        self.0.flags.contains(Flags::NAMED)
    }

    pub fn is_extra(&self) -> bool {
        self.0.flags.contains(Flags::EXTRA)
    }

    pub fn is_error(&self) -> bool {
        self.0.symbol == Symbol::ERROR
    }

    pub fn is_missing(&self) -> bool {
        self.0.flags.contains(Flags::MISSING)
    }

    pub fn is_lex_error(&self) -> bool {
        self.0.flags.contains(Flags::LEX_ERROR)
    }

    pub fn has_error(&self) -> bool {
        self.0.flags.contains(Flags::HAS_ERROR)
    }

    pub fn is_fragile(&self) -> bool {
        self.0.flags.contains(Flags::FRAGILE)
    }

    /// Occupies a grammar position on the stack; extras and recovery
    /// `ERROR` nodes do not.
    pub fn is_counted(&self) -> bool {
        !self.is_extra() && self.0.symbol != Symbol::ERROR
    }

    pub fn first_leaf(&self) -> Option<&Subtree> {
        let mut node = self;
        while !node.is_leaf() {
            node = node.0.children.first()?;
        }
        Some(node)
    }
}

impl SubtreeData {
    fn is_spliceable(&self) -> bool {
        !self.flags.contains(Flags::VISIBLE)
            && !self.flags.contains(Flags::EXTRA)
            && self.symbol != Symbol::ERROR
            && self.production.is_some()
    }

    /// Replaces hidden nonterminal children by their own children.
    fn splice_hidden(&mut self) {
        if !self.children.iter().any(|c| c.0.is_spliceable()) {
            return;
        }
        let children = std::mem::take(&mut self.children);
        let fields = std::mem::take(&mut self.fields);
        let mut stack: Vec<(Subtree, Option<FieldId>)> = children
            .into_iter()
            .enumerate()
            .map(|(i, c)| (c, fields.get(i).copied().flatten()))
            .rev()
            .collect();
        let mut out = Vec::with_capacity(stack.len());
        let mut out_fields = Vec::with_capacity(stack.len());
        while let Some((child, field)) = stack.pop() {
            if child.0.is_spliceable() {
                for i in (0..child.0.children.len()).rev() {
                    stack.push((child.0.children[i].clone(), child.field(i).or(field)));
                }
            } else {
                out.push(child);
                out_fields.push(field);
            }
        }
        self.children = out;
        self.fields = out_fields;
    }

    fn summarize(&mut self, la_extent: usize) {
        let mut total = 0;
        let mut lookahead_end = 0;
        for c in &self.children {
            lookahead_end = lookahead_end.max(total + c.total() + c.lookahead());
            total += c.total();
            self.error_cost = self.error_cost.saturating_add(c.error_cost());
            self.dynamic_precedence += c.dynamic_precedence();
            if c.has_error() {
                self.flags.set(Flags::HAS_ERROR, true);
            }
            if c.is_fragile() {
                self.flags.set(Flags::FRAGILE, true);
            }
        }
        lookahead_end = lookahead_end.max(total + la_extent);
        self.padding = self.children.first().map_or(0, |c| c.padding());
        self.size = total - self.padding;
        self.lookahead = lookahead_end - total;
        if self.fields.iter().all(Option::is_none) {
            self.fields.clear();
        }
    }
}

/// Orders two subtrees by preference; `Less` means `a` is preferred.
///
/// Lower error cost wins, then higher dynamic precedence, then higher static
/// production precedence, then the earlier production, then the children in
/// order.
pub(crate) fn compare_subtrees(lang: &Language, a: &Subtree, b: &Subtree) -> Ordering {
    let mut work = vec![(a.clone(), b.clone())];
    while let Some((a, b)) = work.pop() {
        if a.ptr_eq(&b) {
            continue;
        }
        let (da, db) = (a.data(), b.data());
        let precedence = |p: Option<ProductionId>| p.map_or(0, |p| lang.production(p).precedence);
        let order = da
            .error_cost
            .cmp(&db.error_cost)
            .then_with(|| db.dynamic_precedence.cmp(&da.dynamic_precedence))
            .then_with(|| precedence(db.production).cmp(&precedence(da.production)))
            .then_with(|| {
                let id = |p: Option<ProductionId>| p.map_or(u16::MAX, |p| p.0);
                id(da.production).cmp(&id(db.production))
            })
            .then_with(|| a.kind_id().cmp(&b.kind_id()))
            .then_with(|| da.children.len().cmp(&db.children.len()))
            .then_with(|| a.total().cmp(&b.total()));
        if order != Ordering::Equal {
            return order;
        }
        for (ca, cb) in da.children.iter().zip(&db.children).rev() {
            work.push((ca.clone(), cb.clone()));
        }
    }
    Ordering::Equal
}

/// Same shape, kinds, fields, flags and extents.
pub(crate) fn same_structure(a: &Subtree, b: &Subtree) -> bool {
    let mut work = vec![(a.clone(), b.clone())];
    while let Some((a, b)) = work.pop() {
        if a.ptr_eq(&b) {
            continue;
        }
        let (da, db) = (a.data(), b.data());
        let structural = |f: Flags| f.0 & Flags::STRUCTURAL.0;
        if da.symbol != db.symbol
            || da.alias != db.alias
            || da.padding != db.padding
            || da.size != db.size
            || structural(da.flags) != structural(db.flags)
            || da.fields != db.fields
            || da.children.len() != db.children.len()
        {
            return false;
        }
        work.extend(da.children.iter().cloned().zip(db.children.iter().cloned()));
    }
    true
}

/// A positioned view of a syntax node.
#[derive(Clone, Copy)]
pub struct Node<'tree> {
    subtree: &'tree Subtree,
    /// Absolute offset of the subtree's padding.
    offset: usize,
    language: &'tree Language,
}

impl std::fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{Node {} {}..{}}}",
            self.kind(),
            self.start_byte(),
            self.end_byte()
        )
    }
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.subtree.ptr_eq(other.subtree) && self.offset == other.offset
    }
}

impl Eq for Node<'_> {}

impl<'tree> Node<'tree> {
    /// Child views in order, with their fields, hidden leaves included.
    fn raw_children(self) -> impl Iterator<Item = (Node<'tree>, Option<FieldId>)> + 'tree {
        let subtree = self.subtree;
        let language = self.language;
        let mut offset = self.offset;
        subtree.children().iter().enumerate().map(move |(i, c)| {
            let node = Node {
                subtree: c,
                offset,
                language,
            };
            offset += c.total();
            (node, subtree.field(i))
        })
    }

    fn visible_children(self) -> impl Iterator<Item = (Node<'tree>, Option<FieldId>)> + 'tree {
        self.raw_children().filter(|(n, _)| n.subtree.is_visible())
    }

    pub fn kind(&self) -> &'tree str {
        self.language.symbol_name(self.subtree.kind_id())
    }

    pub fn kind_id(&self) -> Symbol {
        self.subtree.kind_id()
    }

    /// The symbol before aliasing.
    pub fn grammar_symbol(&self) -> Symbol {
        self.subtree.symbol()
    }

    pub fn grammar_name(&self) -> &'tree str {
        self.language.symbol_name(self.subtree.symbol())
    }

    pub fn language(&self) -> &'tree Language {
        self.language
    }

    pub fn start_byte(&self) -> usize {
        self.offset + self.subtree.padding()
    }

    pub fn end_byte(&self) -> usize {
        self.start_byte() + self.subtree.size()
    }

    pub fn byte_range(&self) -> Range<usize> {
        self.start_byte()..self.end_byte()
    }

    pub fn start_point(&self, index: &LineIndex) -> Point {
        index.point(self.start_byte())
    }

    pub fn end_point(&self, index: &LineIndex) -> Point {
        index.point(self.end_byte())
    }

    pub fn child_count(&self) -> usize {
        self.visible_children().count()
    }

    pub fn child(&self, i: usize) -> Option<Node<'tree>> {
        self.visible_children().nth(i).map(|(n, _)| n)
    }

    pub fn children(self) -> impl Iterator<Item = Node<'tree>> + 'tree {
        self.visible_children().map(|(n, _)| n)
    }

    pub fn named_child_count(&self) -> usize {
        self.named_children().count()
    }

    pub fn named_child(&self, i: usize) -> Option<Node<'tree>> {
        self.named_children().nth(i)
    }

    pub fn named_children(self) -> impl Iterator<Item = Node<'tree>> + 'tree {
        self.children().filter(|n| n.is_named())
    }

    pub fn child_by_field_name(&self, name: &str) -> Option<Node<'tree>> {
        let field = self.language.field_id(name)?;
        self.child_by_field_id(field)
    }

    pub fn child_by_field_id(&self, field: FieldId) -> Option<Node<'tree>> {
        self.visible_children()
            .find(|&(_, f)| f == Some(field))
            .map(|(n, _)| n)
    }

    pub fn children_by_field_name(self, name: &str) -> impl Iterator<Item = Node<'tree>> + use<'tree> {
        let field = self.language.field_id(name);
        self.visible_children()
            .filter(move |&(_, f)| field.is_some() && f == field)
            .map(|(n, _)| n)
    }

    /// Field of the `i`-th visible child.
    pub fn field_name_for_child(&self, i: usize) -> Option<&'tree str> {
        let (_, field) = self.visible_children().nth(i)?;
        self.language.field_name(field?)
    }

    pub fn is_named(&self) -> bool {
        self.subtree.is_named()
    }

    pub fn is_extra(&self) -> bool {
        self.subtree.is_extra()
    }

    pub fn is_error(&self) -> bool {
        self.subtree.is_error()
    }

    pub fn is_missing(&self) -> bool {
        self.subtree.is_missing()
    }

    pub fn is_lexical_error(&self) -> bool {
        self.subtree.is_lex_error()
    }

    pub fn has_error(&self) -> bool {
        self.subtree.has_error()
    }

    pub fn utf8_text<'a>(&self, source: &'a [u8]) -> Result<&'a str, std::str::Utf8Error> {
        std::str::from_utf8(&source[self.byte_range()])
    }

    /// Stable identity of the underlying shared node. Reused nodes keep their id.
    pub fn id(&self) -> usize {
        self.subtree.id()
    }

    /// The smallest visible node that contains `start..end`.
    pub fn descendant_for_byte_range(&self, start: usize, end: usize) -> Option<Node<'tree>> {
        if start < self.start_byte() || end > self.end_byte() {
            return None;
        }
        let mut node = *self;
        'descend: loop {
            for child in node.children() {
                if child.start_byte() <= start && end <= child.end_byte() && child.end_byte() > child.start_byte() {
                    node = child;
                    continue 'descend;
                }
            }
            return Some(node);
        }
    }

    /// Named nodes as an S-expression, with field labels.
    pub fn to_sexp(&self) -> String {
        enum Step<'t> {
            Open(Node<'t>, Option<&'t str>),
            Close,
        }
        let mut out = String::new();
        let mut work = vec![Step::Open(*self, None)];
        while let Some(step) = work.pop() {
            match step {
                Step::Close => out.push(')'),
                Step::Open(node, field) => {
                    if !out.is_empty() {
                        out.push(' ');
                    }
                    if let Some(field) = field {
                        let _ = write!(out, "{field}: ");
                    }
                    if node.is_missing() {
                        out.push_str("(MISSING");
                        if !node.is_error() {
                            let _ = write!(out, " {}", node.kind());
                        }
                        out.push(')');
                        continue;
                    }
                    let _ = write!(out, "({}", node.kind());
                    work.push(Step::Close);
                    let kids: Vec<_> = node
                        .visible_children()
                        .filter(|(n, _)| n.is_named() || n.is_missing())
                        .collect();
                    for (child, f) in kids.into_iter().rev() {
                        work.push(Step::Open(child, f.and_then(|f| self.language.field_name(f))));
                    }
                }
            }
        }
        out
    }
}

/// One parse result.
#[derive(Clone)]
pub struct Tree {
    root: Subtree,
    language: Language,
    len: usize,
}

impl std::fmt::Debug for Tree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{Tree {:?}}}", self.root_node().to_sexp())
    }
}

impl Tree {
    pub(crate) fn new(root: Subtree, language: Language, len: usize) -> Self {
        Self {
            root,
            language,
            len,
        }
    }

    pub fn root_node(&self) -> Node<'_> {
        Node {
            subtree: &self.root,
            offset: 0,
            language: &self.language,
        }
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    /// Length of the input this tree was parsed from.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn walk(&self) -> TreeCursor<'_> {
        TreeCursor::new(self.root_node())
    }

    pub(crate) fn root(&self) -> &Subtree {
        &self.root
    }

    /// True when both trees have the same nodes at the same byte ranges.
    pub fn same_structure(&self, other: &Tree) -> bool {
        self.len == other.len && same_structure(&self.root, &other.root)
    }

    /// Lists the named nodes as `tree-sitter parse` does, with a `text:`
    /// line under every leaf. With `show_all`, every header carries the text.
    pub fn print(&self, source: &[u8], show_all: bool) -> String {
        struct Frame<'t> {
            kids: Vec<(Node<'t>, Option<&'t str>)>,
            next: usize,
            last_line: usize,
            depth: usize,
        }

        let printer = Printer {
            index: LineIndex::new(source),
            source,
            show_all,
        };
        let mut lines: Vec<String> = Vec::new();
        let mut frames: Vec<Frame<'_>> = Vec::new();

        match printer.open(self.root_node(), None, 0, &mut lines) {
            Opened::Leaf(_) => return lines.join("\n"),
            Opened::Branch(kids, line) => frames.push(Frame {
                kids,
                next: 0,
                last_line: line,
                depth: 0,
            }),
        }
        while let Some(frame) = frames.last_mut() {
            if frame.next < frame.kids.len() {
                let (child, field) = frame.kids[frame.next];
                frame.next += 1;
                let depth = frame.depth + 1;
                match printer.open(child, field, depth, &mut lines) {
                    Opened::Leaf(line) => frame.last_line = line,
                    Opened::Branch(kids, line) => frames.push(Frame {
                        kids,
                        next: 0,
                        last_line: line,
                        depth,
                    }),
                }
            } else {
                // The closing parenthesis goes on the last structural line.
                let last = frame.last_line;
                lines[last].push(')');
                frames.pop();
                if let Some(parent) = frames.last_mut() {
                    parent.last_line = last;
                }
            }
        }
        lines.join("\n")
    }
}

enum Opened<'t> {
    Leaf(usize),
    Branch(Vec<(Node<'t>, Option<&'t str>)>, usize),
}

struct Printer<'s> {
    index: LineIndex,
    source: &'s [u8],
    show_all: bool,
}

impl Printer<'_> {
    fn text(&self, node: Node<'_>) -> String {
        let bytes = self.source.get(node.byte_range()).unwrap_or_default();
        py_repr(&String::from_utf8_lossy(bytes))
    }

    /// Emits the header line of `node`. Leaves are closed at once and get
    /// their `text:` line.
    fn open<'t>(
        &self,
        node: Node<'t>,
        field: Option<&'t str>,
        depth: usize,
        lines: &mut Vec<String>,
    ) -> Opened<'t> {
        let indent = "  ".repeat(depth);
        let start = node.start_point(&self.index);
        let end = node.end_point(&self.index);
        let mut header = format!(
            "{indent}{}({} [{}, {}] - [{}, {}]",
            field.map(|f| format!("{f}: ")).unwrap_or_default(),
            node.kind(),
            start.row,
            start.column,
            end.row,
            end.column,
        );
        if self.show_all {
            let _ = write!(header, "  text: {}", self.text(node));
        }
        lines.push(header);
        let line = lines.len() - 1;
        let kids = named_children_with_fields(node);
        if kids.is_empty() {
            lines[line].push(')');
            lines.push(format!("{indent}  text: {}", self.text(node)));
            Opened::Leaf(line)
        } else {
            Opened::Branch(kids, line)
        }
    }
}

/// Named children with their fields. A named child without a field takes the
/// field of the nearest anonymous sibling, looking left first.
fn named_children_with_fields(node: Node<'_>) -> Vec<(Node<'_>, Option<&str>)> {
    let lang = node.language;
    let kids: Vec<(Node<'_>, Option<&str>)> = node
        .visible_children()
        .map(|(n, f)| (n, f.and_then(|f| lang.field_name(f))))
        .collect();
    let mut out = Vec::new();
    for (i, &(child, field)) in kids.iter().enumerate() {
        if !child.is_named() {
            continue;
        }
        let field = field
            .or_else(|| {
                kids[..i]
                    .iter()
                    .rev()
                    .take_while(|(n, _)| !n.is_named())
                    .find_map(|&(_, f)| f)
            })
            .or_else(|| {
                kids[i + 1..]
                    .iter()
                    .take_while(|(n, _)| !n.is_named())
                    .find_map(|&(_, f)| f)
            });
        out.push((child, field));
    }
    out
}

/// Quotes text the way Python's `repr` quotes a `str`.
fn py_repr(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || (0x7f..0xa0).contains(&(c as u32)) => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Walks the visible nodes of a tree.
pub struct TreeCursor<'tree> {
    stack: Vec<(Node<'tree>, Option<FieldId>, usize)>,
}

impl<'tree> TreeCursor<'tree> {
    fn new(root: Node<'tree>) -> Self {
        Self {
            stack: vec![(root, None, 0)],
        }
    }

    pub fn node(&self) -> Node<'tree> {
        self.stack[self.stack.len() - 1].0
    }

    pub fn field_name(&self) -> Option<&'tree str> {
        let (node, field, _) = self.stack[self.stack.len() - 1];
        node.language.field_name(field?)
    }

    pub fn depth(&self) -> usize {
        self.stack.len() - 1
    }

    pub fn goto_first_child(&mut self) -> bool {
        match self.node().visible_children().next() {
            Some((child, field)) => {
                self.stack.push((child, field, 0));
                true
            }
            None => false,
        }
    }

    pub fn goto_next_sibling(&mut self) -> bool {
        if self.stack.len() < 2 {
            return false;
        }
        let (_, _, index) = self.stack[self.stack.len() - 1];
        let parent = self.stack[self.stack.len() - 2].0;
        match parent.visible_children().nth(index + 1) {
            Some((sibling, field)) => {
                let last = self.stack.len() - 1;
                self.stack[last] = (sibling, field, index + 1);
                true
            }
            None => false,
        }
    }

    pub fn goto_parent(&mut self) -> bool {
        if self.stack.len() < 2 {
            return false;
        }
        self.stack.pop();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_language::parens;

    fn leaf(lang: &Language, name: &str, padding: usize, size: usize) -> Subtree {
        let symbol = lang
            .symbol_for_name(name, true)
            .or_else(|| lang.symbol_for_name(name, false))
            .unwrap();
        Subtree::leaf(
            lang,
            LeafSpec {
                symbol,
                padding,
                size,
                lookahead: 0,
                parse_state: StateId(0),
                lex_mode: None,
                extra: false,
                lex_error: false,
            },
        )
    }

    /// `( 12)` built by hand.
    fn sample(lang: &Language) -> Tree {
        let lp = leaf(lang, "(", 0, 1);
        let dec = leaf(lang, "dec", 1, 2);
        let rp = leaf(lang, ")", 0, 1);
        let expr = Subtree::reduce(lang, ProductionId(1), vec![dec], StateId(2), false, 1, None);
        let source = Subtree::reduce(lang, ProductionId(0), vec![lp, expr, rp], StateId(0), false, 1, None);
        let fields = source.data().fields.clone();
        let root = Subtree::root(lang, source.symbol(), source.children().to_vec(), fields, 5);
        Tree::new(root, lang.clone(), 5)
    }

    #[test]
    fn extents_derive_from_children() {
        let lang = Language::from_def(parens()).unwrap();
        let tree = sample(&lang);
        let root = tree.root_node();
        assert_eq!(root.byte_range(), 0..5);
        assert_eq!(root.kind(), "source");
        assert_eq!(root.child_count(), 3);
        let expr = root.child(1).unwrap();
        assert_eq!(expr.kind(), "expr");
        assert_eq!(expr.byte_range(), 2..4);
        assert_eq!(root.child(2).unwrap().byte_range(), 4..5);
        assert_eq!(root.child_by_field_name("inner"), Some(expr));
        assert_eq!(root.field_name_for_child(1), Some("inner"));
        assert_eq!(root.field_name_for_child(0), None);
        assert_eq!(root.named_child_count(), 1);
        assert!(!root.has_error());
    }

    #[test]
    fn sexp_and_print() {
        let lang = Language::from_def(parens()).unwrap();
        let tree = sample(&lang);
        assert_eq!(tree.root_node().to_sexp(), "(source inner: (expr (dec)))");
        let printed = tree.print(b"( 12)", false);
        assert_eq!(
            printed,
            "(source [0, 0] - [0, 5]\n  inner: (expr [0, 2] - [0, 4]\n    (dec [0, 2] - [0, 4])))\n      text: '12'"
        );
    }

    #[test]
    fn descendant_lookup() {
        let lang = Language::from_def(parens()).unwrap();
        let tree = sample(&lang);
        let root = tree.root_node();
        assert_eq!(root.descendant_for_byte_range(2, 3).unwrap().kind(), "dec");
        assert_eq!(root.descendant_for_byte_range(0, 1).unwrap().kind(), "(");
        assert_eq!(root.descendant_for_byte_range(1, 4).unwrap().kind(), "source");
        assert!(root.descendant_for_byte_range(0, 9).is_none());
    }

    #[test]
    fn cursor_walk() {
        let lang = Language::from_def(parens()).unwrap();
        let tree = sample(&lang);
        let mut cursor = tree.walk();
        assert!(cursor.goto_first_child());
        assert_eq!(cursor.node().kind(), "(");
        assert!(cursor.goto_next_sibling());
        assert_eq!(cursor.field_name(), Some("inner"));
        assert!(cursor.goto_first_child());
        assert_eq!(cursor.node().kind(), "dec");
        assert_eq!(cursor.depth(), 2);
        assert!(!cursor.goto_next_sibling());
        assert!(cursor.goto_parent());
        assert!(cursor.goto_next_sibling());
        assert_eq!(cursor.node().kind(), ")");
        assert!(cursor.goto_parent());
        assert!(!cursor.goto_parent());
    }

    #[test]
    fn error_nodes_carry_cost() {
        let lang = Language::from_def(parens()).unwrap();
        let err = Subtree::error(vec![leaf(&lang, "dec", 1, 3)], StateId(0));
        assert!(err.is_error() && err.has_error());
        assert_eq!(err.size(), 3);
        assert_eq!(
            err.error_cost(),
            ERROR_COST_PER_RECOVERY + ERROR_COST_PER_SKIPPED_TREE + 3 * ERROR_COST_PER_SKIPPED_BYTE
        );
        let missing = Subtree::missing(StateId(0));
        assert!(missing.is_missing() && missing.total() == 0);
        assert_eq!(compare_subtrees(&lang, &missing, &err), Ordering::Less);
    }

    #[test]
    fn structure_ignores_identity() {
        let lang = Language::from_def(parens()).unwrap();
        let a = sample(&lang);
        let b = sample(&lang);
        assert_ne!(a.root_node().id(), b.root_node().id());
        assert!(a.same_structure(&b));
        assert_eq!(compare_subtrees(&lang, a.root(), b.root()), Ordering::Equal);
    }

    #[test]
    fn deep_trees_drop_without_recursion() {
        let lang = Language::from_def(parens()).unwrap();
        let mut node = leaf(&lang, "dec", 0, 1);
        for _ in 0..200_000 {
            node = Subtree::error(vec![node], StateId(0));
        }
        drop(node);
    }

    #[test]
    fn python_quoting() {
        assert_eq!(py_repr("ab"), "'ab'");
        assert_eq!(py_repr("it's"), "\"it's\"");
        assert_eq!(py_repr("a'\"b"), "'a\\'\"b'");
        assert_eq!(py_repr("x\n\ty"), "'x\\n\\ty'");
        assert_eq!(py_repr("\u{1}"), "'\\x01'");
    }
}
