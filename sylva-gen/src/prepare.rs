//! Normalization of a [`Grammar`] into numbered symbols and flat productions.
//!
//! * Rules whose body is a string, a pattern or a `token(..)` become named
//!   terminals; every other rule is a nonterminal.
//! * Literals and patterns used inside nonterminal rules become anonymous
//!   terminals, shared by text.
//! * Choices are multiplied out into separate productions, so that only the
//!   start rule can derive the empty string.
//! * `repeat` / `repeat1` introduce hidden left-recursive helper rules.
//!
//! Terminals are numbered first (end of input is `0`), then nonterminals, then
//! symbols that only exist as alias names.

use crate::grammar::{Grammar, Prec, Rule};
use anyhow::{Context, Result, anyhow, bail};
use once_cell::sync::Lazy;
use regex::Regex;
use regex_automata::util::syntax;
use smartstring::alias::String;
use std::collections::HashMap;
use sylva::{LexRule, SymbolDef, SymbolKind};

/// Upper bound on the productions one rule may multiply out into.
const MAX_ALTERNATIVES: usize = 1 << 12;

static NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("name pattern is valid"));

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Assoc {
    None,
    Left,
    Right,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Production {
    pub lhs: usize,
    pub rhs: Vec<usize>,
    /// `(position, field index)`, field indices are zero-based.
    pub fields: Vec<(u16, usize)>,
    pub aliases: Vec<(u16, usize)>,
    pub precedence: i32,
    pub assoc: Assoc,
    pub dynamic_precedence: i32,
}

/// A grammar reduced to numbered symbols and productions.
#[derive(Debug)]
pub(crate) struct Prepared {
    pub name: String,
    pub symbols: Vec<SymbolDef>,
    pub terminal_count: usize,
    pub nonterminal_count: usize,
    pub fields: Vec<String>,
    pub productions: Vec<Production>,
    pub start: usize,
    pub word: Option<usize>,
}

impl Prepared {
    pub fn symbol_name(&self, sym: usize) -> &str {
        self.symbols.get(sym).map_or("?", |s| s.name.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Ref {
    Terminal(usize),
    NonTerminal(usize),
    Alias(usize),
}

#[derive(Clone, Debug)]
struct Step {
    symbol: Ref,
    field: Option<usize>,
    alias: Option<Ref>,
}

#[derive(Clone, Debug, Default)]
struct Alt {
    steps: Vec<Step>,
    prec: Option<(i32, Assoc)>,
    dynamic: i32,
}

impl Alt {
    fn single(symbol: Ref) -> Self {
        Self {
            steps: vec![Step {
                symbol,
                field: None,
                alias: None,
            }],
            ..Self::default()
        }
    }

    /// The later part's precedence wins, as it decides the reduction.
    fn concat(&self, other: &Alt) -> Alt {
        let mut steps = self.steps.clone();
        steps.extend(other.steps.iter().cloned());
        let dynamic = if other.dynamic.abs() > self.dynamic.abs() {
            other.dynamic
        } else {
            self.dynamic
        };
        Alt {
            steps,
            prec: other.prec.or(self.prec),
            dynamic,
        }
    }
}

struct Builder<'g> {
    grammar: &'g Grammar,
    terminals: Vec<SymbolDef>,
    /// Literal text of terminals that match exactly one string.
    literal_text: Vec<Option<String>>,
    anonymous: HashMap<String, usize>,
    nonterminals: Vec<SymbolDef>,
    aliases: Vec<SymbolDef>,
    names: HashMap<String, Ref>,
    fields: Vec<String>,
    productions: Vec<(usize, Alt)>,
    repeat_counts: HashMap<String, usize>,
}

pub(crate) fn prepare(grammar: &Grammar) -> Result<Prepared> {
    Builder::new(grammar)?.run()
}

fn check_name(what: &str, name: &str) -> Result<()> {
    if NAME.is_match(name) {
        Ok(())
    } else {
        Err(anyhow!("invalid {what} name {name:?}"))
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('_')
}

fn is_token_rule(rule: &Rule) -> bool {
    matches!(rule, Rule::String(_) | Rule::Pattern(_) | Rule::Token(_))
}

/// Literals beat patterns of the same explicit precedence.
fn lexical_priority(explicit: Option<i32>, literal: bool) -> i32 {
    explicit.unwrap_or(0) * 2 + i32::from(literal)
}

fn check_pattern(pattern: &str, owner: &str) -> Result<()> {
    let hir = syntax::parse_with(pattern, &syntax::Config::new().utf8(false))
        .with_context(|| format!("pattern {pattern:?} of {owner:?} does not compile"))?;
    if hir.properties().minimum_len() == Some(0) {
        bail!("pattern {pattern:?} of {owner:?} matches the empty string");
    }
    Ok(())
}

/// The literal text of a token body, if it is a single string.
fn literal_of(rule: &Rule) -> Option<&str> {
    match rule {
        Rule::String(s) => Some(s.as_str()),
        Rule::Token(inner) => literal_of(inner),
        Rule::Prec(p, inner) if !matches!(p, Prec::Dynamic(_)) => literal_of(inner),
        _ => None,
    }
}

/// Translates a token body into one regular expression. Returns the pattern
/// and the outermost lexical precedence found.
fn token_pattern(rule: &Rule, owner: &str) -> Result<(String, Option<i32>)> {
    fn walk(rule: &Rule, owner: &str, out: &mut String, prec: &mut Option<i32>) -> Result<()> {
        match rule {
            Rule::Blank => {}
            Rule::String(s) => out.push_str(&regex::escape(s)),
            Rule::Pattern(p) => {
                out.push_str("(?:");
                out.push_str(p);
                out.push(')');
            }
            Rule::Seq(rules) => {
                for r in rules {
                    walk(r, owner, out, prec)?;
                }
            }
            Rule::Choice(rules) => {
                out.push_str("(?:");
                for (i, r) in rules.iter().enumerate() {
                    if i > 0 {
                        out.push('|');
                    }
                    walk(r, owner, out, prec)?;
                }
                out.push(')');
            }
            Rule::Repeat(r) | Rule::Repeat1(r) => {
                out.push_str("(?:");
                walk(r, owner, out, prec)?;
                out.push_str(if matches!(rule, Rule::Repeat(_)) { ")*" } else { ")+" });
            }
            Rule::Prec(Prec::Plain(n) | Prec::Left(n) | Prec::Right(n), r) => {
                prec.get_or_insert(*n);
                walk(r, owner, out, prec)?;
            }
            Rule::Prec(Prec::Dynamic(_), r) | Rule::Token(r) => walk(r, owner, out, prec)?,
            Rule::Symbol(name) => bail!("token in {owner:?} refers to rule {name:?}"),
            Rule::Field(name, _) => bail!("token in {owner:?} has field {name:?}"),
            Rule::Alias { name, .. } => bail!("token in {owner:?} has alias {name:?}"),
        }
        Ok(())
    }
    let mut out = String::new();
    let mut prec = None;
    walk(rule, owner, &mut out, &mut prec)?;
    Ok((out, prec))
}

impl<'g> Builder<'g> {
    fn new(grammar: &'g Grammar) -> Result<Self> {
        check_name("grammar", &grammar.name)?;
        let mut builder = Self {
            grammar,
            terminals: vec![SymbolDef {
                name: "end".into(),
                kind: SymbolKind::Terminal,
                named: false,
                visible: false,
                extra: false,
                lex: None,
            }],
            literal_text: vec![None],
            anonymous: HashMap::new(),
            nonterminals: Vec::new(),
            aliases: Vec::new(),
            names: HashMap::new(),
            fields: Vec::new(),
            productions: Vec::new(),
            repeat_counts: HashMap::new(),
        };

        let Some((start, start_rule)) = grammar.rules.first() else {
            bail!("grammar {:?} has no rules", grammar.name);
        };
        if is_token_rule(start_rule) {
            bail!("start rule {start:?} must not be a token");
        }

        for (name, rule) in &grammar.rules {
            check_name("rule", name)?;
            let r = if is_token_rule(rule) {
                let (pattern, prec) = token_pattern(rule, name)?;
                check_pattern(&pattern, name)?;
                let literal = literal_of(rule);
                builder.terminals.push(SymbolDef {
                    name: name.clone(),
                    kind: SymbolKind::Terminal,
                    named: !is_hidden(name),
                    visible: !is_hidden(name),
                    extra: false,
                    lex: Some(LexRule {
                        pattern,
                        priority: lexical_priority(prec, literal.is_some()),
                        keyword: false,
                    }),
                });
                builder.literal_text.push(literal.map(String::from));
                Ref::Terminal(builder.terminals.len() - 1)
            } else {
                builder.nonterminals.push(SymbolDef {
                    name: name.clone(),
                    kind: SymbolKind::NonTerminal,
                    named: !is_hidden(name),
                    visible: !is_hidden(name),
                    extra: false,
                    lex: None,
                });
                Ref::NonTerminal(builder.nonterminals.len() - 1)
            };
            if builder.names.insert(name.clone(), r).is_some() {
                bail!("rule {name:?} is defined twice");
            }
        }

        for name in &grammar.externals {
            check_name("external", name)?;
            builder.terminals.push(SymbolDef {
                name: name.clone(),
                kind: SymbolKind::External,
                named: !is_hidden(name),
                visible: !is_hidden(name),
                extra: false,
                lex: None,
            });
            builder.literal_text.push(None);
            let r = Ref::Terminal(builder.terminals.len() - 1);
            if builder.names.insert(name.clone(), r).is_some() {
                bail!("external {name:?} clashes with a rule");
            }
        }
        Ok(builder)
    }

    fn run(mut self) -> Result<Prepared> {
        self.mark_extras()?;
        let word = self.word()?;

        let grammar = self.grammar;
        for (name, rule) in &grammar.rules {
            if let Some(&Ref::NonTerminal(lhs)) = self.names.get(name) {
                let alts = self
                    .expand(rule, name)
                    .with_context(|| format!("in rule {name:?}"))?;
                if alts.is_empty() {
                    bail!("rule {name:?} has no alternatives");
                }
                let start = lhs == 0;
                for alt in alts {
                    if alt.steps.is_empty() && !start {
                        bail!("rule {name:?} matches the empty string");
                    }
                    self.productions.push((lhs, alt));
                }
            }
        }

        if let Some(w) = word {
            self.mark_keywords(w)?;
        }
        Ok(self.finish(word))
    }

    fn mark_extras(&mut self) -> Result<()> {
        let grammar = self.grammar;
        let default = [Rule::Pattern(r"\s+".into())];
        let extras = if grammar.extras.is_empty() {
            &default[..]
        } else {
            &grammar.extras[..]
        };
        for (i, rule) in extras.iter().enumerate() {
            let idx = match rule {
                Rule::Symbol(name) => match self.names.get(name) {
                    Some(&Ref::Terminal(t)) => t,
                    Some(_) => bail!("extra {name:?} is not a token"),
                    None => bail!("extra {name:?} is not defined"),
                },
                _ => {
                    let name: String = format!("_extra{i}").into();
                    let (pattern, prec) = token_pattern(rule, &name)?;
                    check_pattern(&pattern, &name)?;
                    self.terminals.push(SymbolDef {
                        name,
                        kind: SymbolKind::Terminal,
                        named: false,
                        visible: false,
                        extra: false,
                        lex: Some(LexRule {
                            pattern,
                            priority: lexical_priority(prec, false),
                            keyword: false,
                        }),
                    });
                    self.literal_text.push(None);
                    self.terminals.len() - 1
                }
            };
            self.terminals[idx].extra = true;
        }
        Ok(())
    }

    fn word(&self) -> Result<Option<usize>> {
        let Some(name) = &self.grammar.word else {
            return Ok(None);
        };
        match self.names.get(name) {
            Some(&Ref::Terminal(t)) if self.terminals[t].lex.is_some() => Ok(Some(t)),
            _ => bail!("word token {name:?} is not a lexical token rule"),
        }
    }

    /// Literals that the word token also matches become keywords.
    fn mark_keywords(&mut self, word: usize) -> Result<()> {
        let Some(lex) = &self.terminals[word].lex else {
            return Ok(());
        };
        let re = Regex::new(&format!("^(?:{})$", lex.pattern))
            .context("word token pattern does not compile")?;
        for (i, text) in self.literal_text.iter().enumerate() {
            let Some(text) = text else { continue };
            if i != word && re.is_match(text) {
                if let Some(lex) = &mut self.terminals[i].lex {
                    lex.keyword = true;
                }
            }
        }
        Ok(())
    }

    fn field(&mut self, name: &str) -> Result<usize> {
        if let Some(i) = self.fields.iter().position(|f| f.as_str() == name) {
            return Ok(i);
        }
        check_name("field", name)?;
        self.fields.push(name.into());
        Ok(self.fields.len() - 1)
    }

    /// An anonymous terminal for an inline literal or pattern.
    fn anonymous_terminal(&mut self, rule: &Rule, owner: &str) -> Result<Ref> {
        let literal = literal_of(rule);
        let (pattern, prec) = token_pattern(rule, owner)?;
        if let Some(&t) = self.anonymous.get(&pattern) {
            return Ok(Ref::Terminal(t));
        }
        check_pattern(&pattern, owner)?;
        let name = literal.map_or_else(|| pattern.clone(), String::from);
        self.terminals.push(SymbolDef {
            name,
            kind: SymbolKind::Terminal,
            named: false,
            visible: literal.is_some(),
            extra: false,
            lex: Some(LexRule {
                pattern: pattern.clone(),
                priority: lexical_priority(prec, literal.is_some()),
                keyword: false,
            }),
        });
        self.literal_text.push(literal.map(String::from));
        let t = self.terminals.len() - 1;
        self.anonymous.insert(pattern, t);
        Ok(Ref::Terminal(t))
    }

    fn alias_symbol(&mut self, name: &str, named: bool) -> Ref {
        if named {
            if let Some(&r) = self.names.get(name) {
                return r;
            }
        } else if let Some(t) = self
            .literal_text
            .iter()
            .position(|l| l.as_deref() == Some(name))
            .filter(|&t| !self.terminals[t].named)
        {
            return Ref::Terminal(t);
        }
        if let Some(i) = self
            .aliases
            .iter()
            .position(|a| a.name.as_str() == name && a.named == named)
        {
            return Ref::Alias(i);
        }
        self.aliases.push(SymbolDef {
            name: name.into(),
            kind: SymbolKind::Alias,
            named,
            visible: true,
            extra: false,
            lex: None,
        });
        Ref::Alias(self.aliases.len() - 1)
    }

    fn expand(&mut self, rule: &Rule, owner: &str) -> Result<Vec<Alt>> {
        Ok(match rule {
            Rule::Blank => vec![Alt::default()],
            Rule::String(_) | Rule::Pattern(_) | Rule::Token(_) => {
                vec![Alt::single(self.anonymous_terminal(rule, owner)?)]
            }
            Rule::Symbol(name) => match self.names.get(name) {
                Some(&r) => vec![Alt::single(r)],
                None => bail!("undefined symbol {name:?}"),
            },
            Rule::Seq(rules) => {
                let mut acc = vec![Alt::default()];
                for r in rules {
                    let next = self.expand(r, owner)?;
                    if acc.len() * next.len() > MAX_ALTERNATIVES {
                        bail!("too many alternatives in {owner:?}");
                    }
                    acc = acc
                        .iter()
                        .flat_map(|a| next.iter().map(move |b| a.concat(b)))
                        .collect();
                }
                acc
            }
            Rule::Choice(rules) => {
                let mut acc = Vec::new();
                for r in rules {
                    acc.extend(self.expand(r, owner)?);
                }
                acc
            }
            Rule::Repeat(inner) => {
                let aux = self.repeat_rule(inner, owner)?;
                vec![Alt::single(aux), Alt::default()]
            }
            Rule::Repeat1(inner) => vec![Alt::single(self.repeat_rule(inner, owner)?)],
            Rule::Prec(prec, inner) => {
                let mut alts = self.expand(inner, owner)?;
                for alt in &mut alts {
                    match *prec {
                        Prec::Dynamic(n) => {
                            if alt.dynamic == 0 {
                                alt.dynamic = n;
                            }
                        }
                        Prec::Plain(n) => {
                            alt.prec.get_or_insert((n, Assoc::None));
                        }
                        Prec::Left(n) => {
                            alt.prec.get_or_insert((n, Assoc::Left));
                        }
                        Prec::Right(n) => {
                            alt.prec.get_or_insert((n, Assoc::Right));
                        }
                    }
                }
                alts
            }
            Rule::Field(name, inner) => {
                let field = self.field(name)?;
                let mut alts = self.expand(inner, owner)?;
                for step in alts.iter_mut().flat_map(|a| a.steps.iter_mut()) {
                    step.field.get_or_insert(field);
                }
                alts
            }
            Rule::Alias { name, named, rule } => {
                let mut alts = self.expand(rule, owner)?;
                let alias = self.alias_symbol(name, *named);
                for alt in &mut alts {
                    let [step] = &mut alt.steps[..] else {
                        bail!("alias {name:?} must wrap exactly one symbol");
                    };
                    if step.symbol != alias {
                        step.alias = Some(alias);
                    }
                }
                alts
            }
        })
    }

    /// `aux -> aux x | x` for every alternative `x` of `inner`.
    fn repeat_rule(&mut self, inner: &Rule, owner: &str) -> Result<Ref> {
        let count = self.repeat_counts.entry(owner.into()).or_insert(0);
        *count += 1;
        let name: String = format!("{owner}_repeat{count}").into();
        self.nonterminals.push(SymbolDef {
            name: name.clone(),
            kind: SymbolKind::NonTerminal,
            named: false,
            visible: false,
            extra: false,
            lex: None,
        });
        let lhs = self.nonterminals.len() - 1;
        let aux = Ref::NonTerminal(lhs);

        let alts: Vec<Alt> = self
            .expand(inner, owner)?
            .into_iter()
            .filter(|a| !a.steps.is_empty())
            .collect();
        if alts.is_empty() {
            bail!("{name:?} repeats a rule that only matches the empty string");
        }
        let head = Alt::single(aux);
        for alt in alts {
            self.productions.push((lhs, head.concat(&alt)));
            self.productions.push((lhs, alt));
        }
        Ok(aux)
    }

    fn finish(self, word: Option<usize>) -> Prepared {
        let terminal_count = self.terminals.len();
        let nonterminal_count = self.nonterminals.len();
        let index = |r: Ref| match r {
            Ref::Terminal(t) => t,
            Ref::NonTerminal(n) => terminal_count + n,
            Ref::Alias(a) => terminal_count + nonterminal_count + a,
        };
        let productions = self
            .productions
            .iter()
            .map(|(lhs, alt)| {
                let (precedence, assoc) = alt.prec.unwrap_or((0, Assoc::None));
                let mut fields = Vec::new();
                let mut aliases = Vec::new();
                for (pos, step) in alt.steps.iter().enumerate() {
                    if let Some(f) = step.field {
                        fields.push((pos as u16, f));
                    }
                    if let Some(a) = step.alias {
                        aliases.push((pos as u16, index(a)));
                    }
                }
                Production {
                    lhs: terminal_count + lhs,
                    rhs: alt.steps.iter().map(|s| index(s.symbol)).collect(),
                    fields,
                    aliases,
                    precedence,
                    assoc,
                    dynamic_precedence: alt.dynamic,
                }
            })
            .collect();

        let mut symbols = self.terminals;
        symbols.extend(self.nonterminals);
        symbols.extend(self.aliases);
        Prepared {
            name: self.grammar.name.clone(),
            symbols,
            terminal_count,
            nonterminal_count,
            fields: self.fields,
            productions,
            start: terminal_count,
            word,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::*;

    fn rhs_names(p: &Prepared, prod: &Production) -> Vec<std::string::String> {
        prod.rhs
            .iter()
            .map(|&s| p.symbol_name(s).to_string())
            .collect()
    }

    #[test]
    fn terminals_come_first() {
        let g = Grammar::new("t")
            .rule("source", seq([string("("), sym("num"), string(")")]))
            .rule("num", pattern("[0-9]+"));
        let p = prepare(&g).unwrap();
        let names: Vec<_> = p.symbols.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["end", "num", "_extra0", "(", ")", "source"]);
        assert_eq!(p.terminal_count, 5);
        assert_eq!(p.start, 5);
        assert!(p.symbols[2].extra);
        assert!(!p.symbols[2].visible);
        let lparen = p.symbols[3].lex.as_ref().unwrap();
        assert_eq!((lparen.pattern.as_str(), lparen.priority), (r"\(", 1));
        assert_eq!(p.symbols[1].lex.as_ref().unwrap().priority, 0);
    }

    #[test]
    fn choices_multiply_out() {
        let g = Grammar::new("t").rule(
            "s",
            seq([
                optional(string("a")),
                choice([string("b"), string("c")]),
            ]),
        );
        let p = prepare(&g).unwrap();
        let rhs: Vec<_> = p.productions.iter().map(|x| rhs_names(&p, x)).collect();
        assert_eq!(rhs, [vec!["a", "b"], vec!["a", "c"], vec!["b"], vec!["c"]]);
    }

    #[test]
    fn repeats_become_left_recursive_helpers() {
        let g = Grammar::new("t").rule("list", repeat(string("x")));
        let p = prepare(&g).unwrap();
        let aux = p
            .symbols
            .iter()
            .position(|s| s.name.as_str() == "list_repeat1")
            .unwrap();
        assert!(!p.symbols[aux].visible);
        let rules: Vec<_> = p
            .productions
            .iter()
            .map(|x| format!("{} -> {}", p.symbol_name(x.lhs), rhs_names(&p, x).join(" ")))
            .collect();
        assert_eq!(
            rules,
            [
                "list_repeat1 -> list_repeat1 x",
                "list_repeat1 -> x",
                "list -> list_repeat1",
                "list -> ",
            ]
        );
    }

    #[test]
    fn fields_aliases_and_precedence() {
        let g = Grammar::new("t")
            .rule(
                "e",
                choice([
                    prec_right(
                        3,
                        seq([
                            field("left", sym("e")),
                            field("op", alias(string("+"), "plus")),
                            field("right", sym("e")),
                        ]),
                    ),
                    prec_dynamic(2, sym("n")),
                ]),
            )
            .rule("n", pattern("[0-9]+"));
        let p = prepare(&g).unwrap();
        let fields: Vec<_> = p.fields.iter().map(|f| f.as_str()).collect();
        assert_eq!(fields, ["left", "op", "right"]);
        let bin = &p.productions[0];
        assert_eq!(bin.fields, [(0, 0), (1, 1), (2, 2)]);
        assert_eq!((bin.precedence, bin.assoc), (3, Assoc::Right));
        let plus = bin.aliases[0].1;
        assert_eq!(p.symbols[plus].kind, SymbolKind::Alias);
        assert!(p.symbols[plus].named);
        assert_eq!(p.productions[1].dynamic_precedence, 2);
    }

    #[test]
    fn keywords_are_literals_the_word_matches() {
        let g = Grammar::new("t")
            .rule(
                "s",
                seq([string("if"), sym("identifier"), string("+"), sym("_true")]),
            )
            .rule("identifier", pattern("[a-z]+"))
            .rule("_true", token(string("true")))
            .word("identifier");
        let p = prepare(&g).unwrap();
        let lex = |name: &str| {
            p.symbols
                .iter()
                .find(|s| s.name.as_str() == name)
                .and_then(|s| s.lex.clone())
                .unwrap()
        };
        assert!(lex("if").keyword);
        assert!(lex("_true").keyword);
        assert!(!lex("+").keyword);
        assert!(!lex("identifier").keyword);
        assert_eq!(p.word, p.symbols.iter().position(|s| s.name.as_str() == "identifier"));
    }

    #[test]
    fn rejects_bad_grammars() {
        let undefined = Grammar::new("t").rule("s", sym("missing"));
        assert!(prepare(&undefined).is_err());

        let empty = Grammar::new("t")
            .rule("s", sym("a"))
            .rule("a", optional(string("x")));
        assert!(prepare(&empty).is_err());

        let empty_token = Grammar::new("t")
            .rule("s", sym("a"))
            .rule("a", pattern("a*"));
        assert!(prepare(&empty_token).is_err());

        let bad_name = Grammar::new("t").rule("s-1", string("x"));
        assert!(prepare(&bad_name).is_err());

        let wide_alias = Grammar::new("t").rule("s", alias(seq([string("a"), string("b")]), "ab"));
        assert!(prepare(&wide_alias).is_err());
    }
}
