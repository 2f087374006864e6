//! Grammar description consumed by the table compiler.
//!
//! A grammar is a list of named rules built from [`Rule`] combinators. The
//! first rule is the start rule. Rule names beginning with `_` produce hidden
//! nodes.
//!
//! ```
//! use sylva_gen::grammar::*;
//!
//! let g = Grammar::new("sum")
//!     .rule("source", repeat(sym("expr")))
//!     .rule("expr", choice([
//!         prec_left(1, seq([sym("expr"), string("+"), sym("expr")])),
//!         sym("num"),
//!     ]))
//!     .rule("num", pattern("[0-9]+"));
//! assert_eq!(g.start_rule(), Some("source"));
//! ```

use smartstring::alias::String;

/// How a precedence annotation takes part in conflict resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Prec {
    /// Static precedence without associativity.
    Plain(i32),
    /// Equal precedence resolves toward reducing.
    Left(i32),
    /// Equal precedence resolves toward shifting.
    Right(i32),
    /// Runtime preference between ambiguous parses.
    Dynamic(i32),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rule {
    Blank,
    /// A literal string.
    String(String),
    /// A regular expression in `regex-syntax` dialect.
    Pattern(String),
    /// A reference to another rule or external token.
    Symbol(String),
    Seq(Vec<Rule>),
    Choice(Vec<Rule>),
    Repeat(Box<Rule>),
    Repeat1(Box<Rule>),
    Prec(Prec, Box<Rule>),
    Field(String, Box<Rule>),
    Alias {
        name: String,
        named: bool,
        rule: Box<Rule>,
    },
    /// Collapses the inner rule into a single terminal.
    Token(Box<Rule>),
}

pub fn blank() -> Rule {
    Rule::Blank
}

pub fn string(text: &str) -> Rule {
    Rule::String(text.into())
}

pub fn pattern(regex: &str) -> Rule {
    Rule::Pattern(regex.into())
}

pub fn sym(name: &str) -> Rule {
    Rule::Symbol(name.into())
}

pub fn seq(rules: impl IntoIterator<Item = Rule>) -> Rule {
    Rule::Seq(rules.into_iter().collect())
}

pub fn choice(rules: impl IntoIterator<Item = Rule>) -> Rule {
    Rule::Choice(rules.into_iter().collect())
}

pub fn repeat(rule: Rule) -> Rule {
    Rule::Repeat(Box::new(rule))
}

pub fn repeat1(rule: Rule) -> Rule {
    Rule::Repeat1(Box::new(rule))
}

pub fn optional(rule: Rule) -> Rule {
    Rule::Choice(vec![rule, Rule::Blank])
}

pub fn prec(value: i32, rule: Rule) -> Rule {
    Rule::Prec(Prec::Plain(value), Box::new(rule))
}

pub fn prec_left(value: i32, rule: Rule) -> Rule {
    Rule::Prec(Prec::Left(value), Box::new(rule))
}

pub fn prec_right(value: i32, rule: Rule) -> Rule {
    Rule::Prec(Prec::Right(value), Box::new(rule))
}

pub fn prec_dynamic(value: i32, rule: Rule) -> Rule {
    Rule::Prec(Prec::Dynamic(value), Box::new(rule))
}

pub fn field(name: &str, rule: Rule) -> Rule {
    Rule::Field(name.into(), Box::new(rule))
}

/// Renames `rule` to the named node `name`.
pub fn alias(rule: Rule, name: &str) -> Rule {
    Rule::Alias {
        name: name.into(),
        named: true,
        rule: Box::new(rule),
    }
}

/// Renames `rule` to the anonymous node `text`.
pub fn alias_anonymous(rule: Rule, text: &str) -> Rule {
    Rule::Alias {
        name: text.into(),
        named: false,
        rule: Box::new(rule),
    }
}

pub fn token(rule: Rule) -> Rule {
    Rule::Token(Box::new(rule))
}

/// A complete grammar, built in the order rules are declared.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Grammar {
    pub name: String,
    pub rules: Vec<(String, Rule)>,
    /// Tokens allowed anywhere. When empty, whitespace is used.
    pub extras: Vec<Rule>,
    /// Identifier-like token that keywords are checked against.
    pub word: Option<String>,
    /// Tokens produced by an external scanner, in declaration order.
    pub externals: Vec<String>,
}

impl Grammar {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn rule(mut self, name: &str, rule: Rule) -> Self {
        self.rules.push((name.into(), rule));
        self
    }

    pub fn extra(mut self, rule: Rule) -> Self {
        self.extras.push(rule);
        self
    }

    pub fn word(mut self, name: &str) -> Self {
        self.word = Some(name.into());
        self
    }

    pub fn external(mut self, name: &str) -> Self {
        self.externals.push(name.into());
        self
    }

    pub fn start_rule(&self) -> Option<&str> {
        self.rules.first().map(|(name, _)| name.as_str())
    }

    pub fn find_rule(&self, name: &str) -> Option<&Rule> {
        self.rules
            .iter()
            .find(|(n, _)| n.as_str() == name)
            .map(|(_, r)| r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_keeps_declaration_order() {
        let g = Grammar::new("g")
            .rule("b", sym("a"))
            .rule("a", string("x"))
            .extra(pattern(r"\s+"))
            .word("a")
            .external("indent");
        assert_eq!(g.start_rule(), Some("b"));
        assert_eq!(g.find_rule("a"), Some(&Rule::String("x".into())));
        assert!(g.find_rule("c").is_none());
        assert_eq!(g.extras.len(), 1);
        assert_eq!(g.word.as_deref(), Some("a"));
        assert_eq!(g.externals, vec![String::from("indent")]);
    }

    #[test]
    fn optional_is_a_choice_with_blank() {
        assert_eq!(
            optional(sym("x")),
            Rule::Choice(vec![Rule::Symbol("x".into()), Rule::Blank])
        );
        assert!(matches!(
            alias_anonymous(string("!"), "op"),
            Rule::Alias { named: false, .. }
        ));
    }
}
