//! Hand-built tables used by the unit tests.

use crate::language::{
    FieldId, LanguageDef, LexRule, ParseAction, ProductionDef, ProductionId, StateDef, StateId,
    Symbol, SymbolDef, SymbolKind,
};

fn end() -> SymbolDef {
    SymbolDef {
        name: "end".into(),
        kind: SymbolKind::Terminal,
        named: false,
        visible: false,
        extra: false,
        lex: None,
    }
}

fn literal(name: &str, pattern: &str) -> SymbolDef {
    SymbolDef {
        name: name.into(),
        kind: SymbolKind::Terminal,
        named: false,
        visible: true,
        extra: false,
        lex: Some(LexRule {
            pattern: pattern.into(),
            priority: 1,
            keyword: false,
        }),
    }
}

fn token(name: &str, pattern: &str) -> SymbolDef {
    SymbolDef {
        name: name.into(),
        kind: SymbolKind::Terminal,
        named: true,
        visible: true,
        extra: false,
        lex: Some(LexRule {
            pattern: pattern.into(),
            priority: 0,
            keyword: false,
        }),
    }
}

fn whitespace() -> SymbolDef {
    SymbolDef {
        visible: false,
        extra: true,
        ..token("_ws", r"\s+")
    }
}

fn rule(name: &str) -> SymbolDef {
    SymbolDef {
        name: name.into(),
        kind: SymbolKind::NonTerminal,
        named: true,
        visible: true,
        extra: false,
        lex: None,
    }
}

fn production(lhs: u16, rhs_len: u16) -> ProductionDef {
    ProductionDef {
        lhs: Symbol(lhs),
        rhs_len,
        precedence: 0,
        dynamic_precedence: 0,
        fields: Vec::new(),
        aliases: Vec::new(),
    }
}

fn shift(s: u16) -> ParseAction {
    ParseAction::Shift(StateId(s))
}

fn reduce(p: u16) -> ParseAction {
    ParseAction::Reduce(ProductionId(p))
}

/// `source → "(" expr ")"`, `expr → dec`, whitespace as a hidden extra.
///
/// Symbols: 0 end, 1 `(`, 2 `)`, 3 dec, 4 _ws, 5 expr, 6 source.
pub(crate) fn parens() -> LanguageDef {
    LanguageDef {
        name: "parens".into(),
        symbols: vec![
            end(),
            literal("(", r"\("),
            literal(")", r"\)"),
            token("dec", "[0-9]+"),
            whitespace(),
            rule("expr"),
            rule("source"),
        ],
        fields: vec!["inner".into()],
        productions: vec![
            ProductionDef {
                fields: vec![(1, FieldId(1))],
                ..production(6, 3)
            },
            production(5, 1),
        ],
        states: vec![
            StateDef {
                actions: vec![(Symbol(1), vec![shift(2)])],
                gotos: vec![(Symbol(6), StateId(1))],
            },
            StateDef {
                actions: vec![(Symbol(0), vec![ParseAction::Accept])],
                gotos: vec![],
            },
            StateDef {
                actions: vec![(Symbol(3), vec![shift(4)])],
                gotos: vec![(Symbol(5), StateId(3))],
            },
            StateDef {
                actions: vec![(Symbol(2), vec![shift(5)])],
                gotos: vec![],
            },
            StateDef {
                actions: vec![(Symbol(2), vec![reduce(1)])],
                gotos: vec![],
            },
            StateDef {
                actions: vec![(Symbol(0), vec![reduce(0)])],
                gotos: vec![],
            },
        ],
        start_symbol: Symbol(6),
        word_token: None,
    }
}

/// `e → e "+" e | num` with the conflict on `+` left in the table.
///
/// Symbols: 0 end, 1 `+`, 2 num, 3 _ws, 4 e. Production 0 is the sum.
pub(crate) fn ambiguous_sum() -> LanguageDef {
    LanguageDef {
        name: "sum".into(),
        symbols: vec![
            end(),
            literal("+", r"\+"),
            token("num", "[0-9]+"),
            whitespace(),
            rule("e"),
        ],
        fields: vec![],
        productions: vec![production(4, 3), production(4, 1)],
        states: vec![
            StateDef {
                actions: vec![(Symbol(2), vec![shift(2)])],
                gotos: vec![(Symbol(4), StateId(1))],
            },
            StateDef {
                actions: vec![
                    (Symbol(0), vec![ParseAction::Accept]),
                    (Symbol(1), vec![shift(3)]),
                ],
                gotos: vec![],
            },
            StateDef {
                actions: vec![(Symbol(0), vec![reduce(1)]), (Symbol(1), vec![reduce(1)])],
                gotos: vec![],
            },
            StateDef {
                actions: vec![(Symbol(2), vec![shift(2)])],
                gotos: vec![(Symbol(4), StateId(4))],
            },
            StateDef {
                actions: vec![
                    (Symbol(0), vec![reduce(0)]),
                    (Symbol(1), vec![shift(3), reduce(0)]),
                ],
                gotos: vec![],
            },
        ],
        start_symbol: Symbol(4),
        word_token: None,
    }
}

/// `stmt → "if" identifier` with a word token and a visible comment extra.
///
/// Symbols: 0 end, 1 `if`, 2 identifier, 3 _ws, 4 comment, 5 stmt.
pub(crate) fn keywords() -> LanguageDef {
    LanguageDef {
        name: "keywords".into(),
        symbols: vec![
            end(),
            SymbolDef {
                lex: Some(LexRule {
                    pattern: "if".into(),
                    priority: 1,
                    keyword: true,
                }),
                ..literal("if", "if")
            },
            token("identifier", "[a-z]+"),
            whitespace(),
            SymbolDef {
                extra: true,
                ..token("comment", "#[^\n]*")
            },
            rule("stmt"),
        ],
        fields: vec![],
        productions: vec![production(5, 2)],
        states: vec![
            StateDef {
                actions: vec![(Symbol(1), vec![shift(2)])],
                gotos: vec![(Symbol(5), StateId(1))],
            },
            StateDef {
                actions: vec![(Symbol(0), vec![ParseAction::Accept])],
                gotos: vec![],
            },
            StateDef {
                actions: vec![(Symbol(2), vec![shift(3)])],
                gotos: vec![],
            },
            StateDef {
                actions: vec![(Symbol(0), vec![reduce(0)])],
                gotos: vec![],
            },
        ],
        start_symbol: Symbol(5),
        word_token: Some(Symbol(2)),
    }
}
