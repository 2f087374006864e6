//! The var2 teaching language.
//!
//! Compiled by `build.rs`; kept in plain Rust so the grammar can be read and
//! tested like any other module.

use sylva_gen::Grammar;
use sylva_gen::grammar::*;

const ASSIGNMENT: i32 = -2;
const LOGICAL_OR: i32 = 1;
const LOGICAL_AND: i32 = 2;
const INCLUSIVE_OR: i32 = 3;
const EXCLUSIVE_OR: i32 = 4;
const BITWISE_AND: i32 = 5;
const EQUAL: i32 = 6;
const RELATIONAL: i32 = 7;
const SHIFT: i32 = 9;
const ADD: i32 = 10;
const MULTIPLY: i32 = 11;
const UNARY: i32 = 14;
const CALL: i32 = 15;
const SUBSCRIPT: i32 = 17;

const BINARY_OPERATORS: [(&str, i32); 19] = [
    (":=", ASSIGNMENT),
    ("+", ADD),
    ("-", ADD),
    ("*", MULTIPLY),
    ("/", MULTIPLY),
    ("%", MULTIPLY),
    ("||", LOGICAL_OR),
    ("&&", LOGICAL_AND),
    ("|", INCLUSIVE_OR),
    ("^", EXCLUSIVE_OR),
    ("&", BITWISE_AND),
    ("=", EQUAL),
    ("!=", EQUAL),
    (">", RELATIONAL),
    (">=", RELATIONAL),
    ("<=", RELATIONAL),
    ("<", RELATIONAL),
    ("<<", SHIFT),
    (">>", SHIFT),
];

const BUILTIN_TYPES: [&str; 8] = ["bool", "byte", "int", "uint", "long", "ulong", "char", "string"];

pub fn grammar() -> Grammar {
    Grammar::new("var2")
        .rule(
            "source",
            repeat(choice([
                field("typeRef", sym("typeRef")),
                field("statement", sym("statement")),
            ])),
        )
        .rule(
            "typeRef",
            choice([
                field(
                    "builtin",
                    choice(BUILTIN_TYPES.map(|t| alias(string(t), t))),
                ),
                field("custom", sym("identifier")),
                field(
                    "array",
                    seq([
                        string("array"),
                        string("["),
                        repeat(string(",")),
                        string("]"),
                        string("of"),
                        sym("typeRef"),
                    ]),
                ),
            ]),
        )
        .rule(
            "statement",
            choice([
                field("if", sym("if_statement")),
                field("block", sym("block_content")),
                field("while", sym("while_content")),
                field("do", sym("do_content")),
                field("break", seq([alias(string("break"), "break"), string(";")])),
                field("expr", seq([sym("expression"), string(";")])),
            ]),
        )
        .rule(
            "do_content",
            seq([
                string("repeat"),
                field("statement", sym("statement")),
                choice([string("while"), string("until")]),
                field("expr", sym("expression")),
                string(";"),
            ]),
        )
        .rule(
            "while_content",
            seq([
                string("while"),
                field("expr", sym("expression")),
                string("do"),
                field("statement", sym("statement")),
            ]),
        )
        .rule(
            "block_content",
            seq([
                string("begin"),
                repeat(field("statement", sym("statement"))),
                string("end"),
                string(";"),
            ]),
        )
        .rule(
            "if_statement",
            prec_right(
                0,
                seq([
                    string("if"),
                    field("expr", sym("expression")),
                    string("then"),
                    field("statement", sym("statement")),
                    optional(seq([string("else"), field("statement", sym("statement"))])),
                ]),
            ),
        )
        .rule(
            "expression",
            choice([
                field("unary", sym("unary_expression")),
                field("binary", sym("binary_expression")),
                field("braces", seq([string("("), sym("expression"), string(")")])),
                field("call", sym("call_expression")),
                field("indexer", sym("indexer")),
                field("place", sym("identifier")),
                field(
                    "literal",
                    choice(["bool", "str", "char", "hex", "bits", "dec"].map(sym)),
                ),
            ]),
        )
        .rule(
            "indexer",
            prec(
                SUBSCRIPT,
                seq([
                    field("expr", sym("expression")),
                    string("["),
                    field("listExpr", sym("list_expr")),
                    string("]"),
                ]),
            ),
        )
        .rule(
            "call_expression",
            prec(
                CALL,
                seq([
                    field("expr", sym("expression")),
                    string("("),
                    field("listExpr", sym("list_expr")),
                    string(")"),
                ]),
            ),
        )
        .rule(
            "list_expr",
            seq([
                field("expr", sym("expression")),
                repeat(seq([string(","), field("expr", sym("expression"))])),
            ]),
        )
        .rule(
            "unary_expression",
            prec_left(
                UNARY,
                seq([
                    field("unOp", alias(choice([string("!"), string("~")]), "un_op")),
                    field("expr", sym("expression")),
                ]),
            ),
        )
        .rule(
            "binary_expression",
            choice(BINARY_OPERATORS.map(|(op, p)| {
                prec_right(
                    p,
                    seq([
                        field("expr", sym("expression")),
                        field("binOp", alias(string(op), "bin_op")),
                        field("expr", sym("expression")),
                    ]),
                )
            })),
        )
        .rule("identifier", pattern("[a-zA-Z_][a-zA-Z_0-9]*"))
        .rule("str", pattern(r#""[^"\\]*(?:\\.[^"\\]*)*""#))
        .rule("char", pattern("'[^']'"))
        .rule("hex", pattern("0[xX][0-9A-Fa-f]+"))
        .rule("bits", pattern("0[bB][01]+"))
        .rule("dec", pattern("[0-9]+"))
        .rule("_true", token(string("true")))
        .rule("_false", token(string("false")))
        .rule("bool", choice([sym("_true"), sym("_false")]))
        .word("identifier")
}
