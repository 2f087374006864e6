use sylva::{LineIndex, Node, Point};
use sylva_var2::{language, parse};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const IDENT: &str = "(expression place: (identifier))";
const DEC: &str = "(expression literal: (dec))";

fn bin(left: &str, right: &str) -> String {
    format!("(expression binary: (binary_expression expr: {left} binOp: (bin_op) expr: {right}))")
}

fn statement(expr: &str) -> String {
    format!("(source statement: (statement expr: {expr}))")
}

fn sexp(source: &str) -> String {
    let tree = parse(source.as_bytes()).unwrap();
    let root = tree.root_node();
    assert_eq!(root.byte_range(), 0..source.len());
    root.to_sexp()
}

fn named_kinds(node: Node<'_>, out: &mut Vec<String>) {
    for child in node.named_children() {
        out.push(child.kind().to_string());
        named_kinds(child, out);
    }
}

#[test]
fn type_references() {
    init_logger();
    assert_eq!(
        sexp("int array [,,] of string Point"),
        "(source typeRef: (typeRef builtin: (int)) \
         typeRef: (typeRef array: (typeRef builtin: (string))) \
         typeRef: (typeRef custom: (identifier)))"
    );
}

#[test]
fn keywords_need_a_word_boundary() {
    init_logger();
    assert_eq!(sexp("integer"), "(source typeRef: (typeRef custom: (identifier)))");
    assert_eq!(sexp("iffy := then_x;"), statement(&bin(IDENT, IDENT)));
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    init_logger();
    let expected = statement(&bin(IDENT, &bin(DEC, &bin(DEC, DEC))));
    assert_eq!(sexp("x := 1 + 2 * 3;"), expected);

    let expected = statement(&bin(&bin(DEC, DEC), DEC));
    assert_eq!(sexp("1 * 2 + 3;"), expected);
}

#[test]
fn binary_operators_group_to_the_right() {
    init_logger();
    assert_eq!(sexp("a - b - c;"), statement(&bin(IDENT, &bin(IDENT, IDENT))));
    assert_eq!(sexp("a := b := c;"), statement(&bin(IDENT, &bin(IDENT, IDENT))));
}

#[test]
fn unary_binds_tighter_than_binary() {
    init_logger();
    let unary = format!("(expression unary: (unary_expression unOp: (un_op) expr: {IDENT}))");
    assert_eq!(sexp("!a + b;"), statement(&bin(&unary, IDENT)));
}

#[test]
fn calls_and_indexers() {
    init_logger();
    let call = format!(
        "(expression call: (call_expression expr: {IDENT} listExpr: (list_expr expr: {DEC} expr: {IDENT})))"
    );
    let indexer = format!("(expression indexer: (indexer expr: {call} listExpr: (list_expr expr: {DEC})))");
    assert_eq!(sexp("f(1, x)[0];"), statement(&indexer));
}

#[test]
fn dangling_else_goes_to_the_inner_if() {
    init_logger();
    let source = b"if a then if b then c; else d;";
    let tree = parse(source).unwrap();
    let root = tree.root_node();
    assert!(!root.has_error());

    let outer = root
        .named_child(0)
        .and_then(|s| s.child_by_field_name("if"))
        .unwrap();
    assert_eq!(outer.kind(), "if_statement");
    assert_eq!(outer.children_by_field_name("statement").count(), 1);

    let inner = outer
        .child_by_field_name("statement")
        .and_then(|s| s.child_by_field_name("if"))
        .unwrap();
    assert_eq!(inner.children_by_field_name("statement").count(), 2);
    assert_eq!(inner.byte_range(), 10..source.len());
}

#[test]
fn structured_statements() {
    init_logger();
    let source = "begin\n  repeat x := x + 1; until x > 10;\n  while y do break;\nend;";
    let tree = parse(source.as_bytes()).unwrap();
    let root = tree.root_node();
    assert!(!root.has_error());

    let mut kinds = Vec::new();
    named_kinds(root, &mut kinds);
    for kind in ["block_content", "do_content", "while_content", "break"] {
        assert!(kinds.iter().any(|k| k == kind), "{kind} missing from {kinds:?}");
    }

    let block = root
        .named_child(0)
        .and_then(|s| s.child_by_field_name("block"))
        .unwrap();
    assert_eq!(block.children_by_field_name("statement").count(), 2);

    let index = LineIndex::new(source.as_bytes());
    let loop_stmt = block.child_by_field_name("statement").unwrap();
    assert_eq!(loop_stmt.start_point(&index), Point { row: 1, column: 2 });
}

#[test]
fn literals() {
    init_logger();
    let source = r#"s := "a\"b" + 'c' + 0x1F + 0b101 + 42 + true;"#;
    let tree = parse(source.as_bytes()).unwrap();
    assert!(!tree.root_node().has_error());

    let mut kinds = Vec::new();
    named_kinds(tree.root_node(), &mut kinds);
    for kind in ["str", "char", "hex", "bits", "dec", "bool"] {
        assert!(kinds.iter().any(|k| k == kind), "{kind} missing from {kinds:?}");
    }
    let text = tree
        .root_node()
        .descendant_for_byte_range(5, 11)
        .and_then(|n| n.utf8_text(source.as_bytes()).ok());
    assert_eq!(text, Some(r#""a\"b""#));
}

#[test]
fn identifier_then_parenthesis_is_ambiguous() {
    init_logger();
    // Either a type reference followed by `(1);` or a call statement.
    let tree = parse(b"foo (1);").unwrap();
    let root = tree.root_node();
    assert!(!root.has_error());
    assert!(matches!(root.named_child_count(), 1 | 2));
    assert_eq!(root.byte_range(), 0..8);
}

#[test]
fn errors_stay_inside_a_complete_tree() {
    init_logger();
    for source in [
        "x := (1 + ;",
        "begin x := 1;",
        "if then else",
        "array [ of",
        ")))",
        "x := 'ab';",
        "\u{1F600} := 1;",
    ] {
        let tree = parse(source.as_bytes()).unwrap();
        let root = tree.root_node();
        assert_eq!(root.byte_range(), 0..source.len(), "{source:?}");
        assert!(root.has_error(), "{source:?} parsed as {}", root.to_sexp());
    }
}

#[test]
fn missing_semicolon_is_reported() {
    init_logger();
    let tree = parse(b"begin x := 1 end;").unwrap();
    let root = tree.root_node();
    assert!(root.has_error());
    assert_eq!(root.byte_range(), 0..17);
}

#[test]
fn print_lists_named_nodes_with_positions() {
    init_logger();
    let source = b"int\nx;";
    let tree = parse(source).unwrap();
    let listing = tree.print(source, false);
    assert!(listing.starts_with("(source [0, 0] - [1, 2]"));
    assert!(listing.contains("typeRef: (typeRef [0, 0] - [0, 3]"));
    assert!(listing.contains("(identifier [1, 0] - [1, 1]"));
}

#[test]
fn parsing_is_deterministic_and_shareable() {
    init_logger();
    let source = b"begin a := f(b, c[1]) * 2; end; ulong";
    let first = parse(source).unwrap();
    std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| s.spawn(|| parse(source).unwrap()))
            .collect();
        for h in handles {
            let tree = h.join().unwrap();
            assert!(tree.same_structure(&first));
            assert!(tree.language().ptr_eq(language()));
        }
    });
}
