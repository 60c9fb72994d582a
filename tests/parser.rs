use lox_interpreter as lox;

use lox::ast::Stmt;
use lox::ast_printer::AstPrinter;
use lox::parser::Parser;
use lox::scanner::tokenize;
use pretty_assertions::assert_eq;
use rstest::rstest;

fn parse(source: &str) -> Result<Vec<Stmt>, Vec<String>> {
    let (tokens, lex_errors) = tokenize(source);
    assert!(lex_errors.is_empty(), "unexpected lex errors: {:?}", lex_errors);

    Parser::new(&tokens)
        .parse()
        .map_err(|errors| errors.iter().map(|e| e.to_string()).collect())
}

fn print(source: &str) -> String {
    match parse(source) {
        Ok(statements) => AstPrinter::print_program(&statements),
        Err(errors) => panic!("parse failed: {:?}", errors),
    }
}

#[rstest]
#[case("print 1 + 2 * 3;", "(print (+ 1 (* 2 3)))")]
#[case("print (1 + 2) * 3;", "(print (* (group (+ 1 2)) 3))")]
#[case("print 1 - 2 - 3;", "(print (- (- 1 2) 3))")]
#[case("let a = \"x\" <> 1;", "(let a (<> \"x\" 1))")]
#[case("let a;", "(let a)")]
#[case("print not true == false;", "(print (== (not true) false))")]
#[case("print -x < 2 != y >= 3;", "(print (!= (< (- x) 2) (>= y 3)))")]
#[case("if (a or b and c) print 1; else print 2;", "(if (or a (and b c)) (print 1) (print 2))")]
#[case("while (x) { x = x - 1; }", "(while x (block (; (= x (- x 1)))))")]
#[case("a = b = 3;", "(; (= a (= b 3)))")]
#[case("a.b.c = -x;", "(; (= (. (. a b) c) (- x)))")]
#[case("f(1, 2)(3);", "(; (call (call f 1 2) 3))")]
#[case("fun add(a, b) { return a + b; }", "(fun add (a b) (return (+ a b)))")]
#[case("fun noop() { return; }", "(fun noop () (return))")]
fn test_prints_syntax_tree(#[case] source: &str, #[case] expected: &str) {
    assert_eq!(print(source), expected);
}

#[test]
fn test_for_loop_is_lowered_to_while() {
    assert_eq!(
        print("for (let i = 0; i < 3; i = i + 1) print i;"),
        "(block (let i 0) (while (< i 3) (block (print i) (; (= i (+ i 1))))))"
    );
}

#[test]
fn test_empty_for_clauses_loop_forever() {
    assert_eq!(print("for (;;) print 1;"), "(while true (print 1))");
}

#[test]
fn test_class_declaration() {
    let source = "class B expands A {
        pub x = 1;
        y;
        pub get() { return this.x; }
        init(v) { super.init(v); }
    }";

    assert_eq!(
        print(source),
        "(class B (expands A) (field pub x 1) (field y) \
         (pub method get () (return (. this x))) \
         (method init (v) (; (call (super init) v))))"
    );
}

#[test]
fn test_one_line_per_statement() {
    assert_eq!(print("print 1;\nprint 2;"), "(print 1)\n(print 2)");
}

#[rstest]
#[case("1 = 2;", "[line 1] Error at '=': Invalid assignment target.")]
#[case("a + b = c;", "[line 1] Error at '=': Invalid assignment target.")]
#[case("print 1", "[line 1] Error at end: Expect ';' after value.")]
#[case("let 1 = 2;", "[line 1] Error at '1': Expect variable name.")]
#[case("print (1;", "[line 1] Error at ';': Expect ')' after expression.")]
#[case("class A { m() {} x; }", "[line 1] Error at 'x': Fields must be declared before methods.")]
#[case("class A expands { }", "[line 1] Error at '{': Expect superclass name.")]
#[case("class A { m() { super; } }", "[line 1] Error at ';': Expect '.' after 'super'.")]
#[case("print a.;", "[line 1] Error at ';': Expect property name after '.'.")]
fn test_reports_syntax_error(#[case] source: &str, #[case] expected: &str) {
    let errors = parse(source).expect_err("source should not parse");
    assert_eq!(errors[0], expected);
}

#[test]
fn test_recovers_and_reports_every_error() {
    let errors = parse("let = 1;\nprint ;\nprint 3;\nlet 4;").expect_err("should fail");

    assert_eq!(
        errors,
        vec![
            "[line 1] Error at '=': Expect variable name.",
            "[line 2] Error at ';': Expect expression.",
            "[line 4] Error at '4': Expect variable name.",
        ]
    );
}

#[test]
fn test_parameter_limit() {
    let params: Vec<String> = (0..256).map(|i| format!("p{}", i)).collect();
    let source = format!("fun f({}) {{}}", params.join(", "));

    let errors = parse(&source).expect_err("too many parameters");
    assert_eq!(
        errors[0],
        "[line 1] Error at 'p255': Can't have more than 255 parameters."
    );
}

#[test]
fn test_argument_limit() {
    let args: Vec<String> = (0..256).map(|i| i.to_string()).collect();
    let source = format!("f({});", args.join(", "));

    let errors = parse(&source).expect_err("too many arguments");
    assert_eq!(
        errors[0],
        "[line 1] Error at '255': Can't have more than 255 arguments."
    );
}

#[test]
fn test_exactly_255_parameters_is_fine() {
    let params: Vec<String> = (0..255).map(|i| format!("p{}", i)).collect();
    let source = format!("fun f({}) {{}}", params.join(", "));

    assert!(parse(&source).is_ok());
}
