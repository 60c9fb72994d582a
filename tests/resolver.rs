mod common;

use common::{run_ok, static_errors};
use pretty_assertions::assert_eq;
use rstest::rstest;

#[rstest]
#[case("return 1;", "[line 1] Error at 'return': Can't return from top-level code.")]
#[case("return;", "[line 1] Error at 'return': Can't return from top-level code.")]
#[case(
    "class A { init() { return 1; } }",
    "[line 1] Error at 'return': Can't return a value from an initializer."
)]
#[case("print this;", "[line 1] Error at 'this': Can't use 'this' outside of a class.")]
#[case(
    "fun f() { return this; }",
    "[line 1] Error at 'this': Can't use 'this' outside of a class."
)]
#[case(
    "fun f() { super.m(); }",
    "[line 1] Error at 'super': Can't use 'super' outside of a class."
)]
#[case(
    "class A { m() { super.m(); } }",
    "[line 1] Error at 'super': Can't use 'super' in a class with no superclass."
)]
#[case(
    "{ let a = 1; let a = 2; }",
    "[line 1] Error at 'a': Already a variable with this name in this scope."
)]
#[case(
    "fun f(a, a) {}",
    "[line 1] Error at 'a': Already a variable with this name in this scope."
)]
#[case("class A expands A {}", "[line 1] Error at 'A': A class can't inherit from itself.")]
#[case(
    "{ let fresh = fresh; }",
    "[line 1] Error at 'fresh': Can't read local variable in its own initializer."
)]
fn test_static_rule(#[case] source: &str, #[case] expected: &str) {
    let errors = static_errors(source);
    assert_eq!(errors, vec![expected.to_string()]);
}

#[test]
fn test_every_resolution_error_is_reported() {
    let errors = static_errors("return 1;\nprint this;\n{ let a; let a; }");

    assert_eq!(
        errors,
        vec![
            "[line 1] Error at 'return': Can't return from top-level code.",
            "[line 2] Error at 'this': Can't use 'this' outside of a class.",
            "[line 3] Error at 'a': Already a variable with this name in this scope.",
        ]
    );
}

#[test]
fn test_bare_return_in_initializer_is_allowed() {
    let output = run_ok(
        "class A { init() { this.x = 1; return; } }
         print A().x;",
    );

    assert_eq!(output, "1\n");
}

#[test]
fn test_redeclaring_globals_is_allowed() {
    assert_eq!(run_ok("let a = 1; let a = 2; print a;"), "2\n");
}

#[test]
fn test_initializer_may_read_shadowed_outer_variable() {
    let output = run_ok(
        "let a = 1;
         {
           let a = a + 1;
           print a;
         }
         print a;",
    );

    assert_eq!(output, "2\n1\n");
}

#[test]
fn test_initializer_may_read_shadowed_local() {
    let output = run_ok(
        "{
           let a = \"outer\";
           {
             let a = a <> \" inner\";
             print a;
           }
         }",
    );

    assert_eq!(output, "outer inner\n");
}

#[test]
fn test_closures_bind_at_declaration() {
    let output = run_ok(
        "let a = \"global\";
         {
           fun show() { print a; }
           show();
           let a = \"block\";
           show();
         }",
    );

    assert_eq!(output, "global\nglobal\n");
}

#[test]
fn test_nothing_runs_when_resolution_fails() {
    // static_errors asserts no output was produced
    static_errors("print \"before\";\nreturn;");
}
