mod common;

use common::{capturing_interpreter, run_capture, run_ok, run_runtime_error};
use lox_interpreter::error::LoxError;
use lox_interpreter::interpreter::MAX_CALL_DEPTH;
use lox_interpreter::runner::{self, RunError};
use lox_interpreter::value::Value;
use pretty_assertions::assert_eq;
use rstest::rstest;

// ───────────────────────────── expressions ─────────────────────────────

#[rstest]
#[case("print 3.0;", "3")]
#[case("print 12.5;", "12.5")]
#[case("print 0.1;", "0.1")]
#[case("print -4;", "-4")]
#[case("print 7 / 2;", "3.5")]
#[case("print 1 / 0;", "inf")]
#[case("print 2 * 3 - 4 / 2;", "4")]
#[case("print 1 < 2;", "true")]
#[case("print 2 <= 1;", "false")]
#[case("print \"a\" == \"a\";", "true")]
#[case("print nil == nil;", "true")]
#[case("print nil == false;", "false")]
#[case("print 0 == \"0\";", "false")]
#[case("print 1 != 2;", "true")]
#[case("print \"hi\" <> \"!\";", "hi!")]
#[case("print 1 <> 2;", "12")]
#[case("print \"n=\" <> 2.5;", "n=2.5")]
#[case("print 3 <> \"rd\";", "3rd")]
#[case("print not 0;", "false")]
#[case("print not \"\";", "false")]
#[case("print not nil;", "true")]
#[case("print nil or \"x\";", "x")]
#[case("print 1 and 2;", "2")]
#[case("print false and undefined_name;", "false")]
#[case("print true or undefined_name;", "true")]
#[case("let a; print a = 3;", "3")]
#[case("let a; print a;", "nil")]
fn test_prints(#[case] source: &str, #[case] expected: &str) {
    assert_eq!(run_ok(source), format!("{}\n", expected));
}

#[rstest]
#[case("print \"a\" + \"b\";", "Operands must be numbers; use '<>' to concatenate.")]
#[case("print 1 - \"b\";", "Operands must be numbers.")]
#[case("print nil < 1;", "Operands must be numbers.")]
#[case("print -\"x\";", "Operand must be a number, not string.")]
#[case("print \"x\" <> nil;", "Operands of '<>' must be strings or numbers.")]
#[case("print true <> 1;", "Operands of '<>' must be strings or numbers.")]
#[case("print y;", "Undefined variable 'y'.")]
#[case("y = 1;", "Undefined variable 'y'.")]
fn test_runtime_type_errors(#[case] source: &str, #[case] expected: &str) {
    let (_, error) = run_runtime_error(source);
    assert_eq!(error.message(), expected);
}

#[test]
fn test_truthiness_in_conditions() {
    let output = run_ok(
        "if (0) print \"zero\";
         if (\"\") print \"empty\";
         if (nil) print \"nil\"; else print \"no nil\";
         if (false) print \"false\"; else print \"no false\";",
    );

    assert_eq!(output, "zero\nempty\nno nil\nno false\n");
}

#[test]
fn test_runtime_error_stops_the_program() {
    let (output, error) = run_runtime_error("print 1;\nprint nil - 1;\nprint 2;");

    assert_eq!(output, "1\n");
    assert_eq!(error.line(), Some(2));
    assert_eq!(error.to_string(), "[line 2] Runtime error: Operands must be numbers.");
}

// ─────────────────────────── scopes and loops ──────────────────────────

#[test]
fn test_nested_shadowing() {
    assert_eq!(
        run_ok("let a = 1; { let a = a + 1; print a; } print a;"),
        "2\n1\n"
    );
}

#[test]
fn test_block_scoping() {
    let output = run_ok(
        "let a = \"outer\";
         {
           let a = \"inner\";
           print a;
         }
         print a;",
    );

    assert_eq!(output, "inner\nouter\n");
}

#[test]
fn test_loops() {
    let output = run_ok(
        "let sum = 0;
         for (let i = 1; i <= 4; i = i + 1) sum = sum + i;
         print sum;
         let n = 3;
         while (n > 0) { print n; n = n - 1; }",
    );

    assert_eq!(output, "10\n3\n2\n1\n");
}

#[test]
fn test_for_loop_variable_is_scoped_to_the_loop() {
    let (_, error) = run_runtime_error("for (let i = 0; i < 1; i = i + 1) {} print i;");
    assert_eq!(error.message(), "Undefined variable 'i'.");
}

// ────────────────────────────── functions ──────────────────────────────

#[test]
fn test_function_without_return_yields_nil() {
    assert_eq!(run_ok("fun f() { 1 + 1; } print f();"), "nil\n");
}

#[test]
fn test_recursion() {
    let output = run_ok(
        "fun fib(n) {
           if (n < 2) return n;
           return fib(n - 1) + fib(n - 2);
         }
         print fib(15);",
    );

    assert_eq!(output, "610\n");
}

#[test]
fn test_closures_share_their_scope() {
    let output = run_ok(
        "fun make_counter() {
           let count = 0;
           fun increment() {
             count = count + 1;
             return count;
           }
           return increment;
         }
         let first = make_counter();
         let second = make_counter();
         print first();
         print first();
         print second();",
    );

    assert_eq!(output, "1\n2\n1\n");
}

#[test]
fn test_callable_printing_and_identity() {
    let output = run_ok(
        "fun f() {}
         class A { pub m() {} }
         print f;
         print A;
         print A();
         print A().m;
         print f == f;
         let a = A();
         print a == a;
         print A() == A();",
    );

    assert_eq!(
        output,
        "<fn f>\n<class A>\n<A instance>\n<fn m>\ntrue\ntrue\nfalse\n"
    );
}

#[test]
fn test_calling_a_non_callable() {
    let (output, error) = run_runtime_error(
        "fun side() { print \"side effect\"; return 1; }
         let x = 1;
         x(side());",
    );

    assert_eq!(output, "");
    assert!(error.message().contains("not callable"), "{}", error);
    assert_eq!(
        error.message(),
        "Value of type number is not callable; only functions and classes can be called."
    );
}

#[rstest]
#[case("fun f(a) {} f();", "Expected 1 arguments but got 0.")]
#[case("fun f() {} f(1, 2);", "Expected 0 arguments but got 2.")]
#[case("class A { init(a, b) {} } A(1);", "Expected 2 arguments but got 1.")]
#[case("class A {} A(1);", "Expected 0 arguments but got 1.")]
fn test_arity_is_checked(#[case] source: &str, #[case] expected: &str) {
    let (_, error) = run_runtime_error(source);
    assert_eq!(error.message(), expected);
}

#[test]
fn test_runtime_error_carries_call_trace() {
    let (_, error) = run_runtime_error(
        "fun inner() {
           return nil - 1;
         }
         fun outer() { inner(); }
         outer();",
    );

    assert_eq!(error.line(), Some(2));
    match error {
        LoxError::Runtime { trace, .. } => assert_eq!(
            trace,
            vec!["[line 4] in inner()".to_string(), "[line 5] in outer()".to_string()]
        ),
        other => panic!("expected a runtime error, got {:?}", other),
    }
}

#[test]
fn test_unbounded_recursion_is_a_runtime_error() {
    let handle = std::thread::Builder::new()
        .stack_size(256 * 1024 * 1024)
        .spawn(|| {
            let (_, error) = run_runtime_error("fun r() { r(); }\nr();");
            let frames = match &error {
                LoxError::Runtime { trace, .. } => trace.len(),
                _ => 0,
            };
            (error.message(), frames)
        })
        .expect("spawn interpreter thread");

    let (message, frames) = handle.join().expect("interpreter thread panicked");

    assert_eq!(message, "Stack overflow.");
    assert_eq!(frames, MAX_CALL_DEPTH);
}

#[test]
fn test_unbounded_construction_is_a_runtime_error() {
    let handle = std::thread::Builder::new()
        .stack_size(256 * 1024 * 1024)
        .spawn(|| {
            let (_, error) = run_runtime_error("class A { x = A(); }\nA();");
            let frames = match &error {
                LoxError::Runtime { trace, .. } => trace.len(),
                _ => 0,
            };
            (error.message(), error.line(), frames)
        })
        .expect("spawn interpreter thread");

    let (message, line, frames) = handle.join().expect("interpreter thread panicked");

    assert_eq!(message, "Stack overflow.");
    assert_eq!(line, Some(1));
    assert_eq!(frames, MAX_CALL_DEPTH);
}

#[test]
fn test_session_survives_unbounded_construction() {
    let handle = std::thread::Builder::new()
        .stack_size(256 * 1024 * 1024)
        .spawn(|| {
            let (mut interpreter, buffer) = capturing_interpreter();

            let overflowed = matches!(
                runner::run_line("class A { x = A(); } A();", &mut interpreter),
                Err(RunError::Runtime(_))
            );
            let recovered = runner::run_line("print \"still here\";", &mut interpreter).is_ok();

            (overflowed, recovered, buffer.contents())
        })
        .expect("spawn interpreter thread");

    let (overflowed, recovered, output) = handle.join().expect("interpreter thread panicked");

    assert!(overflowed);
    assert!(recovered);
    assert_eq!(output, "still here\n");
}

// ──────────────────────────────── classes ──────────────────────────────

#[test]
fn test_inherited_fields_and_methods() {
    assert_eq!(
        run_ok(
            "class A { x = 1; f() { return this.x; } }
             class B expands A { }
             let b = B();
             print b.f();"
        ),
        "1\n"
    );
}

#[test]
fn test_public_method_with_concatenation() {
    assert_eq!(
        run_ok("class A { pub greet() { return \"hi\" <> \"!\"; } } print A().greet();"),
        "hi!\n"
    );
}

#[test]
fn test_initializer_returns_the_instance() {
    assert_eq!(
        run_ok("class A { init() { return; } } print A();"),
        "<A instance>\n"
    );

    assert_eq!(
        run_ok(
            "class A { pub init() { this.n = 1; } }
             let a = A();
             print a.init() == a;"
        ),
        "true\n"
    );
}

#[test]
fn test_initializer_receives_arguments() {
    let output = run_ok(
        "class Point {
           pub x;
           pub y;
           init(x, y) {
             this.x = x;
             this.y = y;
           }
         }
         let p = Point(1, 2);
         print p.x <> \",\" <> p.y;",
    );

    assert_eq!(output, "1,2\n");
}

#[test]
fn test_field_defaults_run_superclass_first() {
    let output = run_ok(
        "class A { pub x = 1; pub y = \"a\"; pub z; }
         class B expands A { pub x = 2; pub w = this.x + 10; }
         let b = B();
         print b.x;
         print b.y;
         print b.z;
         print b.w;",
    );

    assert_eq!(output, "2\na\nnil\n12\n");
}

#[test]
fn test_undeclared_fields_can_be_added() {
    let output = run_ok(
        "class A {}
         let a = A();
         a.extra = 3;
         print a.extra;
         a.extra = a.extra <> \"!\";
         print a.extra;",
    );

    assert_eq!(output, "3\n3!\n");
}

#[test]
fn test_fields_shadow_methods() {
    let output = run_ok(
        "class A { pub m() { return \"method\"; } }
         let a = A();
         a.m = \"field\";
         print a.m;",
    );

    assert_eq!(output, "field\n");
}

#[test]
fn test_bound_methods_keep_their_receiver() {
    let output = run_ok(
        "class Counter {
           pub n = 0;
           pub bump() { this.n = this.n + 1; return this.n; }
         }
         let c = Counter();
         let bump = c.bump;
         bump();
         bump();
         print c.n;",
    );

    assert_eq!(output, "2\n");
}

#[test]
fn test_this_inside_nested_function() {
    let output = run_ok(
        "class A {
           pub x = 1;
           pub getter() {
             fun g() { return this.x; }
             return g;
           }
         }
         print A().getter()();",
    );

    assert_eq!(output, "1\n");
}

#[test]
fn test_super_dispatches_from_the_declaring_class() {
    let output = run_ok(
        "class A { pub say() { return \"A\"; } }
         class B expands A { pub say() { return \"B\" <> super.say(); } }
         class C expands B { }
         class D expands C { pub say() { return \"D\" <> super.say(); } }
         print C().say();
         print D().say();",
    );

    assert_eq!(output, "BA\nDBA\n");
}

#[test]
fn test_overriding_method() {
    let output = run_ok(
        "class A { pub name() { return \"A\"; } pub show() { return this.name(); } }
         class B expands A { pub name() { return \"B\"; } }
         print B().show();",
    );

    assert_eq!(output, "B\n");
}

#[test]
fn test_superclass_must_be_a_class() {
    let (_, error) = run_runtime_error("let NotClass = 1;\nclass B expands NotClass {}");

    assert_eq!(error.message(), "Superclass must be a class, not number.");
    assert_eq!(error.line(), Some(2));
}

#[rstest]
#[case("class A {} print A().nope;", "Undefined property 'nope'.")]
#[case("let x = 1; print x.y;", "Only instances have properties; cannot read 'y' of number.")]
#[case("let x = \"s\"; x.y = 1;", "Only instances have fields.")]
fn test_property_errors(#[case] source: &str, #[case] expected: &str) {
    let (_, error) = run_runtime_error(source);
    assert_eq!(error.message(), expected);
}

// ────────────────────────────── visibility ─────────────────────────────

#[test]
fn test_private_field_is_hidden_from_outside() {
    let (output, error) = run_runtime_error("class A { secret = 1; } print A().secret;");

    assert_eq!(output, "");
    assert!(error.message().contains("private"), "{}", error);
    assert_eq!(error.message(), "'secret' is private to class 'A'.");
}

#[test]
fn test_private_field_cannot_be_written_from_outside() {
    let (_, error) = run_runtime_error("class A { secret = 1; } let a = A(); a.secret = 2;");
    assert_eq!(error.message(), "'secret' is private to class 'A'.");
}

#[test]
fn test_private_field_is_visible_to_own_methods() {
    let output = run_ok(
        "class A {
           secret = 41;
           pub reveal() { this.secret = this.secret + 1; return this.secret; }
         }
         print A().reveal();",
    );

    assert_eq!(output, "42\n");
}

#[test]
fn test_private_field_is_hidden_from_subclass_methods() {
    let (_, error) = run_runtime_error(
        "class A { secret = 1; }
         class B expands A { pub peek() { return this.secret; } }
         B().peek();",
    );

    assert_eq!(error.message(), "'secret' is private to class 'A'.");
}

#[test]
fn test_redeclared_private_field_belongs_to_the_subclass() {
    let (_, error) = run_runtime_error(
        "class A { s = 1; pub get() { return this.s; } }
         class B expands A { s = 2; }
         B().get();",
    );

    assert_eq!(error.message(), "'s' is private to class 'B'.");

    assert_eq!(
        run_ok(
            "class A { s = 1; pub get() { return this.s; } }
             class B expands A { pub s = 2; }
             print B().get();"
        ),
        "2\n"
    );
}

#[test]
fn test_private_method_is_hidden_from_other_classes() {
    let (_, error) = run_runtime_error(
        "class A { hidden() { return 1; } }
         class B { pub poke(a) { return a.hidden(); } }
         B().poke(A());",
    );

    assert_eq!(error.message(), "'hidden' is private to class 'A'.");
}

#[test]
fn test_private_method_is_hidden_from_subclass_super_calls() {
    let (_, error) = run_runtime_error(
        "class A { helper() { return 1; } }
         class B expands A { pub go() { return super.helper(); } }
         B().go();",
    );

    assert_eq!(error.message(), "'helper' is private to class 'A'.");
}

#[test]
fn test_closure_in_method_keeps_class_access() {
    let output = run_ok(
        "class A {
           secret = 7;
           pub leak() {
             fun g() { return this.secret; }
             return g;
           }
         }
         print A().leak()();",
    );

    assert_eq!(output, "7\n");
}

#[test]
fn test_free_function_has_no_class_access() {
    let (_, error) = run_runtime_error(
        "fun peek(o) { return o.secret; }
         class A { secret = 1; pub attempt() { return peek(this); } }
         A().attempt();",
    );

    assert_eq!(error.message(), "'secret' is private to class 'A'.");
}

#[test]
fn test_public_field_is_readable_and_writable() {
    assert_eq!(
        run_ok("class P { pub x = 1; } let p = P(); p.x = 5; print p.x;"),
        "5\n"
    );
}

// ──────────────────────────────── sessions ─────────────────────────────

#[test]
fn test_session_keeps_globals_and_survives_errors() {
    let (mut interpreter, buffer) = capturing_interpreter();

    assert!(matches!(
        runner::run_line("let a = 20;", &mut interpreter),
        Ok(None)
    ));

    match runner::run_line("a + 1;", &mut interpreter) {
        Ok(Some(Value::Number(n))) => assert_eq!(n, 21.0),
        other => panic!("unexpected result {:?}", other),
    }

    assert!(matches!(
        runner::run_line("fun f() { return nil - 1; } f();", &mut interpreter),
        Err(RunError::Runtime(_))
    ));

    assert!(matches!(
        runner::run_line("print a", &mut interpreter),
        Err(RunError::Static(_))
    ));

    assert!(matches!(
        runner::run_line("print a <> \"!\";", &mut interpreter),
        Ok(None)
    ));

    assert_eq!(buffer.contents(), "20!\n");
}

#[test]
fn test_later_lines_see_earlier_classes() {
    let (mut interpreter, buffer) = capturing_interpreter();

    runner::run("class A { pub v = 1; }", &mut interpreter).expect("first line");
    runner::run("{ let a = A(); print a.v; }", &mut interpreter).expect("second line");

    assert_eq!(buffer.contents(), "1\n");
}

#[test]
fn test_static_error_exit_code() {
    let (_, result) = run_capture("print ;");
    assert_eq!(result.map_err(|e| e.exit_code()), Err(65));

    let (_, result) = run_capture("print nil - 1;");
    assert_eq!(result.map_err(|e| e.exit_code()), Err(70));
}
