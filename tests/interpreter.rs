mod common;

#[cfg(test)]
mod interpreter_tests {
    use std::thread;

    use super::common::{run, run_ok, session, session_with_depth};
    use rox::error::ErrorKind;
    use rox::{EXIT_RUNTIME_ERROR, EXIT_STATIC_ERROR};

    /// Runs `source` expecting a runtime error; returns the output printed
    /// before it and the rendered error.
    fn runtime_error(source: &str) -> (String, String) {
        let (out, outcome) = run(source);

        assert!(outcome.ran);
        assert_eq!(outcome.exit_code(), EXIT_RUNTIME_ERROR);

        let error = outcome.runtime_error().expect("a runtime error");
        assert_eq!(error.kind, ErrorKind::RuntimeError);

        (out, error.to_string())
    }

    // ───────────────────────── expressions ─────────────────────────

    #[test]
    fn test_arithmetic() {
        assert_eq!(run_ok("print 1 + 2 * 3;"), "7\n");
        assert_eq!(run_ok("print (1 + 2) * 3;"), "9\n");
        assert_eq!(run_ok("print 7 / 2;"), "3.5\n");
        assert_eq!(run_ok("print 10 - 4 - 3;"), "3\n");
        assert_eq!(run_ok("print -(2.5);"), "-2.5\n");
    }

    #[test]
    fn test_division_by_zero_follows_ieee() {
        assert_eq!(run_ok("print 1 / 0;"), "inf\n");
        assert_eq!(run_ok("print -1 / 0;"), "-inf\n");
    }

    #[test]
    fn test_comparison_and_equality() {
        assert_eq!(run_ok("print 1 < 2; print 2 <= 2; print 3 > 4; print 3 >= 4;"), "true\ntrue\nfalse\nfalse\n");
        assert_eq!(run_ok("print nil == nil; print 1 == 1; print \"a\" == \"a\";"), "true\ntrue\ntrue\n");
        assert_eq!(run_ok("print 1 == \"1\"; print nil == false; print 1 != 2;"), "false\nfalse\ntrue\n");
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(run_ok("print \"foo\" + \"bar\";"), "foobar\n");
    }

    #[test]
    fn test_mixed_plus_is_a_runtime_error() {
        let (out, error) = runtime_error("print \"a\" + 1;");

        assert_eq!(out, "");
        assert_eq!(
            error,
            "[line 1] RuntimeError at '+': Operands must be two numbers or two strings."
        );

        let (_, error) = runtime_error("print 1 + \"b\";");
        assert!(error.ends_with("Operands must be two numbers or two strings."));
    }

    #[test]
    fn test_numeric_operand_errors() {
        let (_, error) = runtime_error("print -\"x\";");
        assert_eq!(error, "[line 1] RuntimeError at '-': Operand must be a number.");

        let (_, error) = runtime_error("print 1 < \"2\";");
        assert_eq!(error, "[line 1] RuntimeError at '<': Operands must be numbers.");
    }

    #[test]
    fn test_truthiness() {
        assert_eq!(run_ok("if (0) print \"yes\";"), "yes\n");
        assert_eq!(run_ok("if (\"\") print \"yes\";"), "yes\n");
        assert_eq!(run_ok("if (nil) print 1; else print 2;"), "2\n");
        assert_eq!(run_ok("print !nil; print !0;"), "true\nfalse\n");
    }

    #[test]
    fn test_logical_operators_return_operands() {
        assert_eq!(run_ok("print nil or \"x\";"), "x\n");
        assert_eq!(run_ok("print false and 1;"), "false\n");
        assert_eq!(run_ok("print 1 and 2;"), "2\n");
        assert_eq!(run_ok("print 1 or undefined;"), "1\n");
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(run_ok("print 3.0; print 0.1; print 100;"), "3\n0.1\n100\n");
    }

    // ───────────────────────── variables & scope ───────────────────

    #[test]
    fn test_block_shadowing() {
        assert_eq!(
            run_ok("var a = 1; { var a = 2; print a; } print a;"),
            "2\n1\n"
        );
    }

    #[test]
    fn test_uninitialized_variable_is_nil() {
        assert_eq!(run_ok("var a; print a;"), "nil\n");
    }

    #[test]
    fn test_assignment_through_scopes() {
        assert_eq!(
            run_ok("var a = 1; { a = 2; { a = a + 1; } } print a;"),
            "3\n"
        );
    }

    #[test]
    fn test_undefined_variable() {
        let (_, error) = runtime_error("print nope;");
        assert_eq!(error, "[line 1] RuntimeError at 'nope': Undefined variable 'nope'.");

        let (_, error) = runtime_error("nope = 1;");
        assert_eq!(error, "[line 1] RuntimeError at 'nope': Undefined variable 'nope'.");
    }

    #[test]
    fn test_runtime_error_stops_execution() {
        let (out, error) = runtime_error("print 1;\nprint -nil;\nprint 2;");

        assert_eq!(out, "1\n");
        assert!(error.starts_with("[line 2]"));
    }

    // ───────────────────────── control flow ────────────────────────

    #[test]
    fn test_while_loop() {
        assert_eq!(
            run_ok("var i = 0; while (i < 3) { print i; i = i + 1; }"),
            "0\n1\n2\n"
        );
    }

    #[test]
    fn test_for_loop() {
        assert_eq!(
            run_ok("var sum = 0; for (var i = 1; i <= 4; i = i + 1) sum = sum + i; print sum;"),
            "10\n"
        );
    }

    #[test]
    fn test_for_loop_variable_is_scoped() {
        let (_, error) = runtime_error("for (var i = 0; i < 1; i = i + 1) {} print i;");

        assert!(error.ends_with("Undefined variable 'i'."));
    }

    // ───────────────────────── functions ──────────────────────────

    #[test]
    fn test_recursion() {
        let source = r#"
            fun fib(n) {
                if (n < 2) return n;
                return fib(n - 1) + fib(n - 2);
            }
            print fib(10);
        "#;

        assert_eq!(run_ok(source), "55\n");
    }

    #[test]
    fn test_function_without_return_yields_nil() {
        assert_eq!(run_ok("fun f() {} print f();"), "nil\n");
    }

    #[test]
    fn test_return_unwinds_loops() {
        let source = r#"
            fun first_over(limit) {
                for (var i = 0; ; i = i + 1) {
                    while (true) {
                        if (i > limit) return i;
                        i = i + 1;
                    }
                }
            }
            print first_over(3);
        "#;

        assert_eq!(run_ok(source), "4\n");
    }

    #[test]
    fn test_closure_counter() {
        let source = r#"
            fun makeCounter() {
                var i = 0;
                fun count() {
                    i = i + 1;
                    print i;
                }
                return count;
            }
            var counter = makeCounter();
            counter();
            counter();
            var other = makeCounter();
            other();
        "#;

        assert_eq!(run_ok(source), "1\n2\n1\n");
    }

    #[test]
    fn test_closures_share_captured_variable() {
        let source = r#"
            var get;
            var set;
            fun make() {
                var v = 0;
                fun g() { return v; }
                fun s(x) { v = x; }
                get = g;
                set = s;
            }
            make();
            set(5);
            print get();
        "#;

        assert_eq!(run_ok(source), "5\n");
    }

    #[test]
    fn test_unbounded_recursion_is_a_runtime_error() {
        let (mut lox, buf) = session_with_depth(50);

        let outcome = lox.run("fun f() { f(); }\nf();");
        assert_eq!(outcome.exit_code(), EXIT_RUNTIME_ERROR);

        let error = outcome.runtime_error().expect("a runtime error");
        assert_eq!(error.message, "Stack overflow.");
        assert_eq!(error.lexeme.as_deref(), Some(")"));
        assert_eq!(error.line, 1);

        // The session is still usable, and recursion below the limit runs.
        let outcome = lox.run("print 1;");
        assert!(outcome.is_success());

        let outcome = lox.run("fun g(n) { if (n > 0) return g(n - 1); return n; } print g(40);");
        assert!(outcome.is_success());

        assert_eq!(buf.contents(), "1\n0\n");
    }

    #[test]
    fn test_call_depth_counts_only_active_calls() {
        let (mut lox, buf) = session_with_depth(3);

        let source = r#"
            fun a() { return 1; }
            for (var i = 0; i < 10; i = i + 1) a();
            fun b(n) { if (n > 0) return b(n - 1); return "deep"; }
            print b(2);
        "#;

        assert!(lox.run(source).is_success());
        assert_eq!(buf.contents(), "deep\n");

        let outcome = lox.run("print b(3);");
        assert_eq!(
            outcome.runtime_error().map(|e| e.message.as_str()),
            Some("Stack overflow.")
        );
    }

    #[test]
    fn test_default_call_depth_limit() {
        let worker = thread::Builder::new()
            .stack_size(64 << 20)
            .spawn(|| {
                let (mut lox, buf) = session();

                let outcome = lox.run("fun f(n) { return f(n + 1); } f(0);");
                let message: Option<String> = outcome.runtime_error().map(|e| e.message.clone());

                let recovered: bool = lox.run("print \"after\";").is_success();

                (message, recovered, buf.contents())
            })
            .expect("spawn test thread");

        let (message, recovered, out) = worker.join().expect("test thread finished");

        assert_eq!(message.as_deref(), Some("Stack overflow."));
        assert!(recovered);
        assert_eq!(out, "after\n");
    }

    #[test]
    fn test_function_display() {
        assert_eq!(
            run_ok("fun f() {} print f; print clock;"),
            "<fn f>\n<native fn clock>\n"
        );
    }

    #[test]
    fn test_arity_mismatch() {
        let (_, error) = runtime_error("fun f(a, b) {} f(1);");
        assert_eq!(
            error,
            "[line 1] RuntimeError at ')': Expected 2 arguments but got 1."
        );

        let (_, error) = runtime_error("fun h(a) {} h();");
        assert!(error.ends_with("Expected 1 arguments but got 0."));

        let (_, error) = runtime_error("fun g() {} g(1);");
        assert!(error.ends_with("Expected 0 arguments but got 1."));

        let (_, error) = runtime_error("clock(1);");
        assert!(error.ends_with("Expected 0 arguments but got 1."));
    }

    #[test]
    fn test_call_non_callable() {
        let (_, error) = runtime_error("\"str\"();");
        assert_eq!(
            error,
            "[line 1] RuntimeError at ')': Can only call functions and classes."
        );
    }

    #[test]
    fn test_arguments_evaluated_before_call_checks() {
        let (out, _) = runtime_error("fun p(x) { print x; return x; } nil(p(1), p(2));");

        assert_eq!(out, "1\n2\n");
    }

    // ───────────────────────── classes ────────────────────────────

    #[test]
    fn test_class_and_instance_display() {
        assert_eq!(
            run_ok("class A {} print A; print A();"),
            "A\nA instance\n"
        );
    }

    #[test]
    fn test_fields_and_methods() {
        let source = r#"
            class Box {
                get() { return "method"; }
            }
            var b = Box();
            print b.get();
            b.value = 3;
            print b.value;
            b.get = "field";
            print b.get;
        "#;

        assert_eq!(run_ok(source), "method\n3\nfield\n");
    }

    #[test]
    fn test_initializer_and_this() {
        let source = r#"
            class Point {
                init(x, y) { this.x = x; this.y = y; }
                sum() { return this.x + this.y; }
            }
            print Point(1, 2).sum();
        "#;

        assert_eq!(run_ok(source), "3\n");
    }

    #[test]
    fn test_calling_init_returns_this() {
        let source = r#"
            class A { init() { this.n = 1; } }
            var a = A();
            print a.init() == a;
        "#;

        assert_eq!(run_ok(source), "true\n");
    }

    #[test]
    fn test_class_arity_follows_init() {
        let (_, error) = runtime_error("class A { init(a) {} } A();");
        assert!(error.ends_with("Expected 1 arguments but got 0."));

        let (_, error) = runtime_error("class B {} B(1, 2);");
        assert!(error.ends_with("Expected 0 arguments but got 2."));

        let (_, error) = runtime_error("class C { init(a, b, c) {} } C(1, 2);");
        assert!(error.ends_with("Expected 3 arguments but got 2."));
    }

    #[test]
    fn test_bound_method_keeps_this() {
        let source = r#"
            class A {
                init() { this.name = "a"; }
                say() { print this.name; }
            }
            var m = A().say;
            m();
        "#;

        assert_eq!(run_ok(source), "a\n");
    }

    #[test]
    fn test_inheritance_and_super() {
        let source = r#"
            class A {
                init(n) { this.n = n; }
                get() { return this.n; }
                name() { return "A"; }
            }
            class B < A {
                get() { return super.get() + 1; }
            }
            var b = B(5);
            print b.get();
            print b.name();
        "#;

        assert_eq!(run_ok(source), "6\nA\n");
    }

    #[test]
    fn test_super_skips_overriding_method() {
        let source = r#"
            class A { m() { return "A"; } }
            class B < A { m() { return "B"; } test() { return super.m(); } }
            class C < B {}
            print C().test();
        "#;

        assert_eq!(run_ok(source), "A\n");
    }

    #[test]
    fn test_property_errors() {
        let (_, error) = runtime_error("var a = 1; print a.x;");
        assert_eq!(error, "[line 1] RuntimeError at 'x': Only instances have properties.");

        let (_, error) = runtime_error("var a = 1; a.x = 2;");
        assert_eq!(error, "[line 1] RuntimeError at 'x': Only instances have fields.");

        let (_, error) = runtime_error("class A {} print A().missing;");
        assert_eq!(error, "[line 1] RuntimeError at 'missing': Undefined property 'missing'.");
    }

    #[test]
    fn test_superclass_must_be_a_class() {
        let (_, error) = runtime_error("var A = 1; class B < A {}");

        assert_eq!(error, "[line 1] RuntimeError at 'A': Superclass must be a class.");
    }

    // ───────────────────────── natives ────────────────────────────

    #[test]
    fn test_clock_is_positive_number() {
        assert_eq!(run_ok("var t = clock(); print t > 0; print clock() >= t;"), "true\ntrue\n");
    }

    #[test]
    fn test_dump_lists_scope_chain() {
        let output = run_ok("var a = 1; { var b = \"two\"; dump(); }");

        assert_eq!(
            output,
            "== scope 0 ==\nb = two\n== globals ==\na = 1\nclock = <native fn clock>\ndump = <native fn dump>\n"
        );
    }

    // ───────────────────────── sessions ───────────────────────────

    #[test]
    fn test_state_persists_across_runs() {
        let (mut lox, buf) = session();

        assert!(lox.run("var a = 1;").is_success());
        assert!(lox.run("fun add(x) { return a + x; }").is_success());
        assert!(lox.run("print add(2);").is_success());

        assert_eq!(buf.contents(), "3\n");
    }

    #[test]
    fn test_closures_from_earlier_runs_resolve_correctly() {
        let (mut lox, buf) = session();

        lox.run("fun outer() { var x = \"kept\"; fun inner() { return x; } return inner; }");
        lox.run("var f = outer();");
        lox.run("{ var y = 1; print f(); }");

        assert_eq!(buf.contents(), "kept\n");
    }

    #[test]
    fn test_session_recovers_after_errors() {
        let (mut lox, buf) = session();

        let outcome = lox.run("{ var a = 1; print -\"x\"; }");
        assert_eq!(outcome.exit_code(), EXIT_RUNTIME_ERROR);

        let outcome = lox.run("print ;");
        assert_eq!(outcome.exit_code(), EXIT_STATIC_ERROR);

        buf.clear();
        let outcome = lox.run("var b = 2; print b;");
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(buf.contents(), "2\n");

        // Runtime error left the session back at global scope.
        let outcome = lox.run("print a;");
        assert_eq!(
            outcome.runtime_error().map(|e| e.message.as_str()),
            Some("Undefined variable 'a'.")
        );
    }

    #[test]
    fn test_static_error_prevents_any_output() {
        let (out, outcome) = run("print 1; print (;");

        assert_eq!(out, "");
        assert!(!outcome.ran);
        assert_eq!(outcome.exit_code(), EXIT_STATIC_ERROR);
    }

    #[test]
    fn test_successful_run_exit_code() {
        let (_, outcome) = run("print 1;");

        assert!(outcome.ran);
        assert!(outcome.runtime_error().is_none());
        assert_eq!(outcome.exit_code(), 0);
    }
}
