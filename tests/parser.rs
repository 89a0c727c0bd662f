#[cfg(test)]
mod parser_tests {
    use rox::ast::{Expr, Stmt};
    use rox::ast_printer::AstPrinter;
    use rox::error::{Diagnostics, ErrorKind};
    use rox::parser::Parser;
    use rox::scanner::Scanner;

    fn parse(source: &str) -> (Vec<Stmt>, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let tokens = Scanner::new(source).scan_tokens(&mut diagnostics);
        let statements = Parser::new(tokens, 0).parse(&mut diagnostics);
        (statements, diagnostics)
    }

    fn printed(source: &str) -> String {
        let (statements, diagnostics) = parse(source);
        assert!(
            !diagnostics.has_errors(),
            "unexpected errors: {:?}",
            diagnostics.iter().collect::<Vec<_>>()
        );
        AstPrinter::print_program(&statements)
    }

    fn error_lines(source: &str) -> Vec<String> {
        let (_, diagnostics) = parse(source);
        diagnostics.iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn test_precedence_and_grouping() {
        assert_eq!(printed("1 + 2 * 3;"), "(; (+ 1.0 (* 2.0 3.0)))");
        assert_eq!(printed("(1 + 2) * 3;"), "(; (* (group (+ 1.0 2.0)) 3.0))");
        assert_eq!(printed("-1 < 2 == !false;"), "(; (== (< (- 1.0) 2.0) (! false)))");
    }

    #[test]
    fn test_logical_operators_bind_looser_than_equality() {
        assert_eq!(
            printed("a or b and c == d;"),
            "(; (or a (and b (== c d))))"
        );
    }

    #[test]
    fn test_assignment_is_right_associative() {
        assert_eq!(printed("a = b = 1;"), "(; (= a (= b 1.0)))");
    }

    #[test]
    fn test_property_set_and_call_chain() {
        assert_eq!(
            printed("a.b(1, 2).c = 3;"),
            "(; (= (. (call (. a b) 1.0 2.0) c) 3.0))"
        );
    }

    #[test]
    fn test_for_desugars_to_block_and_while() {
        assert_eq!(
            printed("for (var i = 0; i < 3; i = i + 1) print i;"),
            "(block (var i 0.0) (while (< i 3.0) (block (print i) (; (= i (+ i 1.0))))))"
        );
    }

    #[test]
    fn test_empty_for_clauses_loop_forever() {
        assert_eq!(printed("for (;;) print 1;"), "(block (while true (print 1.0)))");
    }

    #[test]
    fn test_class_with_superclass_and_methods() {
        assert_eq!(
            printed("class B < A { init(x) { this.x = x; } get() { return super.get(); } }"),
            "(class B < A (method init(x) (block (; (= (. this x) x)))) \
             (method get() (block (return (call (super get))))))"
        );
    }

    #[test]
    fn test_var_without_initializer() {
        assert_eq!(printed("var a;"), "(var a)");
    }

    #[test]
    fn test_trailing_commas_allowed() {
        assert_eq!(printed("fun f(a, b,) {} f(1, 2,);"), "(fun f(a b) (block))\n(; (call f 1.0 2.0))");
    }

    #[test]
    fn test_errors_are_collected_and_parsing_resumes() {
        let (statements, diagnostics) = parse("var = 1; print ; print 3;");

        let lines: Vec<String> = diagnostics.iter().map(|e| e.to_string()).collect();
        assert_eq!(
            lines,
            vec![
                "[line 1] ParseError at '=': Expect variable name.".to_string(),
                "[line 1] ParseError at ';': Expect expression.".to_string(),
            ]
        );

        assert_eq!(statements.len(), 1);
        assert!(matches!(statements[0], Stmt::Print { .. }));
    }

    #[test]
    fn test_error_at_end_of_input() {
        assert_eq!(
            error_lines("print 1"),
            vec!["[line 1] ParseError at end: Expect ';' after value.".to_string()]
        );
    }

    #[test]
    fn test_invalid_assignment_target_is_reported_not_thrown() {
        let (statements, diagnostics) = parse("1 = 2; print 3;");

        assert_eq!(diagnostics.len(), 1);
        let error = diagnostics.iter().next().expect("one error");
        assert_eq!(error.kind, ErrorKind::ParseError);
        assert_eq!(error.message, "Invalid assignment target.");
        assert_eq!(error.lexeme.as_deref(), Some("="));

        // Both statements survive.
        assert_eq!(statements.len(), 2);
    }

    #[test]
    fn test_super_requires_method_name() {
        let lines = error_lines("class A < B { f() { super; } }");

        assert_eq!(
            lines.first().map(String::as_str),
            Some("[line 1] ParseError at ';': Expect '.' after 'super'.")
        );
    }

    #[test]
    fn test_too_many_arguments() {
        let args: Vec<String> = (0..256).map(|i| i.to_string()).collect();
        let source = format!("f({});", args.join(", "));

        let lines = error_lines(&source);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("Can't have more than 255 arguments."));
    }

    #[test]
    fn test_expression_ids_are_unique_across_parsers() {
        let mut diagnostics = Diagnostics::new();

        let tokens = Scanner::new("a; b;").scan_tokens(&mut diagnostics);
        let mut first = Parser::new(tokens, 0);
        let first_stmts = first.parse(&mut diagnostics);
        let next = first.next_id();

        let tokens = Scanner::new("c;").scan_tokens(&mut diagnostics);
        let second_stmts = Parser::new(tokens, next).parse(&mut diagnostics);

        let id = |stmt: &Stmt| match stmt {
            Stmt::Expression(Expr::Variable { id, .. }) => *id,
            other => panic!("expected variable statement, got {:?}", other),
        };

        assert_eq!(next, 2);
        assert_ne!(id(&first_stmts[0]), id(&first_stmts[1]));
        assert_eq!(id(&second_stmts[0]).0, 2);
    }
}
