//! A tree‑walking interpreter for the Lox scripting language.
//!
//! The pipeline is scanner → parser → resolver → interpreter.  Hosts drive
//! it through [`Lox::run`], which reports every static diagnostic of a source
//! text and executes it only when there are none.

pub mod ast;
pub mod ast_printer;
pub mod callable;
pub mod class;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod token;
pub mod value;

use std::io::{self, Write};

use log::{debug, info};

use crate::ast::Stmt;
use crate::error::{Diagnostics, ErrorKind, LoxError};
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::{Locals, Resolver};
use crate::scanner::Scanner;
use crate::token::Token;

/// Process exit status for a run that never started because of static errors.
pub const EXIT_STATIC_ERROR: i32 = 65;

/// Process exit status for a run that stopped on a runtime error.
pub const EXIT_RUNTIME_ERROR: i32 = 70;

/// Result of one [`Lox::run`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    /// Every diagnostic produced, in report order.
    pub diagnostics: Vec<LoxError>,

    /// Whether the program was handed to the interpreter at all.
    pub ran: bool,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// The runtime error that stopped execution, if any.
    pub fn runtime_error(&self) -> Option<&LoxError> {
        self.diagnostics
            .iter()
            .find(|e| e.kind == ErrorKind::RuntimeError)
    }

    /// `0` on success, [`EXIT_STATIC_ERROR`] when the program did not run,
    /// [`EXIT_RUNTIME_ERROR`] when it failed while running.
    pub fn exit_code(&self) -> i32 {
        if !self.ran {
            EXIT_STATIC_ERROR
        } else if self.runtime_error().is_some() {
            EXIT_RUNTIME_ERROR
        } else {
            0
        }
    }
}

/// An interpreter session.  Global state persists across [`run`](Lox::run)
/// calls, so an interactive prompt can feed it one line at a time.
pub struct Lox {
    interpreter: Interpreter,

    /// First `ExprId` not yet handed out.  Ids, and the resolver entries
    /// keyed on them, are never reclaimed: the interpreter's table grows
    /// with every line a long interactive session runs.
    next_id: usize,
}

impl Default for Lox {
    fn default() -> Self {
        Self::new()
    }
}

impl Lox {
    /// A session printing to standard output.
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// A session printing to `out`.
    pub fn with_output(out: Box<dyn Write>) -> Self {
        Self {
            interpreter: Interpreter::new(out),
            next_id: 0,
        }
    }

    /// Limit how deeply user function calls may nest before a run fails
    /// with `Stack overflow.`.
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.interpreter.set_max_call_depth(depth);
        self
    }

    /// Scan, parse and resolve `source`; interpret it only if none of those
    /// stages reported a diagnostic.
    pub fn run(&mut self, source: &str) -> RunOutcome {
        info!("Running {} bytes of source", source.len());

        let mut diagnostics: Diagnostics = Diagnostics::new();

        let tokens: Vec<Token> = Scanner::new(source).scan_tokens(&mut diagnostics);

        let mut parser: Parser = Parser::new(tokens, self.next_id);
        let statements: Vec<Stmt> = parser.parse(&mut diagnostics);
        self.next_id = parser.next_id();

        if diagnostics.has_errors() {
            debug!("Skipping resolution: {} diagnostics", diagnostics.len());

            return RunOutcome {
                diagnostics: diagnostics.into_vec(),
                ran: false,
            };
        }

        let locals: Locals = Resolver::new().resolve(&statements, &mut diagnostics);

        if diagnostics.has_errors() {
            debug!("Skipping execution: {} diagnostics", diagnostics.len());

            return RunOutcome {
                diagnostics: diagnostics.into_vec(),
                ran: false,
            };
        }

        self.interpreter.resolve(locals);

        if let Err(e) = self.interpreter.interpret(&statements) {
            diagnostics.report(e);
        }

        RunOutcome {
            diagnostics: diagnostics.into_vec(),
            ran: true,
        }
    }
}
