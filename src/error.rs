//! Centralised error hierarchy for the **Lox interpreter**.
//!
//! Every stage (scanner, parser, resolver, runtime) reports its failures as a
//! [`LoxError`].  Static stages push them into a [`Diagnostics`] sink owned by
//! a single run so that as many problems as possible surface at once; the
//! runtime returns the first one through `?`.
//!
//! The module **does not** print diagnostics itself.

use std::fmt;

use log::info;
use serde::Serialize;
use thiserror::Error;

use crate::token::{Token, TokenType};

/// Category of a diagnostic.  The `Display` form is the machine‑checkable
/// tag printed in every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    ScanError,
    ParseError,
    ResolveError,
    RuntimeError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag: &str = match self {
            ErrorKind::ScanError => "ScanError",
            ErrorKind::ParseError => "ParseError",
            ErrorKind::ResolveError => "ResolveError",
            ErrorKind::RuntimeError => "RuntimeError",
        };

        f.write_str(tag)
    }
}

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("[line {line}] {kind}{}: {message}", location(.lexeme))]
pub struct LoxError {
    /// Which stage rejected the program.
    pub kind: ErrorKind,

    /// 1‑based line where the error occurred.
    pub line: usize,

    /// Offending lexeme, if the error is tied to a token.  An empty lexeme
    /// means the end of input.
    pub lexeme: Option<String>,

    /// Human‑readable description.
    pub message: String,
}

fn location(lexeme: &Option<String>) -> String {
    match lexeme.as_deref() {
        None => String::new(),
        Some("") => " at end".to_string(),
        Some(lexeme) => format!(" at '{}'", lexeme),
    }
}

impl LoxError {
    fn at_token(kind: ErrorKind, token: &Token, message: String) -> Self {
        let lexeme: String = match token.token_type {
            TokenType::EOF => String::new(),
            _ => token.lexeme.clone(),
        };

        LoxError {
            kind,
            line: token.line,
            lexeme: Some(lexeme),
            message,
        }
    }

    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Scan error: line={}, msg={}", line, message);

        LoxError {
            kind: ErrorKind::ScanError,
            line,
            lexeme: None,
            message,
        }
    }

    /// Helper constructor for the **parser**.
    pub fn parse<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Parse error: line={}, msg={}", token.line, message);

        Self::at_token(ErrorKind::ParseError, token, message)
    }

    /// Helper constructor for the **resolver**.
    pub fn resolve<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Resolve error: line={}, msg={}", token.line, message);

        Self::at_token(ErrorKind::ResolveError, token, message)
    }

    /// Helper constructor for the **interpreter**.
    pub fn runtime<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Runtime error: line={}, msg={}", token.line, message);

        Self::at_token(ErrorKind::RuntimeError, token, message)
    }
}

/// Crate‑wide `Result` alias.
pub type Result<T> = std::result::Result<T, LoxError>;

/// Per‑run collector for static diagnostics.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    errors: Vec<LoxError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, error: LoxError) {
        self.errors.push(error);
    }

    pub fn extend<I: IntoIterator<Item = LoxError>>(&mut self, errors: I) {
        self.errors.extend(errors);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LoxError> {
        self.errors.iter()
    }

    pub fn into_vec(self) -> Vec<LoxError> {
        self.errors
    }
}
