#![allow(dead_code)]

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use rox::{Lox, RunOutcome};

/// In‑memory sink shared between a test and the session writing to it.
#[derive(Clone, Default)]
pub struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).expect("output is UTF-8")
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A session whose `print` output can be inspected.
pub fn session() -> (Lox, SharedBuf) {
    let buf: SharedBuf = SharedBuf::default();
    let lox: Lox = Lox::with_output(Box::new(buf.clone()));
    (lox, buf)
}

/// Like [`session`], with a call-depth limit of `depth`.
pub fn session_with_depth(depth: usize) -> (Lox, SharedBuf) {
    let buf: SharedBuf = SharedBuf::default();
    let lox: Lox = Lox::with_output(Box::new(buf.clone())).with_max_call_depth(depth);
    (lox, buf)
}

/// Run `source` in a fresh session.
pub fn run(source: &str) -> (String, RunOutcome) {
    let (mut lox, buf) = session();
    let outcome: RunOutcome = lox.run(source);
    (buf.contents(), outcome)
}

/// Run `source`, asserting it finishes cleanly, and return its output.
pub fn run_ok(source: &str) -> String {
    let (out, outcome) = run(source);
    assert!(
        outcome.is_success(),
        "unexpected diagnostics: {:?}",
        outcome.diagnostics
    );
    out
}

/// Messages of every diagnostic, in report order.
pub fn messages(outcome: &RunOutcome) -> Vec<String> {
    outcome
        .diagnostics
        .iter()
        .map(|e| e.message.clone())
        .collect()
}
