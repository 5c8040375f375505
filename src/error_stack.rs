//! Thread-local stack of error messages.
//!
//! Every [`SddsError`](crate::error::SddsError) built through its
//! constructors lands here as well, so a tool can report the full chain of
//! messages after a failed call. The stack is soft-bounded: once it holds
//! more than [`LibraryConfig::error_stack_limit`](crate::config::LibraryConfig)
//! entries the oldest are dropped and counted, and [`print_errors`] reports
//! how many were lost.
//!
//! # Example
//!
//! ```
//! use sdds::error_stack::{self, PrintMode};
//!
//! error_stack::clear_errors();
//! error_stack::push_error("unable to open input");
//! error_stack::push_error_fragment(" (data.sdds)");
//! assert_eq!(error_stack::take_errors(), vec!["unable to open input (data.sdds)"]);
//! assert_eq!(error_stack::error_count(), 0);
//!
//! error_stack::push_error("another failure");
//! error_stack::print_errors(PrintMode::default());
//! ```

use crate::config;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::io::Write;

thread_local! {
    static STACK: RefCell<ErrorStack> = RefCell::new(ErrorStack::default());
}

/// How [`print_errors`] reports the stack.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrintMode {
    /// Print every message rather than just the most recent one.
    pub verbose: bool,
    /// Exit the process with status 1 after printing.
    pub exit: bool,
}

impl PrintMode {
    pub const VERBOSE: Self = Self {
        verbose: true,
        exit: false,
    };
    pub const EXIT: Self = Self {
        verbose: true,
        exit: true,
    };
}

/// Ordered message store with a soft upper bound.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorStack {
    messages: VecDeque<String>,
    dropped: usize,
    program_name: Option<String>,
}

impl ErrorStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new message, evicting the oldest above `limit`.
    pub fn push(&mut self, message: impl Into<String>, limit: usize) {
        self.messages.push_back(message.into());
        while self.messages.len() > limit.max(1) {
            self.messages.pop_front();
            self.dropped += 1;
        }
    }

    /// Extend the most recent message, or start one if the stack is empty.
    pub fn push_fragment(&mut self, fragment: &str, limit: usize) {
        match self.messages.back_mut() {
            Some(last) => last.push_str(fragment),
            None => self.push(fragment, limit),
        }
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    #[must_use]
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.messages.iter().map(String::as_str)
    }

    pub fn take_all(&mut self) -> Vec<String> {
        self.dropped = 0;
        self.messages.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.dropped = 0;
    }

    /// Write the stack, most recent message first.
    pub fn write_to(&self, out: &mut dyn Write, mode: PrintMode) -> std::io::Result<()> {
        if self.messages.is_empty() {
            return Ok(());
        }
        if let Some(name) = &self.program_name {
            write!(out, "{name}: ")?;
        }
        writeln!(out, "Error:")?;
        let shown = if mode.verbose { self.messages.len() } else { 1 };
        for message in self.messages.iter().rev().take(shown) {
            writeln!(out, "{message}")?;
        }
        let hidden = self.dropped + (self.messages.len() - shown);
        if hidden > 0 {
            writeln!(out, "({hidden} more errors not shown)")?;
        }
        Ok(())
    }
}

impl fmt::Display for ErrorStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ErrorStack({} errors)", self.count())
    }
}

fn limit() -> usize {
    config::current().error_stack_limit
}

/// Push a new message onto the current thread's stack.
pub fn push_error(message: impl Into<String>) {
    let limit = limit();
    STACK.with(|s| s.borrow_mut().push(message, limit));
}

/// Append text to the most recent message.
pub fn push_error_fragment(fragment: &str) {
    let limit = limit();
    STACK.with(|s| s.borrow_mut().push_fragment(fragment, limit));
}

#[must_use]
pub fn error_count() -> usize {
    STACK.with(|s| s.borrow().count())
}

/// Remove and return every message, oldest first.
pub fn take_errors() -> Vec<String> {
    STACK.with(|s| s.borrow_mut().take_all())
}

pub fn clear_errors() {
    STACK.with(|s| s.borrow_mut().clear());
}

/// Name printed in front of reported errors.
pub fn register_program_name(name: impl Into<String>) {
    let name = name.into();
    STACK.with(|s| s.borrow_mut().program_name = Some(name));
}

/// Print the stack to stderr and clear it; exits with status 1 in exit mode.
pub fn print_errors(mode: PrintMode) {
    STACK.with(|s| {
        let mut stack = s.borrow_mut();
        let stderr = std::io::stderr();
        let mut lock = stderr.lock();
        let _ = stack.write_to(&mut lock, mode);
        stack.clear();
    });
    if mode.exit {
        std::process::exit(1);
    }
}

/// Report a warning on stderr without touching the stack.
pub fn warning(message: &str) {
    tracing::warn!("{message}");
    let prefix = STACK.with(|s| s.borrow().program_name.clone());
    match prefix {
        Some(name) => eprintln!("{name}: warning: {message}"),
        None => eprintln!("warning: {message}"),
    }
}

/// Print a fatal message plus any pending errors, then exit with status 1.
pub fn bomb(message: &str) -> ! {
    eprintln!("{message}");
    print_errors(PrintMode::EXIT);
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eviction_counts_dropped_messages() {
        let mut stack = ErrorStack::new();
        for i in 0..5 {
            stack.push(format!("e{i}"), 3);
        }
        assert_eq!(stack.count(), 3);
        assert_eq!(stack.dropped(), 2);
        assert_eq!(stack.messages().next(), Some("e2"));

        let mut out = Vec::new();
        stack.write_to(&mut out, PrintMode::VERBOSE).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Error:\ne4\ne3\ne2\n"));
        assert!(text.contains("(2 more errors not shown)"));
    }

    #[test]
    fn terse_print_shows_latest_only() {
        let mut stack = ErrorStack::new();
        stack.push("first", 10);
        stack.push("second", 10);
        let mut out = Vec::new();
        stack.write_to(&mut out, PrintMode::default()).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Error:\nsecond\n(1 more errors not shown)\n"
        );
    }
}
