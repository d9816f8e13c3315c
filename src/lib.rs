//! malrs - a small Lisp interpreter
//!
//! This crate reads Lisp source text into a tree of tagged values, evaluates that tree
//! against a chain of lexical environments, and renders results back to text.
//!
//! ```text
//! text --reader--> Value (form) --evaluator(form, env)--> Value --printer--> text
//! ```
//!
//! ## Language
//!
//! ```clojure
//! (def! inc (fn* (x) (+ x 1)))        ; closures
//! (let* [a 1 b (inc a)] (list a b))   ; sequential bindings
//! (if nil "no" "yes")                 ; only nil and false are falsy
//! `(1 ~(inc 1) ~@(list 3 4))          ; quasiquote templates
//! (def! counter (atom 0))
//! (swap! counter inc)                 ; explicit mutable cells
//! ```
//!
//! User-level recursion in tail position (`if`, `do`, `let*`, function application)
//! runs in constant native stack: the evaluator is a trampoline loop, not a recursive
//! descent.
//!
//! ## Modules
//!
//! - `ast`: the tagged value model
//! - `intern`: process-wide symbol and keyword registries
//! - `reader`: tokenizer and parser
//! - `printer`: readable and display rendering
//! - `evaluator`: environments, special forms, quasiquote and the trampoline
//! - `builtinops`: the native function library installed into the global environment

use std::fmt;
use std::panic;
use std::thread;

use crate::ast::{Symbol, Value, ValueType};
use crate::evaluator::Environment;

/// Maximum reader nesting depth.
/// Deeper input is rejected as a read error instead of overflowing the native stack.
pub const MAX_PARSE_DEPTH: usize = 256;

/// Maximum depth of non-tail evaluation.
/// Tail positions (`if`, `do`, `let*`, closure application, `eval`, `quasiquote`) never
/// count towards this limit; argument evaluation and natives calling closures do.
///
/// Reaching this depth needs more native stack than a default thread has. Evaluate deep
/// programs inside [`run_with_large_stack`].
pub const MAX_EVAL_DEPTH: usize = 5_000;

/// Native stack size of the thread started by [`run_with_large_stack`].
pub const EVAL_STACK_SIZE: usize = 128 * 1024 * 1024;

/// Run `f` on a thread whose stack fits [`MAX_EVAL_DEPTH`] levels of nested evaluation.
///
/// Values are not `Send`, so `f` builds its own environment and hands back plain data.
/// A panic inside `f` resumes on the calling thread.
///
/// ```
/// let printed = malrs::run_with_large_stack(|| {
///     let env = malrs::evaluator::create_global_env();
///     let run = |src: &str| malrs::rep(src, &env).map_err(|e| e.to_string());
///     run("(def! sum (fn* (n) (if (= n 0) 0 (+ n (sum (- n 1))))))")?;
///     run("(sum 2000)")
/// });
/// assert_eq!(printed.unwrap().unwrap().as_deref(), Some("2001000"));
/// ```
pub fn run_with_large_stack<F, T>(f: F) -> std::io::Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let handle = thread::Builder::new()
        .name("malrs-eval".into())
        .stack_size(EVAL_STACK_SIZE)
        .spawn(f)?;
    match handle.join() {
        Ok(value) => Ok(value),
        Err(payload) => panic::resume_unwind(payload),
    }
}

/// Categorizes the different kinds of read errors.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ReadErrorKind {
    /// A token that matches none of the atom shapes
    UnexpectedToken,
    /// Input ended inside a form or an unterminated string
    Incomplete,
    /// A closing bracket that does not match the open form, or one with no open form
    Mismatch,
    /// Nesting exceeded [`MAX_PARSE_DEPTH`]
    TooDeeplyNested,
    /// Syntax that is recognized but intentionally not supported (metadata)
    Unsupported,
    /// A literal outside what the implementation can represent
    ImplementationLimit,
}

/// A structured error describing malformed source text.
#[derive(Debug, PartialEq, Clone)]
pub struct ReadError {
    pub kind: ReadErrorKind,
    pub message: String,
    /// Context snippet from the input around the failure (max 100 chars)
    pub context: Option<String>,
    /// The offending token, if one was identified
    pub found: Option<String>,
}

impl ReadError {
    pub fn new(
        kind: ReadErrorKind,
        message: impl Into<String>,
        context: Option<String>,
        found: Option<String>,
    ) -> Self {
        ReadError {
            kind,
            message: message.into(),
            context,
            found,
        }
    }

    /// Create a ReadError with a kind and message but no context
    pub fn from_message(kind: ReadErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, None, None)
    }

    /// Create a ReadError with context extracted from `input` around a byte offset
    pub fn with_context(
        kind: ReadErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
        found: Option<String>,
    ) -> Self {
        const MAX_CONTEXT: usize = 100;

        let char_offset = input
            .char_indices()
            .take_while(|(i, _)| *i < error_offset)
            .count();
        let context_start = char_offset.saturating_sub(20);

        let context_str: String = input
            .chars()
            .skip(context_start)
            .take(MAX_CONTEXT)
            .collect();

        let mut display_context = String::new();
        if context_start > 0 {
            display_context.push_str("[...]");
        }
        display_context.push_str(&context_str);
        if context_start + context_str.chars().count() < input.chars().count() {
            display_context.push_str("[...]");
        }

        let display_context = display_context.replace('\n', "\\n").replace('\r', "");

        Self::new(kind, message, Some(display_context), found)
    }
}

/// Error taxonomy shared by the reader, the evaluator and the native library.
///
/// Every error is fatal for the top-level form that raised it; callers are expected to
/// report it and carry on with the next form.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    ReadError(ReadError),
    /// A map literal or grouped-pair structure whose element count is not a multiple of `base`
    UnexpectedLength { got: usize, base: usize },
    /// Symbol lookup failed through the whole chain; `env` is the innermost scope searched
    NotFound { symbol: Symbol, env: Environment },
    /// A value did not have one of the accepted types
    UnexpectedTokenType {
        value: Value,
        expected: Vec<ValueType>,
    },
    /// Fixed-arity mismatch
    ParametersError {
        name: String,
        expected: usize,
        got: usize,
    },
    /// "At least N" arity mismatch
    MultipleParametersError {
        name: String,
        expected: usize,
        got: usize,
    },
    /// A rest marker that is not the second-to-last parameter
    InvalidRestParameter(Symbol),
    /// Application head is neither a closure nor a native function
    NotCallable(Value),
    IndexOutOfRange { index: i64, len: usize },
    /// Host-level failures: I/O, overflow, depth limit
    EvalError(String),
}

impl Error {
    pub fn parameters(name: impl Into<String>, expected: usize, got: usize) -> Self {
        Error::ParametersError {
            name: name.into(),
            expected,
            got,
        }
    }

    pub fn multiple_parameters(name: impl Into<String>, expected: usize, got: usize) -> Self {
        Error::MultipleParametersError {
            name: name.into(),
            expected,
            got,
        }
    }

    pub fn unexpected_type(value: &Value, expected: &[ValueType]) -> Self {
        Error::UnexpectedTokenType {
            value: value.clone(),
            expected: expected.to_vec(),
        }
    }
}

impl From<ReadError> for Error {
    fn from(error: ReadError) -> Self {
        Error::ReadError(error)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ReadError(e) => {
                write!(f, "ReadError: {}", e.message)?;
                if let Some(found) = &e.found {
                    write!(f, "\nFound: {found}")?;
                }
                if let Some(context) = &e.context {
                    write!(f, "\nContext: {context}")?;
                }
                Ok(())
            }
            Error::UnexpectedLength { got, base } => write!(
                f,
                "UnexpectedLength: {got} elements, expected a multiple of {base}"
            ),
            Error::NotFound { symbol, .. } => write!(f, "NotFound: '{symbol}' not found"),
            Error::UnexpectedTokenType { value, expected } => {
                let names: Vec<&str> = expected.iter().map(|t| t.name()).collect();
                write!(
                    f,
                    "UnexpectedTokenType: {value} ({}), expected: {}",
                    value.value_type().name(),
                    names.join(", ")
                )
            }
            Error::ParametersError {
                name,
                expected,
                got,
            } => write!(
                f,
                "ParametersError: {name} needs {expected} parameters, called with {got}"
            ),
            Error::MultipleParametersError {
                name,
                expected,
                got,
            } => write!(
                f,
                "ParametersError: {name} needs at least {expected} parameters, called with {got}"
            ),
            Error::InvalidRestParameter(symbol) => write!(
                f,
                "InvalidRestParameter: '{symbol}' must be followed by exactly one parameter"
            ),
            Error::NotCallable(value) => write!(f, "NotCallable: {value}"),
            Error::IndexOutOfRange { index, len } => {
                write!(f, "IndexOutOfRange: index {index} for length {len}")
            }
            Error::EvalError(msg) => write!(f, "EvaluationError: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

/// Read one form from `input`, evaluate it in `env` and print the result readably.
///
/// Returns `Ok(None)` when the input holds no form (blank or comment only).
pub fn rep(input: &str, env: &Environment) -> Result<Option<String>, Error> {
    match reader::read_str(input)? {
        Some(form) => {
            let value = evaluator::eval(&form, env)?;
            Ok(Some(printer::pr_str(&value, true)))
        }
        None => Ok(None),
    }
}

pub mod ast;
pub mod builtinops;
pub mod evaluator;
pub mod intern;
pub mod printer;
pub mod reader;
