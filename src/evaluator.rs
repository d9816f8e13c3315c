//! Evaluation of forms against an environment chain.
//!
//! [`eval`] is a trampoline: it holds a `(form, env)` pair and loops. Special forms in tail
//! position (`let*`, `do`, `if`, `quasiquote`, `eval`) and closure application replace the
//! pair and go round the loop again instead of recursing, so user-level recursion through
//! them runs in constant native stack. Everything else (argument evaluation, `def!` and
//! `let*` value expressions, natives calling back into closures) recurses into [`eval`]
//! and counts towards [`MAX_EVAL_DEPTH`].

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::LazyLock;

use tracing::{debug, trace};

use crate::ast::{Closure, MapType, ParamSpec, Symbol, Value, ValueType, group};
use crate::builtinops::builtin_ops;
use crate::{Error, MAX_EVAL_DEPTH, reader};

pub mod environment;
pub mod intooperation;

pub use environment::Environment;
pub use intooperation::{NumIter, ValueIter};

/// Accepted argument counts for a special form or native
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    /// Inclusive bounds
    Range(usize, usize),
    Any,
}

impl Arity {
    /// Check `got` arguments against this arity, reporting a mismatch under `name`.
    pub fn validate(self, name: &str, got: usize) -> Result<(), Error> {
        match self {
            Arity::Exact(n) if got != n => Err(Error::parameters(name, n, got)),
            Arity::AtLeast(n) if got < n => Err(Error::multiple_parameters(name, n, got)),
            Arity::Range(min, _) if got < min => Err(Error::multiple_parameters(name, min, got)),
            Arity::Range(_, max) if got > max => Err(Error::parameters(name, max, got)),
            _ => Ok(()),
        }
    }
}

thread_local! {
    static EVAL_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Counts one level of non-tail evaluation for as long as it is alive.
struct DepthGuard;

impl DepthGuard {
    fn enter() -> Result<DepthGuard, Error> {
        EVAL_DEPTH.with(|depth| {
            let current = depth.get();
            if current >= MAX_EVAL_DEPTH {
                return Err(Error::EvalError(format!(
                    "Evaluation depth limit exceeded (max: {MAX_EVAL_DEPTH})"
                )));
            }
            depth.set(current + 1);
            Ok(DepthGuard)
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        EVAL_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// What one trip round the evaluation loop produced
enum Step {
    /// A final value
    Done(Value),
    /// A form to evaluate next, in place of the current one
    TailCall(Value, Environment),
}

type SpecialFormFn = fn(&[Value], &Environment) -> Result<Step, Error>;

struct SpecialForm {
    name: &'static str,
    arity: Arity,
    apply: SpecialFormFn,
}

static SPECIAL_FORMS: LazyLock<HashMap<Symbol, SpecialForm>> = LazyLock::new(|| {
    [
        SpecialForm {
            name: "def!",
            arity: Arity::Exact(2),
            apply: eval_def,
        },
        SpecialForm {
            name: "let*",
            arity: Arity::Exact(2),
            apply: eval_let,
        },
        SpecialForm {
            name: "do",
            arity: Arity::AtLeast(1),
            apply: eval_do,
        },
        SpecialForm {
            name: "if",
            arity: Arity::Range(2, 3),
            apply: eval_if,
        },
        SpecialForm {
            name: "fn*",
            arity: Arity::Exact(2),
            apply: eval_fn,
        },
        SpecialForm {
            name: "quote",
            arity: Arity::Exact(1),
            apply: eval_quote,
        },
        SpecialForm {
            name: "quasiquote",
            arity: Arity::Exact(1),
            apply: eval_quasiquote,
        },
        SpecialForm {
            name: "eval",
            arity: Arity::Exact(1),
            apply: eval_eval,
        },
    ]
    .into_iter()
    .map(|form| (Symbol::get_or_create(form.name), form))
    .collect()
});

/// Symbols the quasiquote expander reads and writes
struct QuasiquoteSymbols {
    quote: Symbol,
    unquote: Symbol,
    splice_unquote: Symbol,
    cons: Symbol,
    concat: Symbol,
}

static QQ: LazyLock<QuasiquoteSymbols> = LazyLock::new(|| QuasiquoteSymbols {
    quote: Symbol::get_or_create("quote"),
    unquote: Symbol::get_or_create("unquote"),
    splice_unquote: Symbol::get_or_create("splice-unquote"),
    cons: Symbol::get_or_create("cons"),
    concat: Symbol::get_or_create("concat"),
});

/// Evaluate `form` in `env` to a final value.
pub fn eval(form: &Value, env: &Environment) -> Result<Value, Error> {
    let _guard = DepthGuard::enter()?;
    let mut form = form.clone();
    let mut env = env.clone();

    loop {
        let items = match &form {
            Value::List(items) if !items.is_empty() => Rc::clone(items),
            Value::List(_) => return Ok(Value::Nil),
            _ => return eval_ast(&form, &env),
        };

        let step = if let Value::Symbol(head) = &items[0]
            && let Some(special) = SPECIAL_FORMS.get(head)
        {
            let args = &items[1..];
            special.arity.validate(special.name, args.len())?;
            (special.apply)(args, &env)?
        } else {
            apply_form(&items, &env)?
        };

        match step {
            Step::Done(value) => return Ok(value),
            Step::TailCall(next_form, next_env) => {
                trace!(form = %next_form, "tail call");
                form = next_form;
                env = next_env;
            }
        }
    }
}

/// Evaluate a non-application form: symbols are looked up, containers are rebuilt with
/// their elements evaluated, everything else evaluates to itself.
fn eval_ast(form: &Value, env: &Environment) -> Result<Value, Error> {
    match form {
        Value::Symbol(symbol) => env.get(*symbol),
        Value::List(items) => Ok(Value::list(eval_all(items, env)?)),
        Value::Vector(items) => Ok(Value::vector(eval_all(items, env)?)),
        Value::Map(map) => {
            let mut evaluated = MapType::with_capacity(map.len());
            for (key, value) in map.iter() {
                evaluated.insert(key.clone(), eval(value, env)?);
            }
            Ok(Value::Map(Rc::new(evaluated)))
        }
        _ => Ok(form.clone()),
    }
}

fn eval_all(items: &[Value], env: &Environment) -> Result<Vec<Value>, Error> {
    let mut evaluated = Vec::with_capacity(items.len());
    for item in items {
        evaluated.push(eval(item, env)?);
    }
    Ok(evaluated)
}

/// Ordinary application: closures continue the loop in a fresh scope, natives are leaves.
fn apply_form(items: &[Value], env: &Environment) -> Result<Step, Error> {
    let head = eval(&items[0], env)?;
    let args = eval_all(&items[1..], env)?;

    match &head {
        Value::Closure(closure) => Ok(Step::TailCall(
            closure.body.clone(),
            Environment::with_bindings(&closure.env, &closure.params, args),
        )),
        Value::NativeFunction { func, .. } => func(args).map(Step::Done),
        other => Err(Error::NotCallable(other.clone())),
    }
}

/// Call `func` with already-evaluated `args` and run it to completion.
///
/// This is the entry point for natives that call back into user code (`map`, `apply`,
/// `swap!`); such calls are not tail-call optimized.
pub fn apply(func: &Value, args: Vec<Value>) -> Result<Value, Error> {
    match func {
        Value::Closure(closure) => {
            let env = Environment::with_bindings(&closure.env, &closure.params, args);
            eval(&closure.body, &env)
        }
        Value::NativeFunction { func, .. } => func(args),
        other => Err(Error::NotCallable(other.clone())),
    }
}

/// `(def! symbol expr)`
fn eval_def(args: &[Value], env: &Environment) -> Result<Step, Error> {
    match args {
        [Value::Symbol(name), expr] => {
            let value = eval(expr, env)?;
            debug!(symbol = %name, "def!");
            Ok(Step::Done(env.set(*name, value)))
        }
        [other, _] => Err(Error::unexpected_type(other, &[ValueType::Symbol])),
        _ => Err(Error::parameters("def!", 2, args.len())),
    }
}

/// `(let* (name expr ...) body)`: each value sees the bindings before it.
fn eval_let(args: &[Value], env: &Environment) -> Result<Step, Error> {
    let [bindings, body] = args else {
        return Err(Error::parameters("let*", 2, args.len()));
    };

    let child = Environment::with_outer(env);
    for pair in group(bindings.expect_sequence()?, 2)? {
        let Value::Symbol(name) = &pair[0] else {
            return Err(Error::unexpected_type(&pair[0], &[ValueType::Symbol]));
        };
        let value = eval(&pair[1], &child)?;
        child.set(*name, value);
    }

    Ok(Step::TailCall(body.clone(), child))
}

fn eval_do(args: &[Value], env: &Environment) -> Result<Step, Error> {
    let [effects @ .., last] = args else {
        return Err(Error::multiple_parameters("do", 1, 0));
    };
    for effect in effects {
        eval(effect, env)?;
    }
    Ok(Step::TailCall(last.clone(), env.clone()))
}

fn eval_if(args: &[Value], env: &Environment) -> Result<Step, Error> {
    let (condition, then_branch, else_branch) = match args {
        [condition, then_branch] => (condition, then_branch, None),
        [condition, then_branch, else_branch] => (condition, then_branch, Some(else_branch)),
        _ => return Err(Error::parameters("if", 3, args.len())),
    };

    let branch = if eval(condition, env)?.is_truthy() {
        then_branch.clone()
    } else {
        else_branch.cloned().unwrap_or(Value::Nil)
    };
    Ok(Step::TailCall(branch, env.clone()))
}

/// `(fn* (params ...) body)`: captures the current scope by reference.
fn eval_fn(args: &[Value], env: &Environment) -> Result<Step, Error> {
    let [params, body] = args else {
        return Err(Error::parameters("fn*", 2, args.len()));
    };
    let params = ParamSpec::from_forms(params.expect_sequence()?)?;

    Ok(Step::Done(Value::Closure(Rc::new(Closure {
        params,
        body: body.clone(),
        env: env.clone(),
    }))))
}

fn eval_quote(args: &[Value], _env: &Environment) -> Result<Step, Error> {
    match args {
        [form] => Ok(Step::Done(form.clone())),
        _ => Err(Error::parameters("quote", 1, args.len())),
    }
}

fn eval_quasiquote(args: &[Value], env: &Environment) -> Result<Step, Error> {
    match args {
        [form] => Ok(Step::TailCall(quasiquote(form)?, env.clone())),
        _ => Err(Error::parameters("quasiquote", 1, args.len())),
    }
}

/// `(eval expr)`: the resulting form runs in the root scope, not the caller's.
fn eval_eval(args: &[Value], env: &Environment) -> Result<Step, Error> {
    match args {
        [expr] => Ok(Step::TailCall(eval(expr, env)?, env.root())),
        _ => Err(Error::parameters("eval", 1, args.len())),
    }
}

/// Expand a quasiquote template into code that builds it.
///
/// - anything but a non-empty list becomes `(quote x)`
/// - `(unquote x)` becomes `x`, left for the caller to evaluate
/// - an element `(splice-unquote y)` becomes `(concat y <rest>)`
/// - any other element `e` becomes `(cons <e> <rest>)`
///
/// The list is walked from its end, so long templates do not recurse per element.
pub fn quasiquote(form: &Value) -> Result<Value, Error> {
    let items = match form {
        Value::List(items) if !items.is_empty() => items,
        _ => return Ok(Value::list(vec![Value::Symbol(QQ.quote), form.clone()])),
    };

    // The expansion of the empty tail
    let mut expansion = Value::list(vec![Value::Symbol(QQ.quote), Value::list(Vec::new())]);

    for (index, item) in items.iter().enumerate().rev() {
        let rest = &items[index + 1..];
        expansion = match item {
            Value::Symbol(s) if *s == QQ.unquote => match rest {
                [unquoted] => unquoted.clone(),
                _ => return Err(Error::parameters("unquote", 1, rest.len())),
            },
            Value::List(inner)
                if matches!(inner.first(), Some(Value::Symbol(s)) if *s == QQ.splice_unquote) =>
            {
                match inner.as_slice() {
                    [_, spliced] => {
                        Value::list(vec![Value::Symbol(QQ.concat), spliced.clone(), expansion])
                    }
                    _ => return Err(Error::parameters("splice-unquote", 1, inner.len() - 1)),
                }
            }
            _ => Value::list(vec![Value::Symbol(QQ.cons), quasiquote(item)?, expansion]),
        };
    }

    trace!(template = %form, expansion = %expansion, "quasiquote");
    Ok(expansion)
}

/// Forms evaluated into every global environment after the natives are installed
const PRELUDE: &[&str] = &[
    "(def! not (fn* (a) (if a false true)))",
    r#"(def! load-file (fn* (path) (eval (read-string (str "(do " (slurp path) "\nnil)")))))"#,
];

/// Create a global environment with the native library and prelude installed.
pub fn create_global_env() -> Environment {
    let env = Environment::new();

    let ops = builtin_ops();
    debug!(count = ops.len(), "installing native library");
    for op in ops {
        env.set(Symbol::get_or_create(op.id), op.to_value());
    }
    env.set(Symbol::get_or_create("*ARGV*"), Value::list(Vec::new()));

    for source in PRELUDE {
        let form = reader::read_str(source)
            .ok()
            .flatten()
            .expect("prelude forms are well-formed");
        eval(&form, &env).expect("prelude forms evaluate");
    }

    env
}
