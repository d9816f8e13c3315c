//! The native function library installed into every global environment.
//!
//! ```clojure
//! (+ 1 2 3)                 ; arithmetic over numbers
//! (< 1 2 3)                 ; comparisons hold for every adjacent pair
//! (cons 0 [1 2])            ; sequences: lists and vectors, results are lists
//! (get {:a 1} :a)           ; maps keyed by keywords and strings
//! (swap! counter + 1)       ; atoms, the one mutable cell
//! (pr-str "a" :b)           ; printing and reading
//! ```
//!
//! ## Error Handling
//!
//! Every native validates its own arity and argument types and reports failures through the
//! crate [`Error`] taxonomy:
//!
//! - **Arity**: the registry arity is checked before the native runs
//! - **Types**: typed parameters (`Number`, `&str`, `NumIter`) reject other values up front
//! - **Overflow**: integer arithmetic is checked; any float operand promotes to float
//!
//! ## Adding New Operations
//!
//! 1. **Implement the function** with typed parameters (`Value`, `Number`, `&str`,
//!    `ValueIter<'_>`, `NumIter<'_>`) returning `R` or `Result<R, Error>` with `R: Into<Value>`
//! 2. **Add it to [`builtin_ops`]** with its identifier and arity
//! 3. **Add tests** covering edge cases and error conditions

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use tracing::debug;

use crate::ast::{Keyword, MapKey, MapType, Number, Symbol, Value, ValueType};
use crate::evaluator::intooperation::{IntoOperation, IntoVariadicOperation, OperationFn};
use crate::evaluator::{self, Arity, NumIter, ValueIter};
use crate::{Error, printer, reader};

/// Definition of a native operation
#[derive(Clone)]
pub struct BuiltinOp {
    /// The name the operation is bound to
    pub id: &'static str,
    /// The implementation, already wrapped by the adapter layer
    pub func: Rc<OperationFn>,
    /// Accepted argument counts, checked before `func` runs
    pub arity: Arity,
}

impl std::fmt::Debug for BuiltinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BuiltinOp({}, {:?})", self.id, self.arity)
    }
}

impl BuiltinOp {
    /// The callable value bound in the global environment.
    pub fn to_value(&self) -> Value {
        let id = self.id;
        let arity = self.arity;
        let func = Rc::clone(&self.func);
        Value::NativeFunction {
            id: Rc::from(id),
            func: Rc::new(move |args: Vec<Value>| {
                arity.validate(id, args.len())?;
                func(args)
            }),
        }
    }
}

//
// Arithmetic
//

fn builtin_add(args: NumIter<'_>) -> Result<Number, Error> {
    args.fold(Ok(Number::Int(0)), |acc, n| acc?.add(n))
}

fn builtin_sub(mut args: NumIter<'_>) -> Result<Number, Error> {
    match args.next() {
        None => Ok(Number::Int(0)),
        Some(only) if args.len() == 0 => only.neg(),
        Some(first) => args.fold(Ok(first), |acc, n| acc?.sub(n)),
    }
}

fn builtin_mul(args: NumIter<'_>) -> Result<Number, Error> {
    args.fold(Ok(Number::Int(1)), |acc, n| acc?.mul(n))
}

fn builtin_div(first: Number, rest: NumIter<'_>) -> Result<Number, Error> {
    if rest.len() == 0 {
        return Number::Int(1).div(first);
    }
    rest.fold(Ok(first), |acc, n| acc?.div(n))
}

//
// Comparison
//

// Numeric comparisons hold when every adjacent pair is ordered as given
macro_rules! numeric_comparison {
    ($name:ident, $($ordering:pat_param)|+) => {
        fn $name(first: Number, rest: NumIter<'_>) -> bool {
            let mut previous = first;
            for n in rest {
                if !matches!(previous.compare(n), Some($($ordering)|+)) {
                    return false;
                }
                previous = n;
            }
            true
        }
    };
}

numeric_comparison!(builtin_lt, Ordering::Less);
numeric_comparison!(builtin_le, Ordering::Less | Ordering::Equal);
numeric_comparison!(builtin_gt, Ordering::Greater);
numeric_comparison!(builtin_ge, Ordering::Greater | Ordering::Equal);

fn builtin_equal(first: Value, rest: ValueIter<'_>) -> bool {
    let mut previous = &first;
    for value in rest {
        if previous != value {
            return false;
        }
        previous = value;
    }
    true
}

//
// Sequences
//

/// Elements of a list or vector; `nil` reads as the empty sequence.
fn sequence_or_nil(value: &Value) -> Result<&[Value], Error> {
    match value {
        Value::Nil => Ok(Default::default()),
        _ => value.expect_sequence(),
    }
}

fn builtin_list(args: ValueIter<'_>) -> Value {
    Value::list(args.cloned().collect())
}

fn builtin_vector(args: ValueIter<'_>) -> Value {
    Value::vector(args.cloned().collect())
}

fn builtin_vec(value: Value) -> Result<Value, Error> {
    match &value {
        Value::Vector(_) => Ok(value),
        Value::List(items) => Ok(Value::Vector(Rc::clone(items))),
        Value::Nil => Ok(Value::vector(Vec::new())),
        other => Err(Error::unexpected_type(
            other,
            &[ValueType::List, ValueType::Vector, ValueType::Nil],
        )),
    }
}

fn builtin_is_empty(value: Value) -> Result<bool, Error> {
    match &value {
        Value::Map(map) => Ok(map.is_empty()),
        _ => Ok(sequence_or_nil(&value)?.is_empty()),
    }
}

fn builtin_count(value: Value) -> Result<usize, Error> {
    match &value {
        Value::Map(map) => Ok(map.len()),
        _ => Ok(sequence_or_nil(&value)?.len()),
    }
}

fn builtin_cons(first: Value, rest: Value) -> Result<Value, Error> {
    let rest = sequence_or_nil(&rest)?;
    let mut items = Vec::with_capacity(rest.len() + 1);
    items.push(first);
    items.extend(rest.iter().cloned());
    Ok(Value::list(items))
}

fn builtin_concat(seqs: ValueIter<'_>) -> Result<Value, Error> {
    let mut items = Vec::new();
    for seq in seqs {
        items.extend(sequence_or_nil(seq)?.iter().cloned());
    }
    Ok(Value::list(items))
}

fn builtin_nth(seq: Value, index: Number) -> Result<Value, Error> {
    let items = seq.expect_sequence()?;
    let Number::Int(index) = index else {
        return Err(Error::unexpected_type(&Value::Number(index), &[ValueType::Number]));
    };
    usize::try_from(index)
        .ok()
        .and_then(|i| items.get(i))
        .cloned()
        .ok_or(Error::IndexOutOfRange {
            index,
            len: items.len(),
        })
}

fn builtin_first(seq: Value) -> Result<Value, Error> {
    Ok(sequence_or_nil(&seq)?
        .first()
        .cloned()
        .unwrap_or(Value::Nil))
}

fn builtin_rest(seq: Value) -> Result<Value, Error> {
    let items = sequence_or_nil(&seq)?;
    Ok(Value::list(items.get(1..).unwrap_or_default().to_vec()))
}

/// `(apply f a b [c d])` calls `(f a b c d)`.
fn builtin_apply(func: Value, args: ValueIter<'_>) -> Result<Value, Error> {
    let [leading @ .., last] = args.as_slice() else {
        return Err(Error::multiple_parameters("apply", 2, 1));
    };
    let mut call_args = leading.to_vec();
    call_args.extend(last.expect_sequence()?.iter().cloned());
    evaluator::apply(&func, call_args)
}

fn builtin_map(func: Value, seq: Value) -> Result<Value, Error> {
    if !func.is_callable() {
        return Err(Error::NotCallable(func));
    }
    let mapped = sequence_or_nil(&seq)?
        .iter()
        .map(|item| evaluator::apply(&func, vec![item.clone()]))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::list(mapped))
}

//
// Maps
//

fn expect_map(value: &Value) -> Result<&MapType, Error> {
    match value {
        Value::Map(map) => Ok(&**map),
        other => Err(Error::unexpected_type(other, &[ValueType::Map])),
    }
}

fn builtin_hash_map(args: ValueIter<'_>) -> Result<Value, Error> {
    Value::map_from_pairs(args.as_slice())
}

fn builtin_assoc(map: Value, pairs: ValueIter<'_>) -> Result<Value, Error> {
    map.assoc(pairs.as_slice())
}

fn builtin_dissoc(map: Value, keys: ValueIter<'_>) -> Result<Value, Error> {
    map.dissoc(keys.as_slice())
}

fn builtin_get(map: Value, key: Value) -> Result<Value, Error> {
    match &map {
        Value::Nil => Ok(Value::Undefined),
        _ => Ok(expect_map(&map)?
            .get(&MapKey::from_value(&key)?)
            .cloned()
            .unwrap_or(Value::Undefined)),
    }
}

fn builtin_contains(map: Value, key: Value) -> Result<bool, Error> {
    match &map {
        Value::Nil => Ok(false),
        _ => Ok(expect_map(&map)?.contains_key(&MapKey::from_value(&key)?)),
    }
}

fn builtin_keys(map: Value) -> Result<Value, Error> {
    Ok(Value::list(
        expect_map(&map)?.keys().map(MapKey::to_value).collect(),
    ))
}

fn builtin_vals(map: Value) -> Result<Value, Error> {
    Ok(Value::list(expect_map(&map)?.values().cloned().collect()))
}

//
// Predicates and constructors
//

macro_rules! type_predicate {
    ($name:ident, $pattern:pat) => {
        fn $name(value: Value) -> bool {
            matches!(value, $pattern)
        }
    };
}

type_predicate!(builtin_is_nil, Value::Nil);
type_predicate!(builtin_is_true, Value::Bool(true));
type_predicate!(builtin_is_false, Value::Bool(false));
type_predicate!(builtin_is_symbol, Value::Symbol(_));
type_predicate!(builtin_is_keyword, Value::Keyword(_));
type_predicate!(builtin_is_string, Value::String(_));
type_predicate!(builtin_is_number, Value::Number(_));
type_predicate!(builtin_is_list, Value::List(_));
type_predicate!(builtin_is_vector, Value::Vector(_));
type_predicate!(builtin_is_sequential, Value::List(_) | Value::Vector(_));
type_predicate!(builtin_is_map, Value::Map(_));
type_predicate!(builtin_is_atom, Value::Atom(_));
type_predicate!(
    builtin_is_fn,
    Value::Closure(_) | Value::NativeFunction { .. }
);

fn builtin_symbol(name: &str) -> Value {
    Value::Symbol(Symbol::get_or_create(name))
}

fn builtin_keyword(value: Value) -> Result<Value, Error> {
    match &value {
        Value::Keyword(_) => Ok(value),
        Value::String(name) => Ok(Value::Keyword(Keyword::get_or_create(name))),
        other => Err(Error::unexpected_type(
            other,
            &[ValueType::String, ValueType::Keyword],
        )),
    }
}

//
// Strings and I/O
//

fn builtin_pr_str(args: ValueIter<'_>) -> String {
    printer::pr_seq(args.as_slice(), true, " ")
}

fn builtin_str(args: ValueIter<'_>) -> String {
    printer::pr_seq(args.as_slice(), false, "")
}

fn builtin_prn(args: ValueIter<'_>) -> Value {
    println!("{}", printer::pr_seq(args.as_slice(), true, " "));
    Value::Nil
}

fn builtin_println(args: ValueIter<'_>) -> Value {
    println!("{}", printer::pr_seq(args.as_slice(), false, " "));
    Value::Nil
}

fn builtin_read_string(text: &str) -> Result<Value, Error> {
    Ok(reader::read_str(text)?.unwrap_or(Value::Nil))
}

fn builtin_slurp(path: &str) -> Result<String, Error> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::EvalError(format!("Cannot read file '{path}': {e}")))?;
    debug!(path, bytes = contents.len(), "slurp");
    Ok(contents)
}

//
// Atoms
//

fn expect_atom(value: &Value) -> Result<&RefCell<Value>, Error> {
    match value {
        Value::Atom(cell) => Ok(&**cell),
        other => Err(Error::unexpected_type(other, &[ValueType::Atom])),
    }
}

fn builtin_atom(value: Value) -> Value {
    Value::atom(value)
}

fn builtin_deref(atom: Value) -> Result<Value, Error> {
    Ok(expect_atom(&atom)?.borrow().clone())
}

fn builtin_reset(atom: Value, value: Value) -> Result<Value, Error> {
    *expect_atom(&atom)?.borrow_mut() = value.clone();
    Ok(value)
}

/// `(swap! a f x y)` stores `(f @a x y)` and returns it.
fn builtin_swap(atom: Value, func: Value, args: ValueIter<'_>) -> Result<Value, Error> {
    let cell = expect_atom(&atom)?;
    // The cell is not borrowed while `func` runs, so it may read the atom itself
    let current = cell.borrow().clone();

    let mut call_args = Vec::with_capacity(args.len() + 1);
    call_args.push(current);
    call_args.extend(args.cloned());

    let updated = evaluator::apply(&func, call_args)?;
    *cell.borrow_mut() = updated.clone();
    Ok(updated)
}

/// The full native library.
///
/// Each call builds fresh callables; the global environment holds the only long-lived
/// copies.
pub(crate) fn builtin_ops() -> Vec<BuiltinOp> {
    fn builtin_fixed<Args, F>(id: &'static str, arity: Arity, f: F) -> BuiltinOp
    where
        F: IntoOperation<Args>,
    {
        BuiltinOp {
            id,
            func: <F as IntoOperation<Args>>::into_operation(f, id),
            arity,
        }
    }

    fn builtin_variadic<Args, F>(id: &'static str, arity: Arity, f: F) -> BuiltinOp
    where
        F: IntoVariadicOperation<Args>,
    {
        BuiltinOp {
            id,
            func: <F as IntoVariadicOperation<Args>>::into_variadic_operation(f, id),
            arity,
        }
    }

    use Arity::{Any, AtLeast, Exact};

    vec![
        // Arithmetic
        builtin_variadic::<(NumIter<'static>,), _>("+", Any, builtin_add),
        builtin_variadic::<(NumIter<'static>,), _>("-", Any, builtin_sub),
        builtin_variadic::<(NumIter<'static>,), _>("*", Any, builtin_mul),
        builtin_variadic::<(Number, NumIter<'static>), _>("/", AtLeast(1), builtin_div),
        // Comparison
        builtin_variadic::<(Number, NumIter<'static>), _>("<", AtLeast(1), builtin_lt),
        builtin_variadic::<(Number, NumIter<'static>), _>("<=", AtLeast(1), builtin_le),
        builtin_variadic::<(Number, NumIter<'static>), _>(">", AtLeast(1), builtin_gt),
        builtin_variadic::<(Number, NumIter<'static>), _>(">=", AtLeast(1), builtin_ge),
        builtin_variadic::<(Value, ValueIter<'static>), _>("=", AtLeast(1), builtin_equal),
        // Sequences
        builtin_variadic::<(ValueIter<'static>,), _>("list", Any, builtin_list),
        builtin_fixed::<(Value,), _>("list?", Exact(1), builtin_is_list),
        builtin_variadic::<(ValueIter<'static>,), _>("vector", Any, builtin_vector),
        builtin_fixed::<(Value,), _>("vector?", Exact(1), builtin_is_vector),
        builtin_fixed::<(Value,), _>("vec", Exact(1), builtin_vec),
        builtin_fixed::<(Value,), _>("sequential?", Exact(1), builtin_is_sequential),
        builtin_fixed::<(Value,), _>("empty?", Exact(1), builtin_is_empty),
        builtin_fixed::<(Value,), _>("count", Exact(1), builtin_count),
        builtin_fixed::<(Value, Value), _>("cons", Exact(2), builtin_cons),
        builtin_variadic::<(ValueIter<'static>,), _>("concat", Any, builtin_concat),
        builtin_fixed::<(Value, Number), _>("nth", Exact(2), builtin_nth),
        builtin_fixed::<(Value,), _>("first", Exact(1), builtin_first),
        builtin_fixed::<(Value,), _>("rest", Exact(1), builtin_rest),
        builtin_variadic::<(Value, ValueIter<'static>), _>("apply", AtLeast(2), builtin_apply),
        builtin_fixed::<(Value, Value), _>("map", Exact(2), builtin_map),
        // Maps
        builtin_variadic::<(ValueIter<'static>,), _>("hash-map", Any, builtin_hash_map),
        builtin_fixed::<(Value,), _>("map?", Exact(1), builtin_is_map),
        builtin_variadic::<(Value, ValueIter<'static>), _>("assoc", AtLeast(1), builtin_assoc),
        builtin_variadic::<(Value, ValueIter<'static>), _>("dissoc", AtLeast(1), builtin_dissoc),
        builtin_fixed::<(Value, Value), _>("get", Exact(2), builtin_get),
        builtin_fixed::<(Value, Value), _>("contains?", Exact(2), builtin_contains),
        builtin_fixed::<(Value,), _>("keys", Exact(1), builtin_keys),
        builtin_fixed::<(Value,), _>("vals", Exact(1), builtin_vals),
        // Predicates
        builtin_fixed::<(Value,), _>("nil?", Exact(1), builtin_is_nil),
        builtin_fixed::<(Value,), _>("true?", Exact(1), builtin_is_true),
        builtin_fixed::<(Value,), _>("false?", Exact(1), builtin_is_false),
        builtin_fixed::<(Value,), _>("symbol?", Exact(1), builtin_is_symbol),
        builtin_fixed::<(Value,), _>("keyword?", Exact(1), builtin_is_keyword),
        builtin_fixed::<(Value,), _>("string?", Exact(1), builtin_is_string),
        builtin_fixed::<(Value,), _>("number?", Exact(1), builtin_is_number),
        builtin_fixed::<(Value,), _>("fn?", Exact(1), builtin_is_fn),
        // Constructors
        builtin_fixed::<(&'static str,), _>("symbol", Exact(1), builtin_symbol),
        builtin_fixed::<(Value,), _>("keyword", Exact(1), builtin_keyword),
        // Strings and I/O
        builtin_variadic::<(ValueIter<'static>,), _>("pr-str", Any, builtin_pr_str),
        builtin_variadic::<(ValueIter<'static>,), _>("str", Any, builtin_str),
        builtin_variadic::<(ValueIter<'static>,), _>("prn", Any, builtin_prn),
        builtin_variadic::<(ValueIter<'static>,), _>("println", Any, builtin_println),
        builtin_fixed::<(&'static str,), _>("read-string", Exact(1), builtin_read_string),
        builtin_fixed::<(&'static str,), _>("slurp", Exact(1), builtin_slurp),
        // Atoms
        builtin_fixed::<(Value,), _>("atom", Exact(1), builtin_atom),
        builtin_fixed::<(Value,), _>("atom?", Exact(1), builtin_is_atom),
        builtin_fixed::<(Value,), _>("deref", Exact(1), builtin_deref),
        builtin_fixed::<(Value, Value), _>("reset!", Exact(2), builtin_reset),
        builtin_variadic::<(Value, Value, ValueIter<'static>), _>(
            "swap!",
            AtLeast(2),
            builtin_swap,
        ),
    ]
}

/// Names of every native, used to seed the symbol registry.
///
/// Building the table creates callables but never interns, so this is safe to call while
/// the registry itself is being initialized.
pub(crate) fn builtin_names() -> Vec<&'static str> {
    builtin_ops().iter().map(|op| op.id).collect()
}
