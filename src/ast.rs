//! This module defines the value model: the single tagged union, [`Value`], that every
//! runtime datum and every piece of read source code is represented with.
//!
//! Scalars (numbers, strings, booleans, `nil`, `undefined`) are plain data. Symbols and
//! keywords are interned handles (see [`crate::intern`]). Lists, vectors and maps are
//! immutable once built and are shared through `Rc`, so cloning a `Value` is cheap and a
//! closure body can be shared by every invocation. Atoms are the one mutable cell.
//!
//! Ergonomic helpers such as [`val`], [`sym`], [`kw`] and [`nil`] build values in code and
//! tests, and `From` conversions cover the common Rust literal types.

use indexmap::IndexMap;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use crate::Error;
use crate::evaluator::Environment;
use crate::evaluator::intooperation::OperationFn;

pub use crate::intern::{Keyword, Symbol};

/// Integer representation
pub type NumberType = i64;

/// Fractional representation
pub type FloatType = f64;

/// Numeric scalar: integral or fractional
#[derive(Debug, Clone, Copy)]
pub enum Number {
    Int(NumberType),
    Float(FloatType),
}

macro_rules! checked_arithmetic {
    ($name:ident, $checked:ident, $op:tt, $what:literal) => {
        pub(crate) fn $name(self, other: Number) -> Result<Number, Error> {
            match (self, other) {
                (Number::Int(a), Number::Int(b)) => a
                    .$checked(b)
                    .map(Number::Int)
                    .ok_or_else(|| Error::EvalError(concat!("Integer overflow in ", $what).into())),
                (a, b) => Ok(Number::Float(a.as_f64() $op b.as_f64())),
            }
        }
    };
}

impl Number {
    pub fn as_f64(self) -> FloatType {
        match self {
            Number::Int(n) => n as FloatType,
            Number::Float(x) => x,
        }
    }

    checked_arithmetic!(add, checked_add, +, "addition");
    checked_arithmetic!(sub, checked_sub, -, "subtraction");
    checked_arithmetic!(mul, checked_mul, *, "multiplication");

    /// Integer division stays integral only when exact.
    pub(crate) fn div(self, other: Number) -> Result<Number, Error> {
        match (self, other) {
            (Number::Int(_), Number::Int(0)) => Err(Error::EvalError("Division by zero".into())),
            (Number::Int(a), Number::Int(b)) => match a.checked_rem(b) {
                // `MIN / -1` is the only quotient that does not fit
                None => Err(Error::EvalError("Integer overflow in division".into())),
                Some(0) => Ok(Number::Int(a / b)),
                Some(_) => Ok(Number::Float(a as FloatType / b as FloatType)),
            },
            (a, b) => Ok(Number::Float(a.as_f64() / b.as_f64())),
        }
    }

    pub(crate) fn neg(self) -> Result<Number, Error> {
        match self {
            Number::Int(n) => n
                .checked_neg()
                .map(Number::Int)
                .ok_or_else(|| Error::EvalError("Integer overflow in negation".into())),
            Number::Float(x) => Ok(Number::Float(-x)),
        }
    }

    pub(crate) fn compare(self, other: Number) -> Option<Ordering> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.compare(*other) == Some(Ordering::Equal)
    }
}

impl std::fmt::Display for Number {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Number::Int(n) => write!(f, "{n}"),
            Number::Float(x) => {
                // Keep a fractional part so the text reads back as a float
                let text = format!("{x}");
                if x.is_finite() && !text.contains('.') {
                    write!(f, "{text}.0")
                } else {
                    f.write_str(&text)
                }
            }
        }
    }
}

/// Variant tags, used to report which types a call site accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Number,
    String,
    Boolean,
    Nil,
    Undefined,
    Symbol,
    Keyword,
    List,
    Vector,
    Map,
    Atom,
    Function,
    NativeFunction,
}

impl ValueType {
    pub fn name(self) -> &'static str {
        match self {
            ValueType::Number => "Number",
            ValueType::String => "String",
            ValueType::Boolean => "Boolean",
            ValueType::Nil => "Nil",
            ValueType::Undefined => "Undefined",
            ValueType::Symbol => "Symbol",
            ValueType::Keyword => "Keyword",
            ValueType::List => "List",
            ValueType::Vector => "Vector",
            ValueType::Map => "Map",
            ValueType::Atom => "Atom",
            ValueType::Function => "Function",
            ValueType::NativeFunction => "NativeFunction",
        }
    }
}

/// Types accepted wherever a sequence is required
pub(crate) const SEQUENTIAL: &[ValueType] = &[ValueType::List, ValueType::Vector];

/// Types accepted as map keys
pub(crate) const MAP_KEY: &[ValueType] = &[ValueType::Keyword, ValueType::String];

/// A map key: only keywords and strings may key a map
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    Keyword(Keyword),
    String(Rc<str>),
}

impl MapKey {
    pub fn from_value(value: &Value) -> Result<MapKey, Error> {
        match value {
            Value::Keyword(k) => Ok(MapKey::Keyword(*k)),
            Value::String(s) => Ok(MapKey::String(s.clone())),
            other => Err(Error::unexpected_type(other, MAP_KEY)),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            MapKey::Keyword(k) => Value::Keyword(*k),
            MapKey::String(s) => Value::String(s.clone()),
        }
    }
}

pub type MapType = IndexMap<MapKey, Value>;

/// Ordered parameter symbols plus an optional variadic capture.
///
/// `(a b & rest)` declares `a` and `b` positionally and collects everything after them
/// into `rest`. The rest marker must be the second-to-last declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    positional: Vec<Symbol>,
    rest: Option<Symbol>,
}

impl ParamSpec {
    pub const REST_MARKER: &'static str = "&";

    /// Build a parameter spec from a sequence of symbol forms.
    pub fn from_forms(forms: &[Value]) -> Result<ParamSpec, Error> {
        let marker = Symbol::get_or_create(Self::REST_MARKER);
        let mut positional = Vec::with_capacity(forms.len());

        for (index, form) in forms.iter().enumerate() {
            let Value::Symbol(symbol) = form else {
                return Err(Error::unexpected_type(form, &[ValueType::Symbol]));
            };
            if *symbol == marker {
                if index + 2 != forms.len() {
                    return Err(Error::InvalidRestParameter(*symbol));
                }
                return match &forms[index + 1] {
                    Value::Symbol(rest) => Ok(ParamSpec {
                        positional,
                        rest: Some(*rest),
                    }),
                    other => Err(Error::unexpected_type(other, &[ValueType::Symbol])),
                };
            }
            positional.push(*symbol);
        }

        Ok(ParamSpec {
            positional,
            rest: None,
        })
    }

    pub fn positional(&self) -> &[Symbol] {
        &self.positional
    }

    pub fn rest(&self) -> Option<Symbol> {
        self.rest
    }
}

/// A user-defined function: body, parameters and the environment it was defined in.
pub struct Closure {
    pub(crate) params: ParamSpec,
    pub(crate) body: Value,
    pub(crate) env: Environment,
}

impl Closure {
    pub fn params(&self) -> &ParamSpec {
        &self.params
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }
}

/// Core value type of the interpreter
///
/// To build values in code, use the ergonomic helpers:
/// - `val(42)`, `val(1.5)`, `val("text")`, `val(true)` for scalars
/// - `sym("name")`, `kw("name")` for interned names, `nil()` for nil
/// - `val([1, 2, 3])` for homogeneous lists, `val(vec![sym("op"), val(42)])` for mixed ones
#[derive(Clone)]
pub enum Value {
    Number(Number),
    String(Rc<str>),
    Bool(bool),
    /// The language's explicit null
    Nil,
    /// Absent or out-of-range, distinct from `Nil`
    Undefined,
    Symbol(Symbol),
    Keyword(Keyword),
    /// Code-shaped sequence `( ... )`
    List(Rc<Vec<Value>>),
    /// Data-shaped sequence `[ ... ]`
    Vector(Rc<Vec<Value>>),
    Map(Rc<MapType>),
    /// The only value whose contents change in place
    Atom(Rc<RefCell<Value>>),
    /// User-defined function; its environment is shared, not copied
    Closure(Rc<Closure>),
    /// Host function, compared by its id
    NativeFunction {
        id: Rc<str>,
        func: Rc<OperationFn>,
    },
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn write_items(
            f: &mut std::fmt::Formatter<'_>,
            name: &str,
            items: &[Value],
        ) -> std::fmt::Result {
            write!(f, "{name}(")?;
            for (i, v) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{v:?}")?;
            }
            write!(f, ")")
        }

        match self {
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Nil => write!(f, "Nil"),
            Value::Undefined => write!(f, "Undefined"),
            Value::Symbol(s) => write!(f, "{s:?}"),
            Value::Keyword(k) => write!(f, "{k:?}"),
            Value::List(items) => write_items(f, "List", items),
            Value::Vector(items) => write_items(f, "Vector", items),
            Value::Map(map) => {
                write!(f, "Map(")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?} => {v:?}", k.to_value())?;
                }
                write!(f, ")")
            }
            // The printer bounds atom cycles
            Value::Atom(cell) => write!(f, "Atom({})", cell.borrow()),
            Value::Closure(closure) => write!(
                f,
                "Function(params={:?}, body={:?})",
                closure.params, closure.body
            ),
            Value::NativeFunction { id, .. } => write!(f, "NativeFunction({id})"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        Value::Number(n)
    }
}

impl From<FloatType> for Value {
    fn from(x: FloatType) -> Self {
        Value::Number(Number::Float(x))
    }
}

impl From<Symbol> for Value {
    fn from(s: Symbol) -> Self {
        Value::Symbol(s)
    }
}

impl From<Keyword> for Value {
    fn from(k: Keyword) -> Self {
        Value::Keyword(k)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Number(Number::Int(n as NumberType))
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(NumberType);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);
impl_from_integer!(usize);

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::list(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::list(arr.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value> + Clone> From<&[T]> for Value {
    fn from(slice: &[T]) -> Self {
        Value::list(slice.iter().cloned().map(Into::into).collect())
    }
}

impl TryFrom<Value> for Number {
    type Error = Error;

    fn try_from(value: Value) -> Result<Number, Error> {
        if let Value::Number(n) = value {
            Ok(n)
        } else {
            Err(Error::unexpected_type(&value, &[ValueType::Number]))
        }
    }
}

/// Helper for interned symbols
pub fn sym<S: AsRef<str>>(name: S) -> Value {
    Value::Symbol(Symbol::get_or_create(name.as_ref()))
}

/// Helper for interned keywords (name without the leading `:`)
pub fn kw<S: AsRef<str>>(name: S) -> Value {
    Value::Keyword(Keyword::get_or_create(name.as_ref()))
}

/// Helper for any value convertible with `Into<Value>`
pub fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

/// Helper for the nil singleton
pub fn nil() -> Value {
    Value::Nil
}

/// Helper for vectors, the list counterpart of [`val`] on arrays
pub fn vector<T: Into<Value>, I: IntoIterator<Item = T>>(items: I) -> Value {
    Value::vector(items.into_iter().map(Into::into).collect())
}

/// Split `items` into groups of `size`, rejecting a trailing partial group.
pub fn group(items: &[Value], size: usize) -> Result<std::slice::Chunks<'_, Value>, Error> {
    if items.len() % size != 0 {
        return Err(Error::UnexpectedLength {
            got: items.len(),
            base: size,
        });
    }
    Ok(items.chunks(size))
}

impl Value {
    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(items))
    }

    pub fn vector(items: Vec<Value>) -> Value {
        Value::Vector(Rc::new(items))
    }

    pub fn atom(value: Value) -> Value {
        Value::Atom(Rc::new(RefCell::new(value)))
    }

    /// Build a map from alternating key/value forms.
    pub fn map_from_pairs(items: &[Value]) -> Result<Value, Error> {
        let mut map = MapType::with_capacity(items.len() / 2);
        for pair in group(items, 2)? {
            map.insert(MapKey::from_value(&pair[0])?, pair[1].clone());
        }
        Ok(Value::Map(Rc::new(map)))
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Number(_) => ValueType::Number,
            Value::String(_) => ValueType::String,
            Value::Bool(_) => ValueType::Boolean,
            Value::Nil => ValueType::Nil,
            Value::Undefined => ValueType::Undefined,
            Value::Symbol(_) => ValueType::Symbol,
            Value::Keyword(_) => ValueType::Keyword,
            Value::List(_) => ValueType::List,
            Value::Vector(_) => ValueType::Vector,
            Value::Map(_) => ValueType::Map,
            Value::Atom(_) => ValueType::Atom,
            Value::Closure(_) => ValueType::Function,
            Value::NativeFunction { .. } => ValueType::NativeFunction,
        }
    }

    /// Everything except `false` and `nil` is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Bool(false) | Value::Nil)
    }

    /// Elements of a list or vector
    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Vector(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Elements of a list or vector, or an UnexpectedTokenType error
    pub fn expect_sequence(&self) -> Result<&[Value], Error> {
        self.as_sequence()
            .ok_or_else(|| Error::unexpected_type(self, SEQUENTIAL))
    }

    pub fn is_sequential(&self) -> bool {
        matches!(self, Value::List(_) | Value::Vector(_))
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Closure(_) | Value::NativeFunction { .. })
    }

    /// A new map with `pairs` associated; the source map is left untouched.
    pub fn assoc(&self, pairs: &[Value]) -> Result<Value, Error> {
        let Value::Map(map) = self else {
            return Err(Error::unexpected_type(self, &[ValueType::Map]));
        };
        let mut derived = MapType::clone(map);
        for pair in group(pairs, 2)? {
            derived.insert(MapKey::from_value(&pair[0])?, pair[1].clone());
        }
        Ok(Value::Map(Rc::new(derived)))
    }

    /// A new map without `keys`; the source map is left untouched.
    pub fn dissoc(&self, keys: &[Value]) -> Result<Value, Error> {
        let Value::Map(map) = self else {
            return Err(Error::unexpected_type(self, &[ValueType::Map]));
        };
        let mut derived = MapType::clone(map);
        for key in keys {
            derived.shift_remove(&MapKey::from_value(key)?);
        }
        Ok(Value::Map(Rc::new(derived)))
    }
}

impl PartialEq for Value {
    /// Structural equality, walked with an explicit stack so nesting depth is not bounded
    /// by the native stack.
    fn eq(&self, other: &Self) -> bool {
        let mut pending = vec![(self, other)];

        while let Some((a, b)) = pending.pop() {
            let same = match (a, b) {
                (Value::Number(a), Value::Number(b)) => a == b,
                (Value::String(a), Value::String(b)) => a == b,
                (Value::Bool(a), Value::Bool(b)) => a == b,
                (Value::Nil, Value::Nil) | (Value::Undefined, Value::Undefined) => true,
                (Value::Symbol(a), Value::Symbol(b)) => a == b,
                (Value::Keyword(a), Value::Keyword(b)) => a == b,
                // Lists and vectors differ only in syntax
                (
                    Value::List(a) | Value::Vector(a),
                    Value::List(b) | Value::Vector(b),
                ) => {
                    if Rc::ptr_eq(a, b) {
                        continue;
                    }
                    pending.extend(a.iter().zip(b.iter()));
                    a.len() == b.len()
                }
                (Value::Map(a), Value::Map(b)) => {
                    if Rc::ptr_eq(a, b) {
                        continue;
                    }
                    a.len() == b.len()
                        && a.iter().all(|(key, value)| match b.get(key) {
                            Some(other) => {
                                pending.push((value, other));
                                true
                            }
                            None => false,
                        })
                }
                (Value::Atom(a), Value::Atom(b)) => Rc::ptr_eq(a, b),
                (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
                (
                    Value::NativeFunction { id: id1, .. },
                    Value::NativeFunction { id: id2, .. },
                ) => id1 == id2,
                _ => false,
            };
            if !same {
                return false;
            }
        }
        true
    }
}

impl Value {
    /// Move the children of containers this value solely owns into `pending`.
    fn take_children(&mut self, pending: &mut Vec<Value>) {
        match self {
            Value::List(items) | Value::Vector(items) => {
                if let Some(items) = Rc::get_mut(items) {
                    pending.append(items);
                }
            }
            Value::Map(map) => {
                if let Some(map) = Rc::get_mut(map) {
                    pending.extend(map.drain(..).map(|(_, value)| value));
                }
            }
            Value::Atom(cell) => {
                if let Some(cell) = Rc::get_mut(cell) {
                    pending.push(std::mem::replace(cell.get_mut(), Value::Nil));
                }
            }
            Value::Closure(closure) => {
                if let Some(closure) = Rc::get_mut(closure) {
                    pending.push(std::mem::replace(&mut closure.body, Value::Nil));
                }
            }
            _ => {}
        }
    }
}

// Deeply nested values are released iteratively instead of through recursive drop glue
impl Drop for Value {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.take_children(&mut pending);
        while let Some(mut child) = pending.pop() {
            child.take_children(&mut pending);
        }
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod helper_function_tests {
    use super::*;

    #[test]
    fn test_helper_functions_data_driven() {
        let test_cases = vec![
            (val(42), Value::Number(Number::Int(42))),
            (val(-17), Value::Number(Number::Int(-17))),
            (val(255u8), Value::Number(Number::Int(255))),
            (val(NumberType::MIN), Value::Number(Number::Int(NumberType::MIN))),
            (val(1.5), Value::Number(Number::Float(1.5))),
            (val(true), Value::Bool(true)),
            (val("hello"), Value::String(Rc::from("hello"))),
            (val(""), Value::String(Rc::from(""))),
            (nil(), Value::Nil),
            (
                val([1, 2, 3]),
                Value::list(vec![val(1), val(2), val(3)]),
            ),
            (
                val(vec![sym("operation"), val(42), kw("key")]),
                Value::list(vec![
                    Value::Symbol(Symbol::get_or_create("operation")),
                    Value::Number(Number::Int(42)),
                    Value::Keyword(Keyword::get_or_create("key")),
                ]),
            ),
        ];

        for (i, (actual, expected)) in test_cases.iter().enumerate() {
            assert_eq!(
                actual,
                expected,
                "Test case {} failed:\n  Expected: {:?}\n  Got: {:?}",
                i + 1,
                expected,
                actual
            );
        }
    }

    #[test]
    fn test_equality_rules() {
        // Numbers compare numerically across representations
        assert_eq!(val(1), val(1.0));
        assert_ne!(val(1), val(1.5));
        // Lists and vectors compare element-wise
        assert_eq!(val([1, 2]), vector([1, 2]));
        assert_ne!(val([1, 2]), vector([1, 2, 3]));
        // Nil and undefined are distinct singletons
        assert_ne!(Value::Nil, Value::Undefined);
        assert_ne!(Value::Nil, val(false));
        // Strings never equal symbols or keywords of the same name
        assert_ne!(val("a"), sym("a"));
        assert_ne!(kw("a"), sym("a"));
    }

    #[test]
    fn test_map_equality_is_per_key() {
        let a = Value::map_from_pairs(&[kw("a"), val(1), kw("b"), val(2)]).unwrap();
        let b = Value::map_from_pairs(&[kw("b"), val(2), kw("a"), val(1)]).unwrap();
        let c = Value::map_from_pairs(&[kw("a"), val(1), kw("b"), val(3)]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, Value::map_from_pairs(&[kw("a"), val(1)]).unwrap());
    }

    #[test]
    fn test_atoms_compare_by_identity() {
        let a = Value::atom(val(1));
        let b = Value::atom(val(1));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_deep_values_compare_and_drop() {
        let build = |depth: usize, leaf: Value| {
            let mut value = leaf;
            for _ in 0..depth {
                value = vector([value]);
            }
            value
        };
        assert_eq!(build(150_000, nil()), build(150_000, nil()));
        assert_ne!(build(150_000, nil()), build(150_000, val(1)));

        // shared children survive the parent being dropped
        let shared = build(10, val(5));
        let parent = val(vec![shared.clone(), shared.clone()]);
        drop(parent);
        assert_eq!(shared, build(10, val(5)));
    }

    #[test]
    fn test_truthiness() {
        for falsy in [Value::Nil, val(false)] {
            assert!(!falsy.is_truthy(), "{falsy:?} should be falsy");
        }
        for truthy in [val(0), val(""), val(Vec::<Value>::new()), val(true), Value::Undefined] {
            assert!(truthy.is_truthy(), "{truthy:?} should be truthy");
        }
    }

    #[test]
    fn test_assoc_and_dissoc_leave_source_untouched() {
        let source = Value::map_from_pairs(&[kw("a"), val(1)]).unwrap();
        let added = source.assoc(&[val("b"), val(2)]).unwrap();
        let removed = added.dissoc(&[kw("a")]).unwrap();

        assert_eq!(source, Value::map_from_pairs(&[kw("a"), val(1)]).unwrap());
        assert_eq!(
            added,
            Value::map_from_pairs(&[kw("a"), val(1), val("b"), val(2)]).unwrap()
        );
        assert_eq!(removed, Value::map_from_pairs(&[val("b"), val(2)]).unwrap());
    }

    #[test]
    fn test_map_keys_are_restricted() {
        let err = Value::map_from_pairs(&[val(1), val(2)]).unwrap_err();
        assert!(matches!(err, Error::UnexpectedTokenType { .. }));
        let err = Value::map_from_pairs(&[kw("a"), val(1), kw("b")]).unwrap_err();
        assert_eq!(err, Error::UnexpectedLength { got: 3, base: 2 });
    }

    #[test]
    fn test_param_spec() {
        let spec = ParamSpec::from_forms(&[sym("a"), sym("&"), sym("rest")]).unwrap();
        assert_eq!(spec.positional(), &[Symbol::get_or_create("a")]);
        assert_eq!(spec.rest(), Some(Symbol::get_or_create("rest")));

        let misplaced = ParamSpec::from_forms(&[sym("&"), sym("a"), sym("b")]).unwrap_err();
        assert!(matches!(misplaced, Error::InvalidRestParameter(_)));
        let trailing = ParamSpec::from_forms(&[sym("a"), sym("&")]).unwrap_err();
        assert!(matches!(trailing, Error::InvalidRestParameter(_)));
        let not_symbol = ParamSpec::from_forms(&[sym("a"), val(1)]).unwrap_err();
        assert!(matches!(not_symbol, Error::UnexpectedTokenType { .. }));
    }

    #[test]
    fn test_number_arithmetic() {
        assert_eq!(Number::Int(7).div(Number::Int(2)).unwrap(), Number::Float(3.5));
        assert_eq!(Number::Int(8).div(Number::Int(2)).unwrap(), Number::Int(4));
        assert!(Number::Int(1).div(Number::Int(0)).is_err());
        assert_eq!(
            Number::Int(NumberType::MIN).div(Number::Int(-1)).unwrap_err(),
            Error::EvalError("Integer overflow in division".into())
        );
        assert_eq!(
            Number::Int(NumberType::MIN).div(Number::Int(1)).unwrap(),
            Number::Int(NumberType::MIN)
        );
        assert!(Number::Int(NumberType::MAX).add(Number::Int(1)).is_err());
        assert_eq!(
            Number::Int(1).add(Number::Float(0.5)).unwrap(),
            Number::Float(1.5)
        );
        assert_eq!(format!("{}", Number::Float(2.0)), "2.0");
        assert_eq!(format!("{}", Number::Float(0.25)), "0.25");
    }
}
