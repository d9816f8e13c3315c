use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::Error;
use crate::ast::{ParamSpec, Symbol, Value};
use crate::evaluator::Arity;
use crate::evaluator::intooperation::{IntoOperation, IntoVariadicOperation, OperationFn};

struct Scope {
    bindings: RefCell<HashMap<Symbol, Value>>,
    outer: Option<Environment>,
}

/// A lexical scope and, through `outer`, the chain of scopes enclosing it.
///
/// `Environment` is a cheap shared handle: cloning it yields another handle to the same
/// scope, which is how closures capture their defining scope by reference. Bindings are
/// only ever added to the scope they are set on.
#[derive(Clone)]
pub struct Environment(Rc<Scope>);

impl Environment {
    /// A root scope with no outer scope.
    pub fn new() -> Self {
        Self::from_scope(HashMap::new(), None)
    }

    pub fn with_outer(outer: &Environment) -> Self {
        Self::from_scope(HashMap::new(), Some(outer.clone()))
    }

    /// A child of `outer` binding `params` against `args`.
    ///
    /// Missing positional arguments bind to `nil` and surplus ones are ignored; a rest
    /// parameter receives a fresh list of every argument from its position onward.
    pub fn with_bindings(outer: &Environment, params: &ParamSpec, args: Vec<Value>) -> Self {
        let positional = params.positional();
        let mut bindings = HashMap::with_capacity(positional.len() + 1);
        let mut args = args.into_iter();

        for param in positional {
            bindings.insert(*param, args.next().unwrap_or(Value::Nil));
        }
        if let Some(rest) = params.rest() {
            bindings.insert(rest, Value::list(args.collect()));
        }

        Self::from_scope(bindings, Some(outer.clone()))
    }

    fn from_scope(bindings: HashMap<Symbol, Value>, outer: Option<Environment>) -> Self {
        Environment(Rc::new(Scope {
            bindings: RefCell::new(bindings),
            outer,
        }))
    }

    /// Bind `symbol` in this scope only, shadowing any outer binding.
    pub fn set(&self, symbol: Symbol, value: Value) -> Value {
        self.0.bindings.borrow_mut().insert(symbol, value.clone());
        value
    }

    /// Look `symbol` up through the scope chain.
    pub fn get(&self, symbol: Symbol) -> Result<Value, Error> {
        let mut scope = self;
        loop {
            if let Some(value) = scope.0.bindings.borrow().get(&symbol) {
                return Ok(value.clone());
            }
            match &scope.0.outer {
                Some(outer) => scope = outer,
                None => {
                    return Err(Error::NotFound {
                        symbol,
                        env: self.clone(),
                    });
                }
            }
        }
    }

    pub fn has(&self, symbol: Symbol) -> bool {
        let mut scope = self;
        loop {
            if scope.0.bindings.borrow().contains_key(&symbol) {
                return true;
            }
            match &scope.0.outer {
                Some(outer) => scope = outer,
                None => return false,
            }
        }
    }

    pub fn outer(&self) -> Option<&Environment> {
        self.0.outer.as_ref()
    }

    /// The outermost scope of the chain
    pub fn root(&self) -> Environment {
        let mut scope = self;
        while let Some(outer) = &scope.0.outer {
            scope = outer;
        }
        scope.clone()
    }

    /// Register a native function that works on the raw argument slice.
    ///
    /// This is the low-level API; the function is responsible for its own arity and
    /// type checks. For most new code prefer [`Environment::register_builtin_operation`].
    ///
    /// # Example
    /// ```
    /// use malrs::evaluator::create_global_env;
    /// use malrs::ast::Value;
    /// use malrs::Error;
    ///
    /// fn arg_count(args: &[Value]) -> Result<Value, Error> {
    ///     Ok(Value::from(args.len()))
    /// }
    ///
    /// let env = create_global_env();
    /// env.register_builtin_function("arg-count", arg_count);
    /// assert_eq!(malrs::rep("(arg-count 1 2 3)", &env).unwrap().as_deref(), Some("3"));
    /// ```
    pub fn register_builtin_function(
        &self,
        name: &str,
        func: fn(&[Value]) -> Result<Value, Error>,
    ) {
        let wrapped: Rc<OperationFn> = Rc::new(move |args: Vec<Value>| func(&args));
        self.set_native(name, wrapped);
    }

    /// Register a strongly-typed Rust function as a native, with automatic argument
    /// extraction and result conversion.
    ///
    /// ```rust,ignore
    /// fn add(a: Number, b: Number) -> Result<Number, Error> { a.add(b) }
    /// env.register_builtin_operation::<_, (Number, Number)>("add", add);
    /// ```
    ///
    /// Supported parameter types:
    /// - `Value` (the argument itself)
    /// - `Number`, `bool`, `&str`
    /// - `ValueIter<'_>` and `NumIter<'_>` (one list or vector argument, iterated)
    ///
    /// The return type may be any `R: Into<Value>` or `Result<R, Error>`. Arity is
    /// enforced automatically and reported as a `ParametersError` under `name`.
    pub fn register_builtin_operation<F, Args>(&self, name: &str, func: F)
    where
        F: IntoOperation<Args> + 'static,
    {
        let wrapped = func.into_operation(name);
        self.set_native(name, wrapped);
    }

    /// Register a native whose last parameter is a rest iterator (`ValueIter<'_>` or
    /// `NumIter<'_>`), optionally after fixed leading parameters.
    ///
    /// The given [`Arity`] is validated against the total argument count before the
    /// function runs, since it cannot always be derived from the signature.
    pub fn register_variadic_builtin_operation<F, Args>(
        &self,
        name: &str,
        arity: Arity,
        func: F,
    ) where
        F: IntoVariadicOperation<Args> + 'static,
    {
        let inner = func.into_variadic_operation(name);
        let id: Rc<str> = Rc::from(name);
        let wrapped: Rc<OperationFn> = Rc::new(move |args: Vec<Value>| {
            arity.validate(&id, args.len())?;
            inner(args)
        });
        self.set_native(name, wrapped);
    }

    fn set_native(&self, name: &str, func: Rc<OperationFn>) {
        self.set(
            Symbol::get_or_create(name),
            Value::NativeFunction {
                id: Rc::from(name),
                func,
            },
        );
    }

    /// Every binding visible from this scope, inner bindings shadowing outer ones,
    /// sorted by name.
    pub fn get_all_bindings(&self) -> Vec<(Symbol, Value)> {
        let mut bindings = HashMap::new();

        // Outer bindings first so local ones override them
        if let Some(outer) = &self.0.outer {
            bindings.extend(outer.get_all_bindings());
        }
        for (symbol, value) in self.0.bindings.borrow().iter() {
            bindings.insert(*symbol, value.clone());
        }

        let mut result: Vec<_> = bindings.into_iter().collect();
        result.sort_by(|a, b| a.0.name().cmp(b.0.name()));
        result
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

/// Scopes compare by identity
impl PartialEq for Environment {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut depth = 0;
        let mut scope = self;
        while let Some(outer) = &scope.0.outer {
            depth += 1;
            scope = outer;
        }
        write!(
            f,
            "Environment(bindings={}, depth={depth})",
            self.0.bindings.borrow().len()
        )
    }
}
