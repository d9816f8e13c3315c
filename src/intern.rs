//! Process-wide registries for symbol and keyword names.
//!
//! Each distinct name is stored exactly once for the lifetime of the process, so a
//! [`Symbol`] or [`Keyword`] is a thin handle to its canonical name and equality is a
//! pointer comparison. Names are never reclaimed.
//!
//! The symbol registry is seeded with the names of the native library on first use. This
//! is what lets the reader accept operator names such as `+` or `<=` that do not match
//! the bare-identifier shape: already-interned names are recognized before any other
//! token classification.

use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{LazyLock, Mutex, PoisonError};

#[derive(Default)]
struct Registry {
    names: HashSet<&'static str>,
}

impl Registry {
    fn get_or_create(&mut self, name: &str) -> &'static str {
        if let Some(existing) = self.names.get(name) {
            return existing;
        }
        let leaked: &'static str = Box::leak(name.to_owned().into_boxed_str());
        self.names.insert(leaked);
        leaked
    }

    fn lookup(&self, name: &str) -> Option<&'static str> {
        self.names.get(name).copied()
    }
}

static SYMBOLS: LazyLock<Mutex<Registry>> = LazyLock::new(|| {
    let mut registry = Registry::default();
    for name in crate::builtinops::builtin_names() {
        registry.get_or_create(name);
    }
    Mutex::new(registry)
});

static KEYWORDS: LazyLock<Mutex<Registry>> = LazyLock::new(|| Mutex::new(Registry::default()));

// The registries are append-only, so a poisoned lock still guards a consistent set.
fn with_registry<R>(registry: &Mutex<Registry>, f: impl FnOnce(&mut Registry) -> R) -> R {
    let mut guard = registry.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut guard)
}

macro_rules! interned_name {
    ($(#[$meta:meta])* $name:ident, $registry:ident, $debug:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy)]
        pub struct $name(&'static str);

        impl $name {
            /// Return the canonical instance for `name`, creating it on first use.
            pub fn get_or_create(name: &str) -> Self {
                $name(with_registry(&$registry, |r| r.get_or_create(name)))
            }

            /// Return the canonical instance for `name` only if it already exists.
            pub fn lookup(name: &str) -> Option<Self> {
                with_registry(&$registry, |r| r.lookup(name)).map($name)
            }

            pub fn name(self) -> &'static str {
                self.0
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                std::ptr::eq(self.0, other.0)
            }
        }

        impl Eq for $name {}

        impl Hash for $name {
            fn hash<H: Hasher>(&self, state: &mut H) {
                std::ptr::hash(self.0, state);
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($debug, "({})"), self.0)
            }
        }
    };
}

interned_name!(
    /// An interned identifier.
    Symbol,
    SYMBOLS,
    "Symbol"
);

interned_name!(
    /// An interned keyword name, stored without its leading `:`.
    Keyword,
    KEYWORDS,
    "Keyword"
);

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}", self.0)
    }
}
