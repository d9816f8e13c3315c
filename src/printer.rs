//! Rendering values back to text.
//!
//! Readable output (`readable = true`) re-reads to an equal value for every literal the
//! reader accepts. Display output leaves string contents unescaped and unquoted, for
//! `str` and `println`.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt::{self, Write};
use std::rc::Rc;

use crate::ast::Value;

/// Render `value` as text.
pub fn pr_str(value: &Value, readable: bool) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_value(&mut out, value, readable);
    out
}

/// Render each value and join the results with `separator`.
pub fn pr_seq(values: &[Value], readable: bool, separator: &str) -> String {
    values
        .iter()
        .map(|v| pr_str(v, readable))
        .collect::<Vec<_>>()
        .join(separator)
}

fn write_escaped(out: &mut impl Write, s: &str) -> fmt::Result {
    out.write_char('"')?;
    for c in s.chars() {
        match c {
            '"' => out.write_str("\\\"")?,
            '\\' => out.write_str("\\\\")?,
            '\n' => out.write_str("\\n")?,
            '\t' => out.write_str("\\t")?,
            '\r' => out.write_str("\\r")?,
            _ => out.write_char(c)?,
        }
    }
    out.write_char('"')
}

/// Work left for the printer, newest on top
enum Pending {
    Value(Value),
    Text(&'static str),
    /// The `)` of an atom whose contents are done
    CloseAtom(*const RefCell<Value>),
}

/// Queue `items` between `open` and `close`, separated by spaces.
fn open_items(
    out: &mut impl Write,
    pending: &mut Vec<Pending>,
    open: &'static str,
    items: Vec<Value>,
    close: &'static str,
) -> fmt::Result {
    out.write_str(open)?;
    pending.push(Pending::Text(close));
    for (i, item) in items.into_iter().enumerate().rev() {
        pending.push(Pending::Value(item));
        if i > 0 {
            pending.push(Pending::Text(" "));
        }
    }
    Ok(())
}

/// Nested containers are walked with an explicit stack. An atom reached again from inside
/// its own contents prints as `...`.
fn write_value(out: &mut impl Write, value: &Value, readable: bool) -> fmt::Result {
    let mut pending = vec![Pending::Value(value.clone())];
    let mut open_atoms: HashSet<*const RefCell<Value>> = HashSet::new();

    while let Some(next) = pending.pop() {
        let value = match next {
            Pending::Value(value) => value,
            Pending::Text(text) => {
                out.write_str(text)?;
                continue;
            }
            Pending::CloseAtom(cell) => {
                open_atoms.remove(&cell);
                out.write_char(')')?;
                continue;
            }
        };

        match &value {
            Value::Number(n) => write!(out, "{n}")?,
            Value::String(s) if readable => write_escaped(out, s)?,
            Value::String(s) => out.write_str(s)?,
            Value::Bool(b) => write!(out, "{b}")?,
            Value::Nil => out.write_str("nil")?,
            Value::Undefined => out.write_str("undefined")?,
            Value::Symbol(s) => write!(out, "{s}")?,
            Value::Keyword(k) => write!(out, "{k}")?,
            Value::List(items) => open_items(out, &mut pending, "(", items.to_vec(), ")")?,
            Value::Vector(items) => open_items(out, &mut pending, "[", items.to_vec(), "]")?,
            Value::Map(map) => {
                let entries = map
                    .iter()
                    .flat_map(|(key, item)| [key.to_value(), item.clone()])
                    .collect();
                open_items(out, &mut pending, "{", entries, "}")?;
            }
            Value::Atom(cell) => {
                let id = Rc::as_ptr(cell);
                if open_atoms.insert(id) {
                    out.write_str("(atom ")?;
                    pending.push(Pending::CloseAtom(id));
                    pending.push(Pending::Value(cell.borrow().clone()));
                } else {
                    out.write_str("...")?;
                }
            }
            Value::Closure(_) => out.write_str("#<function>")?,
            Value::NativeFunction { id, .. } => write!(out, "#<builtin-function:{id}>")?,
        }
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_value(f, self, true)
    }
}
