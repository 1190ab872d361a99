use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt::{self, Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use once_cell::sync::Lazy;
use strum_macros::{Display as StrumDisplay, EnumIter};

use crate::ast::Node;
use crate::environment::Context;
use crate::error::RuntimeError;

static SIZE_ALIASES: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ["size", "len", "length", "count"].into_iter().collect());

#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum ValueKind {
    Null,
    Boolean,
    Number,
    String,
    Table,
    Array,
    Function,
    Native,
    Getset,
}

/// The runtime value model. Primitives carry value semantics; tables,
/// arrays, closures and native bridges are shared handles compared by
/// identity.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Table(Rc<Table>),
    Array(Rc<RefCell<Vec<Value>>>),
    Function(Rc<Function>),
    NativeFn(Rc<NativeFn>),
    GetSet(Rc<GetSet>),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Boolean,
            Value::Number(_) => ValueKind::Number,
            Value::Str(_) => ValueKind::String,
            Value::Table(_) => ValueKind::Table,
            Value::Array(_) => ValueKind::Array,
            Value::Function(_) => ValueKind::Function,
            Value::NativeFn(_) => ValueKind::Native,
            Value::GetSet(_) => ValueKind::Getset,
        }
    }

    /// Null and false are falsy; every other value, zero and the empty
    /// string included, is truthy.
    pub fn truthy(&self) -> bool {
        !matches!(self, Value::Null | Value::Bool(false))
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_) | Value::NativeFn(_))
    }

    fn identity(&self) -> Option<usize> {
        match self {
            Value::Table(t) => Some(Rc::as_ptr(t) as usize),
            Value::Array(a) => Some(Rc::as_ptr(a) as usize),
            Value::Function(f) => Some(Rc::as_ptr(f) as usize),
            Value::NativeFn(f) => Some(Rc::as_ptr(f) as usize),
            Value::GetSet(g) => Some(Rc::as_ptr(g) as usize),
            _ => None,
        }
    }

    /// `==` semantics: identity for composite kinds, value equality for
    /// primitives, false across kinds.
    pub fn is_equal(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            _ => match (self.identity(), other.identity()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    /// `new` semantics: tables and arrays are copied structurally, closures
    /// shallowly (fresh binding cells over the same body), atoms unchanged.
    /// The seen map keeps cyclic tables from recursing forever.
    pub fn deep_copy(&self) -> Value {
        self.deep_copy_inner(&mut HashMap::new())
    }

    fn deep_copy_inner(&self, seen: &mut HashMap<usize, Value>) -> Value {
        match self {
            Value::Table(t) => {
                let ptr = Rc::as_ptr(t) as usize;
                if let Some(copy) = seen.get(&ptr) {
                    return copy.clone();
                }
                let copy = Rc::new(Table::new());
                seen.insert(ptr, Value::Table(copy.clone()));
                for (key, value) in t.entries() {
                    copy.set(key, value.deep_copy_inner(seen));
                }
                Value::Table(copy)
            }
            Value::Array(a) => {
                let ptr = Rc::as_ptr(a) as usize;
                if let Some(copy) = seen.get(&ptr) {
                    return copy.clone();
                }
                let copy = Rc::new(RefCell::new(Vec::new()));
                seen.insert(ptr, Value::Array(copy.clone()));
                let elements: Vec<Value> = a.borrow().clone();
                for element in elements {
                    copy.borrow_mut().push(element.deep_copy_inner(seen));
                }
                Value::Array(copy)
            }
            Value::Function(f) => Value::Function(Rc::new(Function {
                params: f.params.clone(),
                body: Rc::clone(&f.body),
                set_ctx: RefCell::new(f.set_ctx.borrow().clone()),
                self_ref: RefCell::new(f.self_ref.borrow().clone()),
            })),
            other => other.clone(),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Table(t) => write!(f, "{t}"),
            Value::Array(a) => {
                write!(f, "[")?;
                for (i, element) in a.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{element}")?;
                }
                write!(f, "]")
            }
            Value::Function(_) => write!(f, "<function>"),
            Value::NativeFn(_) => write!(f, "<native fn>"),
            Value::GetSet(_) => write!(f, "<getset>"),
        }
    }
}

/// An identity-compared composite value used as a table key.
#[derive(Debug, Clone)]
pub struct RefKey(pub Value);

impl PartialEq for RefKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.identity() == other.0.identity()
    }
}

impl Eq for RefKey {}

impl Hash for RefKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.0.identity().unwrap_or(0));
    }
}

/// The hashable projection of a value used for table keys. Numbers are
/// canonicalized bitwise so 0.0 and -0.0 address the same slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TableKey {
    Null,
    Bool(bool),
    Number(u64),
    Str(String),
    Ref(RefKey),
}

fn canonical_bits(n: f64) -> u64 {
    if n == 0.0 {
        0.0f64.to_bits()
    } else if n.is_nan() {
        f64::NAN.to_bits()
    } else {
        n.to_bits()
    }
}

impl From<&Value> for TableKey {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => TableKey::Null,
            Value::Bool(b) => TableKey::Bool(*b),
            Value::Number(n) => TableKey::Number(canonical_bits(*n)),
            Value::Str(s) => TableKey::Str(s.clone()),
            other => TableKey::Ref(RefKey(other.clone())),
        }
    }
}

impl From<&str> for TableKey {
    fn from(name: &str) -> Self {
        TableKey::Str(name.to_string())
    }
}

impl From<String> for TableKey {
    fn from(name: String) -> Self {
        TableKey::Str(name)
    }
}

impl From<f64> for TableKey {
    fn from(n: f64) -> Self {
        TableKey::Number(canonical_bits(n))
    }
}

impl Display for TableKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TableKey::Null => write!(f, "null"),
            TableKey::Bool(b) => write!(f, "{b}"),
            TableKey::Number(bits) => write!(f, "{}", f64::from_bits(*bits)),
            TableKey::Str(s) => write!(f, "{s}"),
            TableKey::Ref(_) => write!(f, "<ref>"),
        }
    }
}

/// An unordered value-key to value mapping with interior mutability. A
/// missing key reads as null, never an error. Iteration order is only
/// stable for the process.
#[derive(Debug, Default)]
pub struct Table {
    data: RefCell<HashMap<TableKey, Value>>,
}

impl Table {
    pub fn new() -> Table {
        Table::default()
    }

    pub fn get<K: Into<TableKey>>(&self, key: K) -> Value {
        self.data
            .borrow()
            .get(&key.into())
            .cloned()
            .unwrap_or(Value::Null)
    }

    pub fn set<K: Into<TableKey>>(&self, key: K, value: Value) {
        self.data.borrow_mut().insert(key.into(), value);
    }

    pub fn exists<K: Into<TableKey>>(&self, key: K) -> bool {
        self.data.borrow().contains_key(&key.into())
    }

    pub fn entries(&self) -> Vec<(TableKey, Value)> {
        self.data
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.data.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.borrow().is_empty()
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "{{}}");
        }
        write!(f, "{{")?;
        for (i, (key, value)) in self.entries().into_iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{key} = {value}")?;
        }
        write!(f, "}}")
    }
}

/// A user closure: a shared body subtree, parameter names, the optional
/// persistent frame installed by the set_ctx hook, and the transient bound
/// self mutated by member access.
pub struct Function {
    pub params: Vec<String>,
    pub body: Rc<Node>,
    pub set_ctx: RefCell<Option<Rc<Table>>>,
    pub self_ref: RefCell<Value>,
}

impl Function {
    pub fn new(params: Vec<String>, body: Rc<Node>) -> Function {
        Function {
            params,
            body,
            set_ctx: RefCell::new(None),
            self_ref: RefCell::new(Value::Null),
        }
    }
}

impl Debug for Function {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<function({})>", self.params.join(", "))
    }
}

pub type NativeCallback = Rc<dyn Fn(&mut Context, Vec<Value>, Value) -> Result<Value, RuntimeError>>;

/// A host callable exposed to scripts with the same call contract as a
/// closure. The owner slot carries the receiver for string/array built-in
/// methods and stays null for library functions.
pub struct NativeFn {
    pub call: NativeCallback,
    pub owner: Value,
}

impl Debug for NativeFn {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn>")
    }
}

/// A table-slot decoration intercepting property access. Either side may be
/// null: a missing getter reads as null, a missing setter swallows writes.
#[derive(Debug)]
pub struct GetSet {
    pub getter: Value,
    pub setter: Value,
}

pub fn mk_native_fn<F>(f: F) -> Value
where
    F: Fn(&mut Context, Vec<Value>, Value) -> Result<Value, RuntimeError> + 'static,
{
    Value::NativeFn(Rc::new(NativeFn {
        call: Rc::new(f),
        owner: Value::Null,
    }))
}

fn bound_native(
    f: fn(&mut Context, Vec<Value>, Value) -> Result<Value, RuntimeError>,
    owner: &Value,
) -> Value {
    Value::NativeFn(Rc::new(NativeFn {
        call: Rc::new(f),
        owner: owner.clone(),
    }))
}

fn want_number(value: Option<&Value>, what: &str) -> Result<f64, RuntimeError> {
    match value {
        Some(Value::Number(n)) => Ok(*n),
        _ => Err(RuntimeError::new(format!("{what} expects a number argument"))),
    }
}

fn want_index(n: f64, what: &str) -> Result<usize, RuntimeError> {
    if n < 0.0 || n.fract() != 0.0 {
        return Err(RuntimeError::new(format!(
            "{what} expects a non negative whole number, got {n}"
        )));
    }
    Ok(n as usize)
}

fn want_str(value: Option<&Value>, what: &str) -> Result<String, RuntimeError> {
    match value {
        Some(Value::Str(s)) => Ok(s.clone()),
        _ => Err(RuntimeError::new(format!("{what} expects a string argument"))),
    }
}

fn owner_str(owner: &Value) -> Result<&str, RuntimeError> {
    match owner {
        Value::Str(s) => Ok(s),
        _ => Err(RuntimeError::new("String method called without a string receiver")),
    }
}

fn owner_array(owner: &Value) -> Result<&Rc<RefCell<Vec<Value>>>, RuntimeError> {
    match owner {
        Value::Array(a) => Ok(a),
        _ => Err(RuntimeError::new("Array method called without an array receiver")),
    }
}

fn str_size(_ctx: &mut Context, _args: Vec<Value>, owner: Value) -> Result<Value, RuntimeError> {
    Ok(Value::Number(owner_str(&owner)?.chars().count() as f64))
}

fn str_chars(_ctx: &mut Context, _args: Vec<Value>, owner: Value) -> Result<Value, RuntimeError> {
    let chars = owner_str(&owner)?
        .chars()
        .map(|c| Value::Str(c.to_string()))
        .collect();
    Ok(Value::Array(Rc::new(RefCell::new(chars))))
}

fn str_sub(_ctx: &mut Context, args: Vec<Value>, owner: Value) -> Result<Value, RuntimeError> {
    let chars: Vec<char> = owner_str(&owner)?.chars().collect();
    let start = want_index(want_number(args.first(), "sub")?, "sub")?;
    let end = match args.get(1) {
        Some(Value::Number(n)) => want_index(*n, "sub")?,
        None => chars.len(),
        Some(_) => return Err(RuntimeError::new("sub expects a number argument")),
    };
    let start = start.min(chars.len());
    let end = end.clamp(start, chars.len());
    Ok(Value::Str(chars[start..end].iter().collect()))
}

fn str_match(_ctx: &mut Context, args: Vec<Value>, owner: Value) -> Result<Value, RuntimeError> {
    let pattern = want_str(args.first(), "match")?;
    Ok(Value::Bool(owner_str(&owner)?.contains(&pattern)))
}

fn str_replace(_ctx: &mut Context, args: Vec<Value>, owner: Value) -> Result<Value, RuntimeError> {
    let old = want_str(args.first(), "replace")?;
    let new = want_str(args.get(1), "replace")?;
    Ok(Value::Str(owner_str(&owner)?.replace(&old, &new)))
}

fn array_size(_ctx: &mut Context, _args: Vec<Value>, owner: Value) -> Result<Value, RuntimeError> {
    Ok(Value::Number(owner_array(&owner)?.borrow().len() as f64))
}

fn array_add(_ctx: &mut Context, args: Vec<Value>, owner: Value) -> Result<Value, RuntimeError> {
    let item = args.into_iter().next().unwrap_or(Value::Null);
    owner_array(&owner)?.borrow_mut().push(item);
    Ok(Value::Null)
}

fn array_pop(_ctx: &mut Context, args: Vec<Value>, owner: Value) -> Result<Value, RuntimeError> {
    let array = owner_array(&owner)?;
    let index = want_index(want_number(args.first(), "pop")?, "pop")?;
    let len = array.borrow().len();
    if index >= len {
        return Err(RuntimeError::new(format!(
            "Index out of bounds: {index} is greater than the array size {len}"
        )));
    }
    Ok(array.borrow_mut().remove(index))
}

fn array_clear(_ctx: &mut Context, _args: Vec<Value>, owner: Value) -> Result<Value, RuntimeError> {
    owner_array(&owner)?.borrow_mut().clear();
    Ok(Value::Null)
}

/// The built-in pseudo-methods recognized on strings and arrays by name
/// instead of table storage. Unknown names yield no method (the caller
/// reads null).
pub fn builtin_method(receiver: &Value, name: &str) -> Option<Value> {
    match receiver {
        Value::Str(_) => match name {
            _ if SIZE_ALIASES.contains(name) => Some(bound_native(str_size, receiver)),
            "chars" => Some(bound_native(str_chars, receiver)),
            "sub" => Some(bound_native(str_sub, receiver)),
            "match" => Some(bound_native(str_match, receiver)),
            "replace" => Some(bound_native(str_replace, receiver)),
            _ => None,
        },
        Value::Array(_) => match name {
            _ if SIZE_ALIASES.contains(name) => Some(bound_native(array_size, receiver)),
            "add" => Some(bound_native(array_add, receiver)),
            "pop" => Some(bound_native(array_pop, receiver)),
            "clear" => Some(bound_native(array_clear, receiver)),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_table_key_reads_null() {
        let table = Table::new();
        assert!(matches!(table.get("nope"), Value::Null));
    }

    #[test]
    fn tables_compare_by_identity() {
        let a = Value::Table(Rc::new(Table::new()));
        let b = Value::Table(Rc::new(Table::new()));
        assert!(a.is_equal(&a.clone()));
        assert!(!a.is_equal(&b));
    }

    #[test]
    fn numeric_keys_are_canonical() {
        let table = Table::new();
        table.set(0.0, Value::Number(1.0));
        assert!(table.exists(-0.0));
    }

    #[test]
    fn deep_copy_unshares_nested_tables() {
        let inner = Rc::new(Table::new());
        inner.set("a", Value::Number(1.0));
        let outer = Rc::new(Table::new());
        outer.set("inner", Value::Table(inner.clone()));

        let copy = Value::Table(outer).deep_copy();
        let Value::Table(copied) = &copy else {
            panic!("expected a table copy");
        };
        let Value::Table(copied_inner) = copied.get("inner") else {
            panic!("expected an inner table");
        };
        copied_inner.set("a", Value::Number(2.0));
        assert!(inner.get("a").is_equal(&Value::Number(1.0)));
    }

    #[test]
    fn deep_copy_survives_cycles() {
        let table = Rc::new(Table::new());
        table.set("me", Value::Table(table.clone()));
        let copy = Value::Table(table).deep_copy();
        let Value::Table(copied) = &copy else {
            panic!("expected a table copy");
        };
        // The cycle is preserved in the copy and points at the copy itself.
        assert!(copied.get("me").is_equal(&copy));
    }

    #[test]
    fn kind_names_are_the_type_vocabulary() {
        use strum::IntoEnumIterator;
        let names: Vec<String> = ValueKind::iter().map(|k| k.to_string()).collect();
        // These words are script-visible through the `type` library function.
        assert_eq!(
            names,
            [
                "null", "boolean", "number", "string", "table", "array", "function", "native",
                "getset"
            ]
        );
    }

    #[test]
    fn truthiness_only_rejects_null_and_false() {
        assert!(!Value::Null.truthy());
        assert!(!Value::Bool(false).truthy());
        assert!(Value::Number(0.0).truthy());
        assert!(Value::Str(String::new()).truthy());
    }
}
