//! Runtime values of the bytecode interpreter

use super::{Result, SwfError};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

/// Index of a class in the interpreter's class table
pub type ClassId = usize;

/// A value on the operand stack, in a register or in a scope
#[derive(Debug, Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    Number(f64),
    Str(String),
    /// Arrays are shared and mutated in place
    Array(Rc<RefCell<Vec<Value>>>),
    /// A class itself, as found by name lookup
    Class(ClassId),
    /// An instance of a class; constructors are not run
    Object(ClassId),
    /// The variable scope of a class
    Scope(ClassId),
    /// The table of all user-defined classes, bottom of every scope chain
    Globals,
    /// Constants declared by a class
    Constants(ClassId),
}

impl Value {
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Snapshot of an array's elements
    pub fn to_vec(&self) -> Option<Vec<Value>> {
        match self {
            Value::Array(items) => Some(items.borrow().clone()),
            _ => None,
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Number(n) => Some(*n),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Name used in messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "Boolean",
            Value::Int(_) | Value::Number(_) => "Number",
            Value::Str(_) => "String",
            Value::Array(_) => "Array",
            Value::Class(_) => "Class",
            Value::Object(_) => "Object",
            Value::Scope(_) => "Scope",
            Value::Globals => "Globals",
            Value::Constants(_) => "Constants",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Array(items) => !items.borrow().is_empty(),
            Value::Class(_)
            | Value::Object(_)
            | Value::Scope(_)
            | Value::Globals
            | Value::Constants(_) => true,
        }
    }

    /// `==` as used by `ifeq`, `ifne` and `equals`
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                Rc::ptr_eq(a, b) || {
                    let (a, b) = (a.borrow(), b.borrow());
                    a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.loose_eq(y))
                }
            }
            (Value::Class(a), Value::Class(b))
            | (Value::Object(a), Value::Object(b))
            | (Value::Scope(a), Value::Scope(b))
            | (Value::Constants(a), Value::Constants(b)) => a == b,
            (Value::Globals, Value::Globals) => true,
            (a, b) => match (a.as_number(), b.as_number()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }

    /// Ordering for `iflt` and `greaterequals`; `None` when unordered (NaN)
    pub fn compare(&self, other: &Value) -> Result<Option<Ordering>> {
        if let (Value::Str(a), Value::Str(b)) = (self, other) {
            return Ok(Some(a.cmp(b)));
        }
        match (self.as_number(), other.as_number()) {
            (Some(x), Some(y)) => Ok(x.partial_cmp(&y)),
            _ => Err(SwfError::Type(format!(
                "cannot compare {} with {}",
                self.type_name(),
                other.type_name()
            ))),
        }
    }

    fn numeric_op(
        &self,
        other: &Value,
        op: &str,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> Result<Value> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(match int_op(*a, *b) {
                Some(v) => Value::Int(v),
                None => Value::Number(float_op(*a as f64, *b as f64)),
            }),
            _ => match (self.as_number(), other.as_number()) {
                (Some(x), Some(y)) => Ok(Value::Number(float_op(x, y))),
                _ => Err(SwfError::Type(format!(
                    "unsupported operand types for {}: {} and {}",
                    op,
                    self.type_name(),
                    other.type_name()
                ))),
            },
        }
    }

    pub fn add(&self, other: &Value) -> Result<Value> {
        if let (Value::Str(a), Value::Str(b)) = (self, other) {
            return Ok(Value::Str(format!("{}{}", a, b)));
        }
        self.numeric_op(other, "+", i64::checked_add, |x, y| x + y)
    }

    pub fn subtract(&self, other: &Value) -> Result<Value> {
        self.numeric_op(other, "-", i64::checked_sub, |x, y| x - y)
    }

    pub fn multiply(&self, other: &Value) -> Result<Value> {
        self.numeric_op(other, "*", i64::checked_mul, |x, y| x * y)
    }

    /// Remainder taking the sign of the divisor
    pub fn modulo(&self, other: &Value) -> Result<Value> {
        if matches!(other, Value::Int(0)) {
            return Err(SwfError::Type("integer modulo by zero".to_string()));
        }
        self.numeric_op(
            other,
            "%",
            |a, b| {
                let r = a.checked_rem(b)?;
                Some(if r != 0 && (r < 0) != (b < 0) { r + b } else { r })
            },
            |x, y| {
                let r = x % y;
                if r != 0.0 && (r < 0.0) != (y < 0.0) {
                    r + y
                } else {
                    r
                }
            },
        )
    }

    pub fn bitand(&self, other: &Value) -> Result<Value> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a & b)),
            _ => Err(SwfError::Type(format!(
                "bitand needs integers, got {} and {}",
                self.type_name(),
                other.type_name()
            ))),
        }
    }

    /// Integer conversion performed by `convert_i`
    pub fn to_int(&self) -> Result<i64> {
        match self {
            Value::Int(i) => Ok(*i),
            Value::Number(n) if n.is_finite() => Ok(n.trunc() as i64),
            Value::Bool(b) => Ok(i64::from(*b)),
            Value::Str(s) => s
                .trim()
                .parse()
                .map_err(|_| SwfError::Type(format!("invalid integer literal {:?}", s))),
            other => Err(SwfError::Type(format!(
                "cannot convert {} to an integer",
                other.type_name()
            ))),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.loose_eq(other)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Number(n) if n.is_nan() => f.write_str("NaN"),
            Value::Number(n) => write!(f, "{}", n),
            Value::Str(s) => f.write_str(s),
            Value::Array(items) => {
                let items = items.borrow();
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "{}", parts.join(","))
            }
            Value::Class(id) => write!(f, "[class #{}]", id),
            Value::Object(id) => write!(f, "[object of class #{}]", id),
            Value::Scope(id) => write!(f, "[scope of class #{}]", id),
            Value::Globals => f.write_str("[globals]"),
            Value::Constants(id) => write!(f, "[constants of class #{}]", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic() {
        assert_eq!(Value::Int(2).add(&Value::Int(3)).unwrap(), Value::Int(5));
        assert_eq!(Value::str("ab").add(&Value::str("c")).unwrap(), Value::str("abc"));
        assert!(Value::str("a").add(&Value::Int(1)).is_err());
        assert_eq!(Value::Int(-7).modulo(&Value::Int(3)).unwrap(), Value::Int(2));
        assert_eq!(Value::Int(7).modulo(&Value::Int(-3)).unwrap(), Value::Int(-2));
        assert!(Value::Int(1).modulo(&Value::Int(0)).is_err());
        assert_eq!(Value::Int(6).bitand(&Value::Int(3)).unwrap(), Value::Int(2));
        assert!(matches!(
            Value::Int(i64::MAX).add(&Value::Int(1)).unwrap(),
            Value::Number(_)
        ));
    }

    #[test]
    fn test_equality_and_ordering() {
        assert!(Value::Int(1).loose_eq(&Value::Number(1.0)));
        assert!(Value::Bool(true).loose_eq(&Value::Int(1)));
        assert!(!Value::Undefined.loose_eq(&Value::Null));
        assert!(Value::array(vec![Value::Int(1)]).loose_eq(&Value::array(vec![Value::Int(1)])));
        assert_eq!(
            Value::Int(1).compare(&Value::Int(2)).unwrap(),
            Some(Ordering::Less)
        );
        assert_eq!(Value::Number(f64::NAN).compare(&Value::Int(2)).unwrap(), None);
        assert!(Value::str("a").compare(&Value::Int(2)).is_err());
    }

    #[test]
    fn test_truthiness_and_conversion() {
        assert!(!Value::Undefined.truthy());
        assert!(!Value::str("").truthy());
        assert!(Value::Object(0).truthy());
        assert!(!Value::Number(f64::NAN).truthy());
        assert_eq!(Value::str(" 42 ").to_int().unwrap(), 42);
        assert_eq!(Value::Number(-3.9).to_int().unwrap(), -3);
        assert!(Value::Undefined.to_int().is_err());
        assert_eq!(Value::array(vec![Value::Int(1), Value::str("a")]).to_string(), "1,a");
    }
}
