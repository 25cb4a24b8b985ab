//! Literal and runtime values.

use evotest_core::TypeDescriptor;
use serde::{Deserialize, Serialize};

/// Constant embedded in a primitive statement.
///
/// Equality compares floating point values bitwise so that a literal always
/// equals its own copy, NaN included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Literal {
    Bool(bool),
    Char(char),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
}

impl Literal {
    pub fn ty(&self) -> TypeDescriptor {
        match self {
            Literal::Bool(_) => TypeDescriptor::Bool,
            Literal::Char(_) => TypeDescriptor::Char,
            Literal::Byte(_) => TypeDescriptor::Byte,
            Literal::Short(_) => TypeDescriptor::Short,
            Literal::Int(_) => TypeDescriptor::Int,
            Literal::Long(_) => TypeDescriptor::Long,
            Literal::Float(_) => TypeDescriptor::Float,
            Literal::Double(_) => TypeDescriptor::Double,
            Literal::Str(_) => TypeDescriptor::Str,
        }
    }

    /// Default value of a primitive type, `None` for reference types
    pub fn default_for(ty: &TypeDescriptor) -> Option<Literal> {
        match ty {
            TypeDescriptor::Bool => Some(Literal::Bool(false)),
            TypeDescriptor::Char => Some(Literal::Char('\0')),
            TypeDescriptor::Byte => Some(Literal::Byte(0)),
            TypeDescriptor::Short => Some(Literal::Short(0)),
            TypeDescriptor::Int => Some(Literal::Int(0)),
            TypeDescriptor::Long => Some(Literal::Long(0)),
            TypeDescriptor::Float => Some(Literal::Float(0.0)),
            TypeDescriptor::Double => Some(Literal::Double(0.0)),
            _ => None,
        }
    }

    /// Source text of the literal
    pub fn to_source(&self) -> String {
        match self {
            Literal::Bool(v) => v.to_string(),
            Literal::Char(c) => format!("'{}'", escape_char(*c, '\'')),
            Literal::Byte(v) => format!("(byte){}", v),
            Literal::Short(v) => format!("(short){}", v),
            Literal::Int(v) => v.to_string(),
            Literal::Long(v) => format!("{}L", v),
            Literal::Float(v) => format_float(*v as f64, format!("{:?}", v), "Float", "F"),
            Literal::Double(v) => format_float(*v, format!("{:?}", v), "Double", ""),
            Literal::Str(s) => {
                let escaped: String = s.chars().map(|c| escape_char(c, '"')).collect();
                format!("\"{}\"", escaped)
            }
        }
    }
}

impl PartialEq for Literal {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Literal::Bool(a), Literal::Bool(b)) => a == b,
            (Literal::Char(a), Literal::Char(b)) => a == b,
            (Literal::Byte(a), Literal::Byte(b)) => a == b,
            (Literal::Short(a), Literal::Short(b)) => a == b,
            (Literal::Int(a), Literal::Int(b)) => a == b,
            (Literal::Long(a), Literal::Long(b)) => a == b,
            (Literal::Float(a), Literal::Float(b)) => a.to_bits() == b.to_bits(),
            (Literal::Double(a), Literal::Double(b)) => a.to_bits() == b.to_bits(),
            (Literal::Str(a), Literal::Str(b)) => a == b,
            _ => false,
        }
    }
}

fn escape_char(c: char, quote: char) -> String {
    match c {
        '\n' => "\\n".to_string(),
        '\t' => "\\t".to_string(),
        '\r' => "\\r".to_string(),
        '\0' => "\\0".to_string(),
        '\\' => "\\\\".to_string(),
        c if c == quote => format!("\\{}", c),
        c if c.is_control() => format!("\\u{:04x}", c as u32),
        c => c.to_string(),
    }
}

/// `digits` is the shortest round-trip form, which always carries a `.` or
/// an exponent
fn format_float(v: f64, digits: String, class: &str, suffix: &str) -> String {
    if v.is_nan() {
        format!("{}.NaN", class)
    } else if v.is_infinite() {
        let sign = if v > 0.0 { "POSITIVE" } else { "NEGATIVE" };
        format!("{}.{}_INFINITY", class, sign)
    } else {
        format!("{}{}", digits, suffix)
    }
}

/// Handle to an object living in the subject program
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectHandle {
    pub id: u32,
    pub ty: TypeDescriptor,
}

/// Value bound in a scope during execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Void,
    Null,
    Bool(bool),
    Char(char),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
    Object(ObjectHandle),
}

impl Value {
    /// Runtime type, `None` for `null`
    pub fn ty(&self) -> Option<TypeDescriptor> {
        match self {
            Value::Void => Some(TypeDescriptor::Void),
            Value::Null => None,
            Value::Bool(_) => Some(TypeDescriptor::Bool),
            Value::Char(_) => Some(TypeDescriptor::Char),
            Value::Byte(_) => Some(TypeDescriptor::Byte),
            Value::Short(_) => Some(TypeDescriptor::Short),
            Value::Int(_) => Some(TypeDescriptor::Int),
            Value::Long(_) => Some(TypeDescriptor::Long),
            Value::Float(_) => Some(TypeDescriptor::Float),
            Value::Double(_) => Some(TypeDescriptor::Double),
            Value::Str(_) => Some(TypeDescriptor::Str),
            Value::Object(handle) => Some(handle.ty.clone()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether this value may be stored in a slot declared as `ty`
    pub fn is_instance_of(&self, ty: &TypeDescriptor) -> bool {
        match self.ty() {
            None => ty.is_reference(),
            Some(actual) => actual == *ty || ty.is_assignable_from(&actual),
        }
    }

    pub fn as_literal(&self) -> Option<Literal> {
        match self {
            Value::Bool(v) => Some(Literal::Bool(*v)),
            Value::Char(v) => Some(Literal::Char(*v)),
            Value::Byte(v) => Some(Literal::Byte(*v)),
            Value::Short(v) => Some(Literal::Short(*v)),
            Value::Int(v) => Some(Literal::Int(*v)),
            Value::Long(v) => Some(Literal::Long(*v)),
            Value::Float(v) => Some(Literal::Float(*v)),
            Value::Double(v) => Some(Literal::Double(*v)),
            Value::Str(v) => Some(Literal::Str(v.clone())),
            _ => None,
        }
    }
}

impl From<Literal> for Value {
    fn from(literal: Literal) -> Self {
        match literal {
            Literal::Bool(v) => Value::Bool(v),
            Literal::Char(v) => Value::Char(v),
            Literal::Byte(v) => Value::Byte(v),
            Literal::Short(v) => Value::Short(v),
            Literal::Int(v) => Value::Int(v),
            Literal::Long(v) => Value::Long(v),
            Literal::Float(v) => Value::Float(v),
            Literal::Double(v) => Value::Double(v),
            Literal::Str(v) => Value::Str(v),
        }
    }
}

impl From<&Literal> for Value {
    fn from(literal: &Literal) -> Self {
        literal.clone().into()
    }
}
