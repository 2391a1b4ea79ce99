//=====================================================
// File: runtime/value.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Language-level values manipulated by the dispatch loop
// Objective: Cheap-to-clone tagged values; reference types compare by identity
//=====================================================

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use super::class::ClassId;
use super::exception::RubyException;
use super::frame::Block;
use crate::interp::Unwind;
use crate::ir::Constant;

/// Plain object instance.
#[derive(Debug)]
pub struct RObject {
    pub class: ClassId,
}

#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Str(Rc<str>),
    Symbol(Arc<str>),
    Array(Rc<RefCell<Vec<Value>>>),
    Proc(Rc<Block>),
    Object(Rc<RObject>),
    Exception(Rc<RubyException>),
    /// Marks an optional argument the caller did not supply.
    Undefined,
    /// An unrescuable unwind captured by an ensure handler, to be re-thrown.
    Signal(Rc<Unwind>),
}

impl Value {
    pub fn str(value: &str) -> Self {
        Value::Str(Rc::from(value))
    }

    pub fn symbol(value: &str) -> Self {
        Value::Symbol(Arc::from(value))
    }

    pub fn array(values: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(values)))
    }

    /// Fresh instance of `class`.
    pub fn object(class: ClassId) -> Self {
        Value::Object(Rc::new(RObject { class }))
    }

    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false) | Value::Undefined)
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn class_id(&self) -> ClassId {
        match self {
            Value::Nil | Value::Undefined | Value::Signal(_) => ClassId::NIL,
            Value::Bool(true) => ClassId::TRUE,
            Value::Bool(false) => ClassId::FALSE,
            Value::Integer(_) => ClassId::INTEGER,
            Value::Float(_) => ClassId::FLOAT,
            Value::Str(_) => ClassId::STRING,
            Value::Symbol(_) => ClassId::SYMBOL,
            Value::Array(_) => ClassId::ARRAY,
            Value::Proc(_) => ClassId::PROC,
            Value::Object(object) => object.class,
            Value::Exception(exception) => exception.class_id(),
        }
    }

    /// `to_s`-style rendering used by `puts` and messages.
    pub fn to_display(&self) -> String {
        match self {
            Value::Nil | Value::Undefined => String::new(),
            Value::Str(text) => text.to_string(),
            Value::Symbol(name) => name.to_string(),
            Value::Exception(exception) => exception.message().to_string(),
            other => other.inspect(),
        }
    }

    /// `inspect`-style rendering.
    pub fn inspect(&self) -> String {
        match self {
            Value::Nil => "nil".to_string(),
            Value::Bool(value) => value.to_string(),
            Value::Integer(value) => value.to_string(),
            Value::Float(value) => format!("{value:?}"),
            Value::Str(text) => format!("{text:?}"),
            Value::Symbol(name) => format!(":{name}"),
            Value::Array(items) => {
                let parts: Vec<String> = items.borrow().iter().map(Value::inspect).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Proc(block) => {
                let kind = if block.is_lambda() { " (lambda)" } else { "" };
                format!(
                    "#<Proc:{}:{}{kind}>",
                    block.scope().file(),
                    block.scope().line()
                )
            }
            Value::Object(object) => {
                format!("#<Object:{:p} class={}>", Rc::as_ptr(object), object.class.0)
            }
            Value::Exception(exception) => {
                format!("#<{}: {}>", exception.class_name(), exception.message())
            }
            Value::Undefined => "<undefined>".to_string(),
            Value::Signal(_) => "<signal>".to_string(),
        }
    }
}

impl From<&Constant> for Value {
    fn from(value: &Constant) -> Self {
        match value {
            Constant::Nil => Value::Nil,
            Constant::Bool(value) => Value::Bool(*value),
            Constant::Integer(value) => Value::Integer(*value),
            Constant::Float(value) => Value::Float(*value),
            Constant::Str(text) => Value::Str(Rc::from(&**text)),
            Constant::Symbol(name) => Value::Symbol(Arc::clone(name)),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) | (Value::Undefined, Value::Undefined) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
                (*a as f64) == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Proc(a), Value::Proc(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Exception(a), Value::Exception(b)) => Rc::ptr_eq(a, b),
            (Value::Signal(a), Value::Signal(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inspect())
    }
}
