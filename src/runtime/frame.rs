//=====================================================
// File: runtime/frame.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Per-invocation frame, binding store and closures
// Objective: Model the dynamic context PUSH_FRAME/PUSH_BINDING install and
//            the captured environment a block carries
//=====================================================

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use super::class::{ClassId, Visibility};
use super::value::Value;
use crate::ir::Scope;

/// Identity of one method or script activation; break and non-local return
/// unwind to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub u64);

/// Context pushed by `PUSH_FRAME`.
#[derive(Debug, Clone)]
pub struct Frame {
    pub id: FrameId,
    pub self_value: Value,
    /// Class the running method was defined in.
    pub klass: ClassId,
    pub name: Arc<str>,
    /// Serial of the running method, `0` for scripts.
    pub serial: u32,
    pub block: Option<Rc<Block>>,
    pub visibility: Visibility,
}

/// Local variable slots of one scope activation, chained to the lexically
/// enclosing activation for closures.
#[derive(Debug)]
pub struct DynamicScope {
    slots: RefCell<Vec<Value>>,
    parent: Option<Rc<DynamicScope>>,
}

impl DynamicScope {
    pub fn new(size: usize, parent: Option<Rc<DynamicScope>>) -> Rc<Self> {
        Rc::new(Self {
            slots: RefCell::new(vec![Value::Nil; size]),
            parent,
        })
    }

    fn ancestor(&self, depth: u32) -> Option<&DynamicScope> {
        let mut scope = self;
        for _ in 0..depth {
            scope = scope.parent.as_deref()?;
        }
        Some(scope)
    }

    /// `None` when the chain is shorter than `depth`. Unassigned slots read
    /// as nil.
    pub fn get(&self, depth: u32, slot: u32) -> Option<Value> {
        let scope = self.ancestor(depth)?;
        let slots = scope.slots.borrow();
        Some(slots.get(slot as usize).cloned().unwrap_or(Value::Nil))
    }

    /// Returns `false` when the chain is shorter than `depth`.
    pub fn set(&self, depth: u32, slot: u32, value: Value) -> bool {
        let Some(scope) = self.ancestor(depth) else {
            return false;
        };
        let mut slots = scope.slots.borrow_mut();
        let index = slot as usize;
        if index >= slots.len() {
            slots.resize(index + 1, Value::Nil);
        }
        slots[index] = value;
        true
    }
}

/// A closure: a closure scope plus everything it captured when built.
pub struct Block {
    scope: Arc<Scope>,
    binding: Rc<DynamicScope>,
    self_value: Value,
    frame_id: FrameId,
    klass: ClassId,
    serial: u32,
    outer_block: Option<Rc<Block>>,
    lambda: bool,
}

pub(crate) struct BlockParts {
    pub scope: Arc<Scope>,
    pub binding: Rc<DynamicScope>,
    pub self_value: Value,
    pub frame_id: FrameId,
    pub klass: ClassId,
    pub serial: u32,
    pub outer_block: Option<Rc<Block>>,
    pub lambda: bool,
}

impl Block {
    pub(crate) fn from_parts(parts: BlockParts) -> Rc<Self> {
        Rc::new(Self {
            scope: parts.scope,
            binding: parts.binding,
            self_value: parts.self_value,
            frame_id: parts.frame_id,
            klass: parts.klass,
            serial: parts.serial,
            outer_block: parts.outer_block,
            lambda: parts.lambda,
        })
    }

    pub fn scope(&self) -> &Arc<Scope> {
        &self.scope
    }

    pub fn binding(&self) -> &Rc<DynamicScope> {
        &self.binding
    }

    pub fn self_value(&self) -> &Value {
        &self.self_value
    }

    /// Frame of the activation that built this block.
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    pub fn klass(&self) -> ClassId {
        self.klass
    }

    pub fn serial(&self) -> u32 {
        self.serial
    }

    /// Block passed to the method that built this one; `yield` targets it.
    pub fn outer_block(&self) -> Option<&Rc<Block>> {
        self.outer_block.as_ref()
    }

    pub fn is_lambda(&self) -> bool {
        self.lambda
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("scope", &self.scope.name())
            .field("frame_id", &self.frame_id)
            .field("lambda", &self.lambda)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bindings_resolve_through_parents() {
        let outer = DynamicScope::new(1, None);
        let inner = DynamicScope::new(1, Some(Rc::clone(&outer)));
        assert!(inner.set(1, 0, Value::Integer(7)));
        assert_eq!(outer.get(0, 0), Some(Value::Integer(7)));
        assert_eq!(inner.get(0, 3), Some(Value::Nil));
        assert!(inner.get(2, 0).is_none());
        assert!(!inner.set(2, 0, Value::Nil));
    }
}
