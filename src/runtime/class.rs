//=====================================================
// File: runtime/class.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Minimal class table behind the CALL instruction contract
// Objective: Method tables with superclass lookup and per-class generation
//            tokens that invalidate call-site caches on redefinition
//=====================================================

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use super::context::ThreadContext;
use super::frame::Block;
use super::value::Value;
use crate::interp::Unwind;
use crate::ir::Scope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub u32);

impl ClassId {
    pub const OBJECT: ClassId = ClassId(0);
    pub const NIL: ClassId = ClassId(1);
    pub const TRUE: ClassId = ClassId(2);
    pub const FALSE: ClassId = ClassId(3);
    pub const INTEGER: ClassId = ClassId(4);
    pub const FLOAT: ClassId = ClassId(5);
    pub const STRING: ClassId = ClassId(6);
    pub const SYMBOL: ClassId = ClassId(7);
    pub const ARRAY: ClassId = ClassId(8);
    pub const PROC: ClassId = ClassId(9);
    pub const EXCEPTION: ClassId = ClassId(10);
    pub const STANDARD_ERROR: ClassId = ClassId(11);
    pub const RUNTIME_ERROR: ClassId = ClassId(12);
    pub const ARGUMENT_ERROR: ClassId = ClassId(13);
    pub const NO_METHOD_ERROR: ClassId = ClassId(14);
    pub const LOCAL_JUMP_ERROR: ClassId = ClassId(15);
    pub const TYPE_ERROR: ClassId = ClassId(16);
    pub const ZERO_DIVISION_ERROR: ClassId = ClassId(17);
}

/// Core classes, in `ClassId` order, with their superclass.
const CORE_CLASSES: &[(&str, Option<ClassId>)] = &[
    ("Object", None),
    ("NilClass", Some(ClassId::OBJECT)),
    ("TrueClass", Some(ClassId::OBJECT)),
    ("FalseClass", Some(ClassId::OBJECT)),
    ("Integer", Some(ClassId::OBJECT)),
    ("Float", Some(ClassId::OBJECT)),
    ("String", Some(ClassId::OBJECT)),
    ("Symbol", Some(ClassId::OBJECT)),
    ("Array", Some(ClassId::OBJECT)),
    ("Proc", Some(ClassId::OBJECT)),
    ("Exception", Some(ClassId::OBJECT)),
    ("StandardError", Some(ClassId::EXCEPTION)),
    ("RuntimeError", Some(ClassId::STANDARD_ERROR)),
    ("ArgumentError", Some(ClassId::STANDARD_ERROR)),
    ("NoMethodError", Some(ClassId::STANDARD_ERROR)),
    ("LocalJumpError", Some(ClassId::STANDARD_ERROR)),
    ("TypeError", Some(ClassId::STANDARD_ERROR)),
    ("ZeroDivisionError", Some(ClassId::STANDARD_ERROR)),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

/// Host implementation of a built-in method.
pub type NativeFn =
    fn(&mut ThreadContext, &Value, &[Value], Option<&Rc<Block>>) -> Result<Value, Unwind>;

#[derive(Clone)]
pub struct NativeMethod {
    /// Host module path reported in native frames.
    pub host_class: &'static str,
    /// Host function name reported in native frames.
    pub host_method: &'static str,
    pub host_file: &'static str,
    pub func: NativeFn,
}

#[derive(Clone)]
pub enum MethodBody {
    Interpreted(Arc<Scope>),
    Native(NativeMethod),
}

/// A method installed in a class's method table.
pub struct DynamicMethod {
    pub name: Arc<str>,
    pub serial: u32,
    pub owner: ClassId,
    pub visibility: Visibility,
    pub body: MethodBody,
}

impl fmt::Debug for DynamicMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = match &self.body {
            MethodBody::Interpreted(scope) => format!("interpreted({})", scope.name()),
            MethodBody::Native(native) => {
                format!("native({}::{})", native.host_class, native.host_method)
            }
        };
        f.debug_struct("DynamicMethod")
            .field("name", &self.name)
            .field("serial", &self.serial)
            .field("owner", &self.owner)
            .field("visibility", &self.visibility)
            .field("body", &body)
            .finish()
    }
}

struct RClass {
    name: Arc<str>,
    superclass: Option<ClassId>,
    methods: HashMap<Arc<str>, Arc<DynamicMethod>>,
    generation: u64,
}

pub(crate) struct ClassTable {
    classes: Vec<RClass>,
}

impl ClassTable {
    pub(crate) fn with_core() -> Self {
        let mut table = Self {
            classes: Vec::with_capacity(CORE_CLASSES.len()),
        };
        for (name, superclass) in CORE_CLASSES {
            table.define_class(name, *superclass);
        }
        table
    }

    pub(crate) fn define_class(&mut self, name: &str, superclass: Option<ClassId>) -> ClassId {
        if let Some(existing) = self.find(name) {
            return existing;
        }
        let id = ClassId(self.classes.len() as u32);
        self.classes.push(RClass {
            name: Arc::from(name),
            superclass,
            methods: HashMap::new(),
            generation: 0,
        });
        id
    }

    pub(crate) fn find(&self, name: &str) -> Option<ClassId> {
        self.classes
            .iter()
            .position(|class| &*class.name == name)
            .map(|index| ClassId(index as u32))
    }

    pub(crate) fn name(&self, class: ClassId) -> Arc<str> {
        self.classes
            .get(class.0 as usize)
            .map(|class| Arc::clone(&class.name))
            .unwrap_or_else(|| Arc::from("<unknown class>"))
    }

    pub(crate) fn superclass(&self, class: ClassId) -> Option<ClassId> {
        self.classes.get(class.0 as usize)?.superclass
    }

    pub(crate) fn generation(&self, class: ClassId) -> u64 {
        self.classes
            .get(class.0 as usize)
            .map(|class| class.generation)
            .unwrap_or(0)
    }

    pub(crate) fn is_a(&self, class: ClassId, ancestor: ClassId) -> bool {
        let mut current = Some(class);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.superclass(id);
        }
        false
    }

    pub(crate) fn lookup(&self, class: ClassId, name: &str) -> Option<Arc<DynamicMethod>> {
        let mut current = Some(class);
        while let Some(id) = current {
            let entry = self.classes.get(id.0 as usize)?;
            if let Some(method) = entry.methods.get(name) {
                return Some(Arc::clone(method));
            }
            current = entry.superclass;
        }
        None
    }

    /// Install `method` and bump the generation of its owner and every
    /// descendant, since their lookups may now resolve differently.
    pub(crate) fn add_method(&mut self, method: Arc<DynamicMethod>) {
        let owner = method.owner;
        let Some(entry) = self.classes.get_mut(owner.0 as usize) else {
            return;
        };
        entry.methods.insert(Arc::clone(&method.name), method);
        for index in 0..self.classes.len() {
            let id = ClassId(index as u32);
            if self.is_a(id, owner) {
                self.classes[index].generation += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn native(
        _: &mut ThreadContext,
        _: &Value,
        _: &[Value],
        _: Option<&Rc<Block>>,
    ) -> Result<Value, Unwind> {
        Ok(Value::Nil)
    }

    fn method(name: &str, owner: ClassId) -> Arc<DynamicMethod> {
        Arc::new(DynamicMethod {
            name: Arc::from(name),
            serial: 1,
            owner,
            visibility: Visibility::Public,
            body: MethodBody::Native(NativeMethod {
                host_class: "test",
                host_method: "native",
                host_file: file!(),
                func: native,
            }),
        })
    }

    #[test]
    fn core_hierarchy_is_wired() {
        let table = ClassTable::with_core();
        assert_eq!(&*table.name(ClassId::LOCAL_JUMP_ERROR), "LocalJumpError");
        assert!(table.is_a(ClassId::ARGUMENT_ERROR, ClassId::EXCEPTION));
        assert!(!table.is_a(ClassId::EXCEPTION, ClassId::STANDARD_ERROR));
    }

    #[test]
    fn redefinition_bumps_descendant_generations() {
        let mut table = ClassTable::with_core();
        let before_integer = table.generation(ClassId::INTEGER);
        let before_object = table.generation(ClassId::OBJECT);
        table.add_method(method("hello", ClassId::OBJECT));
        assert_eq!(table.generation(ClassId::OBJECT), before_object + 1);
        assert_eq!(table.generation(ClassId::INTEGER), before_integer + 1);
        assert!(table.lookup(ClassId::INTEGER, "hello").is_some());

        let before_array = table.generation(ClassId::ARRAY);
        table.add_method(method("double", ClassId::INTEGER));
        assert_eq!(table.generation(ClassId::ARRAY), before_array);
    }
}
