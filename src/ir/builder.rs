//=====================================================
// File: ir/builder.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Construction API for scopes
// Objective: Stand in for the front-end IR builder: allocate labels, temps
//            and locals (with lexical depth for closures) and emit instructions
//=====================================================

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use super::call_site::CallType;
use super::instr::{BranchCond, Instr};
use super::operand::{Label, LocalVar, Operand, TempVar, Variable};
use super::scope::{
    ExceptionRegion, HandlerKind, Scope, ScopeId, ScopeKind, ScopeParts, Signature,
};

#[derive(Default)]
struct LocalTable {
    names: Vec<Arc<str>>,
    parent: Option<Rc<RefCell<LocalTable>>>,
}

impl LocalTable {
    fn find(&self, name: &str, depth: u32) -> Option<LocalVar> {
        if let Some(slot) = self.names.iter().position(|n| &**n == name) {
            return Some(LocalVar {
                name: Arc::clone(&self.names[slot]),
                depth,
                slot: slot as u32,
            });
        }
        self.parent
            .as_ref()
            .and_then(|parent| parent.borrow().find(name, depth + 1))
    }

    fn declare(&mut self, name: &str) -> LocalVar {
        let name: Arc<str> = Arc::from(name);
        self.names.push(Arc::clone(&name));
        LocalVar {
            name,
            depth: 0,
            slot: (self.names.len() - 1) as u32,
        }
    }
}

pub struct ScopeBuilder {
    id: ScopeId,
    name: Arc<str>,
    file: Arc<str>,
    line: u32,
    kind: ScopeKind,
    lexical_parent: Option<ScopeId>,
    method_name: Arc<str>,
    signature: Signature,
    locals: Rc<RefCell<LocalTable>>,
    next_temp: u32,
    next_label: u32,
    instrs: Vec<Instr>,
    regions: Vec<ExceptionRegion>,
}

impl ScopeBuilder {
    fn new(kind: ScopeKind, name: &str, file: &str, line: u32) -> Self {
        let name: Arc<str> = Arc::from(name);
        Self {
            id: ScopeId::next(),
            method_name: Arc::clone(&name),
            name,
            file: Arc::from(file),
            line,
            kind,
            lexical_parent: None,
            signature: Signature::NONE,
            locals: Rc::new(RefCell::new(LocalTable::default())),
            next_temp: 0,
            next_label: 0,
            instrs: Vec::new(),
            regions: Vec::new(),
        }
    }

    pub fn method(name: &str, file: &str, line: u32) -> Self {
        Self::new(ScopeKind::Method, name, file, line)
    }

    pub fn script(file: &str) -> Self {
        Self::new(ScopeKind::Script, "<main>", file, 1)
    }

    pub fn eval(name: &str, file: &str, line: u32) -> Self {
        Self::new(ScopeKind::Eval, name, file, line)
    }

    /// A closure nested lexically inside `parent`. Locals of `parent` (and its
    /// ancestors) resolve with increasing depth.
    pub fn closure(parent: &ScopeBuilder, line: u32) -> Self {
        let mut builder = Self::new(ScopeKind::Closure, &parent.method_name, &parent.file, line);
        builder.name = Arc::from(format!("block in {}", parent.method_name));
        builder.method_name = Arc::clone(&parent.method_name);
        builder.lexical_parent = Some(parent.id);
        builder.locals = Rc::new(RefCell::new(LocalTable {
            names: Vec::new(),
            parent: Some(Rc::clone(&parent.locals)),
        }));
        builder
    }

    pub fn id(&self) -> ScopeId {
        self.id
    }

    pub fn set_signature(&mut self, signature: Signature) -> &mut Self {
        self.signature = signature;
        self
    }

    pub fn new_label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    pub fn temp(&mut self) -> TempVar {
        let temp = TempVar(self.next_temp);
        self.next_temp += 1;
        temp
    }

    /// Resolve `name` through the lexical chain, declaring it here when it
    /// is not visible yet.
    pub fn local(&mut self, name: &str) -> LocalVar {
        let found = self.locals.borrow().find(name, 0);
        match found {
            Some(local) => local,
            None => self.locals.borrow_mut().declare(name),
        }
    }

    /// Declare `name` in this scope even if an outer scope has one (block
    /// parameters shadow).
    pub fn declare_local(&mut self, name: &str) -> LocalVar {
        let existing = self.locals.borrow().find(name, 0);
        match existing {
            Some(local) if local.depth == 0 => local,
            _ => self.locals.borrow_mut().declare(name),
        }
    }

    pub fn emit(&mut self, instr: Instr) -> &mut Self {
        self.instrs.push(instr);
        self
    }

    pub fn label(&mut self, label: Label) -> &mut Self {
        self.emit(Instr::Label(label))
    }

    pub fn jump(&mut self, target: Label) -> &mut Self {
        self.emit(Instr::Jump { target })
    }

    pub fn branch(&mut self, cond: BranchCond, value: Operand, target: Label) -> &mut Self {
        self.emit(Instr::Branch {
            cond,
            value,
            target,
        })
    }

    pub fn copy(&mut self, result: Variable, source: Operand) -> &mut Self {
        self.emit(Instr::Copy { result, source })
    }

    pub fn ret(&mut self, value: Operand) -> &mut Self {
        self.emit(Instr::Return { value })
    }

    pub fn line(&mut self, line: u32) -> &mut Self {
        self.emit(Instr::LineNumber { line })
    }

    pub fn thread_poll(&mut self) -> &mut Self {
        self.emit(Instr::ThreadPoll)
    }

    pub fn call(
        &mut self,
        result: Option<Variable>,
        name: &str,
        receiver: Operand,
        args: Vec<Operand>,
    ) -> &mut Self {
        self.emit(Instr::call(
            result,
            name,
            CallType::Normal,
            receiver,
            args,
            None,
        ))
    }

    /// Call on implicit `self`.
    pub fn fcall(&mut self, result: Option<Variable>, name: &str, args: Vec<Operand>) -> &mut Self {
        self.emit(Instr::call(
            result,
            name,
            CallType::Functional,
            Operand::SelfValue,
            args,
            None,
        ))
    }

    /// Call on implicit `self` passing a closure.
    pub fn fcall_with_block(
        &mut self,
        result: Option<Variable>,
        name: &str,
        args: Vec<Operand>,
        block: Operand,
    ) -> &mut Self {
        self.emit(Instr::call(
            result,
            name,
            CallType::Functional,
            Operand::SelfValue,
            args,
            Some(block),
        ))
    }

    pub fn protect(
        &mut self,
        start: Label,
        end: Label,
        handler: Label,
        kind: HandlerKind,
    ) -> &mut Self {
        self.regions.push(ExceptionRegion {
            start,
            end,
            handler,
            kind,
        });
        self
    }

    /// `PUSH_FRAME`, `PUSH_BINDING`, `CHECK_ARITY` for the current signature.
    pub fn method_prologue(&mut self) -> &mut Self {
        let signature = self.signature;
        self.emit(Instr::PushFrame)
            .emit(Instr::PushBinding)
            .emit(Instr::CheckArity { signature })
    }

    /// `POP_BINDING`, `POP_FRAME`, then return `value`.
    pub fn method_epilogue(&mut self, value: Operand) -> &mut Self {
        self.emit(Instr::PopBinding)
            .emit(Instr::PopFrame)
            .emit(Instr::Return { value })
    }

    pub fn build(self) -> Arc<Scope> {
        let local_count = self.locals.borrow().names.len();
        Arc::new(Scope::from_parts(ScopeParts {
            id: self.id,
            name: self.name,
            file: self.file,
            line: self.line,
            kind: self.kind,
            lexical_parent: self.lexical_parent,
            method_name: self.method_name,
            signature: self.signature,
            local_count,
            label_count: self.next_label,
            instrs: self.instrs,
            regions: self.regions,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closure_locals_resolve_outward() {
        let mut method = ScopeBuilder::method("foo", "foo.rb", 1);
        let x = method.local("x");
        assert_eq!((x.depth, x.slot), (0, 0));
        let mut block = ScopeBuilder::closure(&method, 2);
        let outer = block.local("x");
        assert_eq!((outer.depth, outer.slot), (1, 0));
        let own = block.declare_local("x");
        assert_eq!((own.depth, own.slot), (0, 0));
        let fresh = block.local("y");
        assert_eq!((fresh.depth, fresh.slot), (0, 1));
        let scope = block.build();
        assert_eq!(scope.kind(), ScopeKind::Closure);
        assert_eq!(&**scope.name(), "block in foo");
        assert_eq!(scope.lexical_parent(), Some(method.id()));
        assert_eq!(scope.local_count(), 2);
    }
}
