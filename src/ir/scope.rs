//=====================================================
// File: ir/scope.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Lexical scopes and their prepared instruction arrays
// Objective: Linearise a scope once (jump targets, temp slots, handler
//            tables) and share the immutable result across threads
//=====================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use once_cell::sync::OnceCell;
use thiserror::Error;

use super::instr::Instr;
use super::operand::Label;

static NEXT_SCOPE_ID: AtomicU32 = AtomicU32::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u32);

impl ScopeId {
    pub(crate) fn next() -> Self {
        ScopeId(NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Method,
    Closure,
    Eval,
    Script,
}

impl ScopeKind {
    /// Script and eval bodies may fall off the end; other scopes must return.
    pub fn allows_fallthrough(self) -> bool {
        matches!(self, ScopeKind::Eval | ScopeKind::Script)
    }
}

/// Positional parameter shape: `pre` required, `opt` optional, optional
/// `rest`, then `post` required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Signature {
    pub pre: u32,
    pub opt: u32,
    pub rest: bool,
    pub post: u32,
}

impl Signature {
    pub const NONE: Signature = Signature {
        pre: 0,
        opt: 0,
        rest: false,
        post: 0,
    };

    pub fn required(count: u32) -> Self {
        Self {
            pre: count,
            ..Self::NONE
        }
    }

    pub fn min(&self) -> usize {
        (self.pre + self.post) as usize
    }

    /// `None` when a rest parameter accepts any number of extra arguments.
    pub fn max(&self) -> Option<usize> {
        if self.rest {
            None
        } else {
            Some((self.pre + self.opt + self.post) as usize)
        }
    }

    pub fn accepts(&self, given: usize) -> bool {
        given >= self.min() && self.max().is_none_or(|max| given <= max)
    }

    /// Parameter count relevant to proc auto-splatting.
    pub fn positional_count(&self) -> usize {
        (self.pre + self.opt + self.post) as usize + usize::from(self.rest)
    }
}

impl fmt::Display for Signature {
    /// Formats the accepted range the way arity errors report it.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max() {
            None => write!(f, "{}+", self.min()),
            Some(max) if max == self.min() => write!(f, "{max}"),
            Some(max) => write!(f, "{}..{max}", self.min()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    /// Catches rescuable faults only.
    Rescue,
    /// Runs for every fault, including unrescuable ones.
    Ensure,
}

/// Instructions between `start` and `end` are protected by `handler`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionRegion {
    pub start: Label,
    pub end: Label,
    pub handler: Label,
    pub kind: HandlerKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    #[error("label {label} is defined twice in scope '{scope}'")]
    DuplicateLabel { scope: String, label: Label },
    #[error("label {label} is used but never defined in scope '{scope}'")]
    UndefinedLabel { scope: String, label: Label },
    #[error("exception region {start}..{end} is inverted in scope '{scope}'")]
    InvertedRegion {
        scope: String,
        start: Label,
        end: Label,
    },
}

/// Linearised, immutable form of a scope's instructions.
#[derive(Debug)]
pub struct Prepared {
    instrs: Box<[Instr]>,
    label_pcs: Box<[usize]>,
    rescue_pcs: Box<[i32]>,
    ensure_pcs: Box<[i32]>,
    temp_count: usize,
}

impl Prepared {
    pub fn instrs(&self) -> &[Instr] {
        &self.instrs
    }

    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    pub fn temp_count(&self) -> usize {
        self.temp_count
    }

    /// Program counter of a label. Preparation guarantees every referenced
    /// label resolves.
    pub fn target(&self, label: Label) -> usize {
        self.label_pcs
            .get(label.0 as usize)
            .copied()
            .unwrap_or(usize::MAX)
    }

    /// Innermost handler of any kind covering `pc`, or `-1`.
    pub fn rescuer_pc(&self, pc: usize) -> i32 {
        self.rescue_pcs.get(pc).copied().unwrap_or(-1)
    }

    /// Innermost ensure handler covering `pc`, or `-1`.
    pub fn ensurer_pc(&self, pc: usize) -> i32 {
        self.ensure_pcs.get(pc).copied().unwrap_or(-1)
    }
}

/// A node of the lexical scope tree.
pub struct Scope {
    id: ScopeId,
    name: Arc<str>,
    file: Arc<str>,
    line: u32,
    kind: ScopeKind,
    lexical_parent: Option<ScopeId>,
    method_name: Arc<str>,
    signature: Signature,
    local_count: usize,
    label_count: u32,
    instrs: Vec<Instr>,
    regions: Vec<ExceptionRegion>,
    prepared: OnceCell<Arc<Prepared>>,
}

pub(crate) struct ScopeParts {
    pub id: ScopeId,
    pub name: Arc<str>,
    pub file: Arc<str>,
    pub line: u32,
    pub kind: ScopeKind,
    pub lexical_parent: Option<ScopeId>,
    pub method_name: Arc<str>,
    pub signature: Signature,
    pub local_count: usize,
    pub label_count: u32,
    pub instrs: Vec<Instr>,
    pub regions: Vec<ExceptionRegion>,
}

impl Scope {
    pub(crate) fn from_parts(parts: ScopeParts) -> Self {
        Self {
            id: parts.id,
            name: parts.name,
            file: parts.file,
            line: parts.line,
            kind: parts.kind,
            lexical_parent: parts.lexical_parent,
            method_name: parts.method_name,
            signature: parts.signature,
            local_count: parts.local_count,
            label_count: parts.label_count,
            instrs: parts.instrs,
            regions: parts.regions,
            prepared: OnceCell::new(),
        }
    }

    pub fn id(&self) -> ScopeId {
        self.id
    }

    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    pub fn file(&self) -> &Arc<str> {
        &self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    pub fn lexical_parent(&self) -> Option<ScopeId> {
        self.lexical_parent
    }

    /// Name of the nearest enclosing method (the scope's own name for methods).
    pub fn method_name(&self) -> &Arc<str> {
        &self.method_name
    }

    pub fn signature(&self) -> Signature {
        self.signature
    }

    pub fn local_count(&self) -> usize {
        self.local_count
    }

    /// Build-time instruction list, labels included.
    pub fn raw_instrs(&self) -> &[Instr] {
        &self.instrs
    }

    /// `None` until [`Scope::prepare_for_interpretation`] has run.
    pub fn instrs_for_interpretation(&self) -> Option<Arc<Prepared>> {
        self.prepared.get().cloned()
    }

    /// Linearise this scope on first use and cache the result.
    ///
    /// The prepared form does not depend on `is_lambda`; arity enforcement
    /// for lambdas happens when the block is activated.
    pub fn prepare_for_interpretation(&self, is_lambda: bool) -> Result<Arc<Prepared>, ScopeError> {
        self.prepared
            .get_or_try_init(|| {
                tracing::debug!(scope = %self.name, id = self.id.0, is_lambda, "preparing scope");
                self.linearize().map(Arc::new)
            })
            .cloned()
    }

    fn linearize(&self) -> Result<Prepared, ScopeError> {
        let mut label_pcs = vec![usize::MAX; self.label_count as usize];
        let mut instrs = Vec::with_capacity(self.instrs.len());
        for instr in &self.instrs {
            if let Instr::Label(label) = instr {
                let slot = self.label_slot(&mut label_pcs, *label)?;
                if *slot != usize::MAX {
                    return Err(ScopeError::DuplicateLabel {
                        scope: self.name.to_string(),
                        label: *label,
                    });
                }
                *slot = instrs.len();
            } else {
                instrs.push(instr.clone());
            }
        }

        let mut temp_count = 0usize;
        for instr in &instrs {
            if let Some(target) = instr.jump_target() {
                self.resolve(&label_pcs, target)?;
            }
            if let Some(max) = instr.max_temp() {
                temp_count = temp_count.max(max as usize + 1);
            }
        }

        let (rescue_pcs, ensure_pcs) = self.handler_tables(&label_pcs, instrs.len())?;
        Ok(Prepared {
            instrs: instrs.into_boxed_slice(),
            label_pcs: label_pcs.into_boxed_slice(),
            rescue_pcs,
            ensure_pcs,
            temp_count,
        })
    }

    fn label_slot<'a>(
        &self,
        label_pcs: &'a mut [usize],
        label: Label,
    ) -> Result<&'a mut usize, ScopeError> {
        label_pcs
            .get_mut(label.0 as usize)
            .ok_or_else(|| ScopeError::UndefinedLabel {
                scope: self.name.to_string(),
                label,
            })
    }

    fn resolve(&self, label_pcs: &[usize], label: Label) -> Result<usize, ScopeError> {
        match label_pcs.get(label.0 as usize) {
            Some(pc) if *pc != usize::MAX => Ok(*pc),
            _ => Err(ScopeError::UndefinedLabel {
                scope: self.name.to_string(),
                label,
            }),
        }
    }

    /// Per-pc handler tables; the narrowest covering region wins.
    fn handler_tables(
        &self,
        label_pcs: &[usize],
        len: usize,
    ) -> Result<(Box<[i32]>, Box<[i32]>), ScopeError> {
        let mut resolved = Vec::with_capacity(self.regions.len());
        for region in &self.regions {
            let start = self.resolve(label_pcs, region.start)?;
            let end = self.resolve(label_pcs, region.end)?;
            let handler = self.resolve(label_pcs, region.handler)?;
            if start > end {
                return Err(ScopeError::InvertedRegion {
                    scope: self.name.to_string(),
                    start: region.start,
                    end: region.end,
                });
            }
            resolved.push((start, end, handler as i32, region.kind));
        }
        resolved.sort_by_key(|(start, end, _, _)| end - start);

        let mut rescue_pcs = vec![-1; len];
        let mut ensure_pcs = vec![-1; len];
        for (start, end, handler, kind) in resolved {
            for pc in start..end.min(len) {
                if rescue_pcs[pc] == -1 {
                    rescue_pcs[pc] = handler;
                }
                if kind == HandlerKind::Ensure && ensure_pcs[pc] == -1 {
                    ensure_pcs[pc] = handler;
                }
            }
        }
        Ok((rescue_pcs.into_boxed_slice(), ensure_pcs.into_boxed_slice()))
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("file", &self.file)
            .field("line", &self.line)
            .field("signature", &self.signature)
            .finish()
    }
}
