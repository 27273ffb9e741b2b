// Copyright (c) 2025 Joshua Seaton
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Symbolic stack-to-tree lifting.
//!
//! The lifter walks a function body as an abstract interpreter over the
//! operand stack. Value-producing instructions push unmaterialized
//! expression nodes; effectful instructions *evict* statements into an
//! ordered list. The eviction policy keeps the rendered tree faithful to
//! the original operational order: before any write to a local, global, or
//! memory, every pending stack node that reads the written state is
//! materialized into a fresh named variable.
//!
//! Structured regions are lifted in child scopes. A scope's position in
//! the scope stack is its nesting depth, which is also the symbolic label
//! a branch renders; resolving `br n` walks up `n` enclosing scopes.

mod ast;
pub use ast::{Ast, CallTarget};

use crate::module::{Function, Module};
use crate::types::{BlockType, FuncType, Instr, OpKind, ValType};

/// Errors that can arise while lifting a function body.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("operand stack underflow in function {func} at instruction {instr}")]
    Underflow { func: u32, instr: usize },

    #[error("function {func} has no body to lift")]
    NoBody { func: u32 },

    #[error("no lifting rule for instruction {instr} of function {func}")]
    Unhandled { func: u32, instr: usize },
}

/// Lift a function body into an ordered statement list.
pub fn lift_function(module: &Module, func: &Function) -> Result<Vec<Ast>, Error> {
    let body = func.body.as_deref().ok_or(Error::NoBody { func: func.id })?;
    let mut lifter = Lifter {
        module,
        func,
        scopes: vec![Scope::default()],
        vars: 0,
        instr_index: 0,
    };
    lifter.lift_body(body)?;
    lifter.exit_return()?;
    let root = lifter.scopes.pop();
    Ok(root.map(|scope| scope.stmts).unwrap_or_default())
}

// Whether control can continue past an instruction.
enum Flow {
    Continues,
    Diverges,
}

enum RegionKind {
    Block,
    Loop,
}

// Per-region lifting state. The scope's index in `Lifter::scopes` is its
// nesting depth (root = 0).
#[derive(Default)]
struct Scope {
    stack: Vec<Ast>,
    stmts: Vec<Ast>,
}

struct Lifter<'m> {
    module: &'m Module,
    func: &'m Function,
    scopes: Vec<Scope>,
    // Fresh-variable counter, owned by the function root so names are
    // unique across nested scopes.
    vars: u32,
    instr_index: usize,
}

impl<'m> Lifter<'m> {
    fn func_type(&self) -> &'m FuncType {
        self.module.func_type(self.func)
    }

    fn cur(&mut self) -> &mut Scope {
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    fn push(&mut self, node: Ast) {
        self.cur().stack.push(node);
    }

    fn pop(&mut self) -> Result<Ast, Error> {
        let (func, instr) = (self.func.id, self.instr_index);
        self.cur().stack.pop().ok_or(Error::Underflow { func, instr })
    }

    fn evict(&mut self, stmt: Ast) {
        self.cur().stmts.push(stmt);
    }

    fn fresh_var(&mut self, ty: ValType) -> Ast {
        let name = format!("var{}", self.vars);
        self.vars += 1;
        Ast::Var {
            name,
            ty,
            local: None,
            global: None,
        }
    }

    // A reference to local `index`: a parameter (`arg{i}`) or a declared
    // local (`local{i}`, numbered after the parameters).
    fn local_ref(&self, index: u32) -> Ast {
        let params = &self.func_type().params;
        if (index as usize) < params.len() {
            Ast::Var {
                name: format!("arg{index}"),
                ty: params[index as usize],
                local: Some(index),
                global: None,
            }
        } else {
            let local = index as usize - params.len();
            let ty = self.func.locals.get(local).copied().unwrap_or(ValType::I32);
            Ast::Var {
                name: format!("local{local}"),
                ty,
                local: Some(index),
                global: None,
            }
        }
    }

    fn global_ref(&self, index: u32) -> Ast {
        let (name, ty) = match self.module.globals.get(index as usize) {
            Some(global) => (global.name.clone(), global.ty),
            None => (format!("global{index}"), ValType::I32),
        };
        Ast::Var {
            name,
            ty,
            local: None,
            global: Some(index),
        }
    }

    // Materializes every live stack node the predicate matches: the node
    // is bound to a fresh variable by an assignment evicted into the scope
    // that holds it, and the stack slot becomes a reference to that
    // variable. Identical nodes share one materialization.
    fn scrub<F: Fn(&Ast) -> bool>(&mut self, invalidated: F) {
        let mut seen: Vec<(Ast, Ast)> = Vec::new();
        for scope in 0..self.scopes.len() {
            for slot in 0..self.scopes[scope].stack.len() {
                if !invalidated(&self.scopes[scope].stack[slot]) {
                    continue;
                }
                if let Some((_, var)) = seen
                    .iter()
                    .find(|(node, _)| *node == self.scopes[scope].stack[slot])
                {
                    self.scopes[scope].stack[slot] = var.clone();
                    continue;
                }
                let ty = self.scopes[scope].stack[slot].ty().unwrap_or(ValType::I32);
                let var = self.fresh_var(ty);
                let node = std::mem::replace(&mut self.scopes[scope].stack[slot], var.clone());
                seen.push((node.clone(), var.clone()));
                self.scopes[scope].stmts.push(Ast::Assign {
                    target: Box::new(var),
                    value: Box::new(node),
                });
            }
        }
    }

    fn set_local(&mut self, index: u32, value: Ast) {
        self.scrub(|node| node.reads_local(index));
        let target = self.local_ref(index);
        self.evict(Ast::Assign {
            target: Box::new(target),
            value: Box::new(value),
        });
    }

    // The scope-stack index `label` enclosing regions up.
    fn branch_target(&self, label: u32) -> usize {
        self.scopes.len().saturating_sub(1 + label as usize)
    }

    fn lift_body(&mut self, body: &[Instr]) -> Result<(), Error> {
        for instr in body {
            self.instr_index += 1;
            if let Flow::Diverges = self.lift_instr(instr)? {
                // The rest of this straight-line region is unreachable.
                break;
            }
        }
        Ok(())
    }

    fn lift_instr(&mut self, instr: &Instr) -> Result<Flow, Error> {
        match instr {
            Instr::Nop => {}
            Instr::Unreachable => {
                self.evict(Ast::Unreachable);
                return Ok(Flow::Diverges);
            }
            Instr::Const(value) => self.push(Ast::Lit(*value)),
            Instr::Op { op, ty, signed } => {
                let args = match op.arity() {
                    1 => vec![self.pop()?],
                    3 => {
                        let cond = self.pop()?;
                        let if_false = self.pop()?;
                        let if_true = self.pop()?;
                        vec![if_true, if_false, cond]
                    }
                    // The second-popped operand is the left-hand side, to
                    // preserve source order.
                    _ => {
                        let rhs = self.pop()?;
                        let lhs = self.pop()?;
                        vec![lhs, rhs]
                    }
                };
                self.push(Ast::Op {
                    op: *op,
                    ty: *ty,
                    signed: *signed,
                    args,
                });
            }
            Instr::Select => {
                let cond = self.pop()?;
                let if_false = self.pop()?;
                let if_true = self.pop()?;
                let ty = if_true.ty().unwrap_or(ValType::I32);
                self.push(Ast::Op {
                    op: OpKind::Select,
                    ty,
                    signed: false,
                    args: vec![if_true, if_false, cond],
                });
            }
            Instr::Cast { from, to, signed } => {
                let value = self.pop()?;
                self.push(Ast::Cast {
                    from: *from,
                    to: *to,
                    signed: *signed,
                    value: Box::new(value),
                });
            }
            Instr::Reinterpret { from, to } => {
                let value = self.pop()?;
                self.push(Ast::Reinterpret {
                    from: *from,
                    to: *to,
                    value: Box::new(value),
                });
            }
            Instr::LocalGet { local } => {
                let node = self.local_ref(*local);
                self.push(node);
            }
            Instr::LocalSet { local } => {
                let value = self.pop()?;
                self.set_local(*local, value);
            }
            Instr::LocalTee { local } => {
                let value = self.pop()?;
                self.set_local(*local, value);
                let node = self.local_ref(*local);
                self.push(node);
            }
            Instr::GlobalGet { global } => {
                let node = self.global_ref(*global);
                self.push(node);
            }
            Instr::GlobalSet { global } => {
                let value = self.pop()?;
                let index = *global;
                self.scrub(|node| node.reads_global(index));
                let target = self.global_ref(index);
                self.evict(Ast::Assign {
                    target: Box::new(target),
                    value: Box::new(value),
                });
            }
            Instr::Load {
                ty,
                width,
                signed,
                memarg,
            } => {
                let base = self.pop()?;
                self.push(Ast::Load {
                    ty: *ty,
                    width: *width,
                    signed: *signed,
                    align: memarg.align,
                    offset: memarg.offset,
                    base: Box::new(base),
                });
            }
            Instr::Store { ty, width, memarg } => {
                let value = self.pop()?;
                let base = self.pop()?;
                self.scrub(Ast::reads_memory);
                self.evict(Ast::Store {
                    ty: *ty,
                    width: *width,
                    align: memarg.align,
                    offset: memarg.offset,
                    base: Box::new(base),
                    value: Box::new(value),
                });
            }
            Instr::MemorySize => self.push(Ast::MemorySize),
            Instr::MemoryGrow => {
                // Growing writes memory state, so the grow itself cannot
                // stay unmaterialized on the stack.
                let pages = self.pop()?;
                self.scrub(Ast::reads_memory);
                let var = self.fresh_var(ValType::I32);
                self.evict(Ast::Assign {
                    target: Box::new(var.clone()),
                    value: Box::new(Ast::MemoryGrow {
                        pages: Box::new(pages),
                    }),
                });
                self.push(var);
            }
            Instr::Call { func } => {
                let ty = self
                    .module
                    .functions
                    .get(*func as usize)
                    .map_or(0, |callee| callee.ty);
                self.call(CallTarget::Direct(*func), ty)?;
            }
            Instr::CallIndirect { ty } => {
                // The computed callee index sits on top of the stack.
                let callee = self.pop()?;
                self.call(CallTarget::Indirect(Box::new(callee)), *ty)?;
            }
            Instr::Drop => {
                self.pop()?;
            }
            Instr::Return => {
                self.emit_return()?;
                return Ok(Flow::Diverges);
            }
            Instr::Br { label } => {
                let label = self.branch_target(*label);
                self.evict(Ast::Branch { label, cond: None });
                return Ok(Flow::Diverges);
            }
            Instr::BrIf { label } => {
                let cond = self.pop()?;
                let label = self.branch_target(*label);
                self.evict(Ast::Branch {
                    label,
                    cond: Some(Box::new(cond)),
                });
            }
            Instr::BrTable { labels, default } => {
                let index = self.pop()?;
                let labels = labels
                    .iter()
                    .map(|&label| self.branch_target(label))
                    .collect();
                let default = self.branch_target(*default);
                self.evict(Ast::BranchTable {
                    index: Box::new(index),
                    labels,
                    default,
                });
                return Ok(Flow::Diverges);
            }
            Instr::Block { ty, body } => self.region(RegionKind::Block, *ty, body)?,
            Instr::Loop { ty, body } => self.region(RegionKind::Loop, *ty, body)?,
            Instr::IfElse {
                ty,
                then_body,
                else_body,
            } => self.if_region(*ty, then_body, else_body.as_deref())?,
        }
        Ok(Flow::Continues)
    }

    // Calls are sequence points: callees may write memory and any global,
    // so pending readers of either are materialized first. Results bind to
    // fresh variables pushed in declaration order (result-last on top).
    fn call(&mut self, target: CallTarget, ty_index: u32) -> Result<(), Error> {
        let ty = self
            .module
            .types
            .get(ty_index as usize)
            .cloned()
            .unwrap_or_default();
        let mut params = Vec::with_capacity(ty.params.len());
        for _ in &ty.params {
            params.push(self.pop()?);
        }
        params.reverse();
        self.scrub(|node| node.reads_memory() || node.reads_any_global());
        let mut results = Vec::with_capacity(ty.results.len());
        for &result in &ty.results {
            results.push(self.fresh_var(result));
        }
        self.evict(Ast::Call {
            target,
            ty: ty_index,
            params,
            results: results.clone(),
        });
        for result in results {
            self.push(result);
        }
        Ok(())
    }

    fn region(&mut self, kind: RegionKind, ty: BlockType, body: &[Instr]) -> Result<(), Error> {
        self.scopes.push(Scope::default());
        self.lift_body(body)?;
        let mut child = self.scopes.pop().unwrap_or_default();
        let mut results = Vec::new();
        if let BlockType::Value(value_ty) = ty {
            // The region's value is bound where the region ends and read
            // through a fresh variable in the enclosing scope. A region
            // that diverged leaves nothing to bind.
            if let Some(value) = child.stack.pop() {
                child.stmts.push(Ast::BlockReturn {
                    values: vec![value],
                });
            }
            let var = self.fresh_var(value_ty);
            results.push(var.clone());
            self.push(var);
        }
        let stmt = match kind {
            RegionKind::Block => Ast::Block {
                body: child.stmts,
                results,
            },
            RegionKind::Loop => Ast::Loop {
                body: child.stmts,
                results,
            },
        };
        self.evict(stmt);
        Ok(())
    }

    fn if_region(
        &mut self,
        ty: BlockType,
        then_body: &[Instr],
        else_body: Option<&[Instr]>,
    ) -> Result<(), Error> {
        // The condition is popped from the enclosing scope before either
        // arm is lifted.
        let cond = self.pop()?;
        self.scopes.push(Scope::default());
        self.lift_body(then_body)?;
        let mut then_scope = self.scopes.pop().unwrap_or_default();
        let mut else_scope = None;
        if let Some(body) = else_body {
            self.scopes.push(Scope::default());
            self.lift_body(body)?;
            else_scope = Some(self.scopes.pop().unwrap_or_default());
        }
        let mut results = Vec::new();
        if let BlockType::Value(value_ty) = ty {
            if let Some(value) = then_scope.stack.pop() {
                then_scope.stmts.push(Ast::BlockReturn {
                    values: vec![value],
                });
            }
            if let Some(scope) = else_scope.as_mut() {
                if let Some(value) = scope.stack.pop() {
                    scope.stmts.push(Ast::BlockReturn {
                        values: vec![value],
                    });
                }
            }
            let var = self.fresh_var(value_ty);
            results.push(var.clone());
            self.push(var);
        }
        self.evict(Ast::IfElse {
            cond: Box::new(cond),
            then_body: then_scope.stmts,
            else_body: else_scope.map(|scope| scope.stmts),
            results,
        });
        Ok(())
    }

    // Pops the declared results (in reverse declaration order) and evicts
    // a return statement.
    fn emit_return(&mut self) -> Result<(), Error> {
        let count = self.func_type().results.len();
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.pop()?);
        }
        values.reverse();
        self.evict(Ast::Return { values });
        Ok(())
    }

    // The implicit return at the end of the body. A stack already drained
    // by an explicit return (or a diverging instruction) produces nothing.
    fn exit_return(&mut self) -> Result<(), Error> {
        let count = self.func_type().results.len();
        if count == 0 || self.cur().stack.len() < count {
            return Ok(());
        }
        self.emit_return()
    }
}
