// Copyright (c) 2025 Joshua Seaton
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! The decompiled expression and statement tree.
//!
//! A single tagged node type serves both as operand-stack entry and as
//! statement: value-producing nodes (literals, variable references, pure
//! operators, loads, casts) may live on the symbolic stack, while
//! statement-only forms (stores, assignments, calls, returns, control
//! regions) are only ever appended to a statement list.

use crate::types::{OpKind, ValType, Value};

/// A node of the decompiled tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Ast {
    /// A typed constant.
    Lit(Value),
    /// A named variable. The `local`/`global` annotations record which
    /// cell the variable reads, if any, and drive dependency tracking.
    Var {
        name: String,
        ty: ValType,
        local: Option<u32>,
        global: Option<u32>,
    },
    /// A unary, binary, or select operator over its operands.
    Op {
        op: OpKind,
        ty: ValType,
        signed: bool,
        args: Vec<Ast>,
    },
    /// A memory read. Reads are pure but dependency-bearing: any pending
    /// load must be materialized before a subsequent memory write.
    Load {
        ty: ValType,
        width: u8,
        signed: bool,
        align: u32,
        offset: u32,
        base: Box<Ast>,
    },
    /// A memory write. Statement only, never on the stack.
    Store {
        ty: ValType,
        width: u8,
        align: u32,
        offset: u32,
        base: Box<Ast>,
        value: Box<Ast>,
    },
    /// A numeric conversion.
    Cast {
        from: ValType,
        to: ValType,
        signed: bool,
        value: Box<Ast>,
    },
    /// A bit-preserving reinterpretation.
    Reinterpret {
        from: ValType,
        to: ValType,
        value: Box<Ast>,
    },
    /// The current memory size in pages.
    MemorySize,
    /// Grows memory; the node evaluates to the previous size in pages.
    MemoryGrow { pages: Box<Ast> },
    /// A call. Statement only; its results are bound to fresh variables.
    Call {
        target: CallTarget,
        /// Index of the callee's function type.
        ty: u32,
        params: Vec<Ast>,
        results: Vec<Ast>,
    },
    /// `target = value`. Statement only.
    Assign { target: Box<Ast>, value: Box<Ast> },
    /// Returns from the function. Statement only.
    Return { values: Vec<Ast> },
    /// Binds the value a structured region leaves behind. Statement only,
    /// always the last statement of a region body.
    BlockReturn { values: Vec<Ast> },
    Block {
        body: Vec<Ast>,
        results: Vec<Ast>,
    },
    Loop {
        body: Vec<Ast>,
        results: Vec<Ast>,
    },
    IfElse {
        cond: Box<Ast>,
        then_body: Vec<Ast>,
        else_body: Option<Vec<Ast>>,
        results: Vec<Ast>,
    },
    /// A labelled break. `label` is the depth of the targeted region;
    /// `cond` is present for the conditional form.
    Branch {
        label: usize,
        cond: Option<Box<Ast>>,
    },
    /// A multi-way break indexed by a computed value.
    BranchTable {
        index: Box<Ast>,
        labels: Vec<usize>,
        default: usize,
    },
    Unreachable,
}

/// The callee of a call: a statically-numbered function, or a computed
/// table index for the indirect form.
#[derive(Clone, Debug, PartialEq)]
pub enum CallTarget {
    Direct(u32),
    Indirect(Box<Ast>),
}

impl Ast {
    /// Whether evaluating this node observes local `index`.
    pub fn reads_local(&self, index: u32) -> bool {
        match self {
            Ast::Var { local, .. } => *local == Some(index),
            Ast::Op { args, .. } => args.iter().any(|arg| arg.reads_local(index)),
            Ast::Load { base, .. } => base.reads_local(index),
            Ast::Cast { value, .. } | Ast::Reinterpret { value, .. } => value.reads_local(index),
            Ast::MemoryGrow { pages } => pages.reads_local(index),
            _ => false,
        }
    }

    /// Whether evaluating this node observes global `index`.
    pub fn reads_global(&self, index: u32) -> bool {
        match self {
            Ast::Var { global, .. } => *global == Some(index),
            Ast::Op { args, .. } => args.iter().any(|arg| arg.reads_global(index)),
            Ast::Load { base, .. } => base.reads_global(index),
            Ast::Cast { value, .. } | Ast::Reinterpret { value, .. } => value.reads_global(index),
            Ast::MemoryGrow { pages } => pages.reads_global(index),
            _ => false,
        }
    }

    /// Whether evaluating this node observes any global.
    pub fn reads_any_global(&self) -> bool {
        match self {
            Ast::Var { global, .. } => global.is_some(),
            Ast::Op { args, .. } => args.iter().any(Ast::reads_any_global),
            Ast::Load { base, .. } => base.reads_any_global(),
            Ast::Cast { value, .. } | Ast::Reinterpret { value, .. } => value.reads_any_global(),
            Ast::MemoryGrow { pages } => pages.reads_any_global(),
            _ => false,
        }
    }

    /// Whether evaluating this node observes linear memory (loads do,
    /// unconditionally, as does the memory size).
    pub fn reads_memory(&self) -> bool {
        match self {
            Ast::Load { .. } | Ast::MemorySize | Ast::MemoryGrow { .. } => true,
            Ast::Op { args, .. } => args.iter().any(Ast::reads_memory),
            Ast::Cast { value, .. } | Ast::Reinterpret { value, .. } => value.reads_memory(),
            _ => false,
        }
    }

    /// The value type this node evaluates to, for value-producing nodes.
    pub fn ty(&self) -> Option<ValType> {
        match self {
            Ast::Lit(value) => Some(value.ty()),
            Ast::Var { ty, .. } | Ast::Op { ty, .. } | Ast::Load { ty, .. } => Some(*ty),
            Ast::Cast { to, .. } | Ast::Reinterpret { to, .. } => Some(*to),
            Ast::MemorySize | Ast::MemoryGrow { .. } => Some(ValType::I32),
            _ => None,
        }
    }
}
