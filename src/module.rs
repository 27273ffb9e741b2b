// Copyright (c) 2025 Joshua Seaton
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! The decoded-module model.
//!
//! A [`Module`] owns everything the decoder produced: the function-type
//! table, the functions (imports first, in import order), tables, memories,
//! globals, the optional start function, and a map from import-module name
//! to the entities imported from it. Cross-references between entities are
//! indices into the owning vectors, never pointers, so the structure is
//! acyclic by construction.

use std::collections::BTreeMap;

use crate::types::{FuncType, Instr, Limits, ValType, Value};

/// A decoded WebAssembly module.
#[derive(Debug, Default)]
pub struct Module {
    /// Function types, indexed by the type section.
    pub types: Vec<FuncType>,
    /// All functions: imported ones first in import order, then
    /// module-defined ones.
    pub functions: Vec<Function>,
    pub tables: Vec<Table>,
    pub memories: Vec<Memory>,
    pub globals: Vec<Global>,
    /// Index of the start function, if the module declares one.
    pub start: Option<u32>,
    /// Imported entities grouped by the module they were imported from.
    pub imports: BTreeMap<String, Vec<ImportedItem>>,
}

impl Module {
    /// The signature of the given function.
    pub fn func_type(&self, func: &Function) -> &FuncType {
        &self.types[func.ty as usize]
    }

    pub(crate) fn register_import(&mut self, module: String, field: String, entity: EntityRef) {
        self.imports
            .entry(module)
            .or_default()
            .push(ImportedItem { field, entity });
    }
}

/// A reference to an entity owned by the module.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EntityRef {
    Function(usize),
    Table(usize),
    Memory(usize),
    Global(usize),
}

/// One entity imported from a particular module.
#[derive(Clone, Debug)]
pub struct ImportedItem {
    /// The imported symbol name.
    pub field: String,
    pub entity: EntityRef,
}

/// A function, imported or module-defined.
#[derive(Debug)]
pub struct Function {
    /// Stable numeric id, equal to the function's index in the module.
    pub id: u32,
    /// Imports keep their imported symbol; module-defined functions are
    /// named `func{id}`.
    pub name: String,
    /// Index of the function's type.
    pub ty: u32,
    pub imported: bool,
    pub exported: bool,
    /// Declared local variable types, not counting parameters.
    pub locals: Vec<ValType>,
    /// The parsed body; None for imports.
    pub body: Option<Vec<Instr>>,
}

/// A decoded initializer expression: a single constant-producing
/// instruction.
#[derive(Clone, Debug, PartialEq)]
pub enum InitExpr {
    Const(Value),
    /// Reads an (imported, immutable) global by index.
    GlobalGet(u32),
}

/// A global variable.
#[derive(Debug)]
pub struct Global {
    pub name: String,
    pub ty: ValType,
    pub mutable: bool,
    pub imported: bool,
    pub exported: bool,
    /// The initializer; None for imports.
    pub init: Option<InitExpr>,
}

/// An initializer range attached to a memory: an offset expression paired
/// with the bytes placed there.
#[derive(Debug)]
pub struct DataRange {
    pub offset: InitExpr,
    pub bytes: Vec<u8>,
}

/// An initializer range attached to a table: an offset expression paired
/// with function indices.
#[derive(Debug)]
pub struct ElemRange {
    pub offset: InitExpr,
    pub functions: Vec<u32>,
}

/// A linear memory.
#[derive(Debug)]
pub struct Memory {
    /// Imports keep their imported symbol.
    pub name: Option<String>,
    pub limits: Limits,
    pub imported: bool,
    pub exported: bool,
    pub data: Vec<DataRange>,
}

/// A table of function references.
#[derive(Debug)]
pub struct Table {
    /// Imports keep their imported symbol.
    pub name: Option<String>,
    pub limits: Limits,
    pub imported: bool,
    pub exported: bool,
    pub elements: Vec<ElemRange>,
}
