// Copyright (c) 2025 Joshua Seaton
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Plain-text rendering of decompiled modules.
//!
//! The exact formatting is incidental; only the statement tree shape and
//! leaf contents carry meaning. Structured regions print with the label
//! (`label_{depth}`) that branches inside them reference.

use crate::lift::{self, Ast, CallTarget, lift_function};
use crate::module::{EntityRef, Function, InitExpr, Module};

const INDENT: &str = "    ";

/// Render the module header and every decompiled function body.
pub fn render_module(module: &Module) -> Result<String, lift::Error> {
    let mut printer = Printer {
        module,
        out: String::new(),
    };
    printer.header();
    for func in &module.functions {
        if func.imported {
            continue;
        }
        let stmts = lift_function(module, func)?;
        printer.function(func, &stmts);
    }
    Ok(printer.out)
}

struct Printer<'m> {
    module: &'m Module,
    out: String,
}

impl Printer<'_> {
    fn line(&mut self, depth: usize, text: &str) {
        for _ in 0..depth {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn header(&mut self) {
        let module = self.module;
        for (module_name, items) in &module.imports {
            for item in items {
                let what = match item.entity {
                    EntityRef::Function(index) => {
                        let func = &module.functions[index];
                        module.func_type(func).to_string()
                    }
                    EntityRef::Table(index) => {
                        format!("table{}", module.tables[index].limits)
                    }
                    EntityRef::Memory(index) => {
                        format!("memory{}", module.memories[index].limits)
                    }
                    EntityRef::Global(index) => {
                        let global = &module.globals[index];
                        format!("global {}", global.ty)
                    }
                };
                self.line(0, &format!("import {}.{}: {}", module_name, item.field, what));
            }
        }
        if !module.imports.is_empty() {
            self.out.push('\n');
        }

        for global in &module.globals {
            if global.imported {
                continue;
            }
            let mut text = format!("global {} {}", global.ty, global.name);
            if let Some(init) = &global.init {
                text.push_str(&format!(" = {}", self.init(init)));
            }
            if global.mutable {
                text.push_str(" mut");
            }
            if global.exported {
                text.push_str(" export");
            }
            self.line(0, &text);
        }

        for (index, memory) in module.memories.iter().enumerate() {
            let name = memory
                .name
                .clone()
                .unwrap_or_else(|| format!("mem{index}"));
            let mut text = format!("memory{} {}", memory.limits, name);
            if memory.exported {
                text.push_str(" export");
            }
            self.line(0, &text);
            for range in &memory.data {
                let bytes = range
                    .bytes
                    .iter()
                    .map(|byte| format!("{byte:02x}"))
                    .collect::<Vec<_>>()
                    .join(" ");
                self.line(1, &format!("offset {}: [{}]", self.init(&range.offset), bytes));
            }
        }

        for (index, table) in module.tables.iter().enumerate() {
            let name = table
                .name
                .clone()
                .unwrap_or_else(|| format!("table{index}"));
            let mut text = format!("table{} {}", table.limits, name);
            if table.exported {
                text.push_str(" export");
            }
            self.line(0, &text);
            for range in &table.elements {
                let funcs = range
                    .functions
                    .iter()
                    .map(|&func| self.func_name(func))
                    .collect::<Vec<_>>()
                    .join(", ");
                self.line(1, &format!("offset {}: ({})", self.init(&range.offset), funcs));
            }
        }

        if let Some(start) = module.start {
            self.line(0, &format!("start {}", self.func_name(start)));
        }

        if !self.out.is_empty() {
            self.out.push('\n');
        }
    }

    fn function(&mut self, func: &Function, stmts: &[Ast]) {
        let mut text = format!("function {}: {}", func.name, self.module.func_type(func));
        if func.exported {
            text.push_str(" export");
        }
        self.line(0, &text);
        if !func.locals.is_empty() {
            let locals = func
                .locals
                .iter()
                .map(|ty| ty.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            self.line(1, &format!("locals: {locals}"));
        }
        for stmt in stmts {
            self.stmt(stmt, 1);
        }
        self.out.push('\n');
    }

    fn stmt(&mut self, node: &Ast, depth: usize) {
        match node {
            Ast::Block { body, results } => {
                let open = format!("{}block label_{depth} {{", results_prefix(results));
                self.line(depth, &open);
                for stmt in body {
                    self.stmt(stmt, depth + 1);
                }
                self.line(depth, "}");
            }
            Ast::Loop { body, results } => {
                let open = format!("{}loop label_{depth} {{", results_prefix(results));
                self.line(depth, &open);
                for stmt in body {
                    self.stmt(stmt, depth + 1);
                }
                self.line(depth, "}");
            }
            Ast::IfElse {
                cond,
                then_body,
                else_body,
                results,
            } => {
                let open = format!(
                    "{}if ({}) label_{depth} {{",
                    results_prefix(results),
                    self.expr(cond)
                );
                self.line(depth, &open);
                for stmt in then_body {
                    self.stmt(stmt, depth + 1);
                }
                if let Some(body) = else_body {
                    self.line(depth, "} else {");
                    for stmt in body {
                        self.stmt(stmt, depth + 1);
                    }
                }
                self.line(depth, "}");
            }
            _ => {
                let text = self.stmt_text(node);
                self.line(depth, &text);
            }
        }
    }

    fn stmt_text(&self, node: &Ast) -> String {
        match node {
            Ast::Assign { target, value } => match target.as_ref() {
                Ast::Var { name, ty, .. } => {
                    format!("{ty} {name} = {}", self.expr(value))
                }
                other => format!("{} = {}", self.expr(other), self.expr(value)),
            },
            Ast::Store {
                width,
                align,
                offset,
                base,
                value,
                ..
            } => format!(
                "store_{width}({} + {offset} align {}, {})",
                self.expr(base),
                align_bytes(*align),
                self.expr(value)
            ),
            Ast::Call {
                target,
                params,
                results,
                ..
            } => {
                let call = self.call_text(target, params);
                match results.as_slice() {
                    [] => call,
                    [Ast::Var { name, ty, .. }] => format!("{ty} {name} = {call}"),
                    many => format!("({}) = {call}", self.expr_list(many)),
                }
            }
            Ast::Return { values } if values.is_empty() => "return".to_owned(),
            Ast::Return { values } => format!("return {}", self.expr_list(values)),
            Ast::BlockReturn { values } => format!("yield {}", self.expr_list(values)),
            Ast::Branch { label, cond: None } => format!("break label_{label}"),
            Ast::Branch {
                label,
                cond: Some(cond),
            } => format!("if ({}) break label_{label}", self.expr(cond)),
            Ast::BranchTable {
                index,
                labels,
                default,
            } => {
                let labels = labels
                    .iter()
                    .map(|label| format!("label_{label}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "break_table ({}) [{}] default label_{default}",
                    self.expr(index),
                    labels
                )
            }
            Ast::Unreachable => "unreachable".to_owned(),
            other => self.expr(other),
        }
    }

    fn expr(&self, node: &Ast) -> String {
        match node {
            Ast::Lit(value) => value.to_string(),
            Ast::Var { name, .. } => name.clone(),
            Ast::Op { op, args, .. } => {
                use crate::types::OpKind;
                match op {
                    OpKind::Eqz => format!("({} == 0)", self.expr(&args[0])),
                    OpKind::Select => format!(
                        "({} ? {} : {})",
                        self.expr(&args[2]),
                        self.expr(&args[0]),
                        self.expr(&args[1])
                    ),
                    _ => match op.symbol() {
                        Some(symbol) => {
                            let parts = args
                                .iter()
                                .map(|arg| self.expr(arg))
                                .collect::<Vec<_>>()
                                .join(&format!(" {symbol} "));
                            format!("({parts})")
                        }
                        None => format!("{}({})", op.name(), self.expr_list(args)),
                    },
                }
            }
            Ast::Load {
                ty,
                width,
                signed,
                align,
                offset,
                base,
            } => {
                let access = format!(
                    "load_{width}({} + {offset} align {}",
                    self.expr(base),
                    align_bytes(*align)
                );
                if *width == ty.bit_width() && !signed {
                    format!("{access})")
                } else if *signed {
                    format!("({ty}) {access} as_signed)")
                } else {
                    format!("({ty}) {access})")
                }
            }
            Ast::Cast { to, signed, value, .. } => {
                if *signed {
                    format!("({to}.s)({})", self.expr(value))
                } else {
                    format!("({to})({})", self.expr(value))
                }
            }
            Ast::Reinterpret { to, value, .. } => {
                format!("reinterpret_{to}({})", self.expr(value))
            }
            Ast::MemorySize => "memory.size()".to_owned(),
            Ast::MemoryGrow { pages } => format!("memory.grow({})", self.expr(pages)),
            // Statement-only nodes have no expression rendering.
            _ => "<statement>".to_owned(),
        }
    }

    fn expr_list(&self, nodes: &[Ast]) -> String {
        nodes
            .iter()
            .map(|node| self.expr(node))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn call_text(&self, target: &CallTarget, params: &[Ast]) -> String {
        let callee = match target {
            CallTarget::Direct(index) => self.func_name(*index),
            CallTarget::Indirect(expr) => format!("(*{})", self.expr(expr)),
        };
        format!("{callee}({})", self.expr_list(params))
    }

    fn func_name(&self, index: u32) -> String {
        self.module
            .functions
            .get(index as usize)
            .map_or_else(|| format!("func{index}"), |func| func.name.clone())
    }

    fn init(&self, expr: &InitExpr) -> String {
        match expr {
            InitExpr::Const(value) => value.to_string(),
            InitExpr::GlobalGet(index) => self
                .module
                .globals
                .get(*index as usize)
                .map_or_else(|| format!("global{index}"), |global| global.name.clone()),
        }
    }
}

fn results_prefix(results: &[Ast]) -> String {
    if results.is_empty() {
        return String::new();
    }
    let names = results
        .iter()
        .map(|result| match result {
            Ast::Var { name, .. } => name.clone(),
            _ => "?".to_owned(),
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{names}] <- ")
}

fn align_bytes(align: u32) -> String {
    match 1u64.checked_shl(align) {
        Some(bytes) => bytes.to_string(),
        None => format!("2^{align}"),
    }
}
