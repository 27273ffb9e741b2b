// Copyright (c) 2025 Joshua Seaton
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! WebAssembly binary format decoding.
//!
//! [`decode_module`] makes a single pass over the byte image: magic and
//! version first, then a loop of (section id, declared size, body). Every
//! section body must consume exactly its declared size. Decoding is
//! append-only into a [`Module`]; on any error the partial module is
//! dropped.

mod cursor;
mod instr;
pub mod leb128;

use log::{debug, warn};

use crate::module::{
    DataRange, ElemRange, EntityRef, Function, Global, InitExpr, Memory, Module, Table,
};
use crate::types::{FuncType, Limits, Opcode, SectionId, ValType, Value};

use cursor::Cursor;

/// Errors that can arise while decoding a module.
///
/// Each variant is produced at a single site and carries the absolute byte
/// offset involved. All errors are fatal to the decode.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("unexpected end of input at offset {offset:#x} (wanted {wanted} more bytes)")]
    Truncated { offset: usize, wanted: usize },

    #[error("bad magic {found:02x?} (expected \\0asm)")]
    BadMagic { found: [u8; 4] },

    #[error(
        "section {id:?} starting at offset {offset:#x} declared {declared} bytes but decoding consumed {consumed}"
    )]
    SectionSizeMismatch {
        id: SectionId,
        offset: usize,
        declared: u32,
        consumed: usize,
    },

    #[error(
        "function body starting at offset {offset:#x} declared {declared} bytes but decoding consumed {consumed}"
    )]
    FunctionSizeMismatch {
        offset: usize,
        declared: u32,
        consumed: usize,
    },

    #[error("LEB128 value at offset {offset:#x} uses more groups than a {bits}-bit value allows")]
    Leb128Overflow { offset: usize, bits: u32 },

    #[error("LEB128 value at offset {offset:#x} does not fit in {bits} bits")]
    Leb128Range { offset: usize, bits: u32 },

    #[error("name at offset {offset:#x} is not valid UTF-8")]
    InvalidUtf8 { offset: usize },

    #[error("unknown opcode {opcode:#04x} at offset {offset:#x}")]
    BadOpcode { offset: usize, opcode: u8 },

    #[error("reserved byte at offset {offset:#x} must be zero, found {found:#x}")]
    ReservedNonZero { offset: usize, found: u8 },

    #[error("unsupported initializer expression at offset {offset:#x}")]
    BadInitExpr { offset: usize },

    #[error("{kind} index {index} at offset {offset:#x} is out of range")]
    BadIndex {
        offset: usize,
        kind: &'static str,
        index: u32,
    },

    #[error("invalid {what} token {found:#x} at offset {offset:#x}")]
    BadToken {
        offset: usize,
        what: &'static str,
        found: u8,
    },

    #[error("function at offset {offset:#x} declares too many locals ({count})")]
    TooManyLocals { offset: usize, count: usize },
}

/// Decode a binary module image.
pub fn decode_module(bytes: &[u8]) -> Result<Module, Error> {
    Decoder::new(bytes).run()
}

pub(crate) struct Decoder<'a> {
    cursor: Cursor<'a>,
    module: Module,
    // Number of imported functions; code entries attach to the functions
    // after this offset, in order.
    imported_functions: usize,
}

impl<'a> Decoder<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(bytes),
            module: Module::default(),
            imported_functions: 0,
        }
    }

    fn run(mut self) -> Result<Module, Error> {
        let magic = self.cursor.pop(4)?;
        if magic != b"\0asm" {
            return Err(Error::BadMagic {
                found: [magic[0], magic[1], magic[2], magic[3]],
            });
        }
        let version = self.cursor.pop(4)?;
        if version != b"\x01\0\0\0" {
            warn!("unexpected module version {version:02x?}; decoding as version 1");
        }
        // There is no in-band end-of-module signal; decode sections until
        // the buffer runs out.
        while self.cursor.peek(1).is_some() {
            self.section()?;
        }
        Ok(self.module)
    }

    fn section(&mut self) -> Result<(), Error> {
        let id_offset = self.cursor.position();
        let id_byte = self.cursor.byte()?;
        let id = SectionId::try_from(id_byte).map_err(|_| Error::BadToken {
            offset: id_offset,
            what: "section id",
            found: id_byte,
        })?;
        let declared = self.read_u32()?;
        let start = self.cursor.position();
        debug!("section {id:?}: {declared} bytes at {start:#x}");
        match id {
            SectionId::Custom => {
                // Custom sections are opaque; discard the body.
                self.cursor.pop(declared as usize)?;
            }
            SectionId::Type => self.type_section()?,
            SectionId::Import => self.import_section()?,
            SectionId::Function => self.function_section()?,
            SectionId::Table => self.table_section()?,
            SectionId::Memory => self.memory_section()?,
            SectionId::Global => self.global_section()?,
            SectionId::Export => self.export_section()?,
            SectionId::Start => self.start_section()?,
            SectionId::Element => self.element_section()?,
            SectionId::Code => self.code_section()?,
            SectionId::Data => self.data_section()?,
        }
        let consumed = self.cursor.position() - start;
        if consumed != declared as usize {
            return Err(Error::SectionSizeMismatch {
                id,
                offset: start,
                declared,
                consumed,
            });
        }
        Ok(())
    }

    //
    // Primitive readers.
    //

    pub(crate) fn read_u32(&mut self) -> Result<u32, Error> {
        leb128::read(&mut self.cursor)
    }

    pub(crate) fn read_i32(&mut self) -> Result<i32, Error> {
        leb128::read(&mut self.cursor)
    }

    pub(crate) fn read_i64(&mut self) -> Result<i64, Error> {
        leb128::read(&mut self.cursor)
    }

    pub(crate) fn read_f32(&mut self) -> Result<f32, Error> {
        let b = self.cursor.pop(4)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn read_f64(&mut self) -> Result<f64, Error> {
        let b = self.cursor.pop(8)?;
        Ok(f64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn read_name(&mut self) -> Result<String, Error> {
        let len = self.read_u32()? as usize;
        let offset = self.cursor.position();
        let bytes = self.cursor.pop(len)?;
        let name = str::from_utf8(bytes).map_err(|_| Error::InvalidUtf8 { offset })?;
        Ok(name.to_owned())
    }

    pub(crate) fn valtype(&mut self) -> Result<ValType, Error> {
        let offset = self.cursor.position();
        let byte = self.cursor.byte()?;
        ValType::try_from(byte).map_err(|_| Error::BadToken {
            offset,
            what: "value type",
            found: byte,
        })
    }

    fn valtype_vec(&mut self) -> Result<Vec<ValType>, Error> {
        let count = self.read_u32()?;
        let mut types = Vec::new();
        for _ in 0..count {
            types.push(self.valtype()?);
        }
        Ok(types)
    }

    fn limits(&mut self) -> Result<Limits, Error> {
        let offset = self.cursor.position();
        let token = self.cursor.byte()?;
        let has_max = match token {
            0x00 => false,
            0x01 => true,
            _ => {
                return Err(Error::BadToken {
                    offset,
                    what: "limits",
                    found: token,
                });
            }
        };
        let min = self.read_u32()?;
        let max = if has_max { Some(self.read_u32()?) } else { None };
        Ok(Limits { min, max })
    }

    fn mutability(&mut self) -> Result<bool, Error> {
        let offset = self.cursor.position();
        let byte = self.cursor.byte()?;
        match byte {
            0x00 => Ok(false),
            0x01 => Ok(true),
            _ => Err(Error::BadToken {
                offset,
                what: "mutability",
                found: byte,
            }),
        }
    }

    fn checked_index(&mut self, kind: &'static str, bound: usize) -> Result<u32, Error> {
        let offset = self.cursor.position();
        let index = self.read_u32()?;
        if (index as usize) < bound {
            Ok(index)
        } else {
            Err(Error::BadIndex {
                offset,
                kind,
                index,
            })
        }
    }

    pub(crate) fn type_index(&mut self) -> Result<u32, Error> {
        self.checked_index("type", self.module.types.len())
    }

    pub(crate) fn func_index(&mut self) -> Result<u32, Error> {
        self.checked_index("function", self.module.functions.len())
    }

    pub(crate) fn global_index(&mut self) -> Result<u32, Error> {
        self.checked_index("global", self.module.globals.len())
    }

    fn table_index(&mut self) -> Result<u32, Error> {
        self.checked_index("table", self.module.tables.len())
    }

    fn mem_index(&mut self) -> Result<u32, Error> {
        self.checked_index("memory", self.module.memories.len())
    }

    //
    // Section parsers.
    //

    fn type_section(&mut self) -> Result<(), Error> {
        let count = self.read_u32()?;
        for _ in 0..count {
            let offset = self.cursor.position();
            let token = self.cursor.byte()?;
            if token != 0x60 {
                return Err(Error::BadToken {
                    offset,
                    what: "function type",
                    found: token,
                });
            }
            let params = self.valtype_vec()?;
            let results = self.valtype_vec()?;
            self.module.types.push(FuncType { params, results });
        }
        Ok(())
    }

    fn import_section(&mut self) -> Result<(), Error> {
        let count = self.read_u32()?;
        for _ in 0..count {
            let module_name = self.read_name()?;
            let field = self.read_name()?;
            let offset = self.cursor.position();
            let kind = self.cursor.byte()?;
            let entity = match kind {
                0x00 => {
                    let ty = self.type_index()?;
                    let id = self.module.functions.len();
                    self.module.functions.push(Function {
                        id: id as u32,
                        name: field.clone(),
                        ty,
                        imported: true,
                        exported: false,
                        locals: Vec::new(),
                        body: None,
                    });
                    EntityRef::Function(id)
                }
                0x01 => {
                    let elem_offset = self.cursor.position();
                    let elem = self.cursor.byte()?;
                    if elem != 0x70 {
                        return Err(Error::BadToken {
                            offset: elem_offset,
                            what: "element kind",
                            found: elem,
                        });
                    }
                    let limits = self.limits()?;
                    let id = self.module.tables.len();
                    self.module.tables.push(Table {
                        name: Some(field.clone()),
                        limits,
                        imported: true,
                        exported: false,
                        elements: Vec::new(),
                    });
                    EntityRef::Table(id)
                }
                0x02 => {
                    let limits = self.limits()?;
                    let id = self.module.memories.len();
                    self.module.memories.push(Memory {
                        name: Some(field.clone()),
                        limits,
                        imported: true,
                        exported: false,
                        data: Vec::new(),
                    });
                    EntityRef::Memory(id)
                }
                0x03 => {
                    let ty = self.valtype()?;
                    let mutable = self.mutability()?;
                    let id = self.module.globals.len();
                    self.module.globals.push(Global {
                        name: field.clone(),
                        ty,
                        mutable,
                        imported: true,
                        exported: false,
                        init: None,
                    });
                    EntityRef::Global(id)
                }
                _ => {
                    return Err(Error::BadToken {
                        offset,
                        what: "import kind",
                        found: kind,
                    });
                }
            };
            self.module.register_import(module_name, field, entity);
        }
        self.imported_functions = self.module.functions.len();
        Ok(())
    }

    fn function_section(&mut self) -> Result<(), Error> {
        let count = self.read_u32()?;
        for _ in 0..count {
            let ty = self.type_index()?;
            let id = self.module.functions.len() as u32;
            self.module.functions.push(Function {
                id,
                name: format!("func{id}"),
                ty,
                imported: false,
                exported: false,
                locals: Vec::new(),
                body: None,
            });
        }
        Ok(())
    }

    fn table_section(&mut self) -> Result<(), Error> {
        let count = self.read_u32()?;
        for _ in 0..count {
            let offset = self.cursor.position();
            let elem = self.cursor.byte()?;
            if elem != 0x70 {
                return Err(Error::BadToken {
                    offset,
                    what: "element kind",
                    found: elem,
                });
            }
            let limits = self.limits()?;
            self.module.tables.push(Table {
                name: None,
                limits,
                imported: false,
                exported: false,
                elements: Vec::new(),
            });
        }
        Ok(())
    }

    fn memory_section(&mut self) -> Result<(), Error> {
        let count = self.read_u32()?;
        for _ in 0..count {
            let limits = self.limits()?;
            self.module.memories.push(Memory {
                name: None,
                limits,
                imported: false,
                exported: false,
                data: Vec::new(),
            });
        }
        Ok(())
    }

    fn global_section(&mut self) -> Result<(), Error> {
        let count = self.read_u32()?;
        for _ in 0..count {
            let ty = self.valtype()?;
            let mutable = self.mutability()?;
            let init = self.init_expr()?;
            let name = format!("global{}", self.module.globals.len());
            self.module.globals.push(Global {
                name,
                ty,
                mutable,
                imported: false,
                exported: false,
                init: Some(init),
            });
        }
        Ok(())
    }

    fn export_section(&mut self) -> Result<(), Error> {
        let count = self.read_u32()?;
        for _ in 0..count {
            let _name = self.read_name()?;
            let offset = self.cursor.position();
            let kind = self.cursor.byte()?;
            match kind {
                0x00 => {
                    let index = self.func_index()?;
                    self.module.functions[index as usize].exported = true;
                }
                0x01 => {
                    let index = self.table_index()?;
                    self.module.tables[index as usize].exported = true;
                }
                0x02 => {
                    let index = self.mem_index()?;
                    self.module.memories[index as usize].exported = true;
                }
                0x03 => {
                    let index = self.global_index()?;
                    self.module.globals[index as usize].exported = true;
                }
                _ => {
                    return Err(Error::BadToken {
                        offset,
                        what: "export kind",
                        found: kind,
                    });
                }
            }
        }
        Ok(())
    }

    fn start_section(&mut self) -> Result<(), Error> {
        let index = self.func_index()?;
        self.module.start = Some(index);
        Ok(())
    }

    fn element_section(&mut self) -> Result<(), Error> {
        let count = self.read_u32()?;
        for _ in 0..count {
            let table = self.table_index()? as usize;
            let offset = self.init_expr()?;
            let len = self.read_u32()?;
            let mut functions = Vec::new();
            for _ in 0..len {
                functions.push(self.func_index()?);
            }
            self.module.tables[table]
                .elements
                .push(ElemRange { offset, functions });
        }
        Ok(())
    }

    fn code_section(&mut self) -> Result<(), Error> {
        let count = self.read_u32()?;
        for i in 0..count {
            // The i-th code entry belongs to the i-th non-imported
            // function.
            let target = self.imported_functions + i as usize;
            if target >= self.module.functions.len() {
                return Err(Error::BadIndex {
                    offset: self.cursor.position(),
                    kind: "function",
                    index: target as u32,
                });
            }
            let declared = self.read_u32()?;
            let start = self.cursor.position();
            let locals = self.locals()?;
            let ty = self.module.functions[target].ty as usize;
            let params = self.module.types[ty].params.len();
            let body = self.expr((params + locals.len()) as u32)?;
            let consumed = self.cursor.position() - start;
            if consumed != declared as usize {
                return Err(Error::FunctionSizeMismatch {
                    offset: start,
                    declared,
                    consumed,
                });
            }
            let func = &mut self.module.functions[target];
            func.locals = locals;
            func.body = Some(body);
        }
        Ok(())
    }

    // Local declarations are run-length encoded as (count, type) groups
    // and expand into a flat list.
    fn locals(&mut self) -> Result<Vec<ValType>, Error> {
        const MAX_LOCALS: usize = 100_000;

        let offset = self.cursor.position();
        let groups = self.read_u32()?;
        let mut locals = Vec::new();
        for _ in 0..groups {
            let count = self.read_u32()? as usize;
            let ty = self.valtype()?;
            let total = locals.len() + count;
            if total > MAX_LOCALS {
                return Err(Error::TooManyLocals {
                    offset,
                    count: total,
                });
            }
            locals.resize(total, ty);
        }
        Ok(locals)
    }

    fn data_section(&mut self) -> Result<(), Error> {
        let count = self.read_u32()?;
        for _ in 0..count {
            let memory = self.mem_index()? as usize;
            let offset = self.init_expr()?;
            let len = self.read_u32()? as usize;
            let bytes = self.cursor.pop(len)?.to_vec();
            self.module.memories[memory]
                .data
                .push(DataRange { offset, bytes });
        }
        Ok(())
    }

    // Initializer expressions are parsed like bodies but restricted to a
    // single constant-producing instruction followed by `end`.
    fn init_expr(&mut self) -> Result<InitExpr, Error> {
        let offset = self.cursor.position();
        let byte = self.cursor.byte()?;
        let expr = match Opcode::try_from(byte) {
            Ok(Opcode::I32Const) => InitExpr::Const(Value::I32(self.read_i32()?)),
            Ok(Opcode::I64Const) => InitExpr::Const(Value::I64(self.read_i64()?)),
            Ok(Opcode::F32Const) => InitExpr::Const(Value::F32(self.read_f32()?)),
            Ok(Opcode::F64Const) => InitExpr::Const(Value::F64(self.read_f64()?)),
            Ok(Opcode::GlobalGet) => InitExpr::GlobalGet(self.global_index()?),
            _ => {
                self.cursor.revert(1);
                return Err(Error::BadInitExpr { offset });
            }
        };
        let end_offset = self.cursor.position();
        if self.cursor.byte()? != Opcode::End as u8 {
            return Err(Error::BadInitExpr { offset: end_offset });
        }
        Ok(expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Instr, OpKind};

    fn header() -> Vec<u8> {
        b"\0asm\x01\0\0\0".to_vec()
    }

    fn section(id: u8, body: &[u8]) -> Vec<u8> {
        let mut out = vec![id];
        out.extend(leb128::encode_unsigned(body.len() as u64));
        out.extend_from_slice(body);
        out
    }

    // (i32, i32) -> (i32) as a type section body with one entry.
    fn binary_i32_type() -> Vec<u8> {
        vec![0x01, 0x60, 0x02, 0x7f, 0x7f, 0x01, 0x7f]
    }

    fn code_entry(locals: &[u8], body: &[u8]) -> Vec<u8> {
        let mut entry = locals.to_vec();
        entry.extend_from_slice(body);
        let mut out = leb128::encode_unsigned(entry.len() as u64);
        out.extend_from_slice(&entry);
        out
    }

    #[test]
    fn empty_module() {
        let module = decode_module(&header()).unwrap();
        assert!(module.types.is_empty());
        assert!(module.functions.is_empty());
        assert!(module.tables.is_empty());
        assert!(module.memories.is_empty());
        assert!(module.globals.is_empty());
        assert!(module.imports.is_empty());
        assert_eq!(module.start, None);
    }

    #[test]
    fn bad_magic() {
        let err = decode_module(b"\0txt\x01\0\0\0").unwrap_err();
        assert!(matches!(err, Error::BadMagic { .. }));
    }

    #[test]
    fn truncated_header() {
        let err = decode_module(b"\0as").unwrap_err();
        assert!(matches!(err, Error::Truncated { offset: 0, wanted: 4 }));
    }

    #[test]
    fn unknown_version_is_tolerated() {
        assert!(decode_module(b"\0asm\x02\0\0\0").is_ok());
    }

    #[test]
    fn unknown_section_id() {
        let mut bytes = header();
        bytes.extend(section(0x20, &[]));
        let err = decode_module(&bytes).unwrap_err();
        assert!(matches!(
            err,
            Error::BadToken { what: "section id", found: 0x20, .. }
        ));
    }

    #[test]
    fn custom_section_is_skipped() {
        let mut bytes = header();
        bytes.extend(section(0, &[0x04, b'n', b'a', b'm', b'e', 0xde, 0xad]));
        let module = decode_module(&bytes).unwrap();
        assert!(module.types.is_empty());
    }

    #[test]
    fn section_size_mismatch() {
        let mut bytes = header();
        // A type section declaring 5 bytes whose single () -> () type only
        // consumes 4; the pad byte keeps the buffer long enough.
        let body = [0x01, 0x60, 0x00, 0x00];
        let mut sec = vec![0x01, 0x05];
        sec.extend_from_slice(&body);
        sec.push(0x00);
        bytes.extend(sec);
        let err = decode_module(&bytes).unwrap_err();
        assert!(matches!(
            err,
            Error::SectionSizeMismatch { id: SectionId::Type, declared: 5, consumed: 4, .. }
        ));
    }

    #[test]
    fn add_function() {
        let mut bytes = header();
        bytes.extend(section(1, &binary_i32_type()));
        bytes.extend(section(3, &[0x01, 0x00]));
        let body = [0x20, 0x00, 0x20, 0x01, 0x6a, 0x0b];
        let mut code = vec![0x01];
        code.extend(code_entry(&[0x00], &body));
        bytes.extend(section(10, &code));

        let module = decode_module(&bytes).unwrap();
        assert_eq!(module.functions.len(), 1);
        let func = &module.functions[0];
        assert_eq!(func.name, "func0");
        assert!(!func.imported);
        assert_eq!(
            func.body.as_deref().unwrap(),
            &[
                Instr::LocalGet { local: 0 },
                Instr::LocalGet { local: 1 },
                Instr::Op { op: OpKind::Add, ty: ValType::I32, signed: false },
            ]
        );
    }

    #[test]
    fn imports_come_first_and_keep_their_symbol() {
        let mut bytes = header();
        bytes.extend(section(1, &binary_i32_type()));
        // import "env"."add" (func type 0)
        let import = [
            0x01, 0x03, b'e', b'n', b'v', 0x03, b'a', b'd', b'd', 0x00, 0x00,
        ];
        bytes.extend(section(2, &import));
        bytes.extend(section(3, &[0x01, 0x00]));
        let mut code = vec![0x01];
        code.extend(code_entry(&[0x00], &[0x0b]));
        bytes.extend(section(10, &code));

        let module = decode_module(&bytes).unwrap();
        assert_eq!(module.functions.len(), 2);
        assert_eq!(module.functions[0].name, "add");
        assert!(module.functions[0].imported);
        assert!(module.functions[0].body.is_none());
        assert_eq!(module.functions[1].name, "func1");
        assert!(module.functions[1].body.is_some());
        let imported = &module.imports["env"];
        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].field, "add");
        assert_eq!(imported[0].entity, EntityRef::Function(0));
    }

    #[test]
    fn export_sets_flag() {
        let mut bytes = header();
        bytes.extend(section(1, &binary_i32_type()));
        bytes.extend(section(3, &[0x01, 0x00]));
        // export "sum" (func 0)
        bytes.extend(section(7, &[0x01, 0x03, b's', b'u', b'm', 0x00, 0x00]));
        let mut code = vec![0x01];
        code.extend(code_entry(&[0x00], &[0x0b]));
        bytes.extend(section(10, &code));

        let module = decode_module(&bytes).unwrap();
        assert!(module.functions[0].exported);
    }

    #[test]
    fn export_of_missing_function_is_bad_index() {
        let mut bytes = header();
        bytes.extend(section(7, &[0x01, 0x01, b'f', 0x00, 0x05]));
        let err = decode_module(&bytes).unwrap_err();
        assert!(matches!(
            err,
            Error::BadIndex { kind: "function", index: 5, .. }
        ));
    }

    #[test]
    fn globals_with_initializers() {
        let mut bytes = header();
        // global i32 mut = 7; global i64 const = -2
        let body = [
            0x02, 0x7f, 0x01, 0x41, 0x07, 0x0b, 0x7e, 0x00, 0x42, 0x7e, 0x0b,
        ];
        bytes.extend(section(6, &body));
        let module = decode_module(&bytes).unwrap();
        assert_eq!(module.globals.len(), 2);
        assert_eq!(module.globals[0].name, "global0");
        assert!(module.globals[0].mutable);
        assert_eq!(module.globals[0].init, Some(InitExpr::Const(Value::I32(7))));
        assert!(!module.globals[1].mutable);
        assert_eq!(
            module.globals[1].init,
            Some(InitExpr::Const(Value::I64(-2)))
        );
    }

    #[test]
    fn bad_initializer_expression() {
        let mut bytes = header();
        // global i32 const initialized by `nop` (not a constant form)
        bytes.extend(section(6, &[0x01, 0x7f, 0x00, 0x01, 0x0b]));
        let err = decode_module(&bytes).unwrap_err();
        assert!(matches!(err, Error::BadInitExpr { .. }));
    }

    #[test]
    fn data_segment_attaches_to_memory() {
        let mut bytes = header();
        bytes.extend(section(5, &[0x01, 0x00, 0x01])); // memory min:1
        // data segment: memory 0, offset i32.const 4, bytes [0xde, 0xad]
        bytes.extend(section(11, &[0x01, 0x00, 0x41, 0x04, 0x0b, 0x02, 0xde, 0xad]));
        let module = decode_module(&bytes).unwrap();
        let memory = &module.memories[0];
        assert_eq!(memory.limits, Limits { min: 1, max: None });
        assert_eq!(memory.data.len(), 1);
        assert_eq!(memory.data[0].offset, InitExpr::Const(Value::I32(4)));
        assert_eq!(memory.data[0].bytes, vec![0xde, 0xad]);
    }

    #[test]
    fn element_segment_attaches_to_table() {
        let mut bytes = header();
        bytes.extend(section(1, &binary_i32_type()));
        bytes.extend(section(3, &[0x01, 0x00]));
        bytes.extend(section(4, &[0x01, 0x70, 0x00, 0x02])); // table min:2
        // element segment: table 0, offset i32.const 0, funcs [0]
        bytes.extend(section(9, &[0x01, 0x00, 0x41, 0x00, 0x0b, 0x01, 0x00]));
        let mut code = vec![0x01];
        code.extend(code_entry(&[0x00], &[0x0b]));
        bytes.extend(section(10, &code));

        let module = decode_module(&bytes).unwrap();
        let table = &module.tables[0];
        assert_eq!(table.elements.len(), 1);
        assert_eq!(table.elements[0].functions, vec![0]);
    }

    #[test]
    fn start_function_is_recorded() {
        let mut bytes = header();
        bytes.extend(section(1, &[0x01, 0x60, 0x00, 0x00]));
        bytes.extend(section(3, &[0x01, 0x00]));
        bytes.extend(section(8, &[0x00]));
        let mut code = vec![0x01];
        code.extend(code_entry(&[0x00], &[0x0b]));
        bytes.extend(section(10, &code));
        let module = decode_module(&bytes).unwrap();
        assert_eq!(module.start, Some(0));
    }

    #[test]
    fn locals_expand_run_length_groups() {
        let mut bytes = header();
        bytes.extend(section(1, &[0x01, 0x60, 0x00, 0x00]));
        bytes.extend(section(3, &[0x01, 0x00]));
        // locals: 2 x i32, 1 x f64
        let locals = [0x02, 0x02, 0x7f, 0x01, 0x7c];
        let mut code = vec![0x01];
        code.extend(code_entry(&locals, &[0x0b]));
        bytes.extend(section(10, &code));
        let module = decode_module(&bytes).unwrap();
        assert_eq!(
            module.functions[0].locals,
            vec![ValType::I32, ValType::I32, ValType::F64]
        );
    }

    #[test]
    fn code_body_size_mismatch() {
        let mut bytes = header();
        bytes.extend(section(1, &[0x01, 0x60, 0x00, 0x00]));
        bytes.extend(section(3, &[0x01, 0x00]));
        // Declared body size is 3 but the body is 2 bytes; pad the entry
        // so the section envelope itself stays consistent.
        bytes.extend(section(10, &[0x01, 0x03, 0x00, 0x0b, 0x00]));
        let err = decode_module(&bytes).unwrap_err();
        assert!(matches!(
            err,
            Error::FunctionSizeMismatch { declared: 3, consumed: 2, .. }
        ));
    }
}
