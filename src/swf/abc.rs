//! Parser for the ABC bytecode block carried by a `DoABC` tag
//!
//! The layout is: version, constant pool, method signatures, metadata,
//! instance and class definitions, scripts, method bodies. Only the parts
//! the interpreter needs are kept; everything else is read and dropped so
//! that offsets stay aligned.

use super::value::Value;
use super::{Result, SwfError};
use byteorder::{LittleEndian, ReadBytesExt};
use std::collections::HashMap;
use std::io::Cursor;

const MULTINAME_QNAME: usize = 0x07;
const MULTINAME_MULTINAME: usize = 0x09;

const TRAIT_SLOT: u8 = 0x00;
const TRAIT_METHOD: u8 = 0x01;
const TRAIT_GETTER: u8 = 0x02;
const TRAIT_SETTER: u8 = 0x03;
const TRAIT_CLASS: u8 = 0x04;
const TRAIT_FUNCTION: u8 = 0x05;
const TRAIT_CONST: u8 = 0x06;

const CONSTANT_INT: u8 = 0x03;
const CONSTANT_UINT: u8 = 0x04;

/// Number of trailing u30 operands for each supported multiname kind
fn multiname_operands(kind: usize) -> Option<usize> {
    match kind {
        0x07 | 0x0d | 0x09 | 0x0e => Some(2),
        0x0f | 0x10 | 0x1b | 0x1c => Some(1),
        0x11 | 0x12 => Some(0),
        _ => None,
    }
}

/// Byte reader shared by the parser and the interpreter loop
pub(crate) struct Reader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    pub(crate) fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    pub(crate) fn len(&self) -> usize {
        self.cursor.get_ref().len()
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.position() >= self.len()
    }

    fn eof(&self, what: &str) -> SwfError {
        SwfError::structural(self.position(), format!("unexpected end of data reading {}", what))
    }

    pub(crate) fn u8(&mut self) -> Result<u8> {
        match self.cursor.read_u8() {
            Ok(b) => Ok(b),
            Err(_) => Err(self.eof("byte")),
        }
    }

    pub(crate) fn bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let data: &'a [u8] = *self.cursor.get_ref();
        let start = self.position();
        let end = start
            .checked_add(count)
            .filter(|end| *end <= data.len())
            .ok_or_else(|| self.eof(&format!("{} bytes", count)))?;
        self.cursor.set_position(end as u64);
        Ok(&data[start..end])
    }

    /// Variable-length integer, 7 bits per byte, at most 5 bytes
    fn varint(&mut self) -> Result<u32> {
        let mut res: u64 = 0;
        let mut shift = 0;
        for _ in 0..5 {
            let b = self.u8()?;
            res |= u64::from(b & 0x7f) << shift;
            if b & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        Ok(res as u32)
    }

    pub(crate) fn u30(&mut self) -> Result<usize> {
        let start = self.position();
        let v = self.varint()?;
        if v & 0xf000_0000 != 0 {
            return Err(SwfError::structural(start, format!("u30 value {:#x} out of range", v)));
        }
        Ok(v as usize)
    }

    pub(crate) fn u32(&mut self) -> Result<u32> {
        self.varint()
    }

    pub(crate) fn s32(&mut self) -> Result<i32> {
        Ok(self.varint()? as i32)
    }

    pub(crate) fn s24(&mut self) -> Result<i32> {
        match self.cursor.read_i24::<LittleEndian>() {
            Ok(v) => Ok(v),
            Err(_) => Err(self.eof("s24")),
        }
    }

    pub(crate) fn string(&mut self) -> Result<String> {
        let len = self.u30()?;
        let start = self.position();
        let raw = self.bytes(len)?;
        String::from_utf8(raw.to_vec())
            .map_err(|_| SwfError::structural(start, "invalid UTF-8 in string constant"))
    }

    /// Move relative to the current position, staying inside the buffer
    pub(crate) fn jump(&mut self, offset: i64) -> Result<()> {
        let target = self.position() as i64 + offset;
        if target < 0 || target as usize > self.len() {
            return Err(SwfError::structural(
                self.position(),
                format!("jump by {} leaves the code block", offset),
            ));
        }
        self.cursor.set_position(target as u64);
        Ok(())
    }
}

/// An entry of the multiname table
#[derive(Debug, Clone, PartialEq)]
pub enum Multiname {
    Name(String),
    /// A runtime-qualified kind; the actual name comes off the operand stack
    Unresolved(usize),
}

impl Multiname {
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Multiname::Name(name) => Some(name),
            Multiname::Unresolved(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MethodBody {
    pub method: usize,
    pub local_count: usize,
    pub code: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct AbcClass {
    pub name: String,
    /// Member name to method-table index
    pub methods: HashMap<String, usize>,
    pub constants: HashMap<String, Value>,
    /// Static initializer method index
    pub cinit: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct AbcFile {
    pub ints: Vec<i32>,
    pub uints: Vec<u32>,
    pub strings: Vec<String>,
    pub multinames: Vec<Multiname>,
    pub method_count: usize,
    pub classes: Vec<AbcClass>,
    pub bodies: Vec<MethodBody>,
}

#[derive(Default)]
struct Traits {
    methods: Vec<(String, usize)>,
    constants: Vec<(String, Value)>,
}

impl Traits {
    fn apply(self, class: &mut AbcClass) {
        class.methods.extend(self.methods);
        class.constants.extend(self.constants);
    }
}

struct Parser<'a> {
    r: Reader<'a>,
    abc: AbcFile,
}

impl AbcFile {
    /// Parse a complete ABC block; trailing bytes are an error
    pub fn parse(data: &[u8]) -> Result<AbcFile> {
        let mut parser = Parser {
            r: Reader::new(data),
            abc: AbcFile::default(),
        };
        parser.parse()?;
        if !parser.r.is_at_end() {
            return Err(SwfError::structural(
                parser.r.position(),
                format!(
                    "{} trailing bytes after the last method body",
                    parser.r.len() - parser.r.position()
                ),
            ));
        }
        Ok(parser.abc)
    }

    pub fn multiname(&self, idx: usize) -> Option<&Multiname> {
        self.multinames.get(idx)
    }

    pub fn class_index(&self, name: &str) -> Option<usize> {
        self.classes.iter().position(|c| c.name == name)
    }
}

impl<'a> Parser<'a> {
    fn parse(&mut self) -> Result<()> {
        // minor and major version
        self.r.bytes(4)?;
        self.constant_pool()?;
        self.method_infos()?;
        self.metadata()?;
        self.classes()?;
        self.scripts()?;
        self.method_bodies()
    }

    fn counted(&mut self) -> Result<usize> {
        // pool counts include the implicit entry 0
        Ok(self.r.u30()?.saturating_sub(1))
    }

    fn constant_pool(&mut self) -> Result<()> {
        let n = self.counted()?;
        self.abc.ints.push(0);
        for _ in 0..n {
            let v = self.r.s32()?;
            self.abc.ints.push(v);
        }

        let n = self.counted()?;
        self.abc.uints.push(0);
        for _ in 0..n {
            let v = self.r.u32()?;
            self.abc.uints.push(v);
        }

        let n = self.counted()?;
        self.r.bytes(n * 8)?;

        let n = self.counted()?;
        self.abc.strings.push(String::new());
        for _ in 0..n {
            let s = self.r.string()?;
            self.abc.strings.push(s);
        }

        // namespaces: kind byte and name
        let n = self.counted()?;
        for _ in 0..n {
            self.r.u8()?;
            self.r.u30()?;
        }

        let n = self.counted()?;
        for _ in 0..n {
            let count = self.r.u30()?;
            for _ in 0..count {
                self.r.u30()?;
            }
        }

        let n = self.counted()?;
        self.abc.multinames.push(Multiname::Name(String::new()));
        for _ in 0..n {
            let start = self.r.position();
            let kind = self.r.u30()?;
            let operands = multiname_operands(kind).ok_or_else(|| {
                SwfError::structural(start, format!("Invalid multiname kind {:#x}", kind))
            })?;
            let entry = match kind {
                MULTINAME_QNAME => {
                    self.r.u30()?;
                    let pos = self.r.position();
                    let idx = self.r.u30()?;
                    Multiname::Name(self.string_at(pos, idx)?)
                }
                MULTINAME_MULTINAME => {
                    let pos = self.r.position();
                    let idx = self.r.u30()?;
                    self.r.u30()?;
                    Multiname::Name(self.string_at(pos, idx)?)
                }
                _ => {
                    for _ in 0..operands {
                        self.r.u30()?;
                    }
                    Multiname::Unresolved(kind)
                }
            };
            self.abc.multinames.push(entry);
        }
        Ok(())
    }

    fn string_at(&self, offset: usize, idx: usize) -> Result<String> {
        self.abc
            .strings
            .get(idx)
            .cloned()
            .ok_or_else(|| SwfError::structural(offset, format!("string index {} out of range", idx)))
    }

    fn method_infos(&mut self) -> Result<()> {
        let count = self.r.u30()?;
        for _ in 0..count {
            let param_count = self.r.u30()?;
            // return type, parameter types, name
            self.r.u30()?;
            for _ in 0..param_count {
                self.r.u30()?;
            }
            self.r.u30()?;
            let flags = self.r.u8()?;
            if flags & 0x08 != 0 {
                let options = self.r.u30()?;
                for _ in 0..options {
                    self.r.u30()?;
                    self.r.u8()?;
                }
            }
            if flags & 0x80 != 0 {
                for _ in 0..param_count {
                    self.r.u30()?;
                }
            }
        }
        self.abc.method_count = count;
        Ok(())
    }

    fn metadata(&mut self) -> Result<()> {
        let count = self.r.u30()?;
        for _ in 0..count {
            self.r.u30()?;
            let items = self.r.u30()?;
            for _ in 0..items * 2 {
                self.r.u30()?;
            }
        }
        Ok(())
    }

    fn trait_name(&self, offset: usize, idx: usize) -> Result<Option<String>> {
        match self.abc.multiname(idx) {
            Some(m) => Ok(m.as_name().map(str::to_string)),
            None => Err(SwfError::structural(
                offset,
                format!("multiname index {} out of range", idx),
            )),
        }
    }

    fn traits(&mut self) -> Result<Traits> {
        let mut traits = Traits::default();
        let count = self.r.u30()?;
        for _ in 0..count {
            let start = self.r.position();
            let name_idx = self.r.u30()?;
            let name = self.trait_name(start, name_idx)?;
            let kind_full = self.r.u8()?;
            let kind = kind_full & 0x0f;
            let attrs = kind_full >> 4;
            match kind {
                TRAIT_SLOT => {
                    self.r.u30()?;
                    self.r.u30()?;
                    if self.r.u30()? != 0 {
                        self.r.u8()?;
                    }
                }
                TRAIT_CONST => {
                    self.r.u30()?;
                    self.r.u30()?;
                    let vindex = self.r.u30()?;
                    if vindex != 0 {
                        let vkind = self.r.u8()?;
                        let value = match vkind {
                            CONSTANT_INT => self.abc.ints.get(vindex).map(|v| Value::Int(i64::from(*v))),
                            CONSTANT_UINT => self.abc.uints.get(vindex).map(|v| Value::Int(i64::from(*v))),
                            _ => None,
                        };
                        if let (Some(name), Some(value)) = (name.clone(), value) {
                            traits.constants.push((name, value));
                        }
                    }
                }
                TRAIT_METHOD | TRAIT_GETTER | TRAIT_SETTER | TRAIT_FUNCTION => {
                    // disp_id or slot_id, then the method index
                    self.r.u30()?;
                    let method = self.r.u30()?;
                    if let Some(name) = name {
                        traits.methods.push((name, method));
                    }
                }
                TRAIT_CLASS => {
                    self.r.u30()?;
                    self.r.u30()?;
                }
                other => {
                    return Err(SwfError::Unsupported(format!(
                        "Unsupported trait kind {} at offset {}",
                        other, start
                    )))
                }
            }
            if attrs & 0x4 != 0 {
                let n = self.r.u30()?;
                for _ in 0..n {
                    self.r.u30()?;
                }
            }
        }
        Ok(traits)
    }

    fn classes(&mut self) -> Result<()> {
        let count = self.r.u30()?;
        let mut classes = Vec::with_capacity(count);
        for _ in 0..count {
            let start = self.r.position();
            let name_idx = self.r.u30()?;
            let name = match self.abc.multiname(name_idx) {
                Some(Multiname::Name(name)) => name.clone(),
                Some(Multiname::Unresolved(kind)) => format!("[multiname kind {:#x}]", kind),
                None => {
                    return Err(SwfError::structural(
                        start,
                        format!("class name index {} out of range", name_idx),
                    ))
                }
            };
            let mut class = AbcClass {
                name,
                ..AbcClass::default()
            };
            // super name, flags, optional protected namespace, interfaces, iinit
            self.r.u30()?;
            let flags = self.r.u8()?;
            if flags & 0x08 != 0 {
                self.r.u30()?;
            }
            let interfaces = self.r.u30()?;
            for _ in 0..interfaces {
                self.r.u30()?;
            }
            self.r.u30()?;
            self.traits()?.apply(&mut class);
            classes.push(class);
        }

        for class in classes.iter_mut() {
            class.cinit = Some(self.r.u30()?);
            self.traits()?.apply(class);
        }
        self.abc.classes = classes;
        Ok(())
    }

    fn scripts(&mut self) -> Result<()> {
        let count = self.r.u30()?;
        for _ in 0..count {
            self.r.u30()?;
            self.traits()?;
        }
        Ok(())
    }

    fn method_bodies(&mut self) -> Result<()> {
        let count = self.r.u30()?;
        for _ in 0..count {
            let method = self.r.u30()?;
            // max_stack
            self.r.u30()?;
            let local_count = self.r.u30()?;
            // init and max scope depth
            self.r.u30()?;
            self.r.u30()?;
            let code_len = self.r.u30()?;
            let code = self.r.bytes(code_len)?.to_vec();
            let exceptions = self.r.u30()?;
            for _ in 0..exceptions * 5 {
                self.r.u30()?;
            }
            self.traits()?;
            self.abc.bodies.push(MethodBody {
                method,
                local_count,
                code,
            });
        }
        Ok(())
    }
}
