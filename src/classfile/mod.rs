//! Classfile container parsing.
//!
//! Decodes the `CAFEBABE` layout: constant pool, access flags, fields,
//! methods, and attributes, restricted to the subset the decompiler
//! accepts (no interfaces, method attributes limited to `Code` and
//! `LineNumberTable`, class attributes limited to
//! `RuntimeInvisibleAnnotations`, `SourceFile`, `BootstrapMethods` and
//! `InnerClasses`).
//!
//! Parsing runs in one of two modes: a partial parse stops after the class
//! attributes and is used during project discovery to find the
//! `@Board`-annotated class; a full parse also decompiles every method
//! body.

pub mod bytes;
pub mod pool;

use bitflags::bitflags;

use crate::decompile::{Decompiler, Instruction};
use crate::descriptor::{self, TypeFlags};
use crate::error::{Error, Result};
use crate::resources::ResourceRegistry;
use bytes::ByteReader;
pub use pool::{Constant, ConstantPool};

const MAGIC: u32 = 0xCAFEBABE;

const CONSTRUCTOR: &str = "<init>";
const STATIC_INIT: &str = "<clinit>";

bitflags! {
    /// Class, field and method access flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SUPER = 0x0020;
        const SYNTHETIC = 0x1000;
        const ENUM = 0x4000;
    }
}

/// A class field. `init` is filled in by the `<clinit>` pass when the
/// static initializer stores into it.
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub cpp_type: String,
    pub is_array: bool,
    pub flags: AccessFlags,
    pub init: Option<String>,
}

/// A decompiled method: its instruction list is already rendered C++.
#[derive(Debug, Clone)]
pub struct Method {
    pub name: String,
    pub descriptor: String,
    pub flags: AccessFlags,
    pub instructions: Vec<Instruction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// Metadata only; method bodies are not decompiled.
    Partial,
    Full,
}

/// One parsed (and, in full mode, decompiled) class.
#[derive(Debug, Clone)]
pub struct ClassFile {
    /// Class name; also the stem of the emitted files.
    pub name: String,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    /// The `@Board(Type.X)` constant, when the class carries the annotation.
    pub board: Option<String>,
}

struct AttributeInfo {
    name_index: u16,
    info: Vec<u8>,
}

struct MethodData {
    name: String,
    descriptor: String,
    flags: AccessFlags,
    code: Vec<u8>,
}

impl ClassFile {
    pub fn has_board(&self) -> bool {
        self.board.is_some()
    }

    /// Parses one classfile. `project_name` is the board class's name;
    /// static references into it stay unqualified. The resource registry
    /// collects image constructor calls seen during decompilation.
    pub fn parse(
        bytes: &[u8],
        name: &str,
        project_name: &str,
        mode: ParseMode,
        resources: &mut ResourceRegistry,
    ) -> Result<ClassFile> {
        let mut r = ByteReader::new(bytes);

        if r.u32()? != MAGIC {
            return Err(Error::BadMagic);
        }
        let _minor = r.u16()?;
        let _major = r.u16()?;

        let pool = ConstantPool::parse(&mut r)?;

        let _access_flags = r.u16()?;
        let _this_class = r.u16()?;
        let _super_class = r.u16()?;
        let interfaces_count = r.u16()?;
        if interfaces_count != 0 {
            return Err(Error::HasInterfaces);
        }

        let mut fields = parse_fields(&mut r, &pool)?;
        let methods_data = parse_method_metadata(&mut r, &pool)?;

        let mut board = None;
        let mut templates = Vec::new();
        let attributes_count = r.u16()?;
        for _ in 0..attributes_count {
            let attr = read_attribute(&mut r)?;
            let attr_name = pool.utf8(attr.name_index)?;
            match attr_name {
                "RuntimeInvisibleAnnotations" => {
                    if let Some(found) = parse_board_annotation(&attr.info, &pool)? {
                        board = Some(found);
                    }
                }
                "SourceFile" | "InnerClasses" => {}
                "BootstrapMethods" => templates = parse_bootstrap_methods(&attr.info, &pool)?,
                other => {
                    return Err(Error::UnhandledAttribute {
                        kind: "class",
                        name: other.to_string(),
                    })
                }
            }
        }

        let mut methods = Vec::new();
        if mode == ParseMode::Full {
            let has_board = board.is_some();
            for data in methods_data {
                let (code, lines) = parse_code_attribute(&data.code, &pool)?;

                if data.name == STATIC_INIT {
                    // its stores become field initializers, never a function
                    Decompiler::new(
                        &pool,
                        &templates,
                        project_name,
                        has_board,
                        STATIC_INIT,
                        &code,
                        &lines,
                        &mut fields,
                        resources,
                    )
                    .run()?;
                    continue;
                }
                if has_board && data.name == CONSTRUCTOR {
                    continue;
                }

                let instructions = Decompiler::new(
                    &pool,
                    &templates,
                    project_name,
                    has_board,
                    &data.name,
                    &code,
                    &lines,
                    &mut fields,
                    resources,
                )
                .run()?;

                methods.push(Method {
                    name: data.name,
                    descriptor: data.descriptor,
                    flags: data.flags,
                    instructions,
                });
            }
        }

        Ok(ClassFile {
            name: name.to_string(),
            fields,
            methods,
            board,
        })
    }
}

fn read_attribute(r: &mut ByteReader) -> Result<AttributeInfo> {
    let name_index = r.u16()?;
    let length = r.u32()?;
    let info = r.take(length as usize)?.to_vec();
    Ok(AttributeInfo { name_index, info })
}

fn parse_fields(r: &mut ByteReader, pool: &ConstantPool) -> Result<Vec<Field>> {
    let count = r.u16()?;
    let mut fields = Vec::with_capacity(count as usize);

    for _ in 0..count {
        let access_flags = AccessFlags::from_bits_truncate(r.u16()?);
        let name_index = r.u16()?;
        let descriptor_index = r.u16()?;
        let attributes_count = r.u16()?;

        let mut type_flags = TypeFlags::empty();
        if access_flags.contains(AccessFlags::FINAL) {
            type_flags |= TypeFlags::CONST;
        }

        for _ in 0..attributes_count {
            let attr = read_attribute(r)?;
            if pool.utf8(attr.name_index)? == "RuntimeInvisibleAnnotations" {
                if field_is_unsigned(&attr.info, pool)? {
                    type_flags |= TypeFlags::UNSIGNED;
                }
            }
        }

        let name = pool.utf8(name_index)?.to_string();
        let descriptor = pool.utf8(descriptor_index)?;

        fields.push(Field {
            name,
            cpp_type: descriptor::cpp_type(descriptor, type_flags)?,
            is_array: descriptor.starts_with('['),
            flags: access_flags,
            init: None,
        });
    }

    Ok(fields)
}

fn parse_method_metadata(r: &mut ByteReader, pool: &ConstantPool) -> Result<Vec<MethodData>> {
    let count = r.u16()?;
    let mut methods = Vec::new();

    for _ in 0..count {
        let flags = AccessFlags::from_bits_truncate(r.u16()?);
        let name_index = r.u16()?;
        let descriptor_index = r.u16()?;
        let attributes_count = r.u16()?;

        let name = pool.utf8(name_index)?.to_string();
        let descriptor = pool.utf8(descriptor_index)?.to_string();

        for _ in 0..attributes_count {
            let attr = read_attribute(r)?;
            match pool.utf8(attr.name_index)? {
                "Code" => methods.push(MethodData {
                    name: name.clone(),
                    descriptor: descriptor.clone(),
                    flags,
                    code: attr.info,
                }),
                "LineNumberTable" => {}
                other => {
                    return Err(Error::UnhandledAttribute {
                        kind: "method",
                        name: other.to_string(),
                    })
                }
            }
        }
    }

    Ok(methods)
}

/// Unpacks a `Code` attribute into the code array and the line-number
/// table. The exception table is read and discarded.
fn parse_code_attribute(info: &[u8], pool: &ConstantPool) -> Result<(Vec<u8>, Vec<(u16, u16)>)> {
    let mut r = ByteReader::new(info);

    let _max_stack = r.u16()?;
    let _max_locals = r.u16()?;
    let code_length = r.u32()?;
    let code = r.take(code_length as usize)?.to_vec();

    let exception_table_length = r.u16()?;
    r.take(exception_table_length as usize * 8)?;

    let mut lines = Vec::new();
    let attributes_count = r.u16()?;
    for _ in 0..attributes_count {
        let attr = read_attribute(&mut r)?;
        match pool.utf8(attr.name_index)? {
            "LineNumberTable" => {
                let mut table = ByteReader::new(&attr.info);
                let length = table.u16()?;
                for _ in 0..length {
                    let start_pc = table.u16()?;
                    let line_number = table.u16()?;
                    lines.push((start_pc, line_number));
                }
            }
            "StackMapTable" => {}
            other => {
                return Err(Error::UnhandledAttribute {
                    kind: "method",
                    name: other.to_string(),
                })
            }
        }
    }

    Ok((code, lines))
}

fn field_is_unsigned(info: &[u8], pool: &ConstantPool) -> Result<bool> {
    let mut r = ByteReader::new(info);
    let mut unsigned = false;

    let num_annotations = r.u16()?;
    for _ in 0..num_annotations {
        let type_index = r.u16()?;
        let num_pairs = r.u16()?;
        if pool.utf8(type_index)? == "Ltypes/unsigned;" {
            unsigned = true;
        }
        for _ in 0..num_pairs {
            let _name_index = r.u16()?;
            skip_element_value(&mut r)?;
        }
    }

    Ok(unsigned)
}

/// Extracts `@Board(Type.X)` from a class-level
/// `RuntimeInvisibleAnnotations` attribute.
fn parse_board_annotation(info: &[u8], pool: &ConstantPool) -> Result<Option<String>> {
    let mut r = ByteReader::new(info);
    let mut board = None;

    let num_annotations = r.u16()?;
    for _ in 0..num_annotations {
        let type_index = r.u16()?;
        let type_name = pool.utf8(type_index)?.to_string();
        let num_pairs = r.u16()?;

        for _ in 0..num_pairs {
            let name_index = r.u16()?;
            let element_name = pool.utf8(name_index)?;

            if type_name == "Lboard/Board;" && element_name == "value" {
                let tag = r.u8()?;
                if tag != b'e' {
                    return Err(Error::BadBoardAnnotation);
                }
                let enum_type_index = r.u16()?;
                let enum_type = pool.utf8(enum_type_index)?;
                let const_index = r.u16()?;
                let const_name = pool.utf8(const_index)?;

                if enum_type != "Lboard/Type;" {
                    return Err(Error::BadBoardAnnotation);
                }
                board = Some(const_name.to_string());
            } else {
                skip_element_value(&mut r)?;
            }
        }
    }

    Ok(board)
}

/// Skips one `element_value` of an annotation.
fn skip_element_value(r: &mut ByteReader) -> Result<()> {
    let tag = r.u8()?;
    match tag {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' | b'c' => {
            r.u16()?;
        }
        b'e' => {
            r.u16()?;
            r.u16()?;
        }
        b'[' => {
            let count = r.u16()?;
            for _ in 0..count {
                skip_element_value(r)?;
            }
        }
        _ => return Err(Error::BadBoardAnnotation),
    }
    Ok(())
}

/// Resolves the `BootstrapMethods` table into per-entry templates: the
/// concatenation recipe of `makeConcatWithConstants`, or the rendered
/// target method reference of `metafactory`.
fn parse_bootstrap_methods(info: &[u8], pool: &ConstantPool) -> Result<Vec<String>> {
    let mut r = ByteReader::new(info);
    let mut templates = Vec::new();

    let num_methods = r.u16()?;
    for _ in 0..num_methods {
        let method_ref = r.u16()?;
        let (_kind, reference) = pool.method_handle(method_ref)?;
        let (_class, method_name, _descriptor) = pool.method_ref(reference)?;
        let method_name = method_name.to_string();

        let mut args = Vec::new();
        let num_arguments = r.u16()?;
        for index in 0..num_arguments {
            let argument = r.u16()?;
            match pool.get(argument)? {
                Constant::MethodHandle { kind, reference } => {
                    if *kind != pool::REF_INVOKE_STATIC {
                        return Err(Error::BadBootstrapHandle);
                    }
                    let (class, name, descriptor) = pool.method_ref(*reference)?;

                    // gpio IRQ handlers need their C callback type restored
                    let caster = if descriptor == "(II)V" {
                        "(gpio_irq_callback_t)"
                    } else {
                        ""
                    };
                    let full = descriptor::cpp_path(&format!("{class}::{name}"));
                    args.push(format!("{caster}{full}"));
                }
                Constant::Str { utf8 } => args.push(pool.utf8(*utf8)?.to_string()),
                Constant::MethodType { .. } => args.push(String::new()),
                _ => {
                    return Err(Error::BadBootstrapArgument {
                        method: method_name.clone(),
                        index,
                    })
                }
            }
        }

        let template = match method_name.as_str() {
            "makeConcatWithConstants" => args.first(),
            "metafactory" => args.get(1),
            other => return Err(Error::UnhandledBootstrapMethod(other.to_string())),
        };
        templates.push(
            template
                .cloned()
                .ok_or(Error::BadBootstrapArgument {
                    method: method_name.clone(),
                    index: 0,
                })?,
        );
    }

    Ok(templates)
}
