//! The symbolic interpreter: walks the bytecode of one per-line chunk,
//! maintaining the operand stack, and lowers each opcode into at most one
//! [`Operation`].

use crate::classfile::bytes::ByteReader;
use crate::decompile::op::{ArrayShape, CondOp, Operation, StoreOp};
use crate::decompile::opcode::*;
use crate::decompile::value::{ArrayValue, ObjectValue, Value};
use crate::decompile::{Decompiler, LocalType, OBJ_INSTANCE};
use crate::descriptor;
use crate::error::{Error, Result};
use crate::resources::{encode_filename, ImageFormat};
use crate::classfile::pool::Constant;

impl Decompiler<'_> {
    /// Executes one chunk, appending operations for the statement
    /// synthesizer. `start_pc` is the bytecode offset of the chunk's first
    /// byte; `line` is the source line the chunk belongs to.
    pub(crate) fn exec_chunk(
        &mut self,
        chunk: &[u8],
        start_pc: u32,
        line: u32,
    ) -> Result<Vec<Operation>> {
        let mut r = ByteReader::new(chunk);
        let mut ops = Vec::new();

        while !r.is_empty() {
            let pc = start_pc + r.pos() as u32;
            let opcode = r.u8()?;

            match opcode {
                ACONST_NULL => self.push(Value::expr("null")),
                ICONST_M1..=ICONST_5 => {
                    self.push(Value::Int(opcode as i32 - ICONST_0 as i32));
                }
                FCONST_0..=FCONST_2 => {
                    self.push(Value::Float((opcode - FCONST_0) as f32));
                }
                BIPUSH => {
                    let value = r.i8()?;
                    self.push(Value::Int(value as i32));
                }
                SIPUSH => {
                    let value = r.i16()?;
                    self.push(Value::Int(value as i32));
                }
                LDC | LDC_W | LDC2_W => {
                    let index = if opcode == LDC {
                        r.u8()? as u16
                    } else {
                        r.u16()?
                    };
                    self.load_constant(index)?;
                }

                ILOAD | LLOAD | FLOAD | DLOAD | ALOAD => {
                    let slot = r.u8()?;
                    self.push(Value::expr(format!("local_{slot}")));
                }
                ILOAD_0..=ILOAD_3 => {
                    self.push(Value::expr(format!("local_{}", opcode - ILOAD_0)));
                }
                LLOAD_0..=LLOAD_3 => {
                    self.push(Value::expr(format!("local_{}", opcode - LLOAD_0)));
                }
                FLOAD_0..=FLOAD_3 => {
                    self.push(Value::expr(format!("local_{}", opcode - FLOAD_0)));
                }
                DLOAD_0..=DLOAD_3 => {
                    self.push(Value::expr(format!("local_{}", opcode - DLOAD_0)));
                }
                ALOAD_0..=ALOAD_3 => {
                    self.push(Value::expr(format!("local_{}", opcode - ALOAD_0)));
                }

                IALOAD..=SALOAD => {
                    let index = self.pop(line)?;
                    let array = self.pop(line)?;
                    self.push(Value::expr(format!(
                        "{}[{}]",
                        array.render(),
                        index.render()
                    )));
                }

                ISTORE | ISTORE_0..=ISTORE_3 => {
                    let slot = numbered_slot(opcode, ISTORE, ISTORE_0, &mut r)?;
                    self.primitive_store(slot, LocalType::Int, line, &mut ops)?;
                }
                LSTORE | LSTORE_0..=LSTORE_3 => {
                    let slot = numbered_slot(opcode, LSTORE, LSTORE_0, &mut r)?;
                    self.primitive_store(slot, LocalType::Long, line, &mut ops)?;
                }
                FSTORE | FSTORE_0..=FSTORE_3 => {
                    let slot = numbered_slot(opcode, FSTORE, FSTORE_0, &mut r)?;
                    self.primitive_store(slot, LocalType::Float, line, &mut ops)?;
                }
                DSTORE | DSTORE_0..=DSTORE_3 => {
                    let slot = numbered_slot(opcode, DSTORE, DSTORE_0, &mut r)?;
                    self.primitive_store(slot, LocalType::Double, line, &mut ops)?;
                }
                ASTORE | ASTORE_0..=ASTORE_3 => {
                    let slot = numbered_slot(opcode, ASTORE, ASTORE_0, &mut r)?;
                    self.reference_store(slot, line, &mut ops)?;
                }

                IASTORE..=SASTORE => self.array_store(line, &mut ops)?,

                DUP => {
                    let top = self
                        .stack
                        .last()
                        .cloned()
                        .ok_or(Error::StackUnderflow(line))?;
                    self.push(top);
                }

                IADD => self.binary("+", line)?,
                ISUB => self.binary("-", line)?,
                IMUL | LMUL | FMUL | DMUL => self.binary("*", line)?,
                IDIV => self.binary("/", line)?,
                IREM => self.binary("%", line)?,
                IAND => self.binary("&", line)?,
                ISHL => self.binary("<<", line)?,
                INEG => {
                    let value = self.pop(line)?;
                    self.push(Value::expr(format!("-{}", value.render())));
                }

                I2F | L2F => {
                    let value = self.pop(line)?;
                    self.push(Value::expr(format!(
                        "static_cast<float>({})",
                        value.render()
                    )));
                }
                I2D | F2D => {
                    let value = self.pop(line)?;
                    self.push(Value::expr(format!(
                        "static_cast<double>({})",
                        value.render()
                    )));
                }

                IINC => {
                    let slot = r.u8()? as u16;
                    let constant = r.i8()? as i32;
                    ops.push(Operation::Inc { slot, constant });
                }

                IFEQ..=IFLE => {
                    let offset = r.i16()? as i32;
                    let target = offset_target(pc, offset)?;
                    let value = self.pop(line)?;
                    let op = inverted_if_op(opcode);
                    ops.push(Operation::Cond(CondOp {
                        left: value.render(),
                        op,
                        right: "0".to_string(),
                        target,
                    }));
                    self.note_skipped_goto(target);
                }
                IF_ICMPEQ..=IF_ACMPNE => {
                    let offset = r.i16()? as i32;
                    let target = offset_target(pc, offset)?;
                    let right = self.pop(line)?;
                    let left = self.pop(line)?;
                    let op = inverted_icmp_op(opcode);
                    ops.push(Operation::Cond(CondOp {
                        left: left.render(),
                        op,
                        right: right.render(),
                        target,
                    }));
                    self.note_skipped_goto(target);
                }
                GOTO => {
                    let offset = r.i16()? as i32;
                    let target = offset_target(pc, offset)?;
                    // elided when a preceding branch consumed it as its
                    // loop back-edge
                    if !self.skipped_gotos.contains(&pc) {
                        ops.push(Operation::Jump { target });
                    }
                }

                RETURN => {
                    let value = (self.method_name == "main").then(|| "0".to_string());
                    ops.push(Operation::Return { value });
                }
                IRETURN..=ARETURN => {
                    let value = self.pop(line)?;
                    ops.push(Operation::Return {
                        value: Some(value.render()),
                    });
                }

                GETSTATIC => {
                    let index = r.u16()?;
                    let (class, name, _descriptor) = self.pool.field_ref(index)?;
                    let full = self.qualify(class, name);
                    self.push(Value::Expr(full));
                }
                PUTSTATIC => self.put_static(&mut r, line, &mut ops)?,
                GETFIELD => {
                    let index = r.u16()?;
                    let (_class, name, _descriptor) = self.pool.field_ref(index)?;
                    let object = self.pop(line)?;
                    let receiver = object.render();
                    if !self.has_board && receiver == OBJ_INSTANCE {
                        self.push(Value::expr(name));
                    } else {
                        self.push(Value::expr(format!("{receiver}.{name}")));
                    }
                }
                PUTFIELD => {
                    let index = r.u16()?;
                    let (_class, name, _descriptor) = self.pool.field_ref(index)?;
                    let name = name.to_string();
                    let value = self.pop(line)?;
                    let object = self.pop(line)?;
                    let receiver = object.render();
                    let code = if !self.has_board && receiver == OBJ_INSTANCE {
                        format!("{name} = {};", value.render())
                    } else {
                        format!("{receiver}.{name} = {};", value.render())
                    };
                    ops.push(Operation::Call { code });
                }

                INVOKESTATIC => self.invoke_static(&mut r, line, &mut ops)?,
                INVOKEVIRTUAL => self.invoke_virtual(&mut r, line, &mut ops)?,
                INVOKESPECIAL => self.invoke_special(&mut r, line, &mut ops)?,
                INVOKEDYNAMIC => self.invoke_dynamic(&mut r, line)?,

                NEW => {
                    let index = r.u16()?;
                    let name = self.pool.class_name(index)?;
                    self.push(Value::Object(ObjectValue {
                        cpp_type: name.to_string(),
                        ctor: String::new(),
                    }));
                }
                NEWARRAY => {
                    let size = self.pop_array_size(line)?;
                    let code = r.u8()?;
                    let cpp_type = LocalType::from_primitive_code(code)?.cpp_name()?;
                    self.push(Value::Array(ArrayValue {
                        cpp_type: cpp_type.to_string(),
                        size,
                        position: pc,
                        populate: Vec::new(),
                    }));
                }
                ANEWARRAY => {
                    let size = self.pop_array_size(line)?;
                    let index = r.u16()?;
                    let name = self.pool.class_name(index)?;
                    let cpp_type = match name {
                        "java/lang/String" => "std::string",
                        "java/lang/Object" => "Object",
                        other => return Err(Error::BadArrayElement(other.to_string())),
                    };
                    self.push(Value::Array(ArrayValue {
                        cpp_type: cpp_type.to_string(),
                        size,
                        position: pc,
                        populate: Vec::new(),
                    }));
                }
                ARRAYLENGTH => {
                    let value = self.pop(line)?;
                    self.push(Value::expr(format!("{}.size()", value.render())));
                }

                other => return Err(Error::UnhandledOpcode(other)),
            }
        }

        Ok(ops)
    }

    fn load_constant(&mut self, index: u16) -> Result<()> {
        let value = match self.pool.get(index)? {
            Constant::Str { utf8 } => Value::Expr(format!("\"{}\"", self.pool.utf8(*utf8)?)),
            Constant::Integer(v) => Value::Int(*v),
            Constant::Float(v) => Value::Float(*v),
            Constant::Long(v) => Value::Long(*v),
            Constant::Double(v) => Value::Double(*v),
            _ => {
                return Err(Error::WrongConstant {
                    index,
                    expected: "int, long, float, double or string",
                })
            }
        };
        self.push(value);
        Ok(())
    }

    /// Store of an `istore`-family value: the slot is (re)declared when its
    /// type tag differs from the deepest scope's record.
    fn primitive_store(
        &mut self,
        slot: u16,
        this_type: LocalType,
        line: u32,
        ops: &mut Vec<Operation>,
    ) -> Result<()> {
        let value = self.pop(line)?;

        let mut store = StoreOp {
            slot,
            cpp_type: None,
            value: Some(value.render()),
            array: None,
        };
        if self.find_local(slot) != this_type {
            store.cpp_type = Some(this_type.cpp_name()?.to_string());
            self.set_local(slot, this_type);
        }

        ops.push(Operation::Store(store));
        Ok(())
    }

    /// `astore`-family: the stored value decides between a string local, an
    /// array-literal declaration, and an object construction.
    fn reference_store(&mut self, slot: u16, line: u32, ops: &mut Vec<Operation>) -> Result<()> {
        let value = self.pop(line)?;
        let local_type = self.find_local(slot);

        let store = match value {
            Value::Array(arr) => {
                let declared = local_type != LocalType::Array;
                if declared {
                    self.set_local(slot, LocalType::Array);
                }
                StoreOp {
                    slot,
                    cpp_type: declared.then(|| arr.cpp_type.clone()),
                    value: None,
                    array: Some(ArrayShape {
                        cpp_type: arr.cpp_type,
                        size: arr.size,
                        position: arr.position,
                        populate: arr.populate,
                    }),
                }
            }
            Value::Object(obj) => {
                let declared = local_type != LocalType::Object;
                if declared {
                    self.set_local(slot, LocalType::Object);
                }
                StoreOp {
                    slot,
                    cpp_type: declared.then(|| obj.cpp_type),
                    value: Some(obj.ctor),
                    array: None,
                }
            }
            other => {
                let declared = local_type != LocalType::Str;
                if declared {
                    self.set_local(slot, LocalType::Str);
                }
                StoreOp {
                    slot,
                    cpp_type: declared.then(|| "std::string".to_string()),
                    value: Some(other.render()),
                    array: None,
                }
            }
        };

        ops.push(Operation::Store(store));
        Ok(())
    }

    /// `iastore`-family: a stored-away array gets an indexed assignment; an
    /// array literal still on the stack collects the value into its
    /// initializer list instead.
    fn array_store(&mut self, line: u32, ops: &mut Vec<Operation>) -> Result<()> {
        let value = self.pop(line)?;
        let index = self.pop(line)?;
        let array = self.pop(line)?;

        match array {
            Value::Expr(array) => {
                ops.push(Operation::IndexedStore {
                    array,
                    index: index.render(),
                    value: value.render(),
                });
            }
            Value::Array(_) => match self.pop(line)? {
                Value::Array(mut original) => {
                    original.populate.push(value.render());
                    self.push(Value::Array(original));
                }
                _ => return Err(Error::UnsupportedShape(line)),
            },
            _ => return Err(Error::UnsupportedShape(line)),
        }

        Ok(())
    }

    fn binary(&mut self, op: &str, line: u32) -> Result<()> {
        let right = self.pop(line)?;
        let left = self.pop(line)?;
        self.push(Value::expr(format!(
            "({} {} {})",
            left.render(),
            op,
            right.render()
        )));
        Ok(())
    }

    fn put_static(
        &mut self,
        r: &mut ByteReader,
        line: u32,
        ops: &mut Vec<Operation>,
    ) -> Result<()> {
        let index = r.u16()?;
        let (class, name, _descriptor) = self.pool.field_ref(index)?;
        let full = self.qualify(class, name);
        let name = name.to_string();
        let value = self.pop(line)?;

        if self.method_name == "<clinit>" {
            for field in self.fields.iter_mut() {
                if field.name == name {
                    field.init = Some(match &value {
                        Value::Object(obj) => obj.ctor.clone(),
                        other => other.render(),
                    });
                }
            }
        } else {
            ops.push(Operation::Call {
                code: format!("{full} = {};", value.render()),
            });
        }

        Ok(())
    }

    fn invoke_static(
        &mut self,
        r: &mut ByteReader,
        line: u32,
        ops: &mut Vec<Operation>,
    ) -> Result<()> {
        let index = r.u16()?;
        let (class, name, descriptor) = self.pool.method_ref(index)?;

        if class == "java/lang/Integer" {
            if name == "valueOf" {
                // boxing is identity, leave the value on the stack
                return Ok(());
            }
            return Err(Error::UnhandledCall {
                class: class.to_string(),
                method: name.to_string(),
            });
        }

        let full = self.qualify(class, name);
        let descriptor = descriptor.to_string();

        let argc = descriptor::count_args(&descriptor)? as usize;
        let args = self.pop_args(argc, line)?;
        let call = format!("{}({})", full, render_args(&args));

        if descriptor::return_type(&descriptor)? != "void" {
            self.push(Value::Expr(call));
        } else {
            ops.push(Operation::Call {
                code: format!("{call};"),
            });
        }

        Ok(())
    }

    fn invoke_virtual(
        &mut self,
        r: &mut ByteReader,
        line: u32,
        ops: &mut Vec<Operation>,
    ) -> Result<()> {
        let index = r.u16()?;
        let (_class, name, descriptor) = self.pool.method_ref(index)?;
        let name = name.to_string();
        let descriptor = descriptor.to_string();

        let argc = descriptor::count_args(&descriptor)? as usize;
        let receiver_at = self
            .stack
            .len()
            .checked_sub(argc + 1)
            .ok_or(Error::StackUnderflow(line))?;
        let receiver = self.stack[receiver_at].render();

        let full = if self.has_board || receiver != OBJ_INSTANCE {
            descriptor::cpp_path(&format!("{receiver}.{name}"))
        } else {
            descriptor::cpp_path(&name)
        };

        let args = self.pop_args(argc, line)?;
        let args_string = if full == "gamebuino::gb::display.printf" && args.len() == 2 {
            // printf's vararg pack arrives as an array literal; splice it
            match &args[1] {
                Value::Array(pack) => {
                    let mut rendered = vec![args[0].render()];
                    rendered.extend(pack.populate.iter().cloned());
                    rendered.join(", ")
                }
                _ => render_args(&args),
            }
        } else {
            render_args(&args)
        };

        self.pop(line)?; // receiver

        let call = format!("{full}({args_string})");
        if descriptor::return_type(&descriptor)? != "void" {
            self.push(Value::Expr(call));
        } else {
            ops.push(Operation::Call {
                code: format!("{call};"),
            });
        }

        Ok(())
    }

    fn invoke_special(
        &mut self,
        r: &mut ByteReader,
        line: u32,
        ops: &mut Vec<Operation>,
    ) -> Result<()> {
        let index = r.u16()?;
        let (class, name, descriptor) = self.pool.method_ref(index)?;
        let class = class.to_string();
        let name = name.to_string();
        let descriptor = descriptor.to_string();

        let argc = descriptor::count_args(&descriptor)? as usize;
        let receiver_at = self
            .stack
            .len()
            .checked_sub(argc + 1)
            .ok_or(Error::StackUnderflow(line))?;
        let receiver = self.stack[receiver_at].render();

        if !self.has_board && receiver == OBJ_INSTANCE {
            // the implicit super-constructor call of the no-arg constructor
            self.pop(line)?;
            return Ok(());
        }

        if name != "<init>" {
            return Err(Error::NotAConstructor);
        }

        let full = descriptor::cpp_path(&receiver);
        let args = self.pop_args(argc, line)?;

        let args_string = if class == "gamebuino/Image" {
            self.image_constructor_args(&args, &descriptor, line)?
        } else {
            render_args(&args)
        };

        self.pop(line)?; // receiver

        let call = format!("{full}({args_string})");
        if receiver == class {
            // `new` left a second placeholder under the receiver
            self.pop(line)?;
            self.push(Value::Object(ObjectValue {
                cpp_type: descriptor::cpp_path(&class),
                ctor: call,
            }));
        } else if descriptor::return_type(&descriptor)? != "void" {
            self.push(Value::Expr(call));
        } else {
            ops.push(Operation::Call {
                code: format!("{call};"),
            });
        }

        Ok(())
    }

    /// An image constructor registers a project resource and is rewritten
    /// to take the encoded-filename identifier instead of its arguments.
    fn image_constructor_args(
        &mut self,
        args: &[Value],
        descriptor: &str,
        line: u32,
    ) -> Result<String> {
        if (2..=5).contains(&args.len()) {
            let filename = args[0].render().replace('"', "");
            let format = if args[1].render().ends_with("Rgb565") {
                ImageFormat::Rgb565
            } else {
                ImageFormat::Indexed
            };

            let mut yframes = 1;
            let mut xframes = 1;
            let mut loop_count = 0;
            if args.len() >= 3 {
                yframes = int_arg(&args[2], line)?;
            }
            if args.len() >= 4 {
                xframes = int_arg(&args[3], line)?;
            }
            if args.len() == 5 {
                loop_count = int_arg(&args[4], line)?;
            }

            self.resources
                .add(filename.clone(), format, yframes, xframes, loop_count);
            Ok(encode_filename(&filename))
        } else if descriptor == "([B)V" || descriptor == "([S)V" {
            Ok(args[0].render())
        } else {
            Err(Error::UnhandledCall {
                class: "gamebuino/Image".to_string(),
                method: "<init>".to_string(),
            })
        }
    }

    fn invoke_dynamic(&mut self, r: &mut ByteReader, line: u32) -> Result<()> {
        let index = r.u16()?;
        let zero = r.u16()?;
        if zero != 0 {
            return Err(Error::BadInvokeDynamicOperand(index));
        }

        let (bootstrap, _name_and_type) = self.pool.invoke_dynamic(index)?;
        let template = self
            .templates
            .get(bootstrap as usize)
            .ok_or(Error::MissingBootstrap(bootstrap))?
            .clone();

        if template.contains('\u{2}') {
            return Err(Error::ConstantTemplateMarker);
        }

        let spliced = if template.contains('\u{1}') {
            let mut out = String::from("\"");
            for c in template.chars() {
                if c == '\u{1}' {
                    let operand = self.pop(line)?;
                    out.push_str("\" + ");
                    out.push_str(&operand.render());
                    out.push_str(" + \"");
                } else {
                    out.push(c);
                }
            }
            out.push('"');

            let out = match out.strip_prefix("\"\" + ") {
                Some(trimmed) => trimmed.to_string(),
                None => out,
            };
            match out.strip_suffix(" + \"\"") {
                Some(trimmed) => trimmed.to_string(),
                None => out,
            }
        } else {
            template
        };

        self.push(Value::Expr(spliced));
        Ok(())
    }

    /// Static references into the board class stay unqualified (its members
    /// are emitted as free definitions); everything else is fully qualified
    /// with `/` turned into `::`.
    fn qualify(&self, class: &str, member: &str) -> String {
        if class == self.project_name {
            descriptor::cpp_path(member)
        } else {
            descriptor::cpp_path(&format!("{class}::{member}"))
        }
    }

    /// Marks a `goto` sitting immediately before a branch target as a loop
    /// back-edge candidate, so it is not re-emitted when its line is
    /// reached.
    fn note_skipped_goto(&mut self, target: u32) {
        if let Some(goto_pc) = target.checked_sub(3) {
            if self.code.get(goto_pc as usize) == Some(&GOTO) {
                self.skipped_gotos.insert(goto_pc);
            }
        }
    }

    fn pop_args(&mut self, argc: usize, line: u32) -> Result<Vec<Value>> {
        let at = self
            .stack
            .len()
            .checked_sub(argc)
            .ok_or(Error::StackUnderflow(line))?;
        Ok(self.stack.split_off(at))
    }

    fn pop_array_size(&mut self, line: u32) -> Result<usize> {
        match self.pop(line)? {
            Value::Int(size) if size >= 0 => Ok(size as usize),
            _ => Err(Error::ArraySize(line)),
        }
    }
}

fn numbered_slot(opcode: u8, wide: u8, zero: u8, r: &mut ByteReader) -> Result<u16> {
    if opcode == wide {
        Ok(r.u8()? as u16)
    } else {
        Ok((opcode - zero) as u16)
    }
}

fn offset_target(pc: u32, offset: i32) -> Result<u32> {
    u32::try_from(pc as i64 + offset as i64).map_err(|_| Error::JumpTargetNotFound)
}

fn int_arg(value: &Value, line: u32) -> Result<i32> {
    match value {
        Value::Int(v) => Ok(*v),
        _ => Err(Error::BadConstructorArgument(line)),
    }
}

fn render_args(args: &[Value]) -> String {
    args.iter()
        .map(Value::render)
        .collect::<Vec<_>>()
        .join(", ")
}

/// The comparison operator is inverted relative to the opcode: the branch
/// is taken when the source-level condition is false.
fn inverted_if_op(opcode: u8) -> &'static str {
    match opcode {
        IFEQ => "!=",
        IFNE => "==",
        IFLT => ">=",
        IFGE => "<",
        IFGT => "<=",
        _ => ">",
    }
}

fn inverted_icmp_op(opcode: u8) -> &'static str {
    match opcode {
        IF_ICMPEQ | IF_ACMPEQ => "!=",
        IF_ICMPNE | IF_ACMPNE => "==",
        IF_ICMPLT => ">=",
        IF_ICMPGE => "<",
        IF_ICMPGT => "<=",
        _ => ">",
    }
}
