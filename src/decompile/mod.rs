//! Bytecode-to-structured-source decompilation.
//!
//! A method's code array is partitioned into per-source-line chunks using
//! its `LineNumberTable`. Each chunk is walked by the symbolic interpreter
//! ([`interp`]), producing a short list of [`op::Operation`]s, which the
//! statement synthesizer ([`synth`]) pattern-matches into C++ statements
//! with correct brace placement.
//!
//! This is not a general decompiler: it relies on the canonical code shapes
//! `javac` emits and on the line table aligning bytecode chunks with source
//! statements. Unrecognized shapes are fatal rather than guessed at.

pub mod interp;
pub mod op;
pub mod opcode;
pub mod synth;
pub mod value;

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::classfile::{Field, ConstantPool};
use crate::error::{Error, Result};
use crate::resources::ResourceRegistry;
use value::Value;

/// One emitted C++ line: a statement, `{`, `}`, or empty (dropped by the
/// emitter). `line` is the Java source line it originated from.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub line: u32,
    pub text: String,
}

impl Instruction {
    pub(crate) fn new(line: u32, text: impl Into<String>) -> Self {
        Self {
            line,
            text: text.into(),
        }
    }
}

/// Type tag tracked per local slot, per lexical scope. Matches the
/// `newarray` primitive type codes where they overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LocalType {
    None,
    Str,
    Object,
    Array,
    Boolean,
    Char,
    Float,
    Double,
    Byte,
    Short,
    Int,
    Long,
}

impl LocalType {
    /// C++ spelling of a primitive slot type.
    pub(crate) fn cpp_name(self) -> Result<&'static str> {
        Ok(match self {
            LocalType::Boolean => "bool",
            LocalType::Char => "char",
            LocalType::Float => "float",
            LocalType::Double => "double",
            LocalType::Byte => "int8_t",
            LocalType::Short => "int16_t",
            LocalType::Int => "int32_t",
            LocalType::Long => "int64_t",
            _ => return Err(Error::BadPrimitiveType(0)),
        })
    }

    /// Maps a `newarray` type code.
    pub(crate) fn from_primitive_code(code: u8) -> Result<Self> {
        Ok(match code {
            4 => LocalType::Boolean,
            5 => LocalType::Char,
            6 => LocalType::Float,
            7 => LocalType::Double,
            8 => LocalType::Byte,
            9 => LocalType::Short,
            10 => LocalType::Int,
            11 => LocalType::Long,
            other => return Err(Error::BadPrimitiveType(other)),
        })
    }
}

/// Expression a method's `this` slot loads as.
pub(crate) const OBJ_INSTANCE: &str = "local_0";

/// Decompiles one method. Owns the symbolic operand stack, the local-slot
/// type scopes, and the pending brace/else bookkeeping; all of it dies with
/// the method.
pub(crate) struct Decompiler<'a> {
    pub(crate) pool: &'a ConstantPool,
    /// Bootstrap-method templates, indexed by bootstrap attribute index.
    pub(crate) templates: &'a [String],
    /// Name of the board-annotated class; its statics are free functions
    /// and stay unqualified.
    pub(crate) project_name: &'a str,
    pub(crate) has_board: bool,
    pub(crate) method_name: &'a str,
    /// The whole code array, for peeking at branch-target predecessors.
    pub(crate) code: &'a [u8],
    /// `(start_pc, line_number)` pairs from the `LineNumberTable`.
    pub(crate) lines: &'a [(u16, u16)],
    /// Class fields; `<clinit>` stores write their `init` values here.
    pub(crate) fields: &'a mut Vec<Field>,
    pub(crate) resources: &'a mut ResourceRegistry,

    pub(crate) stack: Vec<Value>,
    /// One map per open lexical scope.
    pub(crate) locals: Vec<HashMap<u16, LocalType>>,
    /// Lines processed so far.
    pub(crate) insts: Vec<Instruction>,
    /// Source lines owed one `}` each before they are processed.
    pub(crate) closing_brackets: Vec<u32>,
    /// Source lines owed an `else {` before they are processed.
    pub(crate) else_stmts: Vec<u32>,
    /// pcs of `goto`s consumed as loop back-edges; they must not re-emit.
    pub(crate) skipped_gotos: HashSet<u32>,
}

impl<'a> Decompiler<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        pool: &'a ConstantPool,
        templates: &'a [String],
        project_name: &'a str,
        has_board: bool,
        method_name: &'a str,
        code: &'a [u8],
        lines: &'a [(u16, u16)],
        fields: &'a mut Vec<Field>,
        resources: &'a mut ResourceRegistry,
    ) -> Self {
        Self {
            pool,
            templates,
            project_name,
            has_board,
            method_name,
            code,
            lines,
            fields,
            resources,
            stack: Vec::new(),
            locals: vec![HashMap::new()],
            insts: Vec::new(),
            closing_brackets: Vec::new(),
            else_stmts: Vec::new(),
            skipped_gotos: HashSet::new(),
        }
    }

    /// Runs the full decompilation and returns the method's instruction
    /// list in source order.
    pub(crate) fn run(mut self) -> Result<Vec<Instruction>> {
        for (line, chunk) in self.chunk_by_line()? {
            let line_insts = self.decode_line(&chunk, line)?;
            self.insts.extend(line_insts);
        }

        if !self.closing_brackets.is_empty() || !self.else_stmts.is_empty() {
            return Err(Error::MismatchedBrackets(self.method_name.to_string()));
        }
        if self.locals.len() != 1 {
            return Err(Error::MismatchedBrackets(self.method_name.to_string()));
        }
        if !self.stack.is_empty() {
            return Err(Error::StackNotEmpty(self.method_name.to_string()));
        }

        Ok(self.insts)
    }

    /// Splits the code array into per-line chunks. Chunks that share a line
    /// are concatenated in pc order; lines are iterated in ascending order.
    fn chunk_by_line(&self) -> Result<BTreeMap<u32, Vec<u8>>> {
        let mut chunks: BTreeMap<u32, Vec<u8>> = BTreeMap::new();

        for (i, &(start_pc, line)) in self.lines.iter().enumerate() {
            let begin = start_pc as usize;
            let end = match self.lines.get(i + 1) {
                Some(&(next_pc, _)) => next_pc as usize,
                None => self.code.len(),
            };
            if begin >= self.code.len() || end > self.code.len() || begin > end {
                return Err(Error::BadLineTable(start_pc as u32));
            }

            chunks
                .entry(line as u32)
                .or_default()
                .extend_from_slice(&self.code[begin..end]);
        }

        Ok(chunks)
    }

    /// Source line a bytecode offset belongs to: the line of the first
    /// table entry (ignoring non-monotonic ones) whose start pc is not
    /// below `pc`, falling back to the last entry's line.
    pub(crate) fn line_of(&self, pc: u32) -> u32 {
        let mut last_seen = 0u16;
        for i in 0..self.lines.len().saturating_sub(1) {
            let (start_pc, line) = self.lines[i];
            if last_seen <= line {
                if pc <= start_pc as u32 {
                    return line as u32;
                }
                last_seen = line;
            }
        }

        self.lines.last().map(|&(_, line)| line as u32).unwrap_or(0)
    }

    /// First bytecode offset of a source line.
    pub(crate) fn pc_of_line(&self, line: u32) -> Result<u32> {
        self.lines
            .iter()
            .find(|&&(_, l)| l as u32 == line)
            .map(|&(pc, _)| pc as u32)
            .ok_or(Error::UnknownLine(line))
    }

    /// Looks a slot's type up through the scope stack, deepest first.
    pub(crate) fn find_local(&self, slot: u16) -> LocalType {
        for scope in self.locals.iter().rev() {
            if let Some(&t) = scope.get(&slot) {
                return t;
            }
        }

        LocalType::None
    }

    /// Records a slot's type in the current scope.
    pub(crate) fn set_local(&mut self, slot: u16, t: LocalType) {
        if let Some(scope) = self.locals.last_mut() {
            scope.insert(slot, t);
        }
    }

    pub(crate) fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub(crate) fn pop(&mut self, line: u32) -> Result<Value> {
        self.stack.pop().ok_or(Error::StackUnderflow(line))
    }
}
