//! The statement synthesizer: recognizes fixed patterns in the operation
//! list of one source line and emits C++ statements with brace placement.
//!
//! Recognized shapes, most specific first:
//!
//! * no operations — only legal inside `<init>`/`<clinit>`
//! * `X, Jump` — statement followed by an `else` opener (forward jump) or a
//!   `while (true)` back-edge
//! * `Cond, Cond` — short-circuit `&&`/`||`
//! * `Store, Cond, Inc, Jump` — a `for` header
//! * anything else is emitted operation by operation, opening a scope after
//!   a leading condition

use std::collections::HashMap;

use crate::decompile::op::{invert_binop, CondOp, Operation, StoreOp};
use crate::decompile::opcode::GOTO;
use crate::decompile::{Decompiler, Instruction};
use crate::error::{Error, Result};

impl Decompiler<'_> {
    /// Decodes one per-line chunk into instructions, applying the brace
    /// insertion protocol for scopes that end or begin at this line.
    pub(crate) fn decode_line(&mut self, chunk: &[u8], line: u32) -> Result<Vec<Instruction>> {
        let start_pc = self.pc_of_line(line)?;
        let ops = self.exec_chunk(chunk, start_pc, line)?;

        let mut line_insts = vec![Instruction::new(line, "")];
        let mut add_opening = false;
        let mut parsed = false;

        match ops.as_slice() {
            [] => {
                // constructors and the static initializer produce lines
                // with no statement of their own
                if !self.method_name.starts_with('<') {
                    return Err(Error::UnsupportedShape(line));
                }
                parsed = true;
            }

            [first, Operation::Jump { target }] => {
                let target = *target;
                line_insts[0].text =
                    self.lower_operation(first, start_pc, line, &mut add_opening)?;

                if target > start_pc {
                    let text = self.lower_operation(
                        &Operation::Jump { target },
                        start_pc,
                        line,
                        &mut add_opening,
                    )?;
                    line_insts.push(Instruction::new(line, text));
                } else {
                    // back-edge: the loop body is already emitted, wrap it
                    self.inject_loop_header(target, line, &mut line_insts);
                    line_insts.push(Instruction::new(line, "}"));
                }
                parsed = true;
            }

            [Operation::Cond(c1), Operation::Cond(c2)] => {
                line_insts[0].text = self.short_circuit(c1, c2)?;
                add_opening = true;
                parsed = true;
            }

            [Operation::Store(store), Operation::Cond(cond), Operation::Inc { slot, constant }, Operation::Jump { .. }] =>
            {
                line_insts[0].text = self.for_header(store, cond, *slot, *constant, line)?;
                add_opening = true;
                parsed = true;
            }

            [_, _, _, _] => return Err(Error::UnsupportedShape(line)),

            _ => {}
        }

        if !parsed {
            line_insts[0].text =
                self.lower_operation(&ops[0], start_pc, line, &mut add_opening)?;

            for i in 1..ops.len() {
                if matches!(ops[i - 1], Operation::Cond(_)) {
                    line_insts.push(Instruction::new(line, "{"));
                    self.locals.push(HashMap::new());
                    add_opening = false;
                }

                let text = self.lower_operation(&ops[i], start_pc, line, &mut add_opening)?;
                line_insts.push(Instruction::new(line, text));
            }
        }

        self.open_pending_else(line, &mut line_insts)?;
        self.close_pending_scopes(line, &mut line_insts)?;

        if add_opening {
            line_insts.push(Instruction::new(line, "{"));
            self.locals.push(HashMap::new());
        }

        Ok(line_insts)
    }

    /// Two conditions on one line: same target is `&&`, distinct targets
    /// invert the first condition and join with `||`.
    fn short_circuit(&mut self, c1: &CondOp, c2: &CondOp) -> Result<String> {
        let joined = if c1.target == c2.target {
            format!(
                "if ({} {} {} && {} {} {})",
                c1.left, c1.op, c1.right, c2.left, c2.op, c2.right
            )
        } else {
            let inverted = invert_binop(c1.op)?;
            format!(
                "if ({} {} {} || {} {} {})",
                c1.left, inverted, c1.right, c2.left, c2.op, c2.right
            )
        };

        let closing = self.line_of(c2.target);
        self.closing_brackets.push(closing);
        Ok(joined)
    }

    /// `Store, Cond, Inc, Jump` is a `for` header. The loop variable and
    /// the incremented slot may differ.
    fn for_header(
        &mut self,
        store: &StoreOp,
        cond: &CondOp,
        inc_slot: u16,
        inc_constant: i32,
        line: u32,
    ) -> Result<String> {
        let init = store
            .value
            .clone()
            .ok_or(Error::UnsupportedShape(line))?;

        let mut header = String::from("for (");
        if let Some(cpp_type) = &store.cpp_type {
            header.push_str(cpp_type);
            header.push(' ');
        }
        header.push_str(&format!(
            "local_{} = {}; {} {} {}; local_{}",
            store.slot, init, cond.left, cond.op, cond.right, inc_slot
        ));
        if inc_constant == 1 {
            header.push_str("++");
        } else {
            header.push_str(&format!(" += {inc_constant}"));
        }
        header.push(')');

        let closing = self.line_of(cond.target);
        self.closing_brackets.push(closing);
        Ok(header)
    }

    /// Wraps an already-emitted loop body in `while (true) {`. The header
    /// goes before the first instruction at or past the target's line,
    /// searching the emitted list first and the current line's pending
    /// instructions second.
    fn inject_loop_header(&mut self, target: u32, line: u32, pending: &mut Vec<Instruction>) {
        let jump_line = self.line_of(target);

        if let Some(at) = self.insts.iter().position(|inst| jump_line <= inst.line) {
            self.insts.insert(at, Instruction::new(line, "while (true)"));
            self.insts.insert(at + 1, Instruction::new(line, "{"));
        } else if let Some(at) = pending.iter().position(|inst| jump_line <= inst.line) {
            pending.insert(at, Instruction::new(line, "while (true)"));
            pending.insert(at + 1, Instruction::new(line, "{"));
        } else {
            self.insts.push(Instruction::new(line, "while (true)"));
            self.insts.push(Instruction::new(line, "{"));
        }
    }

    /// Renders one operation as a C++ line. `add_opening` is set when the
    /// operation opens a scope (conditions and loop headers).
    pub(crate) fn lower_operation(
        &mut self,
        op: &Operation,
        start_pc: u32,
        _line: u32,
        add_opening: &mut bool,
    ) -> Result<String> {
        match op {
            Operation::Store(store) => Ok(render_store(store)),

            Operation::IndexedStore {
                array,
                index,
                value,
            } => Ok(format!("{array}[{index}] = {value};")),

            Operation::Return { value } => Ok(match value {
                Some(value) => format!("return {value};"),
                None => "return;".to_string(),
            }),

            Operation::Inc { slot, constant } => Ok(if *constant == 1 {
                format!("local_{slot}++;")
            } else {
                format!("local_{slot} += {constant};")
            }),

            Operation::Call { code } => Ok(code.clone()),

            Operation::Cond(cond) => self.lower_cond(cond, start_pc, add_opening),

            Operation::Jump { target } => self.lower_jump(*target, start_pc),
        }
    }

    /// A lone condition lowers to `if` or, when its target is preceded by a
    /// `goto` looping back onto this very line, to `while`.
    fn lower_cond(
        &mut self,
        cond: &CondOp,
        start_pc: u32,
        add_opening: &mut bool,
    ) -> Result<String> {
        *add_opening = true;

        let target = cond.target;
        let goto_pc = target
            .checked_sub(3)
            .filter(|&pc| self.code.get(pc as usize) == Some(&GOTO));

        let header = if let Some(goto_pc) = goto_pc {
            let high = *self
                .code
                .get(goto_pc as usize + 1)
                .ok_or(Error::UnexpectedEof)?;
            let low = *self
                .code
                .get(goto_pc as usize + 2)
                .ok_or(Error::UnexpectedEof)?;
            let offset = i16::from_be_bytes([high, low]);
            let loop_target = goto_pc as i64 + offset as i64;

            if loop_target == start_pc as i64 {
                format!("while ({} {} {})", cond.left, cond.op, cond.right)
            } else if loop_target > start_pc as i64 {
                format!("if ({} {} {})", cond.left, cond.op, cond.right)
            } else {
                return Err(Error::BackwardConditional);
            }
        } else {
            format!("if ({} {} {})", cond.left, cond.op, cond.right)
        };

        let closing = self.line_of(target);
        self.closing_brackets.push(closing);
        Ok(header)
    }

    /// A forward jump after an `if` body: the next source line starts the
    /// `else` branch and the target line closes it. Emits no text itself.
    fn lower_jump(&mut self, target: u32, start_pc: u32) -> Result<String> {
        if target <= start_pc {
            return Err(Error::BackwardJump);
        }

        let current_line = self.line_of(start_pc);
        let mut target_line = self.line_of(target);

        // the table can assign the fallthrough target a lower line; scan
        // forward for the first strictly greater one
        if target_line < current_line {
            for pc in target..self.code.len() as u32 {
                let next_line = self.line_of(pc);
                if next_line > current_line {
                    target_line = next_line;
                    break;
                }
            }
        }
        if target_line <= current_line {
            return Err(Error::JumpTargetNotFound);
        }

        self.else_stmts.push(current_line + 1);
        self.closing_brackets.push(target_line);
        Ok(String::new())
    }

    /// Every pending `else` at or before this line opens the alternative
    /// branch: `else {` is prepended, the `if` body's scope is replaced by
    /// a fresh one plus a placeholder the paired `}` removes.
    fn open_pending_else(&mut self, line: u32, line_insts: &mut Vec<Instruction>) -> Result<()> {
        let mut i = 0;
        while i < self.else_stmts.len() {
            if self.else_stmts[i] <= line {
                self.else_stmts.remove(i);
                line_insts.insert(0, Instruction::new(line, "{"));
                line_insts.insert(0, Instruction::new(line, "else"));

                if self.locals.pop().is_none() {
                    return Err(Error::MismatchedBrackets(self.method_name.to_string()));
                }
                self.locals.push(HashMap::new());
                self.locals.push(HashMap::new());
            } else {
                i += 1;
            }
        }
        Ok(())
    }

    /// Every scope ending at or before this line contributes one `}` ahead
    /// of the line's own instructions.
    fn close_pending_scopes(
        &mut self,
        line: u32,
        line_insts: &mut Vec<Instruction>,
    ) -> Result<()> {
        let mut i = 0;
        while i < self.closing_brackets.len() {
            if self.closing_brackets[i] <= line {
                self.closing_brackets.remove(i);
                line_insts.insert(0, Instruction::new(line, "}"));

                if self.locals.pop().is_none() || self.locals.is_empty() {
                    return Err(Error::MismatchedBrackets(self.method_name.to_string()));
                }
            } else {
                i += 1;
            }
        }
        Ok(())
    }
}

fn render_store(store: &StoreOp) -> String {
    let mut out = String::new();

    if let Some(cpp_type) = &store.cpp_type {
        if store.array.is_none() {
            out.push_str(cpp_type);
            out.push(' ');
        }
    }

    match &store.array {
        Some(arr) => {
            // the literal becomes a named temporary, element assignments,
            // and a pointer local
            out.push_str(&format!(
                "{} temp_{:x}[{}]",
                arr.cpp_type, arr.position, arr.size
            ));
            for (i, value) in arr.populate.iter().enumerate() {
                out.push_str(&format!("; temp_{:x}[{}] = {}", arr.position, i, value));
            }
            let pointer = match &store.cpp_type {
                Some(cpp_type) => format!("{cpp_type}* "),
                None => String::new(),
            };
            out.push_str(&format!(
                "; {}local_{} = temp_{:x}",
                pointer, store.slot, arr.position
            ));
        }
        None => {
            out.push_str(&format!("local_{}", store.slot));
            if let Some(value) = &store.value {
                out.push_str(&format!(" = {value}"));
            }
        }
    }

    out.push(';');
    out
}
