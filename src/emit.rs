//! Renders decompiled classes as C++ translation units.
//!
//! Every class becomes one header and one implementation file. The class
//! carrying the `@Board` annotation has no enclosing scope: its static
//! fields become free definitions and its static methods free functions.
//! Every other class is wrapped in a `class` of the same name.

use std::fmt::Write as _;

use crate::boards::Board;
use crate::classfile::{AccessFlags, ClassFile, Field, Method};
use crate::descriptor;
use crate::error::Result;

/// Stem of the optional resources translation unit.
pub const RESOURCES_FILE: &str = "resources";
/// Stem of the optional user-written translation unit.
pub const USER_FILE: &str = "user";

const CONSTRUCTOR: &str = "<init>";

pub struct Emitter<'a> {
    board: Board,
    classes: &'a [ClassFile],
}

impl<'a> Emitter<'a> {
    pub fn new(board: Board, classes: &'a [ClassFile]) -> Self {
        Self { board, classes }
    }

    /// File extension of implementation files for the target board.
    pub fn source_extension(&self) -> &'static str {
        self.board.source_extension()
    }

    /// Renders the interface file of one class.
    pub fn header(&self, class: &ClassFile) -> Result<String> {
        let guard = format!("{}_H", class.name.to_uppercase());
        let mut out = String::new();
        let _ = writeln!(out, "#ifndef {guard}");
        let _ = writeln!(out, "#define {guard}");

        if self.board != Board::Gamebuino {
            out.push_str(&self.includes(class, true));
            out.push('\n');
        }

        if !class.has_board() {
            let _ = writeln!(out, "class {} {{", class.name);
        }

        for visibility in [AccessFlags::PUBLIC, AccessFlags::empty()] {
            let public = visibility == AccessFlags::PUBLIC;
            if class.has_board() && !public {
                continue;
            }

            let fields: Vec<&Field> = class
                .fields
                .iter()
                .filter(|f| f.flags.contains(AccessFlags::PUBLIC) == public)
                .collect();
            let methods: Vec<&Method> = class
                .methods
                .iter()
                .filter(|m| m.flags.contains(AccessFlags::PUBLIC) == public)
                .collect();
            if fields.is_empty() && methods.is_empty() {
                continue;
            }

            if !class.has_board() {
                let _ = writeln!(out, "{}:", if public { "public" } else { "private" });
            }

            if !fields.is_empty() {
                out.push('\n');
            }
            for field in fields {
                out.push_str(&self.field_declaration(class, field));
            }

            for method in methods {
                out.push('\n');
                out.push_str(&self.method_declaration(class, method)?);
            }
        }

        if !class.has_board() {
            out.push_str("};\n");
        }

        out.push_str("#endif\n");
        Ok(out)
    }

    /// Renders the implementation file of one class.
    pub fn source(&self, class: &ClassFile) -> Result<String> {
        let mut out = String::new();

        if class.has_board() || self.board != Board::Gamebuino {
            out.push_str(&self.includes(class, false));
        }

        if class.has_board() {
            out.push('\n');
            for field in &class.fields {
                out.push_str(&field_definition(field, None));
            }
        } else {
            out.push('\n');
            for field in &class.fields {
                if field.flags.contains(AccessFlags::STATIC) {
                    out.push_str(&field_definition(field, Some(&class.name)));
                }
            }
        }

        for method in &class.methods {
            out.push('\n');
            out.push_str(&self.method_definition(class, method)?);
        }

        Ok(out)
    }

    fn includes(&self, class: &ClassFile, header: bool) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "#include \"{}\"", self.board.shim_file_name());
        let _ = writeln!(out, "#if __has_include(\"{RESOURCES_FILE}.h\")");
        let _ = writeln!(out, "#include \"{RESOURCES_FILE}.h\"");
        let _ = writeln!(out, "#endif");
        let _ = writeln!(out, "#if __has_include(\"{USER_FILE}.h\")");
        let _ = writeln!(out, "#include \"{USER_FILE}.h\"");
        let _ = writeln!(out, "#endif");

        for other in self.classes {
            let skip = if header {
                other.name == class.name
            } else {
                other.has_board()
            };
            if !skip {
                let _ = writeln!(out, "#include \"{}.h\"", other.name);
            }
        }

        out
    }

    fn field_declaration(&self, class: &ClassFile, field: &Field) -> String {
        if class.has_board() {
            let mut out = String::from("extern ");
            out.push_str(&field.cpp_type);
            if field.init.is_none() && field.is_array {
                out.push('*');
            }
            let _ = write!(out, " {}", field.name);
            if field.init.is_some() && field.is_array {
                out.push_str("[]");
            }
            out.push_str(";\n");
            return out;
        }

        let mut out = String::new();
        if field.flags.contains(AccessFlags::STATIC) {
            out.push_str("static ");
        }
        out.push_str(&field.cpp_type);
        if field.init.is_none() && field.is_array {
            out.push('*');
        }
        let _ = write!(out, " {}", field.name);
        if let Some(init) = &field.init {
            if field.is_array {
                out.push_str("[]");
            }
            if !field.flags.contains(AccessFlags::STATIC) && init != "null" {
                let _ = write!(out, " = {init}");
            }
        }
        out.push_str(";\n");
        out
    }

    fn method_declaration(&self, class: &ClassFile, method: &Method) -> Result<String> {
        // firmware entry point; the argument vector does not exist here
        if method.name == "main" {
            return Ok("int main();\n".to_string());
        }

        let mut out = String::new();
        if method.name == CONSTRUCTOR {
            out.push_str(&class.name);
        } else {
            if method.flags.contains(AccessFlags::STATIC) {
                out.push_str("static ");
            }
            let _ = write!(
                out,
                "{} {}",
                descriptor::return_type(&method.descriptor)?,
                method.name
            );
        }

        let _ = writeln!(out, "({});", self.parameters(method)?);
        Ok(out)
    }

    fn method_definition(&self, class: &ClassFile, method: &Method) -> Result<String> {
        let scope = if class.has_board() {
            String::new()
        } else {
            format!("{}::", class.name)
        };

        let mut out = String::new();
        if method.name == "main" {
            out.push_str("int main()");
        } else if method.name == CONSTRUCTOR {
            let _ = write!(out, "{scope}{}({})", class.name, self.parameters(method)?);
        } else {
            let _ = write!(
                out,
                "{} {scope}{}({})",
                descriptor::return_type(&method.descriptor)?,
                method.name,
                self.parameters(method)?
            );
        }
        out.push_str("\n{\n");

        let mut depth: i32 = 0;
        for inst in &method.instructions {
            if inst.text.starts_with('}') {
                depth -= 1;
            }
            if !inst.text.is_empty() {
                for _ in 0..depth + 1 {
                    out.push('\t');
                }
                out.push_str(&inst.text);
                out.push('\n');
            }
            if inst.text.starts_with('{') {
                depth += 1;
            }
        }

        out.push_str("}\n");
        Ok(out)
    }

    fn parameters(&self, method: &Method) -> Result<String> {
        if method.name == "main" {
            return Ok(String::new());
        }
        let first_slot = if method.flags.contains(AccessFlags::STATIC) {
            0
        } else {
            1
        };
        descriptor::parameter_list(&method.descriptor, first_slot)
    }
}

/// A field definition at namespace scope: the board class's free
/// variables, or a `Class::member` definition for other classes' statics.
fn field_definition(field: &Field, scope: Option<&str>) -> String {
    let mut out = String::new();

    // a `null` initializer means the definition lives in user code
    if field.init.as_deref() == Some("null") {
        out.push_str("extern ");
    }

    out.push_str(&field.cpp_type);
    if field.init.is_none() && field.is_array {
        out.push('*');
    }

    match scope {
        Some(scope) => {
            let _ = write!(out, " {}::{}", scope, field.name);
        }
        None => {
            let _ = write!(out, " {}", field.name);
        }
    }

    if let Some(init) = &field.init {
        if field.is_array {
            out.push_str("[]");
        }
        if init != "null" {
            let _ = write!(out, " = {init}");
        }
    }

    out.push_str(";\n");
    out
}
