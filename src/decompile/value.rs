//! Symbolic operand-stack values.
//!
//! A stack slot carries a typed representation (a literal keeps its type, an
//! unfinished array literal keeps its element list) and is rendered to C++
//! text only when an operation consumes it.

/// An array literal still being populated on the stack.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayValue {
    pub cpp_type: String,
    pub size: usize,
    /// Bytecode offset of the `newarray`/`anewarray`; names the C++
    /// temporary (`temp_<position>`).
    pub position: u32,
    pub populate: Vec<String>,
}

/// A freshly constructed object: `new` pushes it with an empty constructor
/// call, `invokespecial <init>` fills it in.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectValue {
    pub cpp_type: String,
    pub ctor: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    /// Already-rendered expression text.
    Expr(String),
    Array(ArrayValue),
    Object(ObjectValue),
}

impl Value {
    pub fn expr(text: impl Into<String>) -> Self {
        Value::Expr(text.into())
    }

    /// Renders the value as C++ expression text.
    pub fn render(&self) -> String {
        match self {
            Value::Int(v) => format!("{v}"),
            Value::Long(v) => format!("{v}L"),
            Value::Float(v) => format!("{v}"),
            Value::Double(v) => format!("{v}"),
            Value::Expr(text) => text.clone(),
            Value::Array(arr) => format!("{{ {} }}", arr.populate.join(", ")),
            Value::Object(obj) => obj.cpp_type.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_rendering() {
        assert_eq!(Value::Int(-3).render(), "-3");
        assert_eq!(Value::Long(7).render(), "7L");
        assert_eq!(Value::Float(0.5).render(), "0.5");
        assert_eq!(Value::expr("local_2").render(), "local_2");
    }

    #[test]
    fn array_renders_as_initializer_list() {
        let arr = ArrayValue {
            cpp_type: "int32_t".into(),
            size: 3,
            position: 2,
            populate: vec!["1".into(), "2".into(), "3".into()],
        };
        assert_eq!(Value::Array(arr).render(), "{ 1, 2, 3 }");
    }

    #[test]
    fn object_renders_as_its_type() {
        let obj = ObjectValue {
            cpp_type: "gamebuino::Image".into(),
            ctor: "Image(logo_png)".into(),
        };
        assert_eq!(Value::Object(obj).render(), "gamebuino::Image");
    }
}
