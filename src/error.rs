use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the pipeline.
pub type Result<T> = std::result::Result<T, Error>;

/// A fatal diagnostic. The first one aborts the project compilation; the
/// CLI prints the rendered message and exits non-zero. The staging
/// directory is left behind for inspection.
#[derive(Debug, Error)]
pub enum Error {
    // ---- malformed classfiles ----
    #[error("invalid class file: wrong magic number")]
    BadMagic,
    #[error("unexpected end of class file")]
    UnexpectedEof,
    #[error("unknown constant pool tag {0}")]
    UnknownConstantTag(u8),
    #[error("constant pool index {index} does not hold a {expected}")]
    WrongConstant { index: u16, expected: &'static str },
    #[error("constant pool entry is not valid UTF-8")]
    InvalidUtf8,
    #[error("unhandled {kind} attribute '{name}'")]
    UnhandledAttribute { kind: &'static str, name: String },
    #[error("unhandled opcode 0x{0:02x}")]
    UnhandledOpcode(u8),
    #[error("invalid type descriptor '{0}'")]
    BadDescriptor(String),
    #[error("'@Board' annotation must contain a board.Type value")]
    BadBoardAnnotation,
    #[error("unhandled bootstrap method '{0}'")]
    UnhandledBootstrapMethod(String),
    #[error("only static method references are valid as bootstrap arguments")]
    BadBootstrapHandle,
    #[error("unhandled bootstrap argument for '{method}' at index {index}")]
    BadBootstrapArgument { method: String, index: u16 },
    #[error("invokedynamic operand at index {0} is not followed by zero")]
    BadInvokeDynamicOperand(u16),

    // ---- unsupported program shapes ----
    #[error("the class must not implement interfaces")]
    HasInterfaces,
    #[error("mismatched brackets at end of '{0}'")]
    MismatchedBrackets(String),
    #[error("operand stack is not empty at end of '{0}'")]
    StackNotEmpty(String),
    #[error("a condition wants to jump backwards")]
    BackwardConditional,
    #[error("a jump did not find its target line")]
    JumpTargetNotFound,
    #[error("backward jumps outside a loop tail are not handled")]
    BackwardJump,
    #[error("unsupported statement shape on line {0}")]
    UnsupportedShape(u32),
    #[error("operand stack underflow on line {0}")]
    StackUnderflow(u32),
    #[error("no bytecode offset recorded for line {0}")]
    UnknownLine(u32),
    #[error("line table offset {0} is outside the method code")]
    BadLineTable(u32),
    #[error("string templates with constant markers (0x02) are not supported")]
    ConstantTemplateMarker,
    #[error("invokedynamic references a missing bootstrap method {0}")]
    MissingBootstrap(u16),
    #[error("array size on line {0} is not an integer constant")]
    ArraySize(u32),
    #[error("constructor argument on line {0} is not an integer constant")]
    BadConstructorArgument(u32),
    #[error("'{method}' is not handled on '{class}'")]
    UnhandledCall { class: String, method: String },
    #[error("invokespecial on something that is not a constructor")]
    NotAConstructor,
    #[error("only String and Object are handled as reference array types, not '{0}'")]
    BadArrayElement(String),
    #[error("'{0}' is not a valid binary operator")]
    BadBinaryOperator(String),
    #[error("invalid primitive array type code {0}")]
    BadPrimitiveType(u8),

    // ---- project level ----
    #[error("no .java file detected")]
    NoSources,
    #[error("no class carries a '@Board' annotation")]
    NoBoardClass,
    #[error("more than one class carries a '@Board' annotation")]
    MultipleBoardClasses,
    #[error("unknown board '{0}'")]
    UnknownBoard(String),
    #[error("{}: file is empty", .0.display())]
    EmptyFile(PathBuf),
    #[error("image '{filename}' uses more than 16 colors")]
    TooManyColors { filename: String },
    #[error("image '{filename}': {message}")]
    BadImage { filename: String, message: String },

    // ---- toolchain & environment ----
    #[error("could not find '{0}'")]
    ToolMissing(String),
    #[error("'{0}' exited with an error")]
    ToolFailed(String),
    #[error("${0} is not set nor accessible")]
    MissingSdk(&'static str),
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl Error {
    /// Wraps an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Error {
        let path = path.into();
        move |source| Error::Io { path, source }
    }
}
