pub mod boards;
pub mod classfile;
pub mod decompile;
pub mod descriptor;
pub mod emit;
pub mod error;
pub mod project;
pub mod resources;

pub use boards::Board;
pub use classfile::{AccessFlags, ClassFile, Field, Method, ParseMode};
pub use decompile::Instruction;
pub use emit::Emitter;
pub use error::{Error, Result};
pub use project::Project;
pub use resources::{ImageFormat, ResourceRegistry};
