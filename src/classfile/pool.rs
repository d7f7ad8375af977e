//! The constant pool: a flat, 1-indexed container of tagged entries.
//!
//! Entries reference each other by index, never by pointer. Slot 0 and the
//! slot following every `Long`/`Double` hold a placeholder; resolving an
//! index to a placeholder or to an entry of the wrong kind is fatal.

use crate::classfile::bytes::ByteReader;
use crate::error::{Error, Result};

const CONSTANT_UTF8: u8 = 1;
const CONSTANT_INTEGER: u8 = 3;
const CONSTANT_FLOAT: u8 = 4;
const CONSTANT_LONG: u8 = 5;
const CONSTANT_DOUBLE: u8 = 6;
const CONSTANT_CLASS: u8 = 7;
const CONSTANT_STRING: u8 = 8;
const CONSTANT_FIELDREF: u8 = 9;
const CONSTANT_METHODREF: u8 = 10;
const CONSTANT_INTERFACE_METHODREF: u8 = 11;
const CONSTANT_NAME_AND_TYPE: u8 = 12;
const CONSTANT_METHOD_HANDLE: u8 = 15;
const CONSTANT_METHOD_TYPE: u8 = 16;
const CONSTANT_INVOKE_DYNAMIC: u8 = 18;

/// Method-handle reference kind accepted as a bootstrap argument.
pub const REF_INVOKE_STATIC: u8 = 6;

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Slot 0 and the trailing slot of `Long`/`Double` entries.
    Placeholder,
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class { name: u16 },
    Str { utf8: u16 },
    FieldRef { class: u16, name_and_type: u16 },
    MethodRef { class: u16, name_and_type: u16 },
    InterfaceMethodRef { class: u16, name_and_type: u16 },
    NameAndType { name: u16, descriptor: u16 },
    MethodHandle { kind: u8, reference: u16 },
    MethodType { descriptor: u16 },
    InvokeDynamic { bootstrap: u16, name_and_type: u16 },
}

#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    pub fn parse(r: &mut ByteReader) -> Result<Self> {
        let mut entries = vec![Constant::Placeholder];

        let count = r.u16()?;
        let mut i = 0;
        while i < count.saturating_sub(1) {
            let tag = r.u8()?;
            let entry = match tag {
                CONSTANT_UTF8 => {
                    let length = r.u16()?;
                    let bytes = r.take(length as usize)?;
                    let text =
                        String::from_utf8(bytes.to_vec()).map_err(|_| Error::InvalidUtf8)?;
                    Constant::Utf8(text)
                }
                CONSTANT_INTEGER => Constant::Integer(r.i32()?),
                CONSTANT_FLOAT => Constant::Float(f32::from_bits(r.u32()?)),
                CONSTANT_LONG => {
                    let high = r.u32()?;
                    let low = r.u32()?;
                    Constant::Long(((high as i64) << 32) | low as i64)
                }
                CONSTANT_DOUBLE => {
                    let high = r.u32()?;
                    let low = r.u32()?;
                    Constant::Double(f64::from_bits((u64::from(high) << 32) | u64::from(low)))
                }
                CONSTANT_CLASS => Constant::Class { name: r.u16()? },
                CONSTANT_STRING => Constant::Str { utf8: r.u16()? },
                CONSTANT_FIELDREF => Constant::FieldRef {
                    class: r.u16()?,
                    name_and_type: r.u16()?,
                },
                CONSTANT_METHODREF => Constant::MethodRef {
                    class: r.u16()?,
                    name_and_type: r.u16()?,
                },
                CONSTANT_INTERFACE_METHODREF => Constant::InterfaceMethodRef {
                    class: r.u16()?,
                    name_and_type: r.u16()?,
                },
                CONSTANT_NAME_AND_TYPE => Constant::NameAndType {
                    name: r.u16()?,
                    descriptor: r.u16()?,
                },
                CONSTANT_METHOD_HANDLE => Constant::MethodHandle {
                    kind: r.u8()?,
                    reference: r.u16()?,
                },
                CONSTANT_METHOD_TYPE => Constant::MethodType { descriptor: r.u16()? },
                CONSTANT_INVOKE_DYNAMIC => Constant::InvokeDynamic {
                    bootstrap: r.u16()?,
                    name_and_type: r.u16()?,
                },
                other => return Err(Error::UnknownConstantTag(other)),
            };

            // Long and Double occupy two slots; the second stays a placeholder.
            let wide = matches!(entry, Constant::Long(_) | Constant::Double(_));
            entries.push(entry);
            if wide {
                entries.push(Constant::Placeholder);
                i += 1;
            }
            i += 1;
        }

        Ok(Self { entries })
    }

    pub fn get(&self, index: u16) -> Result<&Constant> {
        match self.entries.get(index as usize) {
            None | Some(Constant::Placeholder) => Err(Error::WrongConstant {
                index,
                expected: "live entry",
            }),
            Some(entry) => Ok(entry),
        }
    }

    pub fn utf8(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Constant::Utf8(text) => Ok(text),
            _ => Err(Error::WrongConstant {
                index,
                expected: "Utf8",
            }),
        }
    }

    /// Resolves a `Class` entry to its name.
    pub fn class_name(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Constant::Class { name } => self.utf8(*name),
            _ => Err(Error::WrongConstant {
                index,
                expected: "Class",
            }),
        }
    }

    /// Resolves a `Str` entry to its text.
    pub fn string(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Constant::Str { utf8 } => self.utf8(*utf8),
            _ => Err(Error::WrongConstant {
                index,
                expected: "String",
            }),
        }
    }

    /// Resolves a `NameAndType` entry to `(name, descriptor)`.
    pub fn name_and_type(&self, index: u16) -> Result<(&str, &str)> {
        match self.get(index)? {
            Constant::NameAndType { name, descriptor } => {
                Ok((self.utf8(*name)?, self.utf8(*descriptor)?))
            }
            _ => Err(Error::WrongConstant {
                index,
                expected: "NameAndType",
            }),
        }
    }

    /// Resolves a `FieldRef` to `(class name, field name, descriptor)`.
    pub fn field_ref(&self, index: u16) -> Result<(&str, &str, &str)> {
        match self.get(index)? {
            Constant::FieldRef {
                class,
                name_and_type,
            } => {
                let (name, descriptor) = self.name_and_type(*name_and_type)?;
                Ok((self.class_name(*class)?, name, descriptor))
            }
            _ => Err(Error::WrongConstant {
                index,
                expected: "Fieldref",
            }),
        }
    }

    /// Resolves a `MethodRef` to `(class name, method name, descriptor)`.
    pub fn method_ref(&self, index: u16) -> Result<(&str, &str, &str)> {
        match self.get(index)? {
            Constant::MethodRef {
                class,
                name_and_type,
            } => {
                let (name, descriptor) = self.name_and_type(*name_and_type)?;
                Ok((self.class_name(*class)?, name, descriptor))
            }
            _ => Err(Error::WrongConstant {
                index,
                expected: "Methodref",
            }),
        }
    }

    pub fn method_handle(&self, index: u16) -> Result<(u8, u16)> {
        match self.get(index)? {
            Constant::MethodHandle { kind, reference } => Ok((*kind, *reference)),
            _ => Err(Error::WrongConstant {
                index,
                expected: "MethodHandle",
            }),
        }
    }

    pub fn invoke_dynamic(&self, index: u16) -> Result<(u16, u16)> {
        match self.get(index)? {
            Constant::InvokeDynamic {
                bootstrap,
                name_and_type,
            } => Ok((*bootstrap, *name_and_type)),
            _ => Err(Error::WrongConstant {
                index,
                expected: "InvokeDynamic",
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_of(body: &[u8], count: u16) -> ConstantPool {
        let mut bytes = count.to_be_bytes().to_vec();
        bytes.extend_from_slice(body);
        ConstantPool::parse(&mut ByteReader::new(&bytes)).unwrap()
    }

    #[test]
    fn slot_zero_is_a_placeholder() {
        let pool = pool_of(&[], 1);
        assert_eq!(pool.len(), 1);
        assert!(pool.get(0).is_err());
    }

    #[test]
    fn utf8_round_trip() {
        // count=2: one Utf8 entry "main"
        let pool = pool_of(&[1, 0, 4, b'm', b'a', b'i', b'n'], 2);
        assert_eq!(pool.utf8(1).unwrap(), "main");
    }

    #[test]
    fn long_occupies_two_slots() {
        // count=4: Long(1) then Utf8 "x"
        let mut body = vec![5, 0, 0, 0, 0, 0, 0, 0, 1];
        body.extend_from_slice(&[1, 0, 1, b'x']);
        let pool = pool_of(&body, 4);
        assert_eq!(pool.get(1).unwrap(), &Constant::Long(1));
        assert!(pool.get(2).is_err(), "trailing slot must be a sentinel");
        assert_eq!(pool.utf8(3).unwrap(), "x");
    }

    #[test]
    fn wrong_kind_is_fatal() {
        let pool = pool_of(&[3, 0, 0, 0, 42], 2);
        assert!(pool.utf8(1).is_err());
        assert_eq!(pool.get(1).unwrap(), &Constant::Integer(42));
    }

    #[test]
    fn unknown_tag_is_fatal() {
        let bytes = [0, 2, 99, 0, 0];
        assert!(matches!(
            ConstantPool::parse(&mut ByteReader::new(&bytes)),
            Err(Error::UnknownConstantTag(99))
        ));
    }
}
