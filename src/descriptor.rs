//! Decodes JVM type descriptors into C++ type spellings.
//!
//! The grammar is the classfile one: primitives are single letters,
//! `L<name>;` is a reference type, `[` prefixes an array. Anything outside
//! the accepted subset is fatal.

use bitflags::bitflags;

use crate::error::{Error, Result};

bitflags! {
    /// Modifiers attached to a field through its access flags and
    /// `RuntimeInvisibleAnnotations` (`ACC_FINAL` and `Ltypes/unsigned;`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TypeFlags: u8 {
        const CONST = 1;
        const UNSIGNED = 2;
    }
}

/// Turns a slash-separated JVM name into a C++ qualified path.
pub fn cpp_path(name: &str) -> String {
    name.replace('/', "::")
}

/// Spells one (possibly array-prefixed) descriptor as a C++ type. The
/// array dimension is not part of the spelling; callers track it through
/// the descriptor's leading `[`.
pub fn cpp_type(descriptor: &str, flags: TypeFlags) -> Result<String> {
    let base = descriptor.trim_start_matches('[');

    let mut prefix = String::new();
    if flags.contains(TypeFlags::CONST) {
        prefix.push_str("const ");
    }
    if flags.contains(TypeFlags::UNSIGNED) {
        prefix.push('u');
    }

    let spelled = match base {
        "I" => format!("{prefix}int32_t"),
        "B" => format!("{prefix}int8_t"),
        "S" => format!("{prefix}int16_t"),
        "J" => format!("{prefix}int64_t"),
        "Z" => "bool".to_string(),
        "C" => "char".to_string(),
        "F" => "float".to_string(),
        "D" => "double".to_string(),
        "V" => "void".to_string(),
        _ => {
            let Some(name) = base.strip_prefix('L').and_then(|b| b.strip_suffix(';')) else {
                return Err(Error::BadDescriptor(descriptor.to_string()));
            };
            if name == "java/lang/String" {
                "std::string".to_string()
            } else if let Some(custom) = name.strip_prefix("types/") {
                format!("{custom}_t")
            } else {
                cpp_path(name)
            }
        }
    };

    Ok(spelled)
}

/// Counts the argument slots of a method descriptor: one per parameter,
/// with `L…;` counting as one and `[` as a prefix of the following type.
pub fn count_args(descriptor: &str) -> Result<u32> {
    let inner = parameters_of(descriptor)?;
    let mut count = 0;
    let mut chars = inner.char_indices();
    while let Some((_, c)) = chars.next() {
        match c {
            'L' => {
                count += 1;
                if !chars.any(|(_, c)| c == ';') {
                    return Err(Error::BadDescriptor(descriptor.to_string()));
                }
            }
            '[' => {}
            'B' | 'C' | 'D' | 'F' | 'I' | 'J' | 'S' | 'Z' => count += 1,
            _ => return Err(Error::BadDescriptor(descriptor.to_string())),
        }
    }

    Ok(count)
}

/// Spells the return type of a method descriptor.
pub fn return_type(descriptor: &str) -> Result<String> {
    let close = descriptor
        .find(')')
        .ok_or_else(|| Error::BadDescriptor(descriptor.to_string()))?;
    let ret = &descriptor[close + 1..];

    let spelled = cpp_type(ret, TypeFlags::empty())?;
    if ret.starts_with('[') {
        Ok(format!("{spelled}*"))
    } else {
        Ok(spelled)
    }
}

/// Renders a C++ parameter list from a method descriptor. Parameters are
/// named after their local slot: slot 0 for static methods, slot 1 for
/// instance methods (slot 0 is the receiver). `long` and `double` occupy
/// two slots.
pub fn parameter_list(descriptor: &str, first_slot: u16) -> Result<String> {
    let inner = parameters_of(descriptor)?;

    let mut out: Vec<String> = Vec::new();
    let mut slot = first_slot;
    let mut rest = inner;
    while !rest.is_empty() {
        let (one, remainder) = split_first_type(rest, descriptor)?;
        rest = remainder;

        let spelled = cpp_type(one, TypeFlags::empty())?;
        if one.starts_with('[') {
            out.push(format!("{spelled} local_{slot}[]"));
        } else {
            out.push(format!("{spelled} local_{slot}"));
        }

        slot += match one {
            "J" | "D" => 2,
            _ => 1,
        };
    }

    Ok(out.join(", "))
}

fn parameters_of(descriptor: &str) -> Result<&str> {
    descriptor
        .strip_prefix('(')
        .and_then(|d| d.split_once(')'))
        .map(|(params, _)| params)
        .ok_or_else(|| Error::BadDescriptor(descriptor.to_string()))
}

/// Splits one field descriptor off the front of `rest`.
fn split_first_type<'a>(rest: &'a str, whole: &str) -> Result<(&'a str, &'a str)> {
    let bytes = rest.as_bytes();
    let mut i = 0;
    while i < bytes.len() && bytes[i] == b'[' {
        i += 1;
    }

    match bytes.get(i) {
        Some(b'L') => {
            let semi = rest[i..]
                .find(';')
                .ok_or_else(|| Error::BadDescriptor(whole.to_string()))?;
            Ok(rest.split_at(i + semi + 1))
        }
        Some(b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z') => Ok(rest.split_at(i + 1)),
        _ => Err(Error::BadDescriptor(whole.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_spellings() {
        assert_eq!(cpp_type("I", TypeFlags::empty()).unwrap(), "int32_t");
        assert_eq!(cpp_type("B", TypeFlags::empty()).unwrap(), "int8_t");
        assert_eq!(cpp_type("S", TypeFlags::empty()).unwrap(), "int16_t");
        assert_eq!(cpp_type("J", TypeFlags::empty()).unwrap(), "int64_t");
        assert_eq!(cpp_type("Z", TypeFlags::empty()).unwrap(), "bool");
        assert_eq!(cpp_type("F", TypeFlags::empty()).unwrap(), "float");
        assert_eq!(cpp_type("D", TypeFlags::empty()).unwrap(), "double");
    }

    #[test]
    fn modifier_prefixes() {
        assert_eq!(
            cpp_type("I", TypeFlags::UNSIGNED).unwrap(),
            "uint32_t"
        );
        assert_eq!(
            cpp_type("B", TypeFlags::CONST | TypeFlags::UNSIGNED).unwrap(),
            "const uint8_t"
        );
    }

    #[test]
    fn reference_spellings() {
        assert_eq!(
            cpp_type("Ljava/lang/String;", TypeFlags::empty()).unwrap(),
            "std::string"
        );
        assert_eq!(
            cpp_type("Ltypes/color;", TypeFlags::empty()).unwrap(),
            "color_t"
        );
        assert_eq!(
            cpp_type("Lgamebuino/Image;", TypeFlags::empty()).unwrap(),
            "gamebuino::Image"
        );
    }

    #[test]
    fn arrays_strip_to_the_element() {
        assert_eq!(cpp_type("[I", TypeFlags::empty()).unwrap(), "int32_t");
        assert_eq!(
            cpp_type("[Ljava/lang/String;", TypeFlags::empty()).unwrap(),
            "std::string"
        );
    }

    #[test]
    fn unknown_descriptor_is_fatal() {
        assert!(cpp_type("Q", TypeFlags::empty()).is_err());
        assert!(cpp_type("Lunterminated", TypeFlags::empty()).is_err());
    }

    #[test]
    fn argument_counting() {
        assert_eq!(count_args("()V").unwrap(), 0);
        assert_eq!(count_args("(II)V").unwrap(), 2);
        assert_eq!(count_args("(Ljava/lang/String;IZ)V").unwrap(), 3);
        assert_eq!(count_args("([B)V").unwrap(), 1);
        assert_eq!(count_args("([Ljava/lang/String;)V").unwrap(), 1);
    }

    #[test]
    fn return_types() {
        assert_eq!(return_type("()V").unwrap(), "void");
        assert_eq!(return_type("(II)I").unwrap(), "int32_t");
        assert_eq!(return_type("()Z").unwrap(), "bool");
        assert_eq!(return_type("()[I").unwrap(), "int32_t*");
    }

    #[test]
    fn parameter_lists_number_slots() {
        assert_eq!(parameter_list("()V", 0).unwrap(), "");
        assert_eq!(
            parameter_list("(II)V", 0).unwrap(),
            "int32_t local_0, int32_t local_1"
        );
        // instance methods start at slot 1; doubles take two slots
        assert_eq!(
            parameter_list("(DI)V", 1).unwrap(),
            "double local_1, int32_t local_3"
        );
        assert_eq!(
            parameter_list("([I)V", 0).unwrap(),
            "int32_t local_0[]"
        );
    }
}
