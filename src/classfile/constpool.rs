//! The constant pool (JVMS 4.4).
//!
//! Every symbolic reference in a class file (class names, member references, method handles,
//! descriptors, string literals) lives in the constant pool and is addressed by a one-based
//! `u2` index. `long` and `double` constants occupy two slots; the second slot is unusable.
//!
//! [`ConstantPool`] decodes all entries up-front (so the rest of the class file can be located)
//! but keeps cross references as raw indices. The typed lookups resolve and validate them on
//! demand, so a dangling or mistyped index is only reported when something actually asks
//! for it.

use std::borrow::Cow;

use strum::{EnumCount, EnumIter, FromRepr};

use crate::{file::parser::Parser, Result};

/// Tag byte of each constant-pool entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, EnumIter, EnumCount)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum ConstantTag {
    Utf8 = 1,
    Integer = 3,
    Float = 4,
    Long = 5,
    Double = 6,
    Class = 7,
    String = 8,
    Fieldref = 9,
    Methodref = 10,
    InterfaceMethodref = 11,
    NameAndType = 12,
    MethodHandle = 15,
    MethodType = 16,
    Dynamic = 17,
    InvokeDynamic = 18,
    Module = 19,
    Package = 20,
}

impl ConstantTag {
    /// Returns `true` for the tags that take up two pool slots.
    #[must_use]
    pub fn is_wide(self) -> bool {
        matches!(self, ConstantTag::Long | ConstantTag::Double)
    }
}

/// A single decoded constant-pool entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant<'a> {
    /// Slot 0, and the slot following a `Long` or `Double`
    Unusable,
    /// Modified UTF-8 text
    Utf8(Cow<'a, str>),
    /// `int` literal
    Integer(i32),
    /// `float` literal
    Float(f32),
    /// `long` literal
    Long(i64),
    /// `double` literal
    Double(f64),
    /// Class or array type, pointing at its name
    Class {
        /// `Utf8` index of the internal name or array descriptor
        name_index: u16,
    },
    /// `String` literal
    String {
        /// `Utf8` index of the string contents
        string_index: u16,
    },
    /// Field reference
    Fieldref {
        /// `Class` index of the owner
        class_index: u16,
        /// `NameAndType` index of the member
        name_and_type_index: u16,
    },
    /// Class method reference
    Methodref {
        /// `Class` index of the owner
        class_index: u16,
        /// `NameAndType` index of the member
        name_and_type_index: u16,
    },
    /// Interface method reference
    InterfaceMethodref {
        /// `Class` index of the owner
        class_index: u16,
        /// `NameAndType` index of the member
        name_and_type_index: u16,
    },
    /// Name and descriptor pair
    NameAndType {
        /// `Utf8` index of the name
        name_index: u16,
        /// `Utf8` index of the descriptor
        descriptor_index: u16,
    },
    /// Method handle; the reference kind is kept raw and validated by the consumer
    MethodHandle {
        /// Raw reference kind
        reference_kind: u8,
        /// Index of a `Fieldref`, `Methodref` or `InterfaceMethodref`
        reference_index: u16,
    },
    /// Method type
    MethodType {
        /// `Utf8` index of the method descriptor
        descriptor_index: u16,
    },
    /// Dynamically-computed constant
    Dynamic {
        /// Index into the `BootstrapMethods` attribute
        bootstrap_method_attr_index: u16,
        /// `NameAndType` index
        name_and_type_index: u16,
    },
    /// Dynamically-computed call site
    InvokeDynamic {
        /// Index into the `BootstrapMethods` attribute
        bootstrap_method_attr_index: u16,
        /// `NameAndType` index
        name_and_type_index: u16,
    },
    /// Module
    Module {
        /// `Utf8` index of the module name
        name_index: u16,
    },
    /// Package
    Package {
        /// `Utf8` index of the package name
        name_index: u16,
    },
}

/// Which kind of `*ref` constant a [`MemberRef`] was resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberRefKind {
    /// `CONSTANT_Fieldref`
    Field,
    /// `CONSTANT_Methodref`
    Method,
    /// `CONSTANT_InterfaceMethodref`
    InterfaceMethod,
}

/// A fully resolved field or method reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberRef<'p> {
    /// The constant kind the reference came from
    pub kind: MemberRefKind,
    /// Internal name of the owning class (an array descriptor for `clone()` on arrays)
    pub owner: &'p str,
    /// Member name
    pub name: &'p str,
    /// Field or method descriptor
    pub descriptor: &'p str,
}

/// A resolved method handle with its member reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodHandleRef<'p> {
    /// Raw reference kind, see [`crate::classfile::HandleKind`]
    pub reference_kind: u8,
    /// The referenced member
    pub member: MemberRef<'p>,
}

/// A resolved `CONSTANT_InvokeDynamic` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicCallSite<'p> {
    /// Index into the class's bootstrap method table
    pub bootstrap_index: u16,
    /// Call-site name (the functional interface method for lambdas)
    pub name: &'p str,
    /// Call-site method descriptor
    pub descriptor: &'p str,
}

/// The decoded constant pool of one class file.
///
/// # Examples
///
/// ```rust
/// use usagescope::classfile::ConstantPool;
/// use usagescope::Parser;
///
/// // count = 3: #1 Utf8 "a/Foo", #2 Class #1
/// let data = [0x00, 0x03, 0x01, 0x00, 0x05, b'a', b'/', b'F', b'o', b'o', 0x07, 0x00, 0x01];
/// let pool = ConstantPool::parse(&mut Parser::new(&data))?;
///
/// assert_eq!(pool.len(), 3);
/// assert_eq!(pool.class_name(2)?, "a/Foo");
/// assert!(pool.class_name(1).is_err());
/// # Ok::<(), usagescope::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct ConstantPool<'a> {
    entries: Vec<Constant<'a>>,
}

impl<'a> ConstantPool<'a> {
    /// Decode the `constant_pool_count` and every entry that follows it.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for unknown tags, a wide constant in the last slot
    /// or invalid modified UTF-8, and [`crate::Error::OutOfBounds`] on truncated input.
    pub fn parse(parser: &mut Parser<'a>) -> Result<Self> {
        let count = parser.read_be::<u16>()?;
        if count == 0 {
            return Err(malformed_error!("Constant pool count must be at least 1"));
        }

        let mut entries = Vec::with_capacity(count as usize);
        entries.push(Constant::Unusable);

        while entries.len() < count as usize {
            let index = entries.len();
            let raw_tag = parser.read_be::<u8>()?;
            let Some(tag) = ConstantTag::from_repr(raw_tag) else {
                return Err(malformed_error!(
                    "Invalid constant pool tag {} at index {}",
                    raw_tag,
                    index
                ));
            };

            let constant = match tag {
                ConstantTag::Utf8 => {
                    let length = parser.read_be::<u16>()?;
                    Constant::Utf8(parser.read_modified_utf8(length as usize)?)
                }
                ConstantTag::Integer => Constant::Integer(parser.read_be::<i32>()?),
                ConstantTag::Float => Constant::Float(f32::from_bits(parser.read_be::<u32>()?)),
                ConstantTag::Long => Constant::Long(parser.read_be::<i64>()?),
                ConstantTag::Double => {
                    Constant::Double(f64::from_bits(parser.read_be::<u64>()?))
                }
                ConstantTag::Class => Constant::Class {
                    name_index: parser.read_be::<u16>()?,
                },
                ConstantTag::String => Constant::String {
                    string_index: parser.read_be::<u16>()?,
                },
                ConstantTag::Fieldref => Constant::Fieldref {
                    class_index: parser.read_be::<u16>()?,
                    name_and_type_index: parser.read_be::<u16>()?,
                },
                ConstantTag::Methodref => Constant::Methodref {
                    class_index: parser.read_be::<u16>()?,
                    name_and_type_index: parser.read_be::<u16>()?,
                },
                ConstantTag::InterfaceMethodref => Constant::InterfaceMethodref {
                    class_index: parser.read_be::<u16>()?,
                    name_and_type_index: parser.read_be::<u16>()?,
                },
                ConstantTag::NameAndType => Constant::NameAndType {
                    name_index: parser.read_be::<u16>()?,
                    descriptor_index: parser.read_be::<u16>()?,
                },
                ConstantTag::MethodHandle => Constant::MethodHandle {
                    reference_kind: parser.read_be::<u8>()?,
                    reference_index: parser.read_be::<u16>()?,
                },
                ConstantTag::MethodType => Constant::MethodType {
                    descriptor_index: parser.read_be::<u16>()?,
                },
                ConstantTag::Dynamic => Constant::Dynamic {
                    bootstrap_method_attr_index: parser.read_be::<u16>()?,
                    name_and_type_index: parser.read_be::<u16>()?,
                },
                ConstantTag::InvokeDynamic => Constant::InvokeDynamic {
                    bootstrap_method_attr_index: parser.read_be::<u16>()?,
                    name_and_type_index: parser.read_be::<u16>()?,
                },
                ConstantTag::Module => Constant::Module {
                    name_index: parser.read_be::<u16>()?,
                },
                ConstantTag::Package => Constant::Package {
                    name_index: parser.read_be::<u16>()?,
                },
            };

            entries.push(constant);
            if tag.is_wide() {
                if entries.len() >= count as usize {
                    return Err(malformed_error!(
                        "Wide constant at index {} overflows the constant pool",
                        index
                    ));
                }
                entries.push(Constant::Unusable);
            }
        }

        Ok(ConstantPool { entries })
    }

    /// Number of slots, including the unusable slot 0 (the raw `constant_pool_count`).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the pool has no usable entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    /// Fetch the entry at `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the index is out of range or names an unusable
    /// slot.
    pub fn get(&self, index: u16) -> Result<&Constant<'a>> {
        match self.entries.get(index as usize) {
            Some(Constant::Unusable) | None => Err(malformed_error!(
                "Invalid constant pool index {} (pool size {})",
                index,
                self.entries.len()
            )),
            Some(constant) => Ok(constant),
        }
    }

    /// Resolve a `Utf8` entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the entry is missing or of another kind.
    pub fn utf8(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Constant::Utf8(text) => Ok(&**text),
            other => Err(wrong_kind(index, "Utf8", other)),
        }
    }

    /// Resolve a `Class` entry to its internal name (or array descriptor).
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the entry or its name is missing or of another kind.
    pub fn class_name(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Constant::Class { name_index } => self.utf8(*name_index),
            other => Err(wrong_kind(index, "Class", other)),
        }
    }

    /// Resolve a `NameAndType` entry to its `(name, descriptor)` pair.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] on a dangling or mistyped index.
    pub fn name_and_type(&self, index: u16) -> Result<(&str, &str)> {
        match self.get(index)? {
            Constant::NameAndType {
                name_index,
                descriptor_index,
            } => Ok((self.utf8(*name_index)?, self.utf8(*descriptor_index)?)),
            other => Err(wrong_kind(index, "NameAndType", other)),
        }
    }

    /// Resolve a `Fieldref`, `Methodref` or `InterfaceMethodref` entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] on a dangling or mistyped index.
    pub fn member_ref(&self, index: u16) -> Result<MemberRef<'_>> {
        let (kind, class_index, name_and_type_index) = match self.get(index)? {
            Constant::Fieldref {
                class_index,
                name_and_type_index,
            } => (MemberRefKind::Field, class_index, name_and_type_index),
            Constant::Methodref {
                class_index,
                name_and_type_index,
            } => (MemberRefKind::Method, class_index, name_and_type_index),
            Constant::InterfaceMethodref {
                class_index,
                name_and_type_index,
            } => (
                MemberRefKind::InterfaceMethod,
                class_index,
                name_and_type_index,
            ),
            other => return Err(wrong_kind(index, "member reference", other)),
        };

        let owner = self.class_name(*class_index)?;
        let (name, descriptor) = self.name_and_type(*name_and_type_index)?;
        Ok(MemberRef {
            kind,
            owner,
            name,
            descriptor,
        })
    }

    /// Resolve a `MethodHandle` entry and the member it points at.
    ///
    /// The reference kind is returned unvalidated.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] on a dangling or mistyped index.
    pub fn method_handle(&self, index: u16) -> Result<MethodHandleRef<'_>> {
        match self.get(index)? {
            Constant::MethodHandle {
                reference_kind,
                reference_index,
            } => Ok(MethodHandleRef {
                reference_kind: *reference_kind,
                member: self.member_ref(*reference_index)?,
            }),
            other => Err(wrong_kind(index, "MethodHandle", other)),
        }
    }

    /// Resolve a `MethodType` entry to its descriptor.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] on a dangling or mistyped index.
    pub fn method_type(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Constant::MethodType { descriptor_index } => self.utf8(*descriptor_index),
            other => Err(wrong_kind(index, "MethodType", other)),
        }
    }

    /// Resolve an `InvokeDynamic` entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] on a dangling or mistyped index.
    pub fn invoke_dynamic(&self, index: u16) -> Result<DynamicCallSite<'_>> {
        match self.get(index)? {
            Constant::InvokeDynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            } => {
                let (name, descriptor) = self.name_and_type(*name_and_type_index)?;
                Ok(DynamicCallSite {
                    bootstrap_index: *bootstrap_method_attr_index,
                    name,
                    descriptor,
                })
            }
            other => Err(wrong_kind(index, "InvokeDynamic", other)),
        }
    }

    /// Iterate over `(index, constant)` for every usable slot.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &Constant<'a>)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, constant)| !matches!(constant, Constant::Unusable))
            .map(|(index, constant)| (index as u16, constant))
    }
}

fn wrong_kind(index: u16, expected: &str, found: &Constant<'_>) -> crate::Error {
    malformed_error!(
        "Constant pool index {} - expected {}, found {:?}",
        index,
        expected,
        found
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn utf8(text: &str) -> Vec<u8> {
        let mut bytes = vec![1];
        bytes.extend_from_slice(&(text.len() as u16).to_be_bytes());
        bytes.extend_from_slice(text.as_bytes());
        bytes
    }

    fn pool_bytes(count: u16, entries: &[Vec<u8>]) -> Vec<u8> {
        let mut bytes = count.to_be_bytes().to_vec();
        for entry in entries {
            bytes.extend_from_slice(entry);
        }
        bytes
    }

    #[test]
    fn member_and_handle_resolution() {
        let data = pool_bytes(
            9,
            &[
                utf8("a/Bar"),            // #1
                vec![7, 0, 1],            // #2 Class a/Bar
                utf8("baz"),              // #3
                utf8("()I"),              // #4
                vec![12, 0, 3, 0, 4],     // #5 NameAndType baz:()I
                vec![10, 0, 2, 0, 5],     // #6 Methodref a/Bar.baz:()I
                vec![15, 5, 0, 6],        // #7 MethodHandle invokevirtual #6
                vec![16, 0, 4],           // #8 MethodType ()I
            ],
        );
        let pool = ConstantPool::parse(&mut Parser::new(&data)).unwrap();

        let member = pool.member_ref(6).unwrap();
        assert_eq!(member.kind, MemberRefKind::Method);
        assert_eq!(
            (member.owner, member.name, member.descriptor),
            ("a/Bar", "baz", "()I")
        );

        let handle = pool.method_handle(7).unwrap();
        assert_eq!(handle.reference_kind, 5);
        assert_eq!(handle.member, member);
        assert_eq!(pool.method_type(8).unwrap(), "()I");

        assert!(matches!(pool.member_ref(2), Err(Error::Malformed { .. })));
        assert!(matches!(pool.method_type(7), Err(Error::Malformed { .. })));
        assert!(pool.get(0).is_err());
        assert!(pool.get(9).is_err());
        assert_eq!(pool.iter().count(), 8);
    }

    #[test]
    fn wide_constants_take_two_slots() {
        let data = pool_bytes(
            5,
            &[
                vec![5, 0, 0, 0, 0, 0, 0, 0, 42], // #1-#2 Long 42
                utf8("x"),                        // #3
                vec![3, 0xFF, 0xFF, 0xFF, 0xFF],  // #4 Integer -1
            ],
        );
        let pool = ConstantPool::parse(&mut Parser::new(&data)).unwrap();

        assert_eq!(pool.get(1).unwrap(), &Constant::Long(42));
        assert!(pool.get(2).is_err());
        assert_eq!(pool.utf8(3).unwrap(), "x");
        assert_eq!(pool.get(4).unwrap(), &Constant::Integer(-1));
    }

    #[test]
    fn unpaired_surrogate_string_constant() {
        let data = pool_bytes(
            4,
            &[
                vec![1, 0, 3, 0xED, 0xA0, 0x80], // #1 "\uD800"
                vec![8, 0, 1],                   // #2 String #1
                utf8("a/Bar"),                   // #3
            ],
        );
        let pool = ConstantPool::parse(&mut Parser::new(&data)).unwrap();

        assert_eq!(pool.utf8(1).unwrap(), "\u{FFFD}");
        assert_eq!(pool.utf8(3).unwrap(), "a/Bar");
    }

    #[test]
    fn wide_constant_in_last_slot() {
        let data = pool_bytes(2, &[vec![6, 0, 0, 0, 0, 0, 0, 0, 0]]);
        assert!(matches!(
            ConstantPool::parse(&mut Parser::new(&data)),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn invalid_tag_and_truncation() {
        let data = pool_bytes(2, &[vec![2, 0, 0]]);
        assert!(matches!(
            ConstantPool::parse(&mut Parser::new(&data)),
            Err(Error::Malformed { .. })
        ));

        let data = pool_bytes(2, &[vec![1, 0, 10, b'a']]);
        assert!(matches!(
            ConstantPool::parse(&mut Parser::new(&data)),
            Err(Error::OutOfBounds { .. })
        ));

        assert!(ConstantPool::parse(&mut Parser::new(&[0, 0])).is_err());
    }
}
