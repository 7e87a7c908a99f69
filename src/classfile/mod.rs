//! JVM class-file structure parsing.
//!
//! This module decodes the outer structure of a class file (JVMS chapter 4): the constant
//! pool, the class header, the declared fields and methods, and the two attributes the
//! indexer needs (`Code` on methods, `BootstrapMethods` on the class). Every other attribute
//! is skipped by its declared length.
//!
//! Instruction streams are not decoded here. [`Code::code`] borrows the raw bytecode so callers
//! can walk it lazily with [`crate::disassembler::decode_stream`].
//!
//! # Key Components
//!
//! - [`ClassFile`] - The parsed class
//! - [`ConstantPool`] / [`Constant`] - Symbolic references and literals
//! - [`FieldInfo`] / [`MethodInfo`] / [`Code`] - Declared members
//! - [`BootstrapMethod`] - Entries of the `BootstrapMethods` attribute
//! - [`descriptor`] - Field and method descriptor decoding
//! - [`AccessFlags`] / [`HandleKind`] - Flag sets and method-handle reference kinds
//!
//! # Examples
//!
//! ```rust
//! use usagescope::assembly::ClassAssembler;
//! use usagescope::classfile::{AccessFlags, ClassFile};
//!
//! let bytes = ClassAssembler::new("net/minecraft/Foo")
//!     .field(AccessFlags::PRIVATE, "bar", "Lnet/minecraft/Bar;")
//!     .finish()?;
//!
//! let class = ClassFile::parse(&bytes)?;
//! assert_eq!(class.name()?, "net/minecraft/Foo");
//! assert_eq!(class.super_name()?, Some("java/lang/Object"));
//! assert_eq!(class.fields.len(), 1);
//! assert_eq!(class.utf8(class.fields[0].name_index)?, "bar");
//! # Ok::<(), usagescope::Error>(())
//! ```

pub mod constpool;
pub mod descriptor;
mod flags;
mod handle;

pub use constpool::{
    Constant, ConstantPool, ConstantTag, DynamicCallSite, MemberRef, MemberRefKind,
    MethodHandleRef,
};
pub use flags::AccessFlags;
pub use handle::HandleKind;

use tracing::debug;

use crate::{file::parser::Parser, Error, Result};

/// Magic number every class file starts with
pub const CLASS_MAGIC: u32 = 0xCAFE_BABE;

/// One row of a method's exception table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionHandler {
    /// Start of the protected range (inclusive)
    pub start_pc: u16,
    /// End of the protected range (exclusive)
    pub end_pc: u16,
    /// Start of the handler
    pub handler_pc: u16,
    /// `Class` index of the caught type, `0` for `finally`
    pub catch_type: u16,
}

/// The `Code` attribute of a method.
#[derive(Debug, Clone)]
pub struct Code<'a> {
    /// Maximum operand stack depth
    pub max_stack: u16,
    /// Number of local variable slots
    pub max_locals: u16,
    /// Raw bytecode, borrowed from the input
    pub code: &'a [u8],
    /// Exception handlers in declaration order
    pub exception_table: Vec<ExceptionHandler>,
}

/// A declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldInfo {
    /// Access flags
    pub access_flags: AccessFlags,
    /// `Utf8` index of the field name
    pub name_index: u16,
    /// `Utf8` index of the field descriptor
    pub descriptor_index: u16,
}

/// A declared method.
#[derive(Debug, Clone)]
pub struct MethodInfo<'a> {
    /// Access flags
    pub access_flags: AccessFlags,
    /// `Utf8` index of the method name
    pub name_index: u16,
    /// `Utf8` index of the method descriptor
    pub descriptor_index: u16,
    /// The method body; `None` for abstract and native methods
    pub code: Option<Code<'a>>,
}

/// An entry of the `BootstrapMethods` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapMethod {
    /// `MethodHandle` index of the bootstrap method
    pub method_ref: u16,
    /// Constant-pool indices of the static bootstrap arguments
    pub arguments: Vec<u16>,
}

/// A parsed class file.
///
/// The structure borrows the input buffer: bytecode and (valid UTF-8) strings are not copied.
#[derive(Debug, Clone)]
pub struct ClassFile<'a> {
    /// Minor version
    pub minor_version: u16,
    /// Major version (52 = Java 8, 61 = Java 17, ...)
    pub major_version: u16,
    /// The constant pool
    pub constant_pool: ConstantPool<'a>,
    /// Class access flags
    pub access_flags: AccessFlags,
    /// `Class` index of this class
    pub this_class: u16,
    /// `Class` index of the superclass, `0` for `java/lang/Object` and module-info
    pub super_class: u16,
    /// `Class` indices of the direct superinterfaces
    pub interfaces: Vec<u16>,
    /// Declared fields
    pub fields: Vec<FieldInfo>,
    /// Declared methods
    pub methods: Vec<MethodInfo<'a>>,
    /// Contents of the `BootstrapMethods` attribute, empty if absent
    pub bootstrap_methods: Vec<BootstrapMethod>,
}

impl<'a> ClassFile<'a> {
    /// Parse the structure of a class file.
    ///
    /// # Arguments
    /// * `data` - The complete class file
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidMagic`] if `data` does not start with `0xCAFEBABE`,
    /// [`crate::Error::OutOfBounds`] on truncated input and [`crate::Error::Malformed`] for
    /// any other structural problem. Bytes after the last class attribute are ignored.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let mut parser = Parser::new(data);

        let magic = parser.read_be::<u32>()?;
        if magic != CLASS_MAGIC {
            return Err(Error::InvalidMagic(magic));
        }

        let minor_version = parser.read_be::<u16>()?;
        let major_version = parser.read_be::<u16>()?;
        let constant_pool = ConstantPool::parse(&mut parser)?;
        let access_flags = AccessFlags::from_bits_retain(parser.read_be::<u16>()?);
        let this_class = parser.read_be::<u16>()?;
        let super_class = parser.read_be::<u16>()?;

        let interface_count = parser.read_be::<u16>()?;
        let mut interfaces = Vec::with_capacity(interface_count as usize);
        for _ in 0..interface_count {
            interfaces.push(parser.read_be::<u16>()?);
        }

        let field_count = parser.read_be::<u16>()?;
        let mut fields = Vec::with_capacity(field_count as usize);
        for _ in 0..field_count {
            let field = FieldInfo {
                access_flags: AccessFlags::from_bits_retain(parser.read_be::<u16>()?),
                name_index: parser.read_be::<u16>()?,
                descriptor_index: parser.read_be::<u16>()?,
            };
            skip_attributes(&mut parser)?;
            fields.push(field);
        }

        let method_count = parser.read_be::<u16>()?;
        let mut methods = Vec::with_capacity(method_count as usize);
        for _ in 0..method_count {
            let access_flags = AccessFlags::from_bits_retain(parser.read_be::<u16>()?);
            let name_index = parser.read_be::<u16>()?;
            let descriptor_index = parser.read_be::<u16>()?;

            let mut code = None;
            let attribute_count = parser.read_be::<u16>()?;
            for _ in 0..attribute_count {
                let (name, body) = read_attribute(&mut parser, &constant_pool)?;
                if name == "Code" {
                    if code.is_some() {
                        return Err(malformed_error!("Method has more than one Code attribute"));
                    }
                    code = Some(parse_code(body)?);
                }
            }

            methods.push(MethodInfo {
                access_flags,
                name_index,
                descriptor_index,
                code,
            });
        }

        let mut bootstrap_methods = Vec::new();
        let attribute_count = parser.read_be::<u16>()?;
        for _ in 0..attribute_count {
            let (name, body) = read_attribute(&mut parser, &constant_pool)?;
            if name == "BootstrapMethods" {
                bootstrap_methods = parse_bootstrap_methods(body)?;
            }
        }

        if parser.has_more_data() {
            debug!(
                trailing = parser.len() - parser.pos(),
                "ignoring bytes after the class file"
            );
        }

        Ok(ClassFile {
            minor_version,
            major_version,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            bootstrap_methods,
        })
    }

    /// Internal name of this class.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `this_class` does not resolve to a class name.
    pub fn name(&self) -> Result<&str> {
        self.constant_pool.class_name(self.this_class)
    }

    /// Internal name of the superclass, `None` for `java/lang/Object`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `super_class` is set but dangling.
    pub fn super_name(&self) -> Result<Option<&str>> {
        if self.super_class == 0 {
            return Ok(None);
        }
        self.constant_pool.class_name(self.super_class).map(Some)
    }

    /// Resolve a `Utf8` constant, as used by member names and descriptors.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the index does not name a `Utf8` entry.
    pub fn utf8(&self, index: u16) -> Result<&str> {
        self.constant_pool.utf8(index)
    }

    /// Look up an entry of the `BootstrapMethods` attribute.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the class has no such entry.
    pub fn bootstrap_method(&self, index: u16) -> Result<&BootstrapMethod> {
        self.bootstrap_methods.get(index as usize).ok_or_else(|| {
            malformed_error!(
                "Bootstrap method {} out of range ({} entries)",
                index,
                self.bootstrap_methods.len()
            )
        })
    }
}

/// Reads one `attribute_info`, returning its resolved name and body.
fn read_attribute<'a, 'p>(
    parser: &mut Parser<'a>,
    pool: &'p ConstantPool<'a>,
) -> Result<(&'p str, &'a [u8])> {
    let name_index = parser.read_be::<u16>()?;
    let length = parser.read_be::<u32>()?;
    let body = parser.read_bytes(length as usize)?;
    Ok((pool.utf8(name_index)?, body))
}

fn skip_attributes(parser: &mut Parser<'_>) -> Result<()> {
    let attribute_count = parser.read_be::<u16>()?;
    for _ in 0..attribute_count {
        parser.advance_by(2)?;
        let length = parser.read_be::<u32>()?;
        parser.advance_by(length as usize)?;
    }
    Ok(())
}

fn parse_code(body: &[u8]) -> Result<Code<'_>> {
    let mut parser = Parser::new(body);

    let max_stack = parser.read_be::<u16>()?;
    let max_locals = parser.read_be::<u16>()?;
    let code_length = parser.read_be::<u32>()?;
    if code_length == 0 {
        return Err(malformed_error!("Code attribute with empty bytecode"));
    }
    let code = parser.read_bytes(code_length as usize)?;

    let handler_count = parser.read_be::<u16>()?;
    let mut exception_table = Vec::with_capacity(handler_count as usize);
    for _ in 0..handler_count {
        exception_table.push(ExceptionHandler {
            start_pc: parser.read_be::<u16>()?,
            end_pc: parser.read_be::<u16>()?,
            handler_pc: parser.read_be::<u16>()?,
            catch_type: parser.read_be::<u16>()?,
        });
    }

    skip_attributes(&mut parser)?;
    if parser.has_more_data() {
        return Err(malformed_error!("Code attribute length mismatch"));
    }

    Ok(Code {
        max_stack,
        max_locals,
        code,
        exception_table,
    })
}

fn parse_bootstrap_methods(body: &[u8]) -> Result<Vec<BootstrapMethod>> {
    let mut parser = Parser::new(body);

    let count = parser.read_be::<u16>()?;
    let mut methods = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let method_ref = parser.read_be::<u16>()?;
        let argument_count = parser.read_be::<u16>()?;
        let mut arguments = Vec::with_capacity(argument_count as usize);
        for _ in 0..argument_count {
            arguments.push(parser.read_be::<u16>()?);
        }
        methods.push(BootstrapMethod {
            method_ref,
            arguments,
        });
    }

    if parser.has_more_data() {
        return Err(malformed_error!("BootstrapMethods attribute length mismatch"));
    }
    Ok(methods)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::{BootstrapArgument, ClassAssembler, HandleConstant},
        disassembler::opcodes,
    };

    #[test]
    fn invalid_magic() {
        let result = ClassFile::parse(&[0xDE, 0xAD, 0xBE, 0xEF, 0, 0, 0, 52]);
        assert!(matches!(result, Err(Error::InvalidMagic(0xDEAD_BEEF))));

        let result = ClassFile::parse(&[0xCA, 0xFE]);
        assert!(matches!(result, Err(Error::OutOfBounds { .. })));
    }

    #[test]
    fn members_and_code() {
        let bytes = ClassAssembler::new("a/Foo")
            .field(AccessFlags::PUBLIC | AccessFlags::STATIC, "count", "I")
            .method(AccessFlags::PUBLIC, "bar", "()V", |code| {
                code.field_insn(opcodes::GETSTATIC, "a/Baz", "x", "I")?;
                code.method_insn(opcodes::INVOKESTATIC, "a/Qux", "m", "(I)V")?;
                code.emit(opcodes::RETURN)?;
                Ok(())
            })
            .unwrap()
            .abstract_method(AccessFlags::PUBLIC | AccessFlags::ABSTRACT, "baz", "()I")
            .finish()
            .unwrap();

        let class = ClassFile::parse(&bytes).unwrap();
        assert_eq!(class.name().unwrap(), "a/Foo");
        assert_eq!(class.major_version, 52);
        assert!(class.interfaces.is_empty());

        assert_eq!(class.fields.len(), 1);
        let field = class.fields[0];
        assert!(field.access_flags.contains(AccessFlags::STATIC));
        assert_eq!(class.utf8(field.descriptor_index).unwrap(), "I");

        assert_eq!(class.methods.len(), 2);
        let bar = &class.methods[0];
        assert_eq!(class.utf8(bar.name_index).unwrap(), "bar");
        let code = bar.code.as_ref().unwrap();
        assert_eq!(code.code.len(), 7);
        assert_eq!(code.code[0], opcodes::GETSTATIC);
        assert!(class.methods[1].code.is_none());
        assert!(class.bootstrap_methods.is_empty());
    }

    #[test]
    fn bootstrap_methods_attribute() {
        let bytes = ClassAssembler::new("a/Foo")
            .method(AccessFlags::PUBLIC, "run", "()V", |code| {
                code.invokedynamic(
                    "get",
                    "()Ljava/util/function/Supplier;",
                    HandleConstant::new(
                        HandleKind::InvokeStatic,
                        "java/lang/invoke/LambdaMetafactory",
                        "metafactory",
                        "()V",
                    ),
                    &[BootstrapArgument::MethodType("()Ljava/lang/Object;")],
                )?;
                code.emit(opcodes::POP)?;
                code.emit(opcodes::RETURN)?;
                Ok(())
            })
            .unwrap()
            .finish()
            .unwrap();

        let class = ClassFile::parse(&bytes).unwrap();
        assert_eq!(class.bootstrap_methods.len(), 1);
        let bootstrap = class.bootstrap_method(0).unwrap();
        assert_eq!(bootstrap.arguments.len(), 1);
        let handle = class
            .constant_pool
            .method_handle(bootstrap.method_ref)
            .unwrap();
        assert_eq!(handle.member.name, "metafactory");
        assert!(class.bootstrap_method(1).is_err());
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let mut bytes = ClassAssembler::new("a/Foo")
            .field(AccessFlags::PRIVATE, "bar", "La/Bar;")
            .finish()
            .unwrap();
        bytes.extend_from_slice(&[0xCA, 0xFE, 0x00]);

        let class = ClassFile::parse(&bytes).unwrap();
        assert_eq!(class.name().unwrap(), "a/Foo");
        assert_eq!(class.fields.len(), 1);
    }

    #[test]
    fn truncated_everywhere() {
        let bytes = ClassAssembler::new("a/Foo")
            .field(AccessFlags::PUBLIC, "f", "La/Bar;")
            .method(AccessFlags::PUBLIC, "m", "()V", |code| {
                code.emit(opcodes::RETURN)?;
                Ok(())
            })
            .unwrap()
            .finish()
            .unwrap();

        for length in 0..bytes.len() {
            assert!(
                ClassFile::parse(&bytes[..length]).is_err(),
                "prefix of {length} bytes parsed"
            );
        }
    }
}
