//! Whole-class assembly.

use crate::{
    assembly::{
        code::{parameter_slots, push_bootstrap_methods, BootstrapEntry, CodeEncoder},
        pool::ConstantPoolBuilder,
    },
    classfile::{AccessFlags, CLASS_MAGIC},
    file::io::push_be,
    Result,
};

const DEFAULT_MAJOR_VERSION: u16 = 52;
const OBJECT: &str = "java/lang/Object";

#[derive(Debug, Clone)]
struct FieldEntry {
    access: AccessFlags,
    name: String,
    descriptor: String,
}

#[derive(Debug, Clone)]
struct CodeBody {
    max_stack: u16,
    max_locals: u16,
    code: Vec<u8>,
}

#[derive(Debug, Clone)]
struct MethodEntry {
    access: AccessFlags,
    name: String,
    descriptor: String,
    code: Option<CodeBody>,
}

/// Builder producing the bytes of a class file.
///
/// Declarations are collected in order and serialized by [`ClassAssembler::finish`]. Only what
/// the indexer reads is emitted: the constant pool, the class header, fields and methods with
/// their `Code` attributes, and a `BootstrapMethods` attribute when a call site needs one.
/// No stack maps are produced, so the output is meant for analysis, not for class loading.
///
/// # Examples
///
/// ```rust
/// use usagescope::assembly::ClassAssembler;
/// use usagescope::classfile::{AccessFlags, ClassFile};
/// use usagescope::disassembler::opcodes;
///
/// let bytes = ClassAssembler::new("a/Foo")
///     .super_class("a/Base")
///     .interface("java/lang/Runnable")
///     .field(AccessFlags::PRIVATE, "bar", "La/Bar;")
///     .method(AccessFlags::PUBLIC, "run", "()V", |code| {
///         code.emit(opcodes::RETURN)?;
///         Ok(())
///     })?
///     .finish()?;
///
/// let class = ClassFile::parse(&bytes)?;
/// assert_eq!(class.super_name()?, Some("a/Base"));
/// assert_eq!(class.interfaces.len(), 1);
/// # Ok::<(), usagescope::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct ClassAssembler {
    pool: ConstantPoolBuilder,
    bootstrap_methods: Vec<BootstrapEntry>,
    minor_version: u16,
    major_version: u16,
    access: AccessFlags,
    name: String,
    super_class: Option<String>,
    interfaces: Vec<String>,
    fields: Vec<FieldEntry>,
    methods: Vec<MethodEntry>,
}

impl ClassAssembler {
    /// Start a public class named `name` extending `java/lang/Object`, version 52.0.
    #[must_use]
    pub fn new(name: &str) -> Self {
        ClassAssembler {
            pool: ConstantPoolBuilder::new(),
            bootstrap_methods: Vec::new(),
            minor_version: 0,
            major_version: DEFAULT_MAJOR_VERSION,
            access: AccessFlags::PUBLIC | AccessFlags::SUPER,
            name: name.to_string(),
            super_class: Some(OBJECT.to_string()),
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Set the class access flags.
    #[must_use]
    pub fn access(mut self, access: AccessFlags) -> Self {
        self.access = access;
        self
    }

    /// Set the class-file version.
    #[must_use]
    pub fn version(mut self, major: u16, minor: u16) -> Self {
        self.major_version = major;
        self.minor_version = minor;
        self
    }

    /// Replace the superclass.
    #[must_use]
    pub fn super_class(mut self, name: &str) -> Self {
        self.super_class = Some(name.to_string());
        self
    }

    /// Write `0` as the superclass index, as only `java/lang/Object` itself does.
    #[must_use]
    pub fn without_super_class(mut self) -> Self {
        self.super_class = None;
        self
    }

    /// Add an implemented interface.
    #[must_use]
    pub fn interface(mut self, name: &str) -> Self {
        self.interfaces.push(name.to_string());
        self
    }

    /// Declare a field. The descriptor is written as given.
    #[must_use]
    pub fn field(mut self, access: AccessFlags, name: &str, descriptor: &str) -> Self {
        self.fields.push(FieldEntry {
            access,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        });
        self
    }

    /// Declare a method with a body written by `body`.
    ///
    /// `max_locals` starts at the slots taken by the parameters, plus one for `this` unless
    /// `access` contains [`AccessFlags::STATIC`].
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedDescriptor`] if `descriptor` cannot be decoded,
    /// [`crate::Error::Malformed`] if the body is empty, and any error `body` returns.
    pub fn method<F>(
        mut self,
        access: AccessFlags,
        name: &str,
        descriptor: &str,
        body: F,
    ) -> Result<Self>
    where
        F: FnOnce(&mut CodeEncoder<'_>) -> Result<()>,
    {
        let receiver = u16::from(!access.contains(AccessFlags::STATIC));
        let max_locals = parameter_slots(descriptor)?.saturating_add(receiver);

        let mut encoder = CodeEncoder::new(&mut self.pool, &mut self.bootstrap_methods, max_locals);
        body(&mut encoder)?;
        let (max_stack, max_locals, code) = encoder.into_parts();

        if code.is_empty() {
            return Err(malformed_error!("Method {}{} has no code", name, descriptor));
        }

        self.methods.push(MethodEntry {
            access,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            code: Some(CodeBody {
                max_stack,
                max_locals,
                code,
            }),
        });
        Ok(self)
    }

    /// Declare a method without a `Code` attribute, such as an abstract or native method.
    #[must_use]
    pub fn abstract_method(mut self, access: AccessFlags, name: &str, descriptor: &str) -> Self {
        self.methods.push(MethodEntry {
            access,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            code: None,
        });
        self
    }

    /// Serialize the class.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the constant pool or one of the tables outgrows
    /// the class-file format.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        let pool = &mut self.pool;
        let this_class = pool.class(&self.name)?;
        let super_class = match &self.super_class {
            Some(name) => pool.class(name)?,
            None => 0,
        };
        let interfaces = self
            .interfaces
            .iter()
            .map(|name| pool.class(name))
            .collect::<Result<Vec<_>>>()?;
        let fields = self
            .fields
            .iter()
            .map(|field| {
                Ok((
                    field.access,
                    pool.utf8(&field.name)?,
                    pool.utf8(&field.descriptor)?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        let methods = self
            .methods
            .iter()
            .map(|method| {
                Ok((
                    method.access,
                    pool.utf8(&method.name)?,
                    pool.utf8(&method.descriptor)?,
                    method.code.as_ref(),
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        let code_attribute = if methods.iter().any(|method| method.3.is_some()) {
            pool.utf8("Code")?
        } else {
            0
        };
        let bootstrap_attribute = if self.bootstrap_methods.is_empty() {
            None
        } else {
            Some(pool.utf8("BootstrapMethods")?)
        };

        let mut out = Vec::new();
        push_be(&mut out, CLASS_MAGIC);
        push_be(&mut out, self.minor_version);
        push_be(&mut out, self.major_version);
        push_be(&mut out, pool.count());
        out.extend_from_slice(pool.bytes());

        push_be(&mut out, self.access.bits());
        push_be(&mut out, this_class);
        push_be(&mut out, super_class);
        push_be(&mut out, table_length(interfaces.len(), "interfaces")?);
        for interface in interfaces {
            push_be(&mut out, interface);
        }

        push_be(&mut out, table_length(fields.len(), "fields")?);
        for (access, name, descriptor) in fields {
            push_be(&mut out, access.bits());
            push_be(&mut out, name);
            push_be(&mut out, descriptor);
            push_be(&mut out, 0u16);
        }

        push_be(&mut out, table_length(methods.len(), "methods")?);
        for (access, name, descriptor, code) in methods {
            push_be(&mut out, access.bits());
            push_be(&mut out, name);
            push_be(&mut out, descriptor);
            match code {
                Some(body) => {
                    push_be(&mut out, 1u16);
                    push_code_attribute(&mut out, code_attribute, body)?;
                }
                None => push_be(&mut out, 0u16),
            }
        }

        match bootstrap_attribute {
            Some(attribute_name) => {
                let mut attribute = Vec::new();
                push_bootstrap_methods(&mut attribute, &self.bootstrap_methods)?;

                push_be(&mut out, 1u16);
                push_be(&mut out, attribute_name);
                push_be(&mut out, attribute_length(attribute.len())?);
                out.extend_from_slice(&attribute);
            }
            None => push_be(&mut out, 0u16),
        }

        Ok(out)
    }
}

fn push_code_attribute(out: &mut Vec<u8>, name: u16, body: &CodeBody) -> Result<()> {
    let code_length = attribute_length(body.code.len())?;

    push_be(out, name);
    // max_stack, max_locals, code_length, code, exception_table_length, attributes_count
    push_be(out, attribute_length(2 + 2 + 4 + body.code.len() + 2 + 2)?);
    push_be(out, body.max_stack);
    push_be(out, body.max_locals);
    push_be(out, code_length);
    out.extend_from_slice(&body.code);
    push_be(out, 0u16);
    push_be(out, 0u16);
    Ok(())
}

fn table_length(length: usize, table: &str) -> Result<u16> {
    u16::try_from(length).map_err(|_| malformed_error!("Too many {}: {}", table, length))
}

fn attribute_length(length: usize) -> Result<u32> {
    u32::try_from(length).map_err(|_| malformed_error!("Attribute of {} bytes is too long", length))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{classfile::ClassFile, disassembler::opcodes, Error};

    #[test]
    fn minimal_class() {
        let bytes = ClassAssembler::new("a/Foo").finish().unwrap();
        let class = ClassFile::parse(&bytes).unwrap();
        assert_eq!(class.name().unwrap(), "a/Foo");
        assert_eq!(class.super_name().unwrap(), Some("java/lang/Object"));
        assert_eq!(class.access_flags, AccessFlags::PUBLIC | AccessFlags::SUPER);
        assert!(class.fields.is_empty());
        assert!(class.methods.is_empty());
    }

    #[test]
    fn header_options() {
        let bytes = ClassAssembler::new("java/lang/Object")
            .without_super_class()
            .access(AccessFlags::PUBLIC | AccessFlags::INTERFACE | AccessFlags::ABSTRACT)
            .interface("a/One")
            .interface("a/Two")
            .version(65, 0)
            .finish()
            .unwrap();

        let class = ClassFile::parse(&bytes).unwrap();
        assert_eq!(class.super_name().unwrap(), None);
        assert_eq!(class.major_version, 65);
        assert!(class.access_flags.contains(AccessFlags::INTERFACE));
        let names: Vec<_> = class
            .interfaces
            .iter()
            .map(|&index| class.constant_pool.class_name(index).unwrap())
            .collect();
        assert_eq!(names, ["a/One", "a/Two"]);
    }

    #[test]
    fn default_max_locals() {
        let bytes = ClassAssembler::new("a/Foo")
            .method(AccessFlags::PUBLIC, "instance", "(JI)V", |code| {
                code.emit(opcodes::RETURN)?;
                Ok(())
            })
            .unwrap()
            .method(AccessFlags::STATIC, "statik", "(D)V", |code| {
                code.emit(opcodes::RETURN)?.max_locals(9);
                Ok(())
            })
            .unwrap()
            .finish()
            .unwrap();

        let class = ClassFile::parse(&bytes).unwrap();
        let locals: Vec<_> = class
            .methods
            .iter()
            .map(|method| method.code.as_ref().unwrap().max_locals)
            .collect();
        assert_eq!(locals, [4, 9]);
    }

    #[test]
    fn empty_body_is_rejected() {
        let result = ClassAssembler::new("a/Foo").method(AccessFlags::PUBLIC, "m", "()V", |_| Ok(()));
        assert!(matches!(result, Err(Error::Malformed { .. })));
    }

    #[test]
    fn body_errors_propagate() {
        let result = ClassAssembler::new("a/Foo").method(AccessFlags::PUBLIC, "m", "()V", |code| {
            code.method_insn(opcodes::INVOKEINTERFACE, "a/Api", "call", "(Q)V")?;
            Ok(())
        });
        assert!(matches!(result, Err(Error::MalformedDescriptor(_))));
    }
}
