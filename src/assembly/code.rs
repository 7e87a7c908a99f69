//! Bytecode encoding for a single method body.

use crate::{
    assembly::pool::ConstantPoolBuilder,
    classfile::{
        descriptor::{parse_method_descriptor, FieldType, PrimitiveType},
        HandleKind,
    },
    disassembler::opcodes,
    file::io::push_be,
    index::{ALT_METAFACTORY, LAMBDA_METAFACTORY, METAFACTORY},
    Result,
};

/// Descriptor of `LambdaMetafactory.metafactory`
pub const METAFACTORY_DESCRIPTOR: &str = "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodHandle;Ljava/lang/invoke/MethodType;)Ljava/lang/invoke/CallSite;";

/// Descriptor of `LambdaMetafactory.altMetafactory`
pub const ALT_METAFACTORY_DESCRIPTOR: &str = "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/MethodType;[Ljava/lang/Object;)Ljava/lang/invoke/CallSite;";

const MAX_CODE_LENGTH: usize = 65535;

/// A `CONSTANT_MethodHandle` to be placed in the pool.
///
/// The reference kind is kept raw so that handles with invalid kinds can be produced; the
/// member reference it points at is a `Fieldref` for kinds 1 to 4, an `InterfaceMethodref` for
/// kind 9 and a `Methodref` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleConstant<'b> {
    /// Raw reference kind
    pub kind: u8,
    /// Internal name of the member's class
    pub owner: &'b str,
    /// Member name
    pub name: &'b str,
    /// Member descriptor
    pub descriptor: &'b str,
}

impl<'b> HandleConstant<'b> {
    /// A handle of a valid kind.
    #[must_use]
    pub fn new(kind: HandleKind, owner: &'b str, name: &'b str, descriptor: &'b str) -> Self {
        Self::raw(kind.tag(), owner, name, descriptor)
    }

    /// A handle with an arbitrary, possibly invalid, reference kind.
    #[must_use]
    pub fn raw(kind: u8, owner: &'b str, name: &'b str, descriptor: &'b str) -> Self {
        HandleConstant {
            kind,
            owner,
            name,
            descriptor,
        }
    }

    pub(crate) fn intern(&self, pool: &mut ConstantPoolBuilder) -> Result<u16> {
        let reference = match self.kind {
            1..=4 => pool.field_ref(self.owner, self.name, self.descriptor)?,
            9 => pool.interface_method_ref(self.owner, self.name, self.descriptor)?,
            _ => pool.method_ref(self.owner, self.name, self.descriptor)?,
        };
        pool.method_handle(self.kind, reference)
    }
}

/// A static argument of a bootstrap method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapArgument<'b> {
    /// `CONSTANT_MethodType` with the given descriptor
    MethodType(&'b str),
    /// `CONSTANT_MethodHandle`
    Handle(HandleConstant<'b>),
    /// `CONSTANT_Class`
    Class(&'b str),
    /// `CONSTANT_String`
    String(&'b str),
    /// `CONSTANT_Integer`
    Integer(i32),
}

impl BootstrapArgument<'_> {
    fn intern(&self, pool: &mut ConstantPoolBuilder) -> Result<u16> {
        match self {
            BootstrapArgument::MethodType(descriptor) => pool.method_type(descriptor),
            BootstrapArgument::Handle(handle) => handle.intern(pool),
            BootstrapArgument::Class(name) => pool.class(name),
            BootstrapArgument::String(value) => pool.string(value),
            BootstrapArgument::Integer(value) => pool.integer(*value),
        }
    }
}

/// A resolved `BootstrapMethods` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BootstrapEntry {
    pub method_ref: u16,
    pub arguments: Vec<u16>,
}

/// Appends instructions to one method's `Code` attribute.
///
/// Every method interns what it references into the class's constant pool and returns
/// `Result<&mut Self>`, so a body can be written as a sequence of `?`-terminated calls.
/// Opcodes passed to [`CodeEncoder::emit`] and [`CodeEncoder::emit_with`] are not checked,
/// which allows deliberately broken bytecode to be produced.
///
/// # Examples
///
/// ```rust
/// use usagescope::assembly::ClassAssembler;
/// use usagescope::classfile::AccessFlags;
/// use usagescope::disassembler::opcodes;
///
/// let bytes = ClassAssembler::new("a/Foo")
///     .method(AccessFlags::PUBLIC | AccessFlags::STATIC, "twice", "(I)I", |code| {
///         code.emit_with(opcodes::ILOAD, &[0])?
///             .emit(opcodes::ICONST_2)?
///             .emit(opcodes::IMUL)?
///             .emit(opcodes::IRETURN)?
///             .max_stack(2);
///         Ok(())
///     })?
///     .finish()?;
/// assert_eq!(&bytes[..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
/// # Ok::<(), usagescope::Error>(())
/// ```
pub struct CodeEncoder<'p> {
    pool: &'p mut ConstantPoolBuilder,
    bootstrap_methods: &'p mut Vec<BootstrapEntry>,
    code: Vec<u8>,
    max_stack: u16,
    max_locals: u16,
}

impl<'p> CodeEncoder<'p> {
    pub(crate) fn new(
        pool: &'p mut ConstantPoolBuilder,
        bootstrap_methods: &'p mut Vec<BootstrapEntry>,
        max_locals: u16,
    ) -> Self {
        CodeEncoder {
            pool,
            bootstrap_methods,
            code: Vec::new(),
            max_stack: 8,
            max_locals,
        }
    }

    pub(crate) fn into_parts(self) -> (u16, u16, Vec<u8>) {
        (self.max_stack, self.max_locals, self.code)
    }

    /// Current length of the bytecode, which is also the offset of the next instruction.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.code.len()
    }

    /// Override the operand stack size. Defaults to 8.
    pub fn max_stack(&mut self, max_stack: u16) -> &mut Self {
        self.max_stack = max_stack;
        self
    }

    /// Override the local variable count. Defaults to the slots taken by `this` and the
    /// parameters.
    pub fn max_locals(&mut self, max_locals: u16) -> &mut Self {
        self.max_locals = max_locals;
        self
    }

    /// Append a single opcode without operands.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the method exceeds 65535 bytes of code.
    pub fn emit(&mut self, opcode: u8) -> Result<&mut Self> {
        self.emit_with(opcode, &[])
    }

    /// Append an opcode followed by raw operand bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the method exceeds 65535 bytes of code.
    pub fn emit_with(&mut self, opcode: u8, operands: &[u8]) -> Result<&mut Self> {
        if self.code.len() + 1 + operands.len() > MAX_CODE_LENGTH {
            return Err(malformed_error!(
                "Method code exceeds {} bytes",
                MAX_CODE_LENGTH
            ));
        }

        self.code.push(opcode);
        self.code.extend_from_slice(operands);
        Ok(self)
    }

    fn emit_index(&mut self, opcode: u8, index: u16) -> Result<&mut Self> {
        self.emit_with(opcode, &index.to_be_bytes())
    }

    /// `getstatic`, `putstatic`, `getfield` or `putfield` on `owner.name:descriptor`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the pool or the code is full.
    pub fn field_insn(
        &mut self,
        opcode: u8,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<&mut Self> {
        let index = self.pool.field_ref(owner, name, descriptor)?;
        self.emit_index(opcode, index)
    }

    /// An invocation of `owner.name:descriptor`.
    ///
    /// `invokeinterface` references an `InterfaceMethodref` and carries its argument slot
    /// count; the other invokes reference a `Methodref`.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedDescriptor`] if an `invokeinterface` descriptor cannot
    /// be decoded, and [`crate::Error::Malformed`] if the pool or the code is full.
    pub fn method_insn(
        &mut self,
        opcode: u8,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<&mut Self> {
        if opcode == opcodes::INVOKEINTERFACE {
            let count = parameter_slots(descriptor)? + 1;
            let Ok(count) = u8::try_from(count) else {
                return Err(malformed_error!(
                    "Too many arguments for invokeinterface: {}",
                    count
                ));
            };
            let index = self.pool.interface_method_ref(owner, name, descriptor)?;
            let [high, low] = index.to_be_bytes();
            return self.emit_with(opcode, &[high, low, count, 0]);
        }

        let index = self.pool.method_ref(owner, name, descriptor)?;
        self.emit_index(opcode, index)
    }

    /// `new`, `anewarray`, `checkcast` or `instanceof` on a class or array type.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the pool or the code is full.
    pub fn type_insn(&mut self, opcode: u8, class: &str) -> Result<&mut Self> {
        let index = self.pool.class(class)?;
        self.emit_index(opcode, index)
    }

    fn ldc(&mut self, index: u16) -> Result<&mut Self> {
        match u8::try_from(index) {
            Ok(short) => self.emit_with(opcodes::LDC, &[short]),
            Err(_) => self.emit_index(opcodes::LDC_W, index),
        }
    }

    /// Load a class literal, using `ldc_w` when the constant lies beyond index 255.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the pool or the code is full.
    pub fn ldc_class(&mut self, class: &str) -> Result<&mut Self> {
        let index = self.pool.class(class)?;
        self.ldc(index)
    }

    /// Load a string literal.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the pool or the code is full.
    pub fn ldc_string(&mut self, value: &str) -> Result<&mut Self> {
        let index = self.pool.string(value)?;
        self.ldc(index)
    }

    /// Load an `int` constant from the pool.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the pool or the code is full.
    pub fn ldc_int(&mut self, value: i32) -> Result<&mut Self> {
        let index = self.pool.integer(value)?;
        self.ldc(index)
    }

    /// An `invokedynamic` call site bootstrapped by `bootstrap` with static `arguments`.
    ///
    /// Identical bootstrap rows are shared between call sites.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the pool, the bootstrap table or the code is
    /// full.
    pub fn invokedynamic(
        &mut self,
        name: &str,
        descriptor: &str,
        bootstrap: HandleConstant<'_>,
        arguments: &[BootstrapArgument<'_>],
    ) -> Result<&mut Self> {
        let entry = BootstrapEntry {
            method_ref: bootstrap.intern(self.pool)?,
            arguments: arguments
                .iter()
                .map(|argument| argument.intern(self.pool))
                .collect::<Result<_>>()?,
        };

        let position = match self.bootstrap_methods.iter().position(|e| *e == entry) {
            Some(position) => position,
            None => {
                self.bootstrap_methods.push(entry);
                self.bootstrap_methods.len() - 1
            }
        };
        let Ok(bootstrap_index) = u16::try_from(position) else {
            return Err(malformed_error!("Too many bootstrap methods"));
        };

        let index = self.pool.invoke_dynamic(bootstrap_index, name, descriptor)?;
        let [high, low] = index.to_be_bytes();
        self.emit_with(opcodes::INVOKEDYNAMIC, &[high, low, 0, 0])
    }

    /// A lambda or method reference created through `LambdaMetafactory.metafactory`.
    ///
    /// `name` and `descriptor` describe the call site (the functional interface method and
    /// the factory signature), `sam_descriptor` is the erased interface method type and
    /// `instantiated_descriptor` its specialization.
    ///
    /// # Errors
    /// See [`CodeEncoder::invokedynamic`].
    pub fn lambda(
        &mut self,
        name: &str,
        descriptor: &str,
        sam_descriptor: &str,
        implementation: HandleConstant<'_>,
        instantiated_descriptor: &str,
    ) -> Result<&mut Self> {
        self.invokedynamic(
            name,
            descriptor,
            HandleConstant::new(
                HandleKind::InvokeStatic,
                LAMBDA_METAFACTORY,
                METAFACTORY,
                METAFACTORY_DESCRIPTOR,
            ),
            &[
                BootstrapArgument::MethodType(sam_descriptor),
                BootstrapArgument::Handle(implementation),
                BootstrapArgument::MethodType(instantiated_descriptor),
            ],
        )
    }

    /// Like [`CodeEncoder::lambda`], through `altMetafactory` with `flags` as the fourth
    /// static argument.
    ///
    /// # Errors
    /// See [`CodeEncoder::invokedynamic`].
    pub fn alt_lambda(
        &mut self,
        name: &str,
        descriptor: &str,
        sam_descriptor: &str,
        implementation: HandleConstant<'_>,
        instantiated_descriptor: &str,
        flags: i32,
    ) -> Result<&mut Self> {
        self.invokedynamic(
            name,
            descriptor,
            HandleConstant::new(
                HandleKind::InvokeStatic,
                LAMBDA_METAFACTORY,
                ALT_METAFACTORY,
                ALT_METAFACTORY_DESCRIPTOR,
            ),
            &[
                BootstrapArgument::MethodType(sam_descriptor),
                BootstrapArgument::Handle(implementation),
                BootstrapArgument::MethodType(instantiated_descriptor),
                BootstrapArgument::Integer(flags),
            ],
        )
    }
}

/// Number of local variable slots the parameters of `descriptor` occupy.
pub(crate) fn parameter_slots(descriptor: &str) -> Result<u16> {
    let method = parse_method_descriptor(descriptor)?;
    let slots = method
        .parameters
        .iter()
        .map(|parameter| match parameter {
            FieldType::Primitive(PrimitiveType::Long | PrimitiveType::Double) => 2usize,
            _ => 1,
        })
        .sum::<usize>();

    u16::try_from(slots).map_err(|_| malformed_error!("Descriptor '{}' is too wide", descriptor))
}

pub(crate) fn push_bootstrap_methods(out: &mut Vec<u8>, entries: &[BootstrapEntry]) -> Result<()> {
    let count = u16::try_from(entries.len())
        .map_err(|_| malformed_error!("Too many bootstrap methods"))?;
    push_be(out, count);
    for entry in entries {
        push_be(out, entry.method_ref);
        let arguments = u16::try_from(entry.arguments.len())
            .map_err(|_| malformed_error!("Too many bootstrap arguments"))?;
        push_be(out, arguments);
        for &argument in &entry.arguments {
            push_be(out, argument);
        }
    }
    Ok(())
}
