//! The class indexing engine.
//!
//! [`index_class`] parses one class file and reports every reference its declarations and
//! bytecode make to other symbols:
//!
//! - each field: the class types of its descriptor, attributed to the field
//! - each method: the class types of its descriptor, attributed to the method
//! - field instructions: the accessed field
//! - `ldc`, `checkcast`, `instanceof` on a class constant: the class (array element type for
//!   array classes, nothing for primitive arrays)
//! - invocations: the invoked method, plus the owner class for `<init>`
//! - `invokedynamic` through `LambdaMetafactory`: the implementation member and the class
//!   types of the call-site, sam and instantiated descriptors
//!
//! All other instructions record nothing.

use tracing::debug;

use crate::{
    classfile::{
        descriptor::{parse_class_operand, parse_field_descriptor, parse_method_descriptor},
        ClassFile, Constant, HandleKind, MemberRef,
    },
    disassembler::{instructions, opcodes, Instruction},
    index::{symbol::Symbol, usages::UsageSink},
    Result,
};

/// Owner of the lambda bootstrap methods
pub const LAMBDA_METAFACTORY: &str = "java/lang/invoke/LambdaMetafactory";
/// Standard lambda bootstrap method name
pub const METAFACTORY: &str = "metafactory";
/// Lambda bootstrap method used for serializable lambdas and marker interfaces
pub const ALT_METAFACTORY: &str = "altMetafactory";

/// Parse `bytes` as a class file and report its references to `sink`.
///
/// Work stops at the first structural error; whatever was reported before it stays reported.
///
/// # Errors
/// Returns [`crate::Error::InvalidMagic`], [`crate::Error::Malformed`] or
/// [`crate::Error::OutOfBounds`] for damaged class files,
/// [`crate::Error::MalformedDescriptor`] for undecodable descriptors and
/// [`crate::Error::InvalidHandleTag`] for a lambda implementation handle with an unknown
/// reference kind.
///
/// # Examples
///
/// ```rust
/// use usagescope::assembly::ClassAssembler;
/// use usagescope::classfile::AccessFlags;
/// use usagescope::disassembler::opcodes;
/// use usagescope::{index_class, IndexConfig, UsageIndex};
///
/// let bytes = ClassAssembler::new("a/Foo")
///     .method(AccessFlags::PUBLIC, "bar", "()V", |code| {
///         code.method_insn(opcodes::INVOKESTATIC, "a/Qux", "m", "()V")?;
///         code.emit(opcodes::RETURN)?;
///         Ok(())
///     })?
///     .finish()?;
///
/// let mut index = UsageIndex::new(IndexConfig::with_namespaces(["a/"]));
/// index_class(&bytes, &mut index)?;
/// assert!(index.get_usages("m:a/Qux:m:()V").contains("m:a/Foo:bar:()V"));
/// # Ok::<(), usagescope::Error>(())
/// ```
pub fn index_class<S: UsageSink + ?Sized>(bytes: &[u8], sink: &mut S) -> Result<()> {
    let class = ClassFile::parse(bytes)?;
    let mut indexer = ClassIndexer {
        class: &class,
        owner: class.name()?,
        lambdas: sink.follows_lambdas(),
        sink,
    };

    indexer.index_fields()?;
    indexer.index_methods()?;

    debug!(
        class = indexer.owner,
        fields = class.fields.len(),
        methods = class.methods.len(),
        "indexed class"
    );
    Ok(())
}

struct ClassIndexer<'c, 'a, S: ?Sized> {
    class: &'c ClassFile<'a>,
    owner: &'c str,
    lambdas: bool,
    sink: &'c mut S,
}

impl<'c, 'a, S: UsageSink + ?Sized> ClassIndexer<'c, 'a, S> {
    fn index_fields(&mut self) -> Result<()> {
        let class = self.class;
        for field in &class.fields {
            let name = class.utf8(field.name_index)?;
            let descriptor = class.utf8(field.descriptor_index)?;
            let usage = Symbol::field(self.owner, name, descriptor).usage();

            if let Some(referenced) = parse_field_descriptor(descriptor)?.indexable_class() {
                self.record(&Symbol::class(referenced), &usage);
            }
        }
        Ok(())
    }

    fn index_methods(&mut self) -> Result<()> {
        let class = self.class;
        for method in &class.methods {
            let name = class.utf8(method.name_index)?;
            let descriptor = class.utf8(method.descriptor_index)?;
            let usage = Symbol::method(self.owner, name, descriptor).usage();

            self.index_method_descriptor(descriptor, &usage)?;

            if let Some(code) = &method.code {
                for instruction in instructions(code.code) {
                    self.index_instruction(&instruction?, &usage)?;
                }
            }
        }
        Ok(())
    }

    fn index_instruction(&mut self, instruction: &Instruction, caller: &str) -> Result<()> {
        let Some(index) = instruction.constant_index() else {
            return Ok(());
        };
        let class = self.class;
        let pool = &class.constant_pool;

        match instruction.opcode {
            opcodes::GETSTATIC | opcodes::PUTSTATIC | opcodes::GETFIELD | opcodes::PUTFIELD => {
                let field = pool.member_ref(index)?;
                self.record(&field_symbol(&field), caller);
            }
            opcodes::INVOKEVIRTUAL
            | opcodes::INVOKESPECIAL
            | opcodes::INVOKESTATIC
            | opcodes::INVOKEINTERFACE => {
                let method = pool.member_ref(index)?;
                self.record_method(&method_symbol(&method), caller);
            }
            opcodes::LDC | opcodes::LDC_W => {
                if let Constant::Class { name_index } = pool.get(index)? {
                    let name = pool.utf8(*name_index)?;
                    self.record_class_operand(name, caller)?;
                }
            }
            opcodes::CHECKCAST | opcodes::INSTANCEOF => {
                let name = pool.class_name(index)?;
                self.record_class_operand(name, caller)?;
            }
            opcodes::INVOKEDYNAMIC if self.lambdas => {
                self.index_invoke_dynamic(index, caller)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn index_invoke_dynamic(&mut self, index: u16, caller: &str) -> Result<()> {
        let class = self.class;
        let pool = &class.constant_pool;
        let call_site = pool.invoke_dynamic(index)?;
        let bootstrap = class.bootstrap_method(call_site.bootstrap_index)?;
        let handle = pool.method_handle(bootstrap.method_ref)?;

        if handle.member.owner != LAMBDA_METAFACTORY
            || !matches!(handle.member.name, METAFACTORY | ALT_METAFACTORY)
        {
            return Ok(());
        }

        let &[sam, implementation, instantiated, ..] = bootstrap.arguments.as_slice() else {
            return Err(malformed_error!(
                "Lambda bootstrap at #{} has {} arguments, expected at least 3",
                index,
                bootstrap.arguments.len()
            ));
        };

        let sam_descriptor = pool.method_type(sam)?;
        let implementation = pool.method_handle(implementation)?;
        let instantiated_descriptor = pool.method_type(instantiated)?;

        let kind = HandleKind::try_from_tag(implementation.reference_kind)?;
        if kind.is_field() {
            self.record(&field_symbol(&implementation.member), caller);
        } else {
            self.record_method(&method_symbol(&implementation.member), caller);
        }

        self.index_method_descriptor(call_site.descriptor, caller)?;
        self.index_method_descriptor(sam_descriptor, caller)?;
        self.index_method_descriptor(instantiated_descriptor, caller)?;
        Ok(())
    }

    fn index_method_descriptor(&mut self, descriptor: &str, usage: &str) -> Result<()> {
        let method = parse_method_descriptor(descriptor)?;
        for class in method.types().filter_map(|t| t.indexable_class()) {
            self.record(&Symbol::class(class), usage);
        }
        Ok(())
    }

    fn record_class_operand(&mut self, name: &str, caller: &str) -> Result<()> {
        if let Some(class) = parse_class_operand(name)?.indexable_class() {
            self.record(&Symbol::class(class), caller);
        }
        Ok(())
    }

    fn record_method(&mut self, method: &Symbol<'_>, caller: &str) {
        self.record(method, caller);
        if method.is_constructor() {
            self.record(&Symbol::class(method.owner_class()), caller);
        }
    }

    fn record(&mut self, referenced: &Symbol<'_>, caller: &str) {
        self.sink.add_usage(&referenced.usage(), caller);
    }
}

fn field_symbol<'p>(member: &MemberRef<'p>) -> Symbol<'p> {
    Symbol::field(member.owner, member.name, member.descriptor)
}

fn method_symbol<'p>(member: &MemberRef<'p>) -> Symbol<'p> {
    Symbol::method(member.owner, member.name, member.descriptor)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::{
        assembly::{ClassAssembler, HandleConstant},
        classfile::AccessFlags,
        Error,
    };

    /// Records every pair, unfiltered and in order.
    #[derive(Default)]
    struct Recorder {
        pairs: Vec<(String, String)>,
    }

    impl UsageSink for Recorder {
        fn add_usage(&mut self, key: &str, usage: &str) {
            self.pairs.push((key.to_string(), usage.to_string()));
        }
    }

    impl Recorder {
        fn keys(&self) -> HashSet<&str> {
            self.pairs.iter().map(|(key, _)| key.as_str()).collect()
        }
    }

    #[test]
    fn field_descriptors() {
        let bytes = ClassAssembler::new("a/Foo")
            .field(AccessFlags::PRIVATE, "count", "I")
            .field(AccessFlags::PRIVATE, "grid", "[[J")
            .field(AccessFlags::PRIVATE, "bars", "[La/Bar;")
            .finish()
            .unwrap();

        let mut recorder = Recorder::default();
        index_class(&bytes, &mut recorder).unwrap();
        assert_eq!(
            recorder.pairs,
            [("s:a/Bar".to_string(), "f:a/Foo:bars:[La/Bar;".to_string())]
        );
    }

    #[test]
    fn type_operands() {
        let bytes = ClassAssembler::new("a/Foo")
            .method(AccessFlags::PUBLIC, "run", "()V", |code| {
                code.ldc_class("a/Lit")?;
                code.ldc_class("[[La/LitArray;")?;
                code.ldc_class("[I")?;
                code.ldc_string("a/NotAClass")?;
                code.type_insn(opcodes::CHECKCAST, "a/Cast")?;
                code.type_insn(opcodes::INSTANCEOF, "[La/Check;")?;
                code.type_insn(opcodes::NEW, "a/Created")?;
                code.type_insn(opcodes::ANEWARRAY, "a/Element")?;
                code.emit(opcodes::RETURN)?;
                Ok(())
            })
            .unwrap()
            .finish()
            .unwrap();

        let mut recorder = Recorder::default();
        index_class(&bytes, &mut recorder).unwrap();
        assert_eq!(
            recorder.keys(),
            HashSet::from(["s:a/Lit", "s:a/LitArray", "s:a/Cast", "s:a/Check"])
        );
        assert!(recorder
            .pairs
            .iter()
            .all(|(_, usage)| usage == "m:a/Foo:run:()V"));
    }

    #[test]
    fn constructor_records_class() {
        let bytes = ClassAssembler::new("a/Foo")
            .method(AccessFlags::PUBLIC, "make", "()V", |code| {
                code.type_insn(opcodes::NEW, "a/Bar")?;
                code.emit(opcodes::DUP)?;
                code.method_insn(opcodes::INVOKESPECIAL, "a/Bar", "<init>", "()V")?;
                code.emit(opcodes::POP)?;
                code.emit(opcodes::RETURN)?;
                Ok(())
            })
            .unwrap()
            .finish()
            .unwrap();

        let mut recorder = Recorder::default();
        index_class(&bytes, &mut recorder).unwrap();
        assert_eq!(
            recorder.keys(),
            HashSet::from(["m:a/Bar:<init>:()V", "s:a/Bar"])
        );
    }

    #[test]
    fn lambda_field_handle() {
        let bytes = ClassAssembler::new("a/Foo")
            .method(AccessFlags::PUBLIC, "run", "()V", |code| {
                code.lambda(
                    "get",
                    "()Ljava/util/function/Supplier;",
                    "()Ljava/lang/Object;",
                    HandleConstant::new(HandleKind::GetStatic, "a/Holder", "VALUE", "La/Value;"),
                    "()La/Value;",
                )?;
                code.emit(opcodes::POP)?;
                code.emit(opcodes::RETURN)?;
                Ok(())
            })
            .unwrap()
            .finish()
            .unwrap();

        let mut recorder = Recorder::default();
        index_class(&bytes, &mut recorder).unwrap();
        assert!(recorder.keys().contains("f:a/Holder:VALUE:La/Value;"));
        assert!(recorder.keys().contains("s:a/Value"));
    }

    #[test]
    fn non_lambda_bootstrap_is_ignored() {
        let bytes = ClassAssembler::new("a/Foo")
            .method(AccessFlags::PUBLIC, "concat", "(La/Bar;)Ljava/lang/String;", |code| {
                code.emit_with(opcodes::ALOAD, &[1])?;
                code.invokedynamic(
                    "makeConcatWithConstants",
                    "(La/Bar;)Ljava/lang/String;",
                    HandleConstant::new(
                        HandleKind::InvokeStatic,
                        "java/lang/invoke/StringConcatFactory",
                        "makeConcatWithConstants",
                        "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/MethodType;Ljava/lang/String;[Ljava/lang/Object;)Ljava/lang/invoke/CallSite;",
                    ),
                    &[],
                )?;
                code.emit(opcodes::ARETURN)?;
                Ok(())
            })
            .unwrap()
            .finish()
            .unwrap();

        let mut recorder = Recorder::default();
        index_class(&bytes, &mut recorder).unwrap();
        // Only the declaring method's own descriptor
        assert_eq!(
            recorder.keys(),
            HashSet::from(["s:a/Bar", "s:java/lang/String"])
        );
    }

    #[test]
    fn invalid_handle_tag() {
        let bytes = ClassAssembler::new("a/Foo")
            .method(AccessFlags::PUBLIC, "run", "()V", |code| {
                code.lambda(
                    "run",
                    "()Ljava/lang/Runnable;",
                    "()V",
                    HandleConstant::raw(42, "a/Foo", "lambda$run$0", "()V"),
                    "()V",
                )?;
                code.emit(opcodes::POP)?;
                code.emit(opcodes::RETURN)?;
                Ok(())
            })
            .unwrap()
            .finish()
            .unwrap();

        let mut recorder = Recorder::default();
        let result = index_class(&bytes, &mut recorder);
        assert!(matches!(result, Err(Error::InvalidHandleTag(42))));
    }

    #[test]
    fn malformed_descriptor_stops_the_class() {
        let bytes = ClassAssembler::new("a/Foo")
            .field(AccessFlags::PRIVATE, "first", "La/First;")
            .field(AccessFlags::PRIVATE, "broken", "Q")
            .field(AccessFlags::PRIVATE, "never", "La/Never;")
            .finish()
            .unwrap();

        let mut recorder = Recorder::default();
        let result = index_class(&bytes, &mut recorder);
        assert!(matches!(result, Err(Error::MalformedDescriptor(_))));
        assert_eq!(recorder.keys(), HashSet::from(["s:a/First"]));
    }

    #[test]
    fn invalid_bytecode_stops_the_class() {
        let bytes = ClassAssembler::new("a/Foo")
            .method(AccessFlags::PUBLIC, "run", "()V", |code| {
                code.method_insn(opcodes::INVOKESTATIC, "a/Before", "m", "()V")?;
                code.emit(0xFF)?;
                Ok(())
            })
            .unwrap()
            .finish()
            .unwrap();

        let mut recorder = Recorder::default();
        let result = index_class(&bytes, &mut recorder);
        assert!(matches!(result, Err(Error::Malformed { .. })));
        assert_eq!(recorder.keys(), HashSet::from(["m:a/Before:m:()V"]));
    }
}
