//! Lambda and method-reference call sites.

use std::collections::HashSet;

use usagescope::{prelude::*, Result};

const CALLER: &str = "m:a/Foo:run:(La/Bar;)V";

fn set(items: &[&str]) -> HashSet<String> {
    items.iter().map(|item| item.to_string()).collect()
}

/// `a/Foo.run(Bar bar)` creates `bar::baz` as an `IntSupplier`.
fn bound_method_reference() -> Result<Vec<u8>> {
    ClassAssembler::new("a/Foo")
        .method(AccessFlags::PUBLIC, "run", "(La/Bar;)V", |code| {
            code.emit_with(opcodes::ALOAD, &[1])?
                .lambda(
                    "getAsInt",
                    "(La/Bar;)Ljava/util/function/IntSupplier;",
                    "()I",
                    HandleConstant::new(HandleKind::InvokeVirtual, "a/Bar", "baz", "()I"),
                    "()I",
                )?
                .emit(opcodes::POP)?
                .emit(opcodes::RETURN)?;
            Ok(())
        })?
        .finish()
}

#[test]
fn implementation_method_is_attributed_to_the_enclosing_method() -> Result<()> {
    let mut index = UsageIndex::new(IndexConfig::with_namespaces(["a/"]));
    index.ingest(&bound_method_reference()?)?;

    assert_eq!(index.get_usages("m:a/Bar:baz:()I"), set(&[CALLER]));
    assert_eq!(index.get_usages("s:a/Bar"), set(&[CALLER]));
    Ok(())
}

#[test]
fn call_site_descriptor_types_are_recorded() -> Result<()> {
    let mut index = UsageIndex::new(IndexConfig::unfiltered());
    index.ingest(&bound_method_reference()?)?;

    assert_eq!(
        index.get_usages("s:java/util/function/IntSupplier"),
        set(&[CALLER])
    );
    // The bootstrap method itself is not a usage
    assert!(index
        .keys()
        .all(|key| !key.contains("LambdaMetafactory")));
    Ok(())
}

#[test]
fn sam_and_instantiated_types() -> Result<()> {
    let bytes = ClassAssembler::new("a/Foo")
        .method(AccessFlags::PUBLIC, "sort", "()V", |code| {
            code.lambda(
                "compare",
                "()Ljava/util/Comparator;",
                "(Ljava/lang/Object;Ljava/lang/Object;)I",
                HandleConstant::new(
                    HandleKind::InvokeStatic,
                    "a/Foo",
                    "lambda$sort$0",
                    "(La/Item;La/Item;)I",
                ),
                "(La/Item;La/Item;)I",
            )?
            .emit(opcodes::POP)?
            .emit(opcodes::RETURN)?;
            Ok(())
        })?
        .finish()?;

    let mut index = UsageIndex::new(IndexConfig::with_namespaces(["a/"]));
    index.ingest(&bytes)?;

    let caller = set(&["m:a/Foo:sort:()V"]);
    assert_eq!(index.get_usages("s:a/Item"), caller);
    assert_eq!(
        index.get_usages("m:a/Foo:lambda$sort$0:(La/Item;La/Item;)I"),
        caller
    );
    Ok(())
}

#[test]
fn constructor_reference() -> Result<()> {
    let bytes = ClassAssembler::new("a/Foo")
        .method(AccessFlags::PUBLIC, "factory", "()V", |code| {
            code.lambda(
                "get",
                "()Ljava/util/function/Supplier;",
                "()Ljava/lang/Object;",
                HandleConstant::new(HandleKind::NewInvokeSpecial, "a/Bar", "<init>", "()V"),
                "()La/Bar;",
            )?
            .emit(opcodes::POP)?
            .emit(opcodes::RETURN)?;
            Ok(())
        })?
        .finish()?;

    let mut index = UsageIndex::new(IndexConfig::with_namespaces(["a/"]));
    index.ingest(&bytes)?;

    let caller = set(&["m:a/Foo:factory:()V"]);
    assert_eq!(index.get_usages("m:a/Bar:<init>:()V"), caller);
    assert_eq!(index.get_usages("s:a/Bar"), caller);
    Ok(())
}

#[test]
fn serializable_lambda_through_alt_metafactory() -> Result<()> {
    let bytes = ClassAssembler::new("a/Foo")
        .method(AccessFlags::PUBLIC, "run", "()V", |code| {
            code.alt_lambda(
                "run",
                "()Ljava/lang/Runnable;",
                "()V",
                HandleConstant::new(HandleKind::InvokeStatic, "a/Task", "execute", "()V"),
                "()V",
                1,
            )?
            .emit(opcodes::POP)?
            .emit(opcodes::RETURN)?;
            Ok(())
        })?
        .finish()?;

    let mut index = UsageIndex::new(IndexConfig::with_namespaces(["a/"]));
    index.ingest(&bytes)?;
    assert_eq!(
        index.get_usages("m:a/Task:execute:()V"),
        set(&["m:a/Foo:run:()V"])
    );
    Ok(())
}

#[test]
fn lambdas_can_be_ignored() -> Result<()> {
    let mut index = UsageIndex::new(IndexConfig::with_namespaces(["a/"]).without_lambdas());
    index.ingest(&bound_method_reference()?)?;

    assert!(index.get_usages("m:a/Bar:baz:()I").is_empty());
    // Only the enclosing method's own descriptor remains
    assert_eq!(index.get_usages("s:a/Bar"), set(&[CALLER]));
    assert_eq!(index.usage_count(), 1);
    Ok(())
}

#[test]
fn unknown_handle_kind_fails_the_class() -> Result<()> {
    let bytes = ClassAssembler::new("a/Foo")
        .method(AccessFlags::PUBLIC, "run", "()V", |code| {
            code.lambda(
                "run",
                "()Ljava/lang/Runnable;",
                "()V",
                HandleConstant::raw(0, "a/Foo", "lambda$run$0", "()V"),
                "()V",
            )?
            .emit(opcodes::POP)?
            .emit(opcodes::RETURN)?;
            Ok(())
        })?
        .finish()?;

    let mut index = UsageIndex::new(IndexConfig::with_namespaces(["a/"]));
    let error = index.ingest(&bytes).unwrap_err();
    assert!(matches!(error, Error::InvalidHandleTag(0)));
    assert!(!error.is_malformed_input());
    Ok(())
}
