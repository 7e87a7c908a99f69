#![allow(unused)]
extern crate usagescope;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;
use usagescope::{
    assembly::{ClassAssembler, HandleConstant},
    classfile::{AccessFlags, ClassFile, HandleKind},
    disassembler::{instructions, opcodes},
    IndexConfig, SharedUsageIndex, UsageIndex,
};

/// A class with a handful of fields and methods touching its neighbours.
fn synthetic_class(id: usize, total: usize) -> Vec<u8> {
    let name = format!("net/minecraft/gen/Class{id}");
    let next = format!("net/minecraft/gen/Class{}", (id + 1) % total);
    let next_descriptor = format!("L{next};");

    let mut assembler = ClassAssembler::new(&name)
        .field(AccessFlags::PRIVATE, "next", &next_descriptor)
        .field(AccessFlags::PRIVATE, "values", "[I")
        .field(AccessFlags::PRIVATE, "name", "Ljava/lang/String;");

    for method in 0..16 {
        assembler = assembler
            .method(AccessFlags::PUBLIC, &format!("m{method}"), "()V", |code| {
                code.emit(opcodes::ALOAD_0)?
                    .field_insn(opcodes::GETFIELD, &name, "next", &next_descriptor)?
                    .method_insn(opcodes::INVOKEVIRTUAL, &next, "m0", "()V")?
                    .type_insn(opcodes::NEW, &next)?
                    .emit(opcodes::DUP)?
                    .method_insn(opcodes::INVOKESPECIAL, &next, "<init>", "()V")?
                    .type_insn(opcodes::CHECKCAST, "net/minecraft/gen/Marker")?
                    .emit(opcodes::POP)?
                    .lambda(
                        "run",
                        "()Ljava/lang/Runnable;",
                        "()V",
                        HandleConstant::new(HandleKind::InvokeStatic, &next, "m1", "()V"),
                        "()V",
                    )?
                    .emit(opcodes::POP)?
                    .emit(opcodes::RETURN)?;
                Ok(())
            })
            .unwrap();
    }
    assembler.finish().unwrap()
}

fn bench_indexing(c: &mut Criterion) {
    let classes: Vec<Vec<u8>> = (0..256).map(|id| synthetic_class(id, 256)).collect();
    let total_bytes: usize = classes.iter().map(Vec::len).sum();

    println!(
        "Benchmarking {} synthetic classes: {} bytes ({:.2} KB)",
        classes.len(),
        total_bytes,
        total_bytes as f64 / 1024.0
    );

    let mut group = c.benchmark_group("parse");
    group.throughput(Throughput::Bytes(total_bytes as u64));
    group.bench_function("classfile", |b| {
        b.iter(|| {
            for class in &classes {
                black_box(ClassFile::parse(black_box(class)).unwrap());
            }
        });
    });
    group.bench_function("classfile_and_bytecode", |b| {
        b.iter(|| {
            for class in &classes {
                let parsed = ClassFile::parse(black_box(class)).unwrap();
                for method in &parsed.methods {
                    if let Some(code) = &method.code {
                        for instruction in instructions(code.code) {
                            black_box(instruction.unwrap());
                        }
                    }
                }
            }
        });
    });
    group.finish();

    let mut group = c.benchmark_group("index");
    group.throughput(Throughput::Bytes(total_bytes as u64));
    group.bench_function("sequential", |b| {
        b.iter(|| {
            let mut index = UsageIndex::default();
            for class in &classes {
                index.ingest(black_box(class)).unwrap();
            }
            black_box(index)
        });
    });
    group.bench_function("parallel", |b| {
        b.iter(|| {
            let index = SharedUsageIndex::new(IndexConfig::default());
            let report = index.ingest_all(black_box(&classes));
            assert!(report.failures.is_empty());
            black_box(index)
        });
    });
    group.finish();
}

criterion_group!(benches, bench_indexing);
criterion_main!(benches);
