//! Performance benchmarks for `att64_asm`.
//!
//! Measures:
//! - Single statement latency
//! - Lexer throughput (KB/s of source text)
//! - Full-parse throughput on generated programs
//! - Label-heavy and error-heavy workloads
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use att64_asm::{assemble, tokenize};

// ─── Generators ──────────────────────────────────────────────────────────────

/// A `.text` program with `n` instructions cycling through common shapes.
fn gen_code_block(n: usize) -> String {
    let mut s = String::with_capacity(n * 24 + 16);
    s.push_str(".text\n");
    for i in 0..n {
        match i % 6 {
            0 => s.push_str("movq $5, %rax\n"),
            1 => s.push_str("addq %rbx, %rcx\n"),
            2 => s.push_str("movq -8(%rbp), %rdx\n"),
            3 => s.push_str("shlq $3, %rsi\n"),
            4 => s.push_str("xorl %eax, %eax\n"),
            5 => s.push_str("nop\n"),
            _ => unreachable!(),
        }
    }
    s.push_str(".end\n");
    s
}

/// A program with `n` labels, each referenced by a conditional jump.
fn gen_label_heavy(n: usize) -> String {
    let mut s = String::with_capacity(n * 32 + 16);
    s.push_str(".text\n");
    for i in 0..n {
        s.push_str(&format!("label_{i}:\nnop\n"));
    }
    for i in 0..n {
        s.push_str(&format!("jne label_{i}\n"));
    }
    s.push_str(".end\n");
    s
}

/// A program where every other statement is malformed, stressing recovery.
fn gen_error_heavy(n: usize) -> String {
    let mut s = String::with_capacity(n * 16 + 16);
    s.push_str(".text\n");
    for i in 0..n {
        if i % 2 == 0 {
            s.push_str("movq $,\n");
        } else {
            s.push_str("nop\n");
        }
    }
    s.push_str(".end\n");
    s
}

// ─── Single-Statement Latency ────────────────────────────────────────────────

fn bench_single_statement(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_statement");

    group.bench_function("nop", |b| {
        b.iter(|| assemble(black_box(".text\nnop\n.end\n")))
    });

    group.bench_function("mov_imm_reg", |b| {
        b.iter(|| assemble(black_box(".text\nmovq $5, %rax\n.end\n")))
    });

    group.bench_function("mov_sib_memory", |b| {
        b.iter(|| assemble(black_box(".text\nmovq 8(%rbx, %rcx, 4), %rax\n.end\n")))
    });

    group.bench_function("movz_extension", |b| {
        b.iter(|| assemble(black_box(".text\nmovzbq %al, %rax\n.end\n")))
    });

    group.finish();
}

// ─── Lexer Throughput ────────────────────────────────────────────────────────

fn bench_lexer(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer");

    for n in [100, 1000, 5000] {
        let src = gen_code_block(n);
        group.throughput(Throughput::Bytes(src.len() as u64));
        group.bench_function(format!("tokenize_{n}_stmts"), |b| {
            b.iter(|| tokenize(black_box(&src)))
        });
    }

    group.finish();
}

// ─── Full-Parse Throughput ───────────────────────────────────────────────────

fn bench_assemble(c: &mut Criterion) {
    let mut group = c.benchmark_group("assemble");

    for n in [100, 1000, 5000] {
        let src = gen_code_block(n);
        group.throughput(Throughput::Bytes(src.len() as u64));
        group.bench_function(format!("{n}_stmts"), |b| {
            b.iter(|| assemble(black_box(&src)))
        });
    }

    group.finish();
}

// ─── Labels and Recovery ─────────────────────────────────────────────────────

fn bench_workloads(c: &mut Criterion) {
    let mut group = c.benchmark_group("workloads");

    let labels = gen_label_heavy(500);
    group.bench_function("500_labels", |b| b.iter(|| assemble(black_box(&labels))));

    let errors = gen_error_heavy(500);
    group.bench_function("error_recovery_500", |b| {
        b.iter(|| assemble(black_box(&errors)))
    });

    let data = {
        let mut s = String::from(".data\n");
        for i in 0..500 {
            s.push_str(&format!("v{i}: .quad {i}\n"));
        }
        s.push_str(".text\nnop\n.end\n");
        s
    };
    group.bench_function("500_data_decls", |b| b.iter(|| assemble(black_box(&data))));

    group.finish();
}

criterion_group!(
    benches,
    bench_single_statement,
    bench_lexer,
    bench_assemble,
    bench_workloads,
);
criterion_main!(benches);
