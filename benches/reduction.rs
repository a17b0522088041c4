//! Performance benchmarks for comment stripping and dependency resolution.
//!
//! Run with: `cargo bench --bench reduction`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;

use texprune::bib::BibFilter;
use texprune::{CitationSet, CleanPolicy, CommentStripper, DependencyResolver, InMemorySourceTree};

/// A section of prose with a comment on every third line.
fn make_section(lines: usize) -> String {
    (0..lines)
        .map(|i| match i % 3 {
            0 => format!("Line {} of text with 100\\% escaped percent. % comment {}\n", i, i),
            1 => format!("% full comment line {}\n", i),
            _ => format!("\\cite{{key{}}} and plain prose, continued.\n", i),
        })
        .collect()
}

/// A project with a chain of `sections` documents, each including the next.
fn make_project(sections: usize) -> InMemorySourceTree {
    let mut tree = InMemorySourceTree::new();
    tree.add_file("main.tex", "\\documentclass{article}\n\\input{s0}\n\\bibliography{refs}\n");
    for i in 0..sections {
        let mut body = make_section(30);
        if i + 1 < sections {
            body.push_str(&format!("\\input{{s{}}}\n", i + 1));
        }
        body.push_str(&format!("\\includegraphics{{figures/f{}}}\n", i));
        tree.add_file(&format!("s{}.tex", i), body);
        tree.add_file(&format!("figures/f{}.pdf", i), vec![0u8; 64]);
    }
    tree.add_file("refs.bib", make_bib(sections * 10));
    tree
}

fn make_bib(entries: usize) -> String {
    (0..entries)
        .map(|i| format!("@article{{key{},\n  title = {{Title {{{}}}}},\n  year = 2024\n}}\n\n", i, i))
        .collect()
}

fn bench_strip(c: &mut Criterion) {
    let policy = CleanPolicy::default();
    let stripper = CommentStripper::new(&policy);

    let mut group = c.benchmark_group("strip_comments");
    for lines in [100, 1_000, 10_000] {
        let text = make_section(lines);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new("lines", lines), &text, |b, text| {
            b.iter(|| stripper.strip(black_box(text)))
        });
    }
    group.finish();
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");
    for sections in [10, 50, 200] {
        let tree = Arc::new(make_project(sections));
        let resolver = DependencyResolver::new(tree, CleanPolicy::minimal());
        group.throughput(Throughput::Elements(sections as u64));
        group.bench_with_input(BenchmarkId::new("sections", sections), &resolver, |b, resolver| {
            b.iter(|| {
                let resolution = resolver.resolve(black_box("main.tex")).unwrap();
                assert_eq!(resolution.reachable.documents.len(), sections + 1);
                resolution
            })
        });
    }
    group.finish();
}

fn bench_bib_filter(c: &mut Criterion) {
    let filter = BibFilter::new();
    let mut group = c.benchmark_group("bib_filter");
    for entries in [100, 1_000, 5_000] {
        let bib = make_bib(entries);
        let keys: Vec<String> = (0..entries).step_by(7).map(|i| format!("key{}", i)).collect();
        let citations: CitationSet = keys.iter().map(String::as_str).collect();
        group.throughput(Throughput::Bytes(bib.len() as u64));
        group.bench_with_input(BenchmarkId::new("entries", entries), &bib, |b, bib| {
            b.iter(|| filter.filter(black_box(bib), &citations).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_strip, bench_resolve, bench_bib_filter);
criterion_main!(benches);
