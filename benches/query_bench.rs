//! Benchmarks for portsearch
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use portsearch::query::{Query, QuerySpec, SearchField};
use portsearch::store::{PlistTable, PortTable, StoreImage};

const PORTS: u32 = 30_000;
const FILES_PER_PORT: u32 = 20;

fn index_image() -> StoreImage {
    let mut text = String::new();
    for id in (1..=PORTS).rev() {
        let cat = ["devel", "www", "shells", "net"][id as usize % 4];
        text.push_str(&format!(
            "{id}|port{id}-1.{id}|/usr/ports/{cat}/port{id}|/usr/local|Port number {id}|/usr/ports/{cat}/port{id}/pkg-descr|ports@FreeBSD.org|{cat}|gmake-4.4 pkgconf-2.0|perl5-5.36|https://example.org/{id}/|||\n"
        ));
    }
    StoreImage::from_text("index", text, 0)
}

fn plist_image() -> StoreImage {
    let mut text = String::new();
    for id in 1..=PORTS {
        for f in 0..FILES_PER_PORT {
            text.push_str(&format!("{id}|share/port{id}/file{f}\n"));
        }
    }
    StoreImage::from_text("plist", text, 0)
}

fn benchmark_parse(c: &mut Criterion) {
    let index = index_image();
    let plist = plist_image();

    c.bench_function("parse_index", |b| {
        b.iter(|| black_box(PortTable::parse(&index).unwrap()))
    });

    c.bench_function("parse_plist", |b| {
        b.iter(|| black_box(PlistTable::parse(&plist).unwrap()))
    });
}

fn benchmark_lookup(c: &mut Criterion) {
    let plist = plist_image();
    let table = PlistTable::parse(&plist).unwrap();

    c.bench_function("files_for_port", |b| {
        let mut id = 0;
        b.iter(|| {
            id = id % PORTS + 1;
            black_box(table.files_for_port(id))
        })
    });
}

fn benchmark_query(c: &mut Criterion) {
    let index = index_image();
    let plist = plist_image();
    let lines = PlistTable::parse(&plist).unwrap();

    let field_query = Query::compile(&QuerySpec::default().with(SearchField::Cat, "^shells$")).unwrap();
    c.bench_function("query_category", |b| {
        b.iter(|| {
            let mut ports = PortTable::parse(&index).unwrap();
            field_query.evaluate(&mut ports, None).unwrap();
            black_box(field_query.select(ports))
        })
    });

    let file_query = Query::compile(
        &QuerySpec::default()
            .with(SearchField::Cat, "^www$")
            .with(SearchField::File, "file1[0-9]$"),
    )
    .unwrap();
    c.bench_function("query_category_and_file", |b| {
        b.iter(|| {
            let mut ports = PortTable::parse(&index).unwrap();
            file_query.evaluate(&mut ports, Some(&lines)).unwrap();
            black_box(file_query.select(ports))
        })
    });
}

criterion_group!(benches, benchmark_parse, benchmark_lookup, benchmark_query);
criterion_main!(benches);
