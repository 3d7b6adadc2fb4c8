use std::fmt::Write;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use gstr_recon::classification::MasterCodeTable;
use gstr_recon::config::{CountPolicy, RunConfig};
use gstr_recon::document::Document;
use gstr_recon::pipeline::{self, SourceFile};

const PLACES: [&str; 4] = ["29-Karnataka", "27-Maharashtra", "33-Tamil Nadu", "07-Delhi"];
const RATES: [u32; 4] = [5, 12, 18, 28];
const CODES: [&str; 5] = ["998412", "99841", "998599", "8471", "847130"];

fn business_export(rows: usize) -> SourceFile {
    let mut text = String::from(
        "GSTIN/UIN of Recipient,Receiver Name,Invoice Number,Invoice date,Invoice Value,\
         Place Of Supply,Reverse Charge,Invoice Type,E-Commerce GSTIN,Rate,Taxable Value,Cess Amount\n",
    );
    for i in 0..rows {
        // Every seventh identifier is malformed.
        let id = if i % 7 == 0 {
            format!("{i:06}")
        } else {
            format!("29AAAAA{:04}A1Z5", i % 10_000)
        };
        let place = PLACES[i % PLACES.len()];
        let rate = RATES[i % RATES.len()];
        let day = (i % 28) + 1;
        writeln!(
            text,
            "{id},Party {i},INV-{i},{day:02}-Apr-24,{},{place},N,Regular B2B,,{rate},{},0",
            1000 + i,
            1000 + i
        )
        .expect("write row");
    }
    SourceFile::new("b2b.csv", text)
}

fn code_export(rows: usize, kind: &str) -> SourceFile {
    let mut text = String::from(
        "HSN,Description,UQC,Total Quantity,Total Value,Rate,Taxable Value,\
         Integrated Tax Amount,Central Tax Amount,State/UT Tax Amount,Cess Amount\n",
    );
    for i in 0..rows {
        let code = CODES[i % CODES.len()];
        let rate = RATES[i % RATES.len()];
        writeln!(text, "{code},Line {i},NOS-NUMBERS,1,{},{rate},{},0,9,9,0", 5000 + i, 5000 + i)
            .expect("write row");
    }
    SourceFile::new(format!("hsn_{kind}.csv"), text)
}

fn bench_reconcile(c: &mut Criterion) {
    let inputs = vec![
        business_export(20_000),
        code_export(2_000, "b2b"),
        code_export(500, "b2c"),
    ];
    let master = MasterCodeTable::builtin();
    let config = RunConfig::default();
    let assembled = pipeline::generate(&inputs, Document::template(), CountPolicy::Zero).document;

    let mut group = c.benchmark_group("filing");

    group.bench_function("generate", |b| {
        b.iter(|| pipeline::generate(&inputs, Document::template(), CountPolicy::Zero));
    });

    group.bench_function("reconcile", |b| {
        b.iter_batched(
            || assembled.clone(),
            |mut document| {
                pipeline::reconcile(&mut document, &master, &config).expect("reconcile");
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_reconcile);
criterion_main!(benches);
