// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for ledger wire encoding: the base64 image payload and
// a scanned-check transaction body.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use uuid::Uuid;

use checkscan_upload::ledger::{BinaryFileData, FinancialTransaction};

fn bench_file_data_json(c: &mut Criterion) {
    // Typical bitonal check image after PNG encoding.
    let data = BinaryFileData {
        id: 101,
        content: (0..48 * 1024).map(|i| (i % 251) as u8).collect(),
    };

    c.bench_function("BinaryFileData to json (48 KiB)", |b| {
        b.iter(|| black_box(serde_json::to_vec(black_box(&data)).expect("serialize")));
    });
}

fn bench_transaction_json(c: &mut Criterion) {
    let transaction = FinancialTransaction {
        guid: Uuid::new_v4(),
        batch_id: 7,
        summary: "Scanned from checkscan".into(),
        currency_type_value_id: 11,
        source_type_value_id: 21,
        transaction_type_value_id: 53,
        scanned_check_micr: Some("123456789_55501_101".into()),
        ..Default::default()
    };

    c.bench_function("FinancialTransaction to json", |b| {
        b.iter(|| black_box(serde_json::to_string(black_box(&transaction)).expect("serialize")));
    });
}

criterion_group!(benches, bench_file_data_json, bench_transaction_json);
criterion_main!(benches);
