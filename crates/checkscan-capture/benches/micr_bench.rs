// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the capture hot path: MICR parsing and PNG
// re-encoding of a check-sized bitonal image.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{DynamicImage, GrayImage, ImageFormat, Luma};

use checkscan_capture::micr::parse_micr_line;
use checkscan_capture::payload::to_png;

fn bench_parse_micr_line(c: &mut Criterion) {
    c.bench_function("parse_micr_line", |b| {
        b.iter(|| parse_micr_line(black_box("-123456789- c 555-01 d 101 !")));
    });
}

/// 1200x550 is roughly a personal check at 200 dpi.
fn bench_to_png(c: &mut Criterion) {
    let mut img = GrayImage::from_pixel(1200, 550, Luma([255u8]));
    for x in (0..1200).step_by(7) {
        for y in 480..520 {
            img.put_pixel(x, y, Luma([0u8]));
        }
    }
    let mut tiff = Vec::new();
    DynamicImage::ImageLuma8(img)
        .write_to(&mut std::io::Cursor::new(&mut tiff), ImageFormat::Tiff)
        .expect("encode fixture");

    c.bench_function("to_png (1200x550 tiff)", |b| {
        b.iter(|| black_box(to_png(black_box(&tiff)).expect("convert")));
    });
}

criterion_group!(benches, bench_parse_micr_line, bench_to_png);
criterion_main!(benches);
