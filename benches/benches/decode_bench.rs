//! # Decode Benchmarks
//!
//! Measures the pure register-decoding paths that run once per sample.
//!
//! Run: `cargo bench --bench decode_bench`

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sensa_core::codec;
use sensa_core::ChecksumPolicy;
use sensa_devices::bmp280::{self, Calibration};
use sensa_devices::{one_wire_thermo, sen55, sht4x};

/// Datasheet calibration example
fn calibration() -> Calibration {
    Calibration {
        t1: 27504,
        t2: 26435,
        t3: -1000,
        p1: 36477,
        p2: -10685,
        p3: 3024,
        p4: 2855,
        p5: 140,
        p6: -7,
        p7: 15500,
        p8: -14600,
        p9: 6000,
    }
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    group.bench_function("crc8_2_bytes", |b| b.iter(|| black_box(codec::crc8(black_box(&[0xBE, 0xEF])))));

    group.bench_function("u20_from_msb", |b| {
        b.iter(|| black_box(codec::u20_from_msb(black_box(0x65), black_box(0x5A), black_box(0xC0))))
    });

    group.bench_function("f32_le", |b| {
        b.iter(|| black_box(codec::f32_le(black_box([0x00, 0x00, 0x80, 0x3F]))))
    });

    group.finish();
}

fn bench_devices(c: &mut Criterion) {
    let mut group = c.benchmark_group("device_decode");

    let cal = calibration();
    group.bench_function("bmp280_compensate", |b| {
        b.iter(|| {
            let (t, t_fine) = cal.compensate_temperature(black_box(519888));
            black_box((t, cal.compensate_pressure(black_box(415148), t_fine)))
        })
    });

    let raw = [0x65, 0x5A, 0xC0, 0x7E, 0xED, 0x00];
    group.bench_function("bmp280_raw", |b| b.iter(|| black_box(bmp280::decode_raw(black_box(&raw)))));

    let sht = [0x66, 0x66, 0x93, 0x80, 0x00, 0xA2];
    group.bench_function("sht4x_decode", |b| {
        b.iter(|| black_box(sht4x::decode(black_box(&sht), ChecksumPolicy::Ignore)))
    });

    let values = [
        0, 105, 178, 0, 110, 37, 0, 125, 53, 0, 130, 153, 17, 198, 250, 252, 24, 215, 0, 250, 216, 0, 10, 90,
    ];
    group.bench_function("sen55_values", |b| {
        b.iter(|| black_box(sen55::decode_values(black_box(&values), ChecksumPolicy::Warn)))
    });

    let w1: Vec<String> = [
        "72 01 4b 46 7f ff 0e 10 57 : crc=57 YES",
        "72 01 4b 46 7f ff 0e 10 57 t=23125",
    ]
    .iter()
    .map(|l| l.to_string())
    .collect();
    group.bench_function("w1_slave", |b| {
        b.iter(|| black_box(one_wire_thermo::decode_w1_slave("DS18B20", black_box(&w1), ChecksumPolicy::Reject)))
    });

    group.finish();
}

criterion_group!(benches, bench_codec, bench_devices);
criterion_main!(benches);
