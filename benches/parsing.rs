use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use aytf::as_you_type::AsYouTypeFormatter;
use aytf::metadata::DATABASE;

pub fn criterion_benchmark(c: &mut Criterion) {
    let cases = [
        ("US", "16502532222"),
        ("US", "6502532222"),
        ("GB", "7912345678"),
        ("DE", "15123456789"),
        ("BY", "912345"),
        ("ZZ", "4888123123"),
    ];

    for (region, digits) in cases {
        c.bench_with_input(BenchmarkId::new("as_you_type", format!("{region}:{digits}")), &(region, digits), |b, (region, digits)| {
            b.iter(|| {
                let mut formatter = AsYouTypeFormatter::new(&DATABASE, black_box(region));

                for ch in digits.chars() {
                    black_box(formatter.input_digit(ch));
                }
            })
        });
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
