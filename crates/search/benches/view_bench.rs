use std::hint::black_box;

use common::{Currency, Money};
use criterion::{Criterion, criterion_group, criterion_main};
use search::{FilterState, Occupancy, SortBy, SupplierQuote, apply_view};

fn quotes(n: usize) -> Vec<SupplierQuote> {
    let currency = Currency::parse("AED").unwrap();
    (0..n)
        .map(|i| SupplierQuote {
            supplier_id: format!("s{}", i % 4),
            hotel_id: format!("H{i}"),
            hotel_name: format!("Hotel {}", (i * 7919) % n),
            room_id: "R1".to_string(),
            option_id: "O1".to_string(),
            currency: currency.clone(),
            base_price_per_night: Money::from_minor(((i * 31) % 50_000) as i64),
            markup_price_per_night: Money::from_minor(((i * 37) % 60_000) as i64),
            quantity: 1,
            cancellation_allowed: i % 2 == 0,
            board_type: if i % 3 == 0 { "BB" } else { "RO" }.to_string(),
            occupancy: Occupancy::default(),
            rating: (i % 6) as u8,
            amenities: if i % 2 == 0 {
                vec!["wifi".to_string(), "pool".to_string()]
            } else {
                vec!["wifi".to_string()]
            },
            tax: None,
        })
        .collect()
}

fn bench_view(c: &mut Criterion) {
    let data = quotes(2_000);

    c.bench_function("apply_view_price_low", |b| {
        let filter = FilterState {
            sort: Some(SortBy::PriceLow),
            ..Default::default()
        };
        b.iter(|| apply_view(black_box(&data), black_box(&filter)))
    });

    c.bench_function("apply_view_filtered_by_name", |b| {
        let filter = FilterState {
            sort: Some(SortBy::Name),
            amenities: vec!["pool".to_string()],
            text: Some("hotel 1".to_string()),
            board_types: vec!["BB".to_string()],
        };
        b.iter(|| apply_view(black_box(&data), black_box(&filter)))
    });
}

criterion_group!(benches, bench_view);
criterion_main!(benches);
