use chrono::NaiveDate;
use common::{BookingRef, Currency, Money};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{
    Aggregate, BookingDraft, BookingEvent, BookingPayload, BookingService, DraftPayload,
    FinalizePayload, Financials, Payer, Stay, Traveller,
};
use ledger::{AppendOptions, InMemoryLedger, Ledger, LedgerEntry, StreamKey, Version};
use search::{Occupancy, SupplierQuote};

fn quote(markup: i64) -> SupplierQuote {
    SupplierQuote {
        supplier_id: "alpha".to_string(),
        hotel_id: "H-1".to_string(),
        hotel_name: "Bench Hotel".to_string(),
        room_id: "DBL".to_string(),
        option_id: "O-1".to_string(),
        currency: Currency::parse("AED").unwrap(),
        base_price_per_night: Money::from_minor(10_000),
        markup_price_per_night: Money::from_minor(markup),
        quantity: 1,
        cancellation_allowed: true,
        board_type: "BB".to_string(),
        occupancy: Occupancy {
            adults: 2,
            children: 0,
            child_ages: vec![],
        },
        rating: 4,
        amenities: vec![],
        tax: None,
    }
}

fn draft(booking_ref: BookingRef) -> DraftPayload {
    DraftPayload {
        booking_ref,
        quote: quote(12_000),
        stay: Stay {
            destination: "Dubai".to_string(),
            checkin: NaiveDate::from_ymd_opt(2026, 12, 1).unwrap(),
            checkout: NaiveDate::from_ymd_opt(2026, 12, 4).unwrap(),
            rooms: 1,
            adults: 2,
            children: 0,
            child_ages: vec![],
            nationality: "AE".to_string(),
        },
        travellers: vec![Traveller::adult("A", "One"), Traveller::adult("B", "Two")],
        payer: Payer {
            email: "bench@example.com".to_string(),
            user_id: None,
        },
        payment_gateway: "stripe".to_string(),
    }
}

fn make_entry(booking_ref: &BookingRef, version: i64, event: &BookingEvent) -> LedgerEntry {
    LedgerEntry::builder()
        .entry_type(domain::DomainEvent::event_type(event))
        .stream(StreamKey::new("Booking", booking_ref.clone()))
        .version(Version::new(version))
        .payload(event)
        .unwrap()
        .build()
        .unwrap()
}

fn bench_reserve(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("domain/reserve_draft", |b| {
        b.iter(|| {
            rt.block_on(async {
                let service = BookingService::new(InMemoryLedger::new());
                service
                    .upsert_booking(BookingPayload::Draft(draft(BookingRef::generate("TT"))))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_full_checkout_cycle(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("domain/reserve_unpaid_paid", |b| {
        b.iter(|| {
            rt.block_on(async {
                let service = BookingService::new(InMemoryLedger::new());
                let booking_ref = BookingRef::generate("TT");
                service
                    .upsert_booking(BookingPayload::Draft(draft(booking_ref.clone())))
                    .await
                    .unwrap();
                service
                    .upsert_booking(BookingPayload::Finalize(FinalizePayload::unpaid(
                        booking_ref.clone(),
                        "stripe",
                    )))
                    .await
                    .unwrap();
                service
                    .upsert_booking(BookingPayload::Finalize(FinalizePayload::paid(
                        booking_ref,
                        "stripe",
                        "pi_bench",
                    )))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_replay(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ledger = InMemoryLedger::new();
    let booking_ref = BookingRef::parse("TT-BENCH").unwrap();

    // 1 reserve + 50 agent recomputations
    rt.block_on(async {
        let mut draft_agg = BookingDraft::default();
        let reserved = draft_agg.reserve(&draft(booking_ref.clone())).unwrap();
        let mut entries = vec![make_entry(&booking_ref, 1, &reserved[0])];
        draft_agg.apply_events(reserved);

        for v in 2..=51 {
            let q = quote(12_000 + v);
            let event = BookingEvent::financials_recomputed(
                q.clone(),
                Financials::from_quote(&q, 3, Money::from_minor(v)).unwrap(),
            );
            entries.push(make_entry(&booking_ref, v, &event));
        }
        ledger.append(entries, AppendOptions::new()).await.unwrap();
    });

    c.bench_function("domain/replay_51_entries", |b| {
        b.iter(|| {
            rt.block_on(async {
                let entries = ledger
                    .read_stream(&StreamKey::new("Booking", booking_ref.clone()))
                    .await
                    .unwrap();
                let mut draft = BookingDraft::default();
                for entry in &entries {
                    let event: BookingEvent = serde_json::from_value(entry.payload.clone()).unwrap();
                    draft.apply(event);
                }
            });
        });
    });
}

criterion_group!(benches, bench_reserve, bench_full_checkout_cycle, bench_replay);
criterion_main!(benches);
