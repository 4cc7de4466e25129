use criterion::{black_box, criterion_group, criterion_main, Criterion};

use theatre_api::models::ticket::validate_ticket;
use theatre_api::models::TheatreHall;

fn hall() -> TheatreHall {
    TheatreHall { id: 1, name: "Green".into(), rows: 25, seats_in_row: 30 }
}

fn bench_seat_validation(c: &mut Criterion) {
    let hall = hall();

    c.bench_function("validate_ticket/inside", |b| {
        b.iter(|| validate_ticket(black_box(12), black_box(15), &hall))
    });

    c.bench_function("validate_ticket/row_out_of_range", |b| {
        b.iter(|| validate_ticket(black_box(26), black_box(1), &hall))
    });

    c.bench_function("validate_ticket/full_hall", |b| {
        b.iter(|| {
            let mut ok = 0;
            for row in 1..=hall.rows {
                for seat in 1..=hall.seats_in_row {
                    if validate_ticket(row, seat, &hall).is_ok() {
                        ok += 1;
                    }
                }
            }
            black_box(ok)
        })
    });
}

criterion_group!(benches, bench_seat_validation);
criterion_main!(benches);
