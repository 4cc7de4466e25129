//! Postgres-backed store tests. Each test gets a fresh database with the
//! migrations applied; run with `DATABASE_URL=... cargo test -- --ignored`.

use chrono::NaiveDateTime;
use sqlx::PgPool;

use theatre_api::{
    database::Database,
    models::{
        NewActor, NewGenre, NewTheatreHall, NewTicket, NewUser, Page, PerformanceWrite, PlayFilter,
        PlayWrite,
    },
    storage::{StoreError, TheatreStore},
};

struct Seed {
    user: i64,
    hall: i64,
    play: i64,
    performance: i64,
}

fn show_time() -> NaiveDateTime {
    NaiveDateTime::parse_from_str("2024-01-03 19:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
}

async fn seed(db: &Database) -> Seed {
    let user = db
        .create_user(NewUser { email: "user@test.com".into(), password_hash: "x".into(), is_staff: false })
        .await
        .unwrap();
    let hall = db
        .create_hall(NewTheatreHall { name: "Green".into(), rows: 5, seats_in_row: 5 })
        .await
        .unwrap();
    let play = db
        .create_play(PlayWrite {
            title: "Hamlet".into(),
            description: String::new(),
            duration: 120,
            genres: vec![],
            actors: vec![],
        })
        .await
        .unwrap();
    let performance = db
        .create_performance(PerformanceWrite { play: play.play.id, theatre_hall: hall.id, show_time: show_time() })
        .await
        .unwrap();
    Seed { user: user.id, hall: hall.id, play: play.play.id, performance: performance.id }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a Postgres DATABASE_URL"]
async fn double_booking_leaves_no_partial_order(pool: PgPool) {
    let db = Database { pool };
    let seed = seed(&db).await;
    let seat = NewTicket { row: 1, seat: 1, performance: seed.performance };

    db.create_order(seed.user, &[seat]).await.unwrap();
    let err = db
        .create_order(seed.user, &[NewTicket { row: 2, seat: 2, performance: seed.performance }, seat])
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::SeatTaken { row: 1, seat: 1, .. }));
    let (count, _) = db.list_orders(Some(seed.user), Page::default()).await.unwrap();
    assert_eq!(count, 1);
    assert_eq!(db.list_tickets().await.unwrap().len(), 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a Postgres DATABASE_URL"]
async fn seat_outside_hall_is_rejected_in_transaction(pool: PgPool) {
    let db = Database { pool };
    let seed = seed(&db).await;

    let err = db
        .create_order(seed.user, &[NewTicket { row: 6, seat: 1, performance: seed.performance }])
        .await
        .unwrap_err();

    match err {
        StoreError::InvalidSeat { index, errors } => {
            assert_eq!(index, 0);
            assert!(errors.get("row").is_some());
        }
        other => panic!("unexpected {other:?}"),
    }
    let (count, _) = db.list_orders(None, Page::default()).await.unwrap();
    assert_eq!(count, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a Postgres DATABASE_URL"]
async fn unknown_performance_in_order_is_a_reference_error(pool: PgPool) {
    let db = Database { pool };
    let seed = seed(&db).await;

    let err = db
        .create_order(seed.user, &[NewTicket { row: 1, seat: 1, performance: 9999 }])
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::UnknownReference { field: "performance", id: 9999 }));
    let (count, _) = db.list_orders(None, Page::default()).await.unwrap();
    assert_eq!(count, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a Postgres DATABASE_URL"]
async fn play_filters_combine(pool: PgPool) {
    let db = Database { pool };
    let drama = db.create_genre(NewGenre { name: "Drama".into() }).await.unwrap();
    let comedy = db.create_genre(NewGenre { name: "Comedy".into() }).await.unwrap();
    let actor = db
        .create_actor(NewActor { first_name: "Ada".into(), last_name: "Lace".into() })
        .await
        .unwrap();

    for (title, genres, actors) in [
        ("Hamlet", vec![drama.id], vec![actor.id]),
        ("Hamlet 50%", vec![comedy.id], vec![actor.id]),
        ("Macbeth", vec![drama.id], vec![]),
    ] {
        db.create_play(PlayWrite { title: title.into(), description: String::new(), duration: 90, genres, actors })
            .await
            .unwrap();
    }

    let filter = PlayFilter {
        title: Some("hamlet".into()),
        genres: Some(vec![drama.id]),
        actors: Some(vec![actor.id]),
    };
    let titles: Vec<String> = db.list_plays(&filter).await.unwrap().into_iter().map(|p| p.play.title).collect();
    assert_eq!(titles, ["Hamlet"]);

    let literal = PlayFilter { title: Some("50%".into()), ..PlayFilter::default() };
    let titles: Vec<String> = db.list_plays(&literal).await.unwrap().into_iter().map(|p| p.play.title).collect();
    assert_eq!(titles, ["Hamlet 50%"]);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a Postgres DATABASE_URL"]
async fn deleting_a_performance_cascades_to_tickets(pool: PgPool) {
    let db = Database { pool };
    let seed = seed(&db).await;
    db.create_order(seed.user, &[NewTicket { row: 1, seat: 1, performance: seed.performance }])
        .await
        .unwrap();

    db.delete_performance(seed.performance).await.unwrap();

    assert!(db.list_tickets().await.unwrap().is_empty());
    assert!(matches!(
        db.get_performance(seed.performance).await,
        Err(StoreError::NotFound { entity: "performance", .. })
    ));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a Postgres DATABASE_URL"]
async fn performance_with_unknown_hall_names_the_hall(pool: PgPool) {
    let db = Database { pool };
    let seed = seed(&db).await;

    let err = db
        .create_performance(PerformanceWrite { play: seed.play, theatre_hall: 9999, show_time: show_time() })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::UnknownReference { field: "theatre_hall", id: 9999 }));

    let err = db
        .create_performance(PerformanceWrite { play: 9999, theatre_hall: seed.hall, show_time: show_time() })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::UnknownReference { field: "play", .. }));
}
