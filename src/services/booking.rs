//! booking.rs
//!
//! Order placement.
//!
//! An order is accepted only when every ticket in it passes, in this order:
//! 1. shape checks on the payload,
//! 2. the seat range check against the hall of the ticket's performance,
//! 3. uniqueness of `(performance, row, seat)` inside the request,
//! 4. uniqueness against already sold tickets, enforced atomically by the store.

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};
use validator::Validate;

use crate::error::{AppError, FieldErrors};
use crate::models::ticket::validate_ticket;
use crate::models::{NewTicket, OrderDetail, TheatreHall};
use crate::storage::{StoreError, TheatreStore};

#[derive(Debug, Clone, Deserialize)]
pub struct OrderRequest {
    #[serde(default)]
    pub tickets: Vec<NewTicket>,
}

pub async fn place_order(
    store: &dyn TheatreStore,
    user_id: i64,
    request: OrderRequest,
) -> Result<OrderDetail, AppError> {
    if request.tickets.is_empty() {
        return Err(AppError::field("tickets", "an order must contain at least one ticket"));
    }

    let mut errors = FieldErrors::new();
    let mut halls: HashMap<i64, TheatreHall> = HashMap::new();

    for (i, ticket) in request.tickets.iter().enumerate() {
        let prefix = format!("tickets[{i}]");

        if let Err(e) = ticket.validate() {
            errors.merge(FieldErrors::from(e).prefixed(&prefix));
            continue;
        }

        if !halls.contains_key(&ticket.performance) {
            match store.get_performance_hall(ticket.performance).await {
                Ok(hall) => {
                    halls.insert(ticket.performance, hall);
                }
                Err(StoreError::NotFound { .. }) => {
                    errors.add(
                        format!("{prefix}.performance"),
                        format!("invalid pk \"{}\" - object does not exist", ticket.performance),
                    );
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }

        if let Some(hall) = halls.get(&ticket.performance) {
            if let Err(e) = validate_ticket(ticket.row, ticket.seat, hall) {
                errors.merge(e.prefixed(&prefix));
            }
        }
    }

    errors.into_result()?;

    let mut seen: HashSet<(i64, i32, i32)> = HashSet::new();
    for ticket in &request.tickets {
        if !seen.insert((ticket.performance, ticket.row, ticket.seat)) {
            return Err(AppError::field(
                "non_field_errors",
                format!(
                    "seat (row: {}, seat: {}) is listed more than once for performance {}",
                    ticket.row, ticket.seat, ticket.performance
                ),
            ));
        }
    }

    match store.create_order(user_id, &request.tickets).await {
        Ok(order) => {
            info!("Order {} placed by user {} with {} tickets", order.id, user_id, order.tickets.len());
            Ok(order)
        }
        Err(e @ StoreError::SeatTaken { .. }) => {
            warn!("Order by user {} rejected: {}", user_id, e);
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewTheatreHall, NewUser, PerformanceWrite, PlayWrite};
    use crate::storage::MemoryStore;
    use chrono::NaiveDateTime;

    async fn setup() -> (MemoryStore, i64, i64) {
        let store = MemoryStore::new();
        let user = store
            .create_user(NewUser { email: "u@test.com".into(), password_hash: "-".into(), is_staff: false })
            .await
            .unwrap();
        let hall = store
            .create_hall(NewTheatreHall { name: "Green".into(), rows: 25, seats_in_row: 30 })
            .await
            .unwrap();
        let play = store
            .create_play(PlayWrite {
                title: "Sample play".into(),
                description: "Sample description".into(),
                duration: 90,
                genres: vec![],
                actors: vec![],
            })
            .await
            .unwrap();
        let performance = store
            .create_performance(PerformanceWrite {
                play: play.play.id,
                theatre_hall: hall.id,
                show_time: NaiveDateTime::parse_from_str("2024-01-03 19:00:00", "%Y-%m-%d %H:%M:%S").unwrap(),
            })
            .await
            .unwrap();
        (store, user.id, performance.id)
    }

    fn request(tickets: &[(i32, i32, i64)]) -> OrderRequest {
        OrderRequest {
            tickets: tickets
                .iter()
                .map(|&(row, seat, performance)| NewTicket { row, seat, performance })
                .collect(),
        }
    }

    fn field_errors(err: AppError) -> FieldErrors {
        match err {
            AppError::Validation(errors) => errors,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn places_order_with_tickets_sorted_by_row_and_seat() {
        let (store, user, perf) = setup().await;
        let order = place_order(&store, user, request(&[(5, 2, perf), (1, 9, perf), (1, 3, perf)]))
            .await
            .unwrap();
        let seats: Vec<(i32, i32)> = order.tickets.iter().map(|t| (t.row, t.seat)).collect();
        assert_eq!(seats, vec![(1, 3), (1, 9), (5, 2)]);
        assert_eq!(order.tickets[0].performance.tickets_available, 750 - 3);
    }

    #[tokio::test]
    async fn out_of_range_row_is_field_scoped() {
        let (store, user, perf) = setup().await;
        let errors = field_errors(place_order(&store, user, request(&[(26, 1, perf)])).await.unwrap_err());
        assert_eq!(
            errors.get("tickets[0].row"),
            Some(&["row number must be in available range: (1, rows): (1, 25)".to_string()][..])
        );
    }

    #[tokio::test]
    async fn range_check_runs_before_uniqueness() {
        let (store, user, perf) = setup().await;
        place_order(&store, user, request(&[(1, 1, perf)])).await.unwrap();

        // Same seat again, plus an invalid one: the range error wins.
        let errors = field_errors(
            place_order(&store, user, request(&[(1, 1, perf), (1, 31, perf)])).await.unwrap_err(),
        );
        assert!(errors.get("tickets[1].seat").is_some());
        assert!(errors.get("non_field_errors").is_none());
    }

    #[tokio::test]
    async fn taken_seat_rejects_whole_order() {
        let (store, user, perf) = setup().await;
        place_order(&store, user, request(&[(2, 2, perf)])).await.unwrap();

        let errors = field_errors(
            place_order(&store, user, request(&[(3, 3, perf), (2, 2, perf)])).await.unwrap_err(),
        );
        assert!(errors.get("non_field_errors").is_some());
        assert_eq!(store.list_tickets().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_seat_in_request_is_rejected() {
        let (store, user, perf) = setup().await;
        let errors = field_errors(
            place_order(&store, user, request(&[(4, 4, perf), (4, 4, perf)])).await.unwrap_err(),
        );
        assert!(errors.get("non_field_errors").is_some());
    }

    #[tokio::test]
    async fn unknown_performance_and_empty_orders_are_rejected() {
        let (store, user, _) = setup().await;
        let errors = field_errors(place_order(&store, user, request(&[(1, 1, 999)])).await.unwrap_err());
        assert!(errors.get("tickets[0].performance").is_some());

        let errors = field_errors(place_order(&store, user, request(&[])).await.unwrap_err());
        assert!(errors.get("tickets").is_some());
    }

    #[tokio::test]
    async fn concurrent_orders_for_one_seat_have_one_winner() {
        let (store, user, perf) = setup().await;
        let store = std::sync::Arc::new(store);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { place_order(store.as_ref(), user, request(&[(7, 7, perf)])).await })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(store.list_tickets().await.unwrap().len(), 1);
    }
}
