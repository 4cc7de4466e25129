//! In-process store backed by ordered maps behind one async mutex.
//!
//! Used when no `DATABASE_URL` is configured and by the test-suite. Every operation
//! takes the lock once, so check-then-insert sequences (seat uniqueness, unique names)
//! are atomic the same way a Postgres transaction with unique constraints is.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use tokio::sync::Mutex;

use super::{StoreError, StoreResult, TheatreStore};
use crate::models::{
    Actor, Genre, NewActor, NewGenre, NewTheatreHall, NewTicket, NewUser, Order, OrderDetail,
    Page, Performance, PerformanceDetail, PerformanceFilter, PerformanceSummary,
    PerformanceWrite, Play, PlayDetail, PlayFilter, PlayWrite, TakenPlace, TheatreHall, Ticket,
    TicketDetail, User,
};
use crate::models::ticket::validate_ticket;

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Default)]
struct Sequences {
    users: i64,
    halls: i64,
    genres: i64,
    actors: i64,
    plays: i64,
    performances: i64,
    orders: i64,
    tickets: i64,
}

fn next(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

#[derive(Default)]
struct Tables {
    seq: Sequences,
    users: BTreeMap<i64, User>,
    halls: BTreeMap<i64, TheatreHall>,
    genres: BTreeMap<i64, Genre>,
    actors: BTreeMap<i64, Actor>,
    plays: BTreeMap<i64, Play>,
    // (play_id, genre_id)
    play_genres: Vec<(i64, i64)>,
    // (play_id, actor_id)
    play_actors: Vec<(i64, i64)>,
    performances: BTreeMap<i64, Performance>,
    orders: BTreeMap<i64, Order>,
    tickets: BTreeMap<i64, Ticket>,
}

impl Tables {
    fn play(&self, id: i64) -> StoreResult<&Play> {
        self.plays.get(&id).ok_or(StoreError::NotFound { entity: "play", id })
    }

    fn hall(&self, id: i64) -> StoreResult<&TheatreHall> {
        self.halls.get(&id).ok_or(StoreError::NotFound { entity: "theatre hall", id })
    }

    fn performance(&self, id: i64) -> StoreResult<&Performance> {
        self.performances.get(&id).ok_or(StoreError::NotFound { entity: "performance", id })
    }

    fn play_detail(&self, id: i64) -> StoreResult<PlayDetail> {
        let play = self.play(id)?.clone();

        let mut genres: Vec<Genre> = self
            .play_genres
            .iter()
            .filter(|(play_id, _)| *play_id == id)
            .filter_map(|(_, genre_id)| self.genres.get(genre_id).cloned())
            .collect();
        genres.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

        let mut actors: Vec<Actor> = self
            .play_actors
            .iter()
            .filter(|(play_id, _)| *play_id == id)
            .filter_map(|(_, actor_id)| self.actors.get(actor_id).cloned())
            .collect();
        actors.sort_by(|a, b| {
            (&a.last_name, &a.first_name, a.id).cmp(&(&b.last_name, &b.first_name, b.id))
        });

        Ok(PlayDetail { play, genres, actors })
    }

    fn check_associations(&self, write: &PlayWrite) -> StoreResult<()> {
        if let Some(id) = write.genre_ids().into_iter().find(|id| !self.genres.contains_key(id)) {
            return Err(StoreError::UnknownReference { field: "genres", id });
        }
        if let Some(id) = write.actor_ids().into_iter().find(|id| !self.actors.contains_key(id)) {
            return Err(StoreError::UnknownReference { field: "actors", id });
        }
        Ok(())
    }

    fn replace_associations(&mut self, play_id: i64, write: &PlayWrite) {
        self.play_genres.retain(|(p, _)| *p != play_id);
        self.play_actors.retain(|(p, _)| *p != play_id);
        self.play_genres.extend(write.genre_ids().into_iter().map(|g| (play_id, g)));
        self.play_actors.extend(write.actor_ids().into_iter().map(|a| (play_id, a)));
    }

    fn check_performance_refs(&self, write: &PerformanceWrite) -> StoreResult<()> {
        if !self.plays.contains_key(&write.play) {
            return Err(StoreError::UnknownReference { field: "play", id: write.play });
        }
        if !self.halls.contains_key(&write.theatre_hall) {
            return Err(StoreError::UnknownReference { field: "theatre_hall", id: write.theatre_hall });
        }
        Ok(())
    }

    fn taken(&self, performance_id: i64) -> impl Iterator<Item = &Ticket> {
        self.tickets.values().filter(move |t| t.performance_id == performance_id)
    }

    fn summary(&self, performance: &Performance) -> StoreResult<PerformanceSummary> {
        let play = self.play(performance.play_id)?;
        let hall = self.hall(performance.theatre_hall_id)?;
        let sold = self.taken(performance.id).count() as i32;
        Ok(PerformanceSummary {
            id: performance.id,
            show_time: performance.show_time,
            play_title: play.title.clone(),
            play_image: play.image.clone(),
            theatre_hall_name: hall.name.clone(),
            theatre_hall_capacity: hall.capacity(),
            tickets_available: hall.capacity() - sold,
        })
    }

    fn order_detail(&self, order: &Order) -> StoreResult<OrderDetail> {
        let mut tickets: Vec<&Ticket> =
            self.tickets.values().filter(|t| t.order_id == order.id).collect();
        tickets.sort_by_key(|t| (t.row, t.seat, t.id));

        let tickets = tickets
            .into_iter()
            .map(|t| {
                let performance = self.performance(t.performance_id)?;
                Ok(TicketDetail {
                    id: t.id,
                    row: t.row,
                    seat: t.seat,
                    performance: self.summary(performance)?,
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(OrderDetail { id: order.id, created_at: order.created_at, tickets })
    }

    fn remove_performances_where(&mut self, pred: impl Fn(&Performance) -> bool) {
        let doomed: HashSet<i64> =
            self.performances.values().filter(|p| pred(*p)).map(|p| p.id).collect();
        self.performances.retain(|id, _| !doomed.contains(id));
        self.tickets.retain(|_, t| !doomed.contains(&t.performance_id));
    }
}

#[async_trait]
impl TheatreStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let mut t = self.tables.lock().await;
        if t.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail(user.email));
        }
        let id = next(&mut t.seq.users);
        let user = User {
            id,
            email: user.email,
            password_hash: user.password_hash,
            is_staff: user.is_staff,
            created_at: Utc::now(),
        };
        t.users.insert(id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: i64) -> StoreResult<Option<User>> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let t = self.tables.lock().await;
        Ok(t.users.values().find(|u| u.email == email).cloned())
    }

    async fn set_user_staff(&self, id: i64, is_staff: bool) -> StoreResult<User> {
        let mut t = self.tables.lock().await;
        let user = t.users.get_mut(&id).ok_or(StoreError::NotFound { entity: "user", id })?;
        user.is_staff = is_staff;
        Ok(user.clone())
    }

    async fn list_halls(&self) -> StoreResult<Vec<TheatreHall>> {
        Ok(self.tables.lock().await.halls.values().cloned().collect())
    }

    async fn create_hall(&self, hall: NewTheatreHall) -> StoreResult<TheatreHall> {
        let mut t = self.tables.lock().await;
        let id = next(&mut t.seq.halls);
        let hall = TheatreHall { id, name: hall.name, rows: hall.rows, seats_in_row: hall.seats_in_row };
        t.halls.insert(id, hall.clone());
        Ok(hall)
    }

    async fn delete_hall(&self, id: i64) -> StoreResult<()> {
        let mut t = self.tables.lock().await;
        t.halls.remove(&id).ok_or(StoreError::NotFound { entity: "theatre hall", id })?;
        t.remove_performances_where(|p| p.theatre_hall_id == id);
        Ok(())
    }

    async fn list_genres(&self) -> StoreResult<Vec<Genre>> {
        let mut genres: Vec<Genre> = self.tables.lock().await.genres.values().cloned().collect();
        genres.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(genres)
    }

    async fn create_genre(&self, genre: NewGenre) -> StoreResult<Genre> {
        let mut t = self.tables.lock().await;
        if t.genres.values().any(|g| g.name == genre.name) {
            return Err(StoreError::DuplicateGenre(genre.name));
        }
        let id = next(&mut t.seq.genres);
        let genre = Genre { id, name: genre.name };
        t.genres.insert(id, genre.clone());
        Ok(genre)
    }

    async fn delete_genre(&self, id: i64) -> StoreResult<()> {
        let mut t = self.tables.lock().await;
        t.genres.remove(&id).ok_or(StoreError::NotFound { entity: "genre", id })?;
        t.play_genres.retain(|(_, g)| *g != id);
        Ok(())
    }

    async fn list_actors(&self) -> StoreResult<Vec<Actor>> {
        Ok(self.tables.lock().await.actors.values().cloned().collect())
    }

    async fn create_actor(&self, actor: NewActor) -> StoreResult<Actor> {
        let mut t = self.tables.lock().await;
        let id = next(&mut t.seq.actors);
        let actor = Actor { id, first_name: actor.first_name, last_name: actor.last_name };
        t.actors.insert(id, actor.clone());
        Ok(actor)
    }

    async fn delete_actor(&self, id: i64) -> StoreResult<()> {
        let mut t = self.tables.lock().await;
        t.actors.remove(&id).ok_or(StoreError::NotFound { entity: "actor", id })?;
        t.play_actors.retain(|(_, a)| *a != id);
        Ok(())
    }

    async fn list_plays(&self, filter: &PlayFilter) -> StoreResult<Vec<PlayDetail>> {
        let t = self.tables.lock().await;
        let mut plays = t
            .plays
            .keys()
            .map(|id| t.play_detail(*id))
            .collect::<StoreResult<Vec<_>>>()?;
        plays.retain(|p| filter.matches(p));
        plays.sort_by(|a, b| a.play.title.cmp(&b.play.title).then(a.play.id.cmp(&b.play.id)));
        Ok(plays)
    }

    async fn get_play(&self, id: i64) -> StoreResult<PlayDetail> {
        self.tables.lock().await.play_detail(id)
    }

    async fn create_play(&self, play: PlayWrite) -> StoreResult<PlayDetail> {
        let mut t = self.tables.lock().await;
        t.check_associations(&play)?;
        let id = next(&mut t.seq.plays);
        t.plays.insert(
            id,
            Play {
                id,
                title: play.title.clone(),
                description: play.description.clone(),
                duration: play.duration,
                image: None,
            },
        );
        t.replace_associations(id, &play);
        t.play_detail(id)
    }

    async fn update_play(&self, id: i64, play: PlayWrite) -> StoreResult<PlayDetail> {
        let mut t = self.tables.lock().await;
        t.play(id)?;
        t.check_associations(&play)?;
        if let Some(existing) = t.plays.get_mut(&id) {
            existing.title = play.title.clone();
            existing.description = play.description.clone();
            existing.duration = play.duration;
        }
        t.replace_associations(id, &play);
        t.play_detail(id)
    }

    async fn set_play_image(&self, id: i64, image: &str) -> StoreResult<PlayDetail> {
        let mut t = self.tables.lock().await;
        let play = t.plays.get_mut(&id).ok_or(StoreError::NotFound { entity: "play", id })?;
        play.image = Some(image.to_string());
        t.play_detail(id)
    }

    async fn delete_play(&self, id: i64) -> StoreResult<()> {
        let mut t = self.tables.lock().await;
        t.plays.remove(&id).ok_or(StoreError::NotFound { entity: "play", id })?;
        t.play_genres.retain(|(p, _)| *p != id);
        t.play_actors.retain(|(p, _)| *p != id);
        t.remove_performances_where(|p| p.play_id == id);
        Ok(())
    }

    async fn list_performances(&self, filter: &PerformanceFilter) -> StoreResult<Vec<PerformanceSummary>> {
        let t = self.tables.lock().await;
        let mut matching: Vec<&Performance> =
            t.performances.values().filter(|p| filter.matches(p)).collect();
        matching.sort_by(|a, b| b.show_time.cmp(&a.show_time).then(b.id.cmp(&a.id)));
        matching.into_iter().map(|p| t.summary(p)).collect()
    }

    async fn get_performance(&self, id: i64) -> StoreResult<PerformanceDetail> {
        let t = self.tables.lock().await;
        let performance = t.performance(id)?;

        let mut taken_places: Vec<TakenPlace> = t
            .taken(id)
            .map(|ticket| TakenPlace { row: ticket.row, seat: ticket.seat })
            .collect();
        taken_places.sort_by_key(|p| (p.row, p.seat));

        Ok(PerformanceDetail {
            id,
            show_time: performance.show_time,
            play: t.play_detail(performance.play_id)?,
            theatre_hall: t.hall(performance.theatre_hall_id)?.clone(),
            taken_places,
        })
    }

    async fn get_performance_hall(&self, performance_id: i64) -> StoreResult<TheatreHall> {
        let t = self.tables.lock().await;
        let performance = t.performance(performance_id)?;
        Ok(t.hall(performance.theatre_hall_id)?.clone())
    }

    async fn create_performance(&self, performance: PerformanceWrite) -> StoreResult<Performance> {
        let mut t = self.tables.lock().await;
        t.check_performance_refs(&performance)?;
        let id = next(&mut t.seq.performances);
        let performance = Performance {
            id,
            play_id: performance.play,
            theatre_hall_id: performance.theatre_hall,
            show_time: performance.show_time,
        };
        t.performances.insert(id, performance.clone());
        Ok(performance)
    }

    async fn update_performance(&self, id: i64, write: PerformanceWrite) -> StoreResult<Performance> {
        let mut t = self.tables.lock().await;
        t.performance(id)?;
        t.check_performance_refs(&write)?;
        let performance = Performance {
            id,
            play_id: write.play,
            theatre_hall_id: write.theatre_hall,
            show_time: write.show_time,
        };
        t.performances.insert(id, performance.clone());
        Ok(performance)
    }

    async fn delete_performance(&self, id: i64) -> StoreResult<()> {
        let mut t = self.tables.lock().await;
        t.performance(id)?;
        t.remove_performances_where(|p| p.id == id);
        Ok(())
    }

    async fn create_order(&self, user_id: i64, tickets: &[NewTicket]) -> StoreResult<OrderDetail> {
        let mut t = self.tables.lock().await;

        if !t.users.contains_key(&user_id) {
            return Err(StoreError::UnknownReference { field: "user", id: user_id });
        }

        // Validate the whole batch before touching any table.
        let mut batch: HashSet<(i64, i32, i32)> = HashSet::new();
        for (index, ticket) in tickets.iter().enumerate() {
            let Some(performance) = t.performances.get(&ticket.performance) else {
                return Err(StoreError::UnknownReference { field: "performance", id: ticket.performance });
            };
            validate_ticket(ticket.row, ticket.seat, t.hall(performance.theatre_hall_id)?)
                .map_err(|errors| StoreError::InvalidSeat { index, errors })?;
            let key = (ticket.performance, ticket.row, ticket.seat);
            let already_sold = t
                .taken(ticket.performance)
                .any(|sold| sold.row == ticket.row && sold.seat == ticket.seat);
            if already_sold || !batch.insert(key) {
                return Err(StoreError::SeatTaken {
                    performance_id: ticket.performance,
                    row: ticket.row,
                    seat: ticket.seat,
                });
            }
        }

        let order_id = next(&mut t.seq.orders);
        let order = Order { id: order_id, user_id, created_at: Utc::now() };
        t.orders.insert(order_id, order.clone());

        for ticket in tickets {
            let id = next(&mut t.seq.tickets);
            t.tickets.insert(
                id,
                Ticket {
                    id,
                    performance_id: ticket.performance,
                    order_id,
                    row: ticket.row,
                    seat: ticket.seat,
                },
            );
        }

        t.order_detail(&order)
    }

    async fn list_orders(&self, user_id: Option<i64>, page: Page) -> StoreResult<(i64, Vec<OrderDetail>)> {
        let t = self.tables.lock().await;
        let mut orders: Vec<&Order> = t
            .orders
            .values()
            .filter(|o| user_id.map_or(true, |uid| o.user_id == uid))
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let count = orders.len() as i64;
        let results = orders
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .map(|o| t.order_detail(o))
            .collect::<StoreResult<Vec<_>>>()?;
        Ok((count, results))
    }

    async fn delete_order(&self, id: i64) -> StoreResult<()> {
        let mut t = self.tables.lock().await;
        t.orders.remove(&id).ok_or(StoreError::NotFound { entity: "order", id })?;
        t.tickets.retain(|_, ticket| ticket.order_id != id);
        Ok(())
    }

    async fn list_tickets(&self) -> StoreResult<Vec<Ticket>> {
        let mut tickets: Vec<Ticket> = self.tables.lock().await.tickets.values().cloned().collect();
        tickets.sort_by_key(|t| (t.row, t.seat, t.performance_id, t.id));
        Ok(tickets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    async fn seeded() -> (MemoryStore, i64, i64) {
        let store = MemoryStore::new();
        let user = store
            .create_user(NewUser { email: "a@b.c".into(), password_hash: "x".into(), is_staff: false })
            .await
            .unwrap();
        let hall = store
            .create_hall(NewTheatreHall { name: "Green".into(), rows: 5, seats_in_row: 5 })
            .await
            .unwrap();
        let play = store
            .create_play(PlayWrite {
                title: "Hamlet".into(),
                description: String::new(),
                duration: 120,
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

    #[tokio::test]
    async fn second_order_for_same_seat_fails_without_side_effects() {
        let (store, user, perf) = seeded().await;
        let seat = NewTicket { row: 1, seat: 1, performance: perf };

        store.create_order(user, &[seat]).await.unwrap();
        let err = store
            .create_order(user, &[NewTicket { row: 2, seat: 2, performance: perf }, seat])
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::SeatTaken { row: 1, seat: 1, .. }));
        let (count, _) = store.list_orders(Some(user), Page::default()).await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(store.list_tickets().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn seat_outside_hall_is_not_persisted() {
        let (store, user, perf) = seeded().await;
        let err = store
            .create_order(
                user,
                &[
                    NewTicket { row: 1, seat: 1, performance: perf },
                    NewTicket { row: 20, seat: 1, performance: perf },
                ],
            )
            .await
            .unwrap_err();

        match err {
            StoreError::InvalidSeat { index, errors } => {
                assert_eq!(index, 1);
                assert!(errors.get("row").is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
        let (count, _) = store.list_orders(Some(user), Page::default()).await.unwrap();
        assert_eq!(count, 0);
        assert!(store.list_tickets().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_inside_one_order_is_rejected() {
        let (store, user, perf) = seeded().await;
        let seat = NewTicket { row: 3, seat: 3, performance: perf };
        let err = store.create_order(user, &[seat, seat]).await.unwrap_err();
        assert!(matches!(err, StoreError::SeatTaken { .. }));
    }

    #[tokio::test]
    async fn deleting_performance_cascades_to_tickets() {
        let (store, user, perf) = seeded().await;
        store
            .create_order(user, &[NewTicket { row: 1, seat: 2, performance: perf }])
            .await
            .unwrap();
        store.delete_performance(perf).await.unwrap();
        assert!(store.list_tickets().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn tickets_available_counts_sold_seats() {
        let (store, user, perf) = seeded().await;
        store
            .create_order(
                user,
                &[
                    NewTicket { row: 1, seat: 1, performance: perf },
                    NewTicket { row: 1, seat: 2, performance: perf },
                ],
            )
            .await
            .unwrap();
        let listed = store.list_performances(&PerformanceFilter::default()).await.unwrap();
        assert_eq!(listed[0].tickets_available, 23);
    }

    #[tokio::test]
    async fn unknown_genre_is_reported() {
        let store = MemoryStore::new();
        let err = store
            .create_play(PlayWrite {
                title: "X".into(),
                description: String::new(),
                duration: 10,
                genres: vec![42],
                actors: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownReference { field: "genres", id: 42 }));
    }
}
