use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, Pool, Postgres, Row};
use std::collections::{hash_map::Entry, HashMap};
use std::time::Duration;
use tracing::info;

use crate::models::{
    Actor, Genre, NewActor, NewGenre, NewTheatreHall, NewTicket, NewUser, Order, OrderDetail,
    Page, Performance, PerformanceDetail, PerformanceFilter, PerformanceSummary,
    PerformanceWrite, Play, PlayDetail, PlayFilter, PlayWrite, TakenPlace, TheatreHall, Ticket,
    TicketDetail, User,
};
use crate::models::ticket::validate_ticket;
use crate::storage::{StoreError, StoreResult, TheatreStore};

#[derive(Clone)]
pub struct Database {
    pub pool: Pool<Postgres>,
}

impl Database {
    pub async fn new(database_url: &str, pool_size: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        Ok(Database { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Migrations completed");
        Ok(())
    }

    async fn load_play_details(&self, plays: Vec<Play>) -> StoreResult<Vec<PlayDetail>> {
        let ids: Vec<i64> = plays.iter().map(|p| p.id).collect();

        let genre_rows = sqlx::query(
            "SELECT pg.play_id, g.id, g.name
             FROM play_genres pg
             JOIN genres g ON g.id = pg.genre_id
             WHERE pg.play_id = ANY($1)
             ORDER BY g.name, g.id",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut genres: HashMap<i64, Vec<Genre>> = HashMap::new();
        for r in genre_rows {
            genres
                .entry(r.get("play_id"))
                .or_default()
                .push(Genre { id: r.get("id"), name: r.get("name") });
        }

        let actor_rows = sqlx::query(
            "SELECT pa.play_id, a.id, a.first_name, a.last_name
             FROM play_actors pa
             JOIN actors a ON a.id = pa.actor_id
             WHERE pa.play_id = ANY($1)
             ORDER BY a.last_name, a.first_name, a.id",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut actors: HashMap<i64, Vec<Actor>> = HashMap::new();
        for r in actor_rows {
            actors.entry(r.get("play_id")).or_default().push(Actor {
                id: r.get("id"),
                first_name: r.get("first_name"),
                last_name: r.get("last_name"),
            });
        }

        Ok(plays
            .into_iter()
            .map(|play| PlayDetail {
                genres: genres.remove(&play.id).unwrap_or_default(),
                actors: actors.remove(&play.id).unwrap_or_default(),
                play,
            })
            .collect())
    }

    async fn performance_summaries(&self, ids: &[i64]) -> StoreResult<HashMap<i64, PerformanceSummary>> {
        let rows = sqlx::query_as::<_, PerformanceSummary>(&format!(
            "{SUMMARY_SELECT} WHERE pf.id = ANY($1) {SUMMARY_GROUP}"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|s| (s.id, s)).collect())
    }

    async fn order_details(&self, orders: Vec<Order>) -> StoreResult<Vec<OrderDetail>> {
        let order_ids: Vec<i64> = orders.iter().map(|o| o.id).collect();

        let tickets = sqlx::query_as::<_, Ticket>(
            "SELECT id, performance_id, order_id, row, seat
             FROM tickets
             WHERE order_id = ANY($1)
             ORDER BY row, seat, id",
        )
        .bind(&order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut performance_ids: Vec<i64> = tickets.iter().map(|t| t.performance_id).collect();
        performance_ids.sort_unstable();
        performance_ids.dedup();
        let summaries = self.performance_summaries(&performance_ids).await?;

        let mut by_order: HashMap<i64, Vec<TicketDetail>> = HashMap::new();
        for t in tickets {
            let performance = summaries
                .get(&t.performance_id)
                .cloned()
                .ok_or(StoreError::NotFound { entity: "performance", id: t.performance_id })?;
            by_order.entry(t.order_id).or_default().push(TicketDetail {
                id: t.id,
                row: t.row,
                seat: t.seat,
                performance,
            });
        }

        Ok(orders
            .into_iter()
            .map(|o| OrderDetail {
                id: o.id,
                created_at: o.created_at,
                tickets: by_order.remove(&o.id).unwrap_or_default(),
            })
            .collect())
    }

    async fn delete_by_id(&self, table: &'static str, entity: &'static str, id: i64) -> StoreResult<()> {
        let affected = sqlx::query(&format!("DELETE FROM {table} WHERE id = $1"))
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if affected == 0 {
            return Err(StoreError::NotFound { entity, id });
        }
        Ok(())
    }

    async fn write_associations(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        play_id: i64,
        play: &PlayWrite,
    ) -> StoreResult<()> {
        sqlx::query("DELETE FROM play_genres WHERE play_id = $1")
            .bind(play_id)
            .execute(&mut **tx)
            .await?;
        sqlx::query("DELETE FROM play_actors WHERE play_id = $1")
            .bind(play_id)
            .execute(&mut **tx)
            .await?;

        for genre_id in play.genre_ids() {
            sqlx::query("INSERT INTO play_genres (play_id, genre_id) VALUES ($1, $2)")
                .bind(play_id)
                .bind(genre_id)
                .execute(&mut **tx)
                .await
                .map_err(|e| on_foreign_key(e, "genres", genre_id))?;
        }
        for actor_id in play.actor_ids() {
            sqlx::query("INSERT INTO play_actors (play_id, actor_id) VALUES ($1, $2)")
                .bind(play_id)
                .bind(actor_id)
                .execute(&mut **tx)
                .await
                .map_err(|e| on_foreign_key(e, "actors", actor_id))?;
        }
        Ok(())
    }
}

const SUMMARY_SELECT: &str = r#"
    SELECT pf.id,
           pf.show_time,
           p.title AS play_title,
           p.image AS play_image,
           h.name AS theatre_hall_name,
           (h.rows::bigint * h.seats_in_row)::int AS theatre_hall_capacity,
           (h.rows::bigint * h.seats_in_row - COUNT(t.id))::int AS tickets_available
    FROM performances pf
    JOIN plays p ON p.id = pf.play_id
    JOIN theatre_halls h ON h.id = pf.theatre_hall_id
    LEFT JOIN tickets t ON t.performance_id = pf.id
"#;

const SUMMARY_GROUP: &str = "GROUP BY pf.id, p.title, p.image, h.name, h.rows, h.seats_in_row";

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn on_foreign_key(e: sqlx::Error, field: &'static str, id: i64) -> StoreError {
    if matches!(&e, sqlx::Error::Database(db) if db.is_foreign_key_violation()) {
        StoreError::UnknownReference { field, id }
    } else {
        StoreError::Database(e)
    }
}

// LIKE wildcards in user input are matched literally
fn like_pattern(raw: &str) -> String {
    let escaped = raw.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{escaped}%")
}

#[async_trait]
impl TheatreStore for Database {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (email, password_hash, is_staff)
             VALUES ($1, $2, $3)
             RETURNING id, email, password_hash, is_staff, created_at",
        )
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_staff)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateEmail(user.email.clone())
            } else {
                StoreError::Database(e)
            }
        })
    }

    async fn find_user(&self, id: i64) -> StoreResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, is_staff, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, is_staff, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn set_user_staff(&self, id: i64, is_staff: bool) -> StoreResult<User> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET is_staff = $1 WHERE id = $2
             RETURNING id, email, password_hash, is_staff, created_at",
        )
        .bind(is_staff)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound { entity: "user", id })
    }

    async fn list_halls(&self) -> StoreResult<Vec<TheatreHall>> {
        Ok(sqlx::query_as::<_, TheatreHall>(
            "SELECT id, name, rows, seats_in_row FROM theatre_halls ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn create_hall(&self, hall: NewTheatreHall) -> StoreResult<TheatreHall> {
        Ok(sqlx::query_as::<_, TheatreHall>(
            "INSERT INTO theatre_halls (name, rows, seats_in_row)
             VALUES ($1, $2, $3)
             RETURNING id, name, rows, seats_in_row",
        )
        .bind(&hall.name)
        .bind(hall.rows)
        .bind(hall.seats_in_row)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn delete_hall(&self, id: i64) -> StoreResult<()> {
        self.delete_by_id("theatre_halls", "theatre hall", id).await
    }

    async fn list_genres(&self) -> StoreResult<Vec<Genre>> {
        Ok(sqlx::query_as::<_, Genre>("SELECT id, name FROM genres ORDER BY name")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn create_genre(&self, genre: NewGenre) -> StoreResult<Genre> {
        sqlx::query_as::<_, Genre>("INSERT INTO genres (name) VALUES ($1) RETURNING id, name")
            .bind(&genre.name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::DuplicateGenre(genre.name.clone())
                } else {
                    StoreError::Database(e)
                }
            })
    }

    async fn delete_genre(&self, id: i64) -> StoreResult<()> {
        self.delete_by_id("genres", "genre", id).await
    }

    async fn list_actors(&self) -> StoreResult<Vec<Actor>> {
        Ok(sqlx::query_as::<_, Actor>("SELECT id, first_name, last_name FROM actors ORDER BY id")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn create_actor(&self, actor: NewActor) -> StoreResult<Actor> {
        Ok(sqlx::query_as::<_, Actor>(
            "INSERT INTO actors (first_name, last_name) VALUES ($1, $2)
             RETURNING id, first_name, last_name",
        )
        .bind(&actor.first_name)
        .bind(&actor.last_name)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn delete_actor(&self, id: i64) -> StoreResult<()> {
        self.delete_by_id("actors", "actor", id).await
    }

    async fn list_plays(&self, filter: &PlayFilter) -> StoreResult<Vec<PlayDetail>> {
        let mut q = String::from("SELECT p.id, p.title, p.description, p.duration, p.image FROM plays p WHERE TRUE");
        let mut bind_idx = 1;
        if filter.title.is_some() {
            q.push_str(&format!(" AND p.title ILIKE ${}", bind_idx));
            bind_idx += 1;
        }
        if filter.genres.is_some() {
            q.push_str(&format!(
                " AND EXISTS (SELECT 1 FROM play_genres pg WHERE pg.play_id = p.id AND pg.genre_id = ANY(${}))",
                bind_idx
            ));
            bind_idx += 1;
        }
        if filter.actors.is_some() {
            q.push_str(&format!(
                " AND EXISTS (SELECT 1 FROM play_actors pa WHERE pa.play_id = p.id AND pa.actor_id = ANY(${}))",
                bind_idx
            ));
        }
        q.push_str(" ORDER BY p.title, p.id");

        let mut dbq = sqlx::query_as::<_, Play>(&q);
        if let Some(title) = &filter.title {
            dbq = dbq.bind(like_pattern(title));
        }
        if let Some(genres) = &filter.genres {
            dbq = dbq.bind(genres.clone());
        }
        if let Some(actors) = &filter.actors {
            dbq = dbq.bind(actors.clone());
        }

        let plays = dbq.fetch_all(&self.pool).await?;
        self.load_play_details(plays).await
    }

    async fn get_play(&self, id: i64) -> StoreResult<PlayDetail> {
        let play = sqlx::query_as::<_, Play>(
            "SELECT id, title, description, duration, image FROM plays WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound { entity: "play", id })?;

        self.load_play_details(vec![play])
            .await?
            .pop()
            .ok_or(StoreError::NotFound { entity: "play", id })
    }

    async fn create_play(&self, play: PlayWrite) -> StoreResult<PlayDetail> {
        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO plays (title, description, duration) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&play.title)
        .bind(&play.description)
        .bind(play.duration)
        .fetch_one(&mut *tx)
        .await?;

        Self::write_associations(&mut tx, id, &play).await?;
        tx.commit().await?;

        self.get_play(id).await
    }

    async fn update_play(&self, id: i64, play: PlayWrite) -> StoreResult<PlayDetail> {
        let mut tx = self.pool.begin().await?;

        let affected = sqlx::query(
            "UPDATE plays SET title = $1, description = $2, duration = $3 WHERE id = $4",
        )
        .bind(&play.title)
        .bind(&play.description)
        .bind(play.duration)
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(StoreError::NotFound { entity: "play", id });
        }

        Self::write_associations(&mut tx, id, &play).await?;
        tx.commit().await?;

        self.get_play(id).await
    }

    async fn set_play_image(&self, id: i64, image: &str) -> StoreResult<PlayDetail> {
        let affected = sqlx::query("UPDATE plays SET image = $1 WHERE id = $2")
            .bind(image)
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if affected == 0 {
            return Err(StoreError::NotFound { entity: "play", id });
        }
        self.get_play(id).await
    }

    async fn delete_play(&self, id: i64) -> StoreResult<()> {
        self.delete_by_id("plays", "play", id).await
    }

    async fn list_performances(&self, filter: &PerformanceFilter) -> StoreResult<Vec<PerformanceSummary>> {
        let mut q = format!("{SUMMARY_SELECT} WHERE TRUE");
        let mut bind_idx = 1;
        if filter.date.is_some() {
            q.push_str(&format!(" AND pf.show_time::date = ${}", bind_idx));
            bind_idx += 1;
        }
        if filter.play_id.is_some() {
            q.push_str(&format!(" AND pf.play_id = ${}", bind_idx));
        }
        q.push_str(&format!(" {SUMMARY_GROUP} ORDER BY pf.show_time DESC, pf.id DESC"));

        let mut dbq = sqlx::query_as::<_, PerformanceSummary>(&q);
        if let Some(date) = filter.date {
            dbq = dbq.bind(date);
        }
        if let Some(play_id) = filter.play_id {
            dbq = dbq.bind(play_id);
        }

        Ok(dbq.fetch_all(&self.pool).await?)
    }

    async fn get_performance(&self, id: i64) -> StoreResult<PerformanceDetail> {
        let performance = sqlx::query_as::<_, Performance>(
            "SELECT id, play_id, theatre_hall_id, show_time FROM performances WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound { entity: "performance", id })?;

        let theatre_hall = sqlx::query_as::<_, TheatreHall>(
            "SELECT id, name, rows, seats_in_row FROM theatre_halls WHERE id = $1",
        )
        .bind(performance.theatre_hall_id)
        .fetch_one(&self.pool)
        .await?;

        let taken_places = sqlx::query_as::<_, (i32, i32)>(
            "SELECT row, seat FROM tickets WHERE performance_id = $1 ORDER BY row, seat",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|(row, seat)| TakenPlace { row, seat })
        .collect();

        Ok(PerformanceDetail {
            id,
            show_time: performance.show_time,
            play: self.get_play(performance.play_id).await?,
            theatre_hall,
            taken_places,
        })
    }

    async fn get_performance_hall(&self, performance_id: i64) -> StoreResult<TheatreHall> {
        sqlx::query_as::<_, TheatreHall>(
            "SELECT h.id, h.name, h.rows, h.seats_in_row
             FROM performances pf
             JOIN theatre_halls h ON h.id = pf.theatre_hall_id
             WHERE pf.id = $1",
        )
        .bind(performance_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound { entity: "performance", id: performance_id })
    }

    async fn create_performance(&self, performance: PerformanceWrite) -> StoreResult<Performance> {
        sqlx::query_as::<_, Performance>(
            "INSERT INTO performances (play_id, theatre_hall_id, show_time)
             VALUES ($1, $2, $3)
             RETURNING id, play_id, theatre_hall_id, show_time",
        )
        .bind(performance.play)
        .bind(performance.theatre_hall)
        .bind(performance.show_time)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| performance_fk(e, &performance))
    }

    async fn update_performance(&self, id: i64, performance: PerformanceWrite) -> StoreResult<Performance> {
        sqlx::query_as::<_, Performance>(
            "UPDATE performances SET play_id = $1, theatre_hall_id = $2, show_time = $3
             WHERE id = $4
             RETURNING id, play_id, theatre_hall_id, show_time",
        )
        .bind(performance.play)
        .bind(performance.theatre_hall)
        .bind(performance.show_time)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| performance_fk(e, &performance))?
        .ok_or(StoreError::NotFound { entity: "performance", id })
    }

    async fn delete_performance(&self, id: i64) -> StoreResult<()> {
        self.delete_by_id("performances", "performance", id).await
    }

    async fn create_order(&self, user_id: i64, tickets: &[NewTicket]) -> StoreResult<OrderDetail> {
        let mut tx = self.pool.begin().await?;

        let order = sqlx::query_as::<_, Order>(
            "INSERT INTO orders (user_id) VALUES ($1) RETURNING id, user_id, created_at",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| on_foreign_key(e, "user", user_id))?;

        // Performances stay locked until commit so their hall cannot change underneath.
        let mut halls: HashMap<i64, TheatreHall> = HashMap::new();
        for (index, ticket) in tickets.iter().enumerate() {
            let hall = match halls.entry(ticket.performance) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let hall = sqlx::query_as::<_, TheatreHall>(
                        "SELECT h.id, h.name, h.rows, h.seats_in_row
                         FROM performances pf
                         JOIN theatre_halls h ON h.id = pf.theatre_hall_id
                         WHERE pf.id = $1
                         FOR SHARE OF pf",
                    )
                    .bind(ticket.performance)
                    .fetch_optional(&mut *tx)
                    .await?;
                    match hall {
                        Some(hall) => entry.insert(hall),
                        None => {
                            let _ = tx.rollback().await;
                            return Err(StoreError::UnknownReference { field: "performance", id: ticket.performance });
                        }
                    }
                }
            };
            if let Err(errors) = validate_ticket(ticket.row, ticket.seat, hall) {
                let _ = tx.rollback().await;
                return Err(StoreError::InvalidSeat { index, errors });
            }
        }

        // One insert per ticket so a conflict can be attributed to its seat.
        for ticket in tickets {
            let inserted = sqlx::query(
                "INSERT INTO tickets (performance_id, order_id, row, seat) VALUES ($1, $2, $3, $4)",
            )
            .bind(ticket.performance)
            .bind(order.id)
            .bind(ticket.row)
            .bind(ticket.seat)
            .execute(&mut *tx)
            .await;

            if let Err(e) = inserted {
                let _ = tx.rollback().await;
                return Err(if is_unique_violation(&e) {
                    StoreError::SeatTaken {
                        performance_id: ticket.performance,
                        row: ticket.row,
                        seat: ticket.seat,
                    }
                } else {
                    on_foreign_key(e, "performance", ticket.performance)
                });
            }
        }

        tx.commit().await?;

        self.order_details(vec![order])
            .await?
            .pop()
            .ok_or(StoreError::NotFound { entity: "order", id: 0 })
    }

    async fn list_orders(&self, user_id: Option<i64>, page: Page) -> StoreResult<(i64, Vec<OrderDetail>)> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM orders WHERE ($1::bigint IS NULL OR user_id = $1)",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        let orders = sqlx::query_as::<_, Order>(
            "SELECT id, user_id, created_at FROM orders
             WHERE ($1::bigint IS NULL OR user_id = $1)
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((count, self.order_details(orders).await?))
    }

    async fn delete_order(&self, id: i64) -> StoreResult<()> {
        self.delete_by_id("orders", "order", id).await
    }

    async fn list_tickets(&self) -> StoreResult<Vec<Ticket>> {
        Ok(sqlx::query_as::<_, Ticket>(
            "SELECT id, performance_id, order_id, row, seat FROM tickets
             ORDER BY row, seat, performance_id, id",
        )
        .fetch_all(&self.pool)
        .await?)
    }
}

fn performance_fk(e: sqlx::Error, write: &PerformanceWrite) -> StoreError {
    let constraint = match &e {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => db.constraint().map(str::to_owned),
        _ => None,
    };
    match constraint.as_deref() {
        Some(c) if c.contains("theatre_hall") => {
            StoreError::UnknownReference { field: "theatre_hall", id: write.theatre_hall }
        }
        Some(_) => StoreError::UnknownReference { field: "play", id: write.play },
        None => StoreError::Database(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("hamlet"), "%hamlet%");
    }
}
