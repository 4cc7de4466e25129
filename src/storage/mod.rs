//! Storage seam.
//!
//! `TheatreStore` is implemented by [`crate::database::Database`] (Postgres) and by
//! [`memory::MemoryStore`]. Both enforce the same constraints: unique genre names,
//! unique user emails, unique `(performance, row, seat)` tickets, existing foreign
//! keys, and cascading deletes. `create_order` also checks every seat against its
//! hall so a caller that skips `services::booking` cannot persist an impossible seat.

pub mod memory;

use async_trait::async_trait;

use crate::error::FieldErrors;
use crate::models::{
    Actor, Genre, NewActor, NewGenre, NewTheatreHall, NewTicket, NewUser, OrderDetail, Page,
    Performance, PerformanceDetail, PerformanceFilter, PerformanceSummary, PerformanceWrite,
    PlayDetail, PlayFilter, PlayWrite, TheatreHall, Ticket, User,
};

pub use memory::MemoryStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("genre '{0}' already exists")]
    DuplicateGenre(String),

    #[error("user '{0}' already exists")]
    DuplicateEmail(String),

    #[error("seat (row {row}, seat {seat}) already taken for performance {performance_id}")]
    SeatTaken { performance_id: i64, row: i32, seat: i32 },

    #[error("{field} references unknown id {id}")]
    UnknownReference { field: &'static str, id: i64 },

    #[error("ticket {index} is outside its theatre hall")]
    InvalidSeat { index: usize, errors: FieldErrors },

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait TheatreStore: Send + Sync {
    // --- users ---
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;
    async fn find_user(&self, id: i64) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn set_user_staff(&self, id: i64, is_staff: bool) -> StoreResult<User>;

    // --- halls ---
    async fn list_halls(&self) -> StoreResult<Vec<TheatreHall>>;
    async fn create_hall(&self, hall: NewTheatreHall) -> StoreResult<TheatreHall>;
    async fn delete_hall(&self, id: i64) -> StoreResult<()>;

    // --- genres ---
    async fn list_genres(&self) -> StoreResult<Vec<Genre>>;
    async fn create_genre(&self, genre: NewGenre) -> StoreResult<Genre>;
    async fn delete_genre(&self, id: i64) -> StoreResult<()>;

    // --- actors ---
    async fn list_actors(&self) -> StoreResult<Vec<Actor>>;
    async fn create_actor(&self, actor: NewActor) -> StoreResult<Actor>;
    async fn delete_actor(&self, id: i64) -> StoreResult<()>;

    // --- plays ---
    /// Ordered by title.
    async fn list_plays(&self, filter: &PlayFilter) -> StoreResult<Vec<PlayDetail>>;
    async fn get_play(&self, id: i64) -> StoreResult<PlayDetail>;
    async fn create_play(&self, play: PlayWrite) -> StoreResult<PlayDetail>;
    /// Replaces every field and both association sets.
    async fn update_play(&self, id: i64, play: PlayWrite) -> StoreResult<PlayDetail>;
    async fn set_play_image(&self, id: i64, image: &str) -> StoreResult<PlayDetail>;
    async fn delete_play(&self, id: i64) -> StoreResult<()>;

    // --- performances ---
    /// Ordered by show time, newest first.
    async fn list_performances(&self, filter: &PerformanceFilter) -> StoreResult<Vec<PerformanceSummary>>;
    async fn get_performance(&self, id: i64) -> StoreResult<PerformanceDetail>;
    /// The hall a performance takes place in; what seat checks are made against.
    async fn get_performance_hall(&self, performance_id: i64) -> StoreResult<TheatreHall>;
    async fn create_performance(&self, performance: PerformanceWrite) -> StoreResult<Performance>;
    async fn update_performance(&self, id: i64, performance: PerformanceWrite) -> StoreResult<Performance>;
    async fn delete_performance(&self, id: i64) -> StoreResult<()>;

    // --- orders & tickets ---
    /// Inserts the order and all of its tickets, or nothing.
    async fn create_order(&self, user_id: i64, tickets: &[NewTicket]) -> StoreResult<OrderDetail>;
    /// `user_id == None` lists every user's orders. Newest first.
    async fn list_orders(&self, user_id: Option<i64>, page: Page) -> StoreResult<(i64, Vec<OrderDetail>)>;
    async fn delete_order(&self, id: i64) -> StoreResult<()>;
    /// Ordered by (row, seat).
    async fn list_tickets(&self) -> StoreResult<Vec<Ticket>>;
}
