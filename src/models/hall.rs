use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct TheatreHall {
    pub id: i64,
    pub name: String,
    pub rows: i32,
    pub seats_in_row: i32,
}

impl TheatreHall {
    pub fn capacity(&self) -> i32 {
        self.rows * self.seats_in_row
    }
}

/// Upper bound for both hall dimensions; keeps `capacity` well inside `i32`.
pub const MAX_HALL_DIMENSION: i32 = 1000;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewTheatreHall {
    #[validate(length(min = 1, max = 255, message = "name must be 1 to 255 characters"))]
    pub name: String,
    #[validate(range(min = 1, max = 1000, message = "rows must be between 1 and 1000"))]
    pub rows: i32,
    #[validate(range(min = 1, max = 1000, message = "seats_in_row must be between 1 and 1000"))]
    pub seats_in_row: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TheatreHallResponse {
    pub id: i64,
    pub name: String,
    pub rows: i32,
    pub seats_in_row: i32,
    pub capacity: i32,
}

impl From<TheatreHall> for TheatreHallResponse {
    fn from(hall: TheatreHall) -> Self {
        let capacity = hall.capacity();
        Self {
            id: hall.id,
            name: hall.name,
            rows: hall.rows,
            seats_in_row: hall.seats_in_row,
            capacity,
        }
    }
}
