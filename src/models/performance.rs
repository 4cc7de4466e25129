use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::hall::{TheatreHall, TheatreHallResponse};
use super::play::{PlayDetail, PlayListItem};

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Performance {
    pub id: i64,
    pub play_id: i64,
    pub theatre_hall_id: i64,
    pub show_time: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PerformanceWrite {
    #[validate(range(min = 1, message = "play must be a valid id"))]
    pub play: i64,
    #[validate(range(min = 1, message = "theatre_hall must be a valid id"))]
    pub theatre_hall: i64,
    pub show_time: NaiveDateTime,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerformanceFilter {
    pub date: Option<NaiveDate>,
    pub play_id: Option<i64>,
}

impl PerformanceFilter {
    pub fn matches(&self, performance: &Performance) -> bool {
        self.date.map_or(true, |d| performance.show_time.date() == d)
            && self.play_id.map_or(true, |id| performance.play_id == id)
    }
}

/// List-view row: flattened play/hall fields plus remaining seats.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub id: i64,
    pub show_time: NaiveDateTime,
    pub play_title: String,
    pub play_image: Option<String>,
    pub theatre_hall_name: String,
    pub theatre_hall_capacity: i32,
    pub tickets_available: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TakenPlace {
    pub row: i32,
    pub seat: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerformanceDetail {
    pub id: i64,
    pub show_time: NaiveDateTime,
    pub play: PlayDetail,
    pub theatre_hall: TheatreHall,
    pub taken_places: Vec<TakenPlace>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PerformanceDetailResponse {
    pub id: i64,
    pub show_time: NaiveDateTime,
    pub play: PlayListItem,
    pub theatre_hall: TheatreHallResponse,
    pub taken_places: Vec<TakenPlace>,
}

impl From<PerformanceDetail> for PerformanceDetailResponse {
    fn from(detail: PerformanceDetail) -> Self {
        Self {
            id: detail.id,
            show_time: detail.show_time,
            play: detail.play.into(),
            theatre_hall: detail.theatre_hall.into(),
            taken_places: detail.taken_places,
        }
    }
}
