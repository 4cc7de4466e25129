use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::actor::{Actor, ActorResponse};
use super::genre::Genre;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Play {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub duration: i32,
    pub image: Option<String>,
}

/// A play together with its associations, genres by name and actors by last name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayDetail {
    pub play: Play,
    pub genres: Vec<Genre>,
    pub actors: Vec<Actor>,
}

/// Full-record write: create and PUT share the same payload.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PlayWrite {
    #[validate(length(min = 1, max = 255, message = "title must be 1 to 255 characters"))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 1, message = "duration must be a positive number of minutes"))]
    pub duration: i32,
    #[serde(default)]
    pub genres: Vec<i64>,
    #[serde(default)]
    pub actors: Vec<i64>,
}

impl PlayWrite {
    /// Association ids with duplicates removed, first occurrence kept.
    pub fn genre_ids(&self) -> Vec<i64> {
        dedup(&self.genres)
    }

    pub fn actor_ids(&self) -> Vec<i64> {
        dedup(&self.actors)
    }
}

fn dedup(ids: &[i64]) -> Vec<i64> {
    let mut out: Vec<i64> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(id) {
            out.push(*id);
        }
    }
    out
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayFilter {
    pub title: Option<String>,
    pub genres: Option<Vec<i64>>,
    pub actors: Option<Vec<i64>>,
}

impl PlayFilter {
    pub fn matches(&self, detail: &PlayDetail) -> bool {
        if let Some(title) = &self.title {
            if !detail.play.title.to_lowercase().contains(&title.to_lowercase()) {
                return false;
            }
        }
        if let Some(ids) = &self.genres {
            if !detail.genres.iter().any(|g| ids.contains(&g.id)) {
                return false;
            }
        }
        if let Some(ids) = &self.actors {
            if !detail.actors.iter().any(|a| ids.contains(&a.id)) {
                return false;
            }
        }
        true
    }

    /// Stable textual form, used to derive cache keys.
    pub fn canonical(&self) -> String {
        let ids = |v: &Option<Vec<i64>>| {
            v.as_ref()
                .map(|ids| {
                    let mut ids = ids.clone();
                    ids.sort_unstable();
                    ids.dedup();
                    ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",")
                })
                .unwrap_or_default()
        };
        format!(
            "title={}&genres={}&actors={}",
            self.title.as_deref().unwrap_or_default().to_lowercase(),
            ids(&self.genres),
            ids(&self.actors)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayListItem {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub duration: i32,
    pub genres: Vec<String>,
    pub actors: Vec<String>,
    pub image: Option<String>,
}

impl From<PlayDetail> for PlayListItem {
    fn from(detail: PlayDetail) -> Self {
        Self {
            id: detail.play.id,
            title: detail.play.title,
            description: detail.play.description,
            duration: detail.play.duration,
            genres: detail.genres.into_iter().map(|g| g.name).collect(),
            actors: detail.actors.iter().map(Actor::full_name).collect(),
            image: detail.play.image,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayDetailResponse {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub duration: i32,
    pub genres: Vec<Genre>,
    pub actors: Vec<ActorResponse>,
    pub image: Option<String>,
}

impl From<PlayDetail> for PlayDetailResponse {
    fn from(detail: PlayDetail) -> Self {
        Self {
            id: detail.play.id,
            title: detail.play.title,
            description: detail.play.description,
            duration: detail.play.duration,
            genres: detail.genres,
            actors: detail.actors.into_iter().map(ActorResponse::from).collect(),
            image: detail.play.image,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail(title: &str, genre_ids: &[i64], actor_ids: &[i64]) -> PlayDetail {
        PlayDetail {
            play: Play {
                id: 1,
                title: title.to_string(),
                description: String::new(),
                duration: 90,
                image: None,
            },
            genres: genre_ids
                .iter()
                .map(|id| Genre { id: *id, name: format!("genre{id}") })
                .collect(),
            actors: actor_ids
                .iter()
                .map(|id| Actor { id: *id, first_name: format!("actor{id}"), last_name: "X".into() })
                .collect(),
        }
    }

    #[test]
    fn title_filter_is_case_insensitive_substring() {
        let filter = PlayFilter { title: Some("HAM".into()), ..Default::default() };
        assert!(filter.matches(&detail("Hamlet", &[], &[])));
        assert!(!filter.matches(&detail("Macbeth", &[], &[])));
    }

    #[test]
    fn genre_and_actor_filters_match_any_id() {
        let filter = PlayFilter { genres: Some(vec![2, 3]), actors: Some(vec![7]), ..Default::default() };
        assert!(filter.matches(&detail("A", &[3], &[7, 8])));
        assert!(!filter.matches(&detail("B", &[3], &[8])));
        assert!(!filter.matches(&detail("C", &[], &[7])));
    }

    #[test]
    fn canonical_ignores_id_order() {
        let a = PlayFilter { genres: Some(vec![2, 1]), ..Default::default() };
        let b = PlayFilter { genres: Some(vec![1, 2, 2]), ..Default::default() };
        assert_eq!(a.canonical(), b.canonical());
    }

    #[test]
    fn write_ids_are_deduplicated() {
        let write = PlayWrite {
            title: "T".into(),
            description: String::new(),
            duration: 10,
            genres: vec![3, 1, 3],
            actors: vec![],
        };
        assert_eq!(write.genre_ids(), vec![3, 1]);
    }

    #[test]
    fn list_item_flattens_associations() {
        let item = PlayListItem::from(detail("Hamlet", &[1], &[2]));
        assert_eq!(item.genres, vec!["genre1".to_string()]);
        assert_eq!(item.actors, vec!["actor2 X".to_string()]);
    }
}
