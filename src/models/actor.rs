use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Actor {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
}

impl Actor {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewActor {
    #[validate(length(min = 1, max = 255, message = "first_name must be 1 to 255 characters"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 255, message = "last_name must be 1 to 255 characters"))]
    pub last_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActorResponse {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
}

impl From<Actor> for ActorResponse {
    fn from(actor: Actor) -> Self {
        let full_name = actor.full_name();
        Self {
            id: actor.id,
            first_name: actor.first_name,
            last_name: actor.last_name,
            full_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_name_joins_with_space() {
        let actor = Actor { id: 1, first_name: "Bohdan".into(), last_name: "Stupka".into() };
        assert_eq!(actor.full_name(), "Bohdan Stupka");
    }
}
