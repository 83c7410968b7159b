use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Seed counts a bracket can be built from.
pub const VALID_ROUND_TYPES: [i32; 3] = [4, 8, 16];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "tournament_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TournamentStatus {
    InProgress,
    Completed,
}

impl std::fmt::Display for TournamentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TournamentStatus::InProgress => write!(f, "in_progress"),
            TournamentStatus::Completed => write!(f, "completed"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tournament {
    pub id: Uuid,
    pub user_id: Uuid,
    pub round_type: i32,
    pub status: TournamentStatus,
    pub winner_photo_id: Option<Uuid>,
    /// Cached insight report, populated on first shared view.
    pub analysis: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Match {
    pub id: Uuid,
    pub tournament_id: Uuid,
    pub round_number: i32,
    pub match_order: i32,
    pub photo_a_id: Uuid,
    pub photo_b_id: Uuid,
    pub winner_photo_id: Option<Uuid>,
}

impl Match {
    pub fn new(
        tournament_id: Uuid,
        round_number: i32,
        match_order: i32,
        photo_a_id: Uuid,
        photo_b_id: Uuid,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tournament_id,
            round_number,
            match_order,
            photo_a_id,
            photo_b_id,
            winner_photo_id: None,
        }
    }

    pub fn is_decided(&self) -> bool {
        self.winner_photo_id.is_some()
    }

    pub fn has_participant(&self, photo_id: Uuid) -> bool {
        self.photo_a_id == photo_id || self.photo_b_id == photo_id
    }

    /// The participant that did not win. None while undecided.
    pub fn loser(&self) -> Option<Uuid> {
        self.winner_photo_id.map(|winner| {
            if winner == self.photo_a_id {
                self.photo_b_id
            } else {
                self.photo_a_id
            }
        })
    }
}

// ===== API DTOs =====

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTournamentRequest {
    pub round_type: i32,
    #[validate(length(min = 4, max = 16))]
    pub photo_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PhotoInMatch {
    pub id: Uuid,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchResponse {
    pub id: Uuid,
    pub round_number: i32,
    pub match_order: i32,
    pub photo_a: PhotoInMatch,
    pub photo_b: PhotoInMatch,
    pub winner_photo_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct TournamentResponse {
    pub id: Uuid,
    pub round_type: i32,
    pub status: TournamentStatus,
    pub current_match: Option<MatchResponse>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectWinnerRequest {
    pub winner_photo_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct SelectWinnerResponse {
    pub is_completed: bool,
    pub winner_photo_id: Option<Uuid>,
    pub next_match: Option<MatchResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankingEntry {
    pub rank: i32,
    pub photo: PhotoInMatch,
}

#[derive(Debug, Serialize)]
pub struct TournamentResultResponse {
    pub tournament_id: Uuid,
    pub round_type: i32,
    pub status: TournamentStatus,
    pub rankings: Vec<RankingEntry>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_participants_and_loser() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut m = Match::new(Uuid::new_v4(), 1, 1, a, b);

        assert!(m.has_participant(a));
        assert!(m.has_participant(b));
        assert!(!m.has_participant(Uuid::new_v4()));
        assert!(!m.is_decided());
        assert_eq!(m.loser(), None);

        m.winner_photo_id = Some(b);
        assert!(m.is_decided());
        assert_eq!(m.loser(), Some(a));
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&TournamentStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        let json = serde_json::to_string(&TournamentStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
    }
}
