use crate::db::DbPool;
use crate::models::tournament::{Match, Tournament};
use crate::service::bracket_service::{BracketError, BracketStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Postgres-backed bracket persistence. Concurrency guards live here: the
/// winner claim is a compare-and-swap on `winner_photo_id IS NULL`, round
/// insertion is transactional with a unique-index backstop on
/// `(tournament_id, round_number, match_order)`, and completion only fires
/// from the in-progress state.
#[derive(Clone)]
pub struct PgBracketStore {
    pool: DbPool,
}

impl PgBracketStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BracketStore for PgBracketStore {
    async fn tournament(&self, id: Uuid) -> Result<Option<Tournament>, BracketError> {
        let tournament = sqlx::query_as::<_, Tournament>(
            r#"
            SELECT id, user_id, round_type, status, winner_photo_id, analysis,
                   created_at, completed_at
            FROM tournaments
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(tournament)
    }

    async fn match_by_id(&self, id: Uuid) -> Result<Option<Match>, BracketError> {
        let m = sqlx::query_as::<_, Match>(
            r#"
            SELECT id, tournament_id, round_number, match_order,
                   photo_a_id, photo_b_id, winner_photo_id
            FROM matches
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(m)
    }

    async fn matches(&self, tournament_id: Uuid) -> Result<Vec<Match>, BracketError> {
        let matches = sqlx::query_as::<_, Match>(
            r#"
            SELECT id, tournament_id, round_number, match_order,
                   photo_a_id, photo_b_id, winner_photo_id
            FROM matches
            WHERE tournament_id = $1
            ORDER BY round_number, match_order
            "#,
        )
        .bind(tournament_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(matches)
    }

    async fn claim_winner(
        &self,
        match_id: Uuid,
        winner_photo_id: Uuid,
    ) -> Result<bool, BracketError> {
        let result = sqlx::query(
            r#"
            UPDATE matches
            SET winner_photo_id = $2
            WHERE id = $1 AND winner_photo_id IS NULL
            "#,
        )
        .bind(match_id)
        .bind(winner_photo_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_round(
        &self,
        tournament_id: Uuid,
        round_number: i32,
        matches: &[Match],
    ) -> Result<bool, BracketError> {
        let mut tx = self.pool.begin().await?;

        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM matches
                WHERE tournament_id = $1 AND round_number = $2
            )
            "#,
        )
        .bind(tournament_id)
        .bind(round_number)
        .fetch_one(&mut *tx)
        .await?;
        if exists {
            return Ok(false);
        }

        for m in matches {
            let inserted = sqlx::query(
                r#"
                INSERT INTO matches
                    (id, tournament_id, round_number, match_order, photo_a_id, photo_b_id)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (tournament_id, round_number, match_order) DO NOTHING
                "#,
            )
            .bind(m.id)
            .bind(m.tournament_id)
            .bind(m.round_number)
            .bind(m.match_order)
            .bind(m.photo_a_id)
            .bind(m.photo_b_id)
            .execute(&mut *tx)
            .await?;
            if inserted.rows_affected() == 0 {
                // Another writer committed this round between our existence
                // check and the insert.
                tx.rollback().await?;
                return Ok(false);
            }
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn complete(
        &self,
        tournament_id: Uuid,
        winner_photo_id: Uuid,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, BracketError> {
        let result = sqlx::query(
            r#"
            UPDATE tournaments
            SET status = 'completed', winner_photo_id = $2, completed_at = $3
            WHERE id = $1 AND status = 'in_progress'
            "#,
        )
        .bind(tournament_id)
        .bind(winner_photo_id)
        .bind(completed_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
