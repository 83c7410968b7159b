use crate::api_error::ApiError;
use crate::db::DbPool;
use crate::models::tournament::{
    CreateTournamentRequest, Match, MatchResponse, PhotoInMatch, RankingEntry,
    SelectWinnerRequest, SelectWinnerResponse, Tournament, TournamentResponse,
    TournamentResultResponse, TournamentStatus, VALID_ROUND_TYPES,
};
use crate::service::bracket_service::{BracketEngine, BracketStore};
use crate::service::bracket_store::PgBracketStore;
use crate::service::rate_limit_service::RateLimitService;
use std::collections::HashSet;
use tracing::info;
use uuid::Uuid;

/// Request-layer orchestration around the bracket engine: ownership and
/// quota checks, tournament rows, and response assembly with photo URLs.
#[derive(Clone)]
pub struct TournamentService {
    pool: DbPool,
    engine: BracketEngine<PgBracketStore>,
    quotas: RateLimitService,
}

impl TournamentService {
    pub fn new(pool: DbPool, quotas: RateLimitService) -> Self {
        let engine = BracketEngine::new(PgBracketStore::new(pool.clone()));
        Self {
            pool,
            engine,
            quotas,
        }
    }

    pub async fn create_tournament(
        &self,
        user_id: Uuid,
        request: CreateTournamentRequest,
    ) -> Result<TournamentResponse, ApiError> {
        if !VALID_ROUND_TYPES.contains(&request.round_type) {
            return Err(ApiError::bad_request(format!(
                "round_type must be one of {VALID_ROUND_TYPES:?}"
            )));
        }
        if request.photo_ids.len() as i32 != request.round_type {
            return Err(ApiError::bad_request(format!(
                "a {}-seed tournament requires exactly {} photos",
                request.round_type, request.round_type
            )));
        }
        let distinct: HashSet<Uuid> = request.photo_ids.iter().copied().collect();
        if distinct.len() != request.photo_ids.len() {
            return Err(ApiError::bad_request("photo_ids must be distinct"));
        }

        self.quotas.check_creation_allowed(user_id).await?;

        let owned: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM photos WHERE user_id = $1 AND id = ANY($2)",
        )
        .bind(user_id)
        .bind(&request.photo_ids)
        .fetch_one(&self.pool)
        .await?;
        if owned != request.photo_ids.len() as i64 {
            return Err(ApiError::bad_request(
                "only your own photos can enter a tournament",
            ));
        }

        let tournament = sqlx::query_as::<_, Tournament>(
            r#"
            INSERT INTO tournaments (id, user_id, round_type)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, round_type, status, winner_photo_id, analysis,
                      created_at, completed_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(request.round_type)
        .fetch_one(&self.pool)
        .await?;

        self.engine
            .construct_bracket(&tournament, &request.photo_ids)
            .await?;
        self.quotas.record_creation(user_id).await?;

        info!(
            tournament_id = %tournament.id,
            user_id = %user_id,
            round_type = tournament.round_type,
            "Tournament created"
        );

        let current_match = match self.engine.next_match(tournament.id).await? {
            Some(m) => Some(self.match_response(&m).await?),
            None => None,
        };

        Ok(TournamentResponse {
            id: tournament.id,
            round_type: tournament.round_type,
            status: tournament.status,
            current_match,
            created_at: tournament.created_at,
        })
    }

    pub async fn select_winner(
        &self,
        user_id: Uuid,
        tournament_id: Uuid,
        match_id: Uuid,
        request: SelectWinnerRequest,
    ) -> Result<SelectWinnerResponse, ApiError> {
        let tournament = self.owned_tournament(user_id, tournament_id).await?;

        let m = self
            .engine
            .store()
            .match_by_id(match_id)
            .await
            .map_err(ApiError::from)?
            .ok_or(ApiError::NotFound)?;
        if m.tournament_id != tournament.id {
            return Err(ApiError::NotFound);
        }

        self.engine
            .select_winner(match_id, request.winner_photo_id)
            .await?;

        // Status may have flipped during advancement.
        let tournament = self.owned_tournament(user_id, tournament_id).await?;
        let next_match = match self.engine.next_match(tournament_id).await? {
            Some(m) => Some(self.match_response(&m).await?),
            None => None,
        };

        Ok(SelectWinnerResponse {
            is_completed: tournament.status == TournamentStatus::Completed,
            winner_photo_id: tournament.winner_photo_id,
            next_match,
        })
    }

    pub async fn result(
        &self,
        user_id: Uuid,
        tournament_id: Uuid,
    ) -> Result<TournamentResultResponse, ApiError> {
        let tournament = self.owned_tournament(user_id, tournament_id).await?;

        let ranked = self.engine.rankings(tournament_id).await?;
        let mut rankings = Vec::with_capacity(ranked.len());
        for entry in ranked {
            rankings.push(RankingEntry {
                rank: entry.rank,
                photo: self.photo_ref(entry.photo_id).await?,
            });
        }

        Ok(TournamentResultResponse {
            tournament_id: tournament.id,
            round_type: tournament.round_type,
            status: tournament.status,
            rankings,
            completed_at: tournament.completed_at,
        })
    }

    async fn owned_tournament(
        &self,
        user_id: Uuid,
        tournament_id: Uuid,
    ) -> Result<Tournament, ApiError> {
        let tournament = self
            .engine
            .store()
            .tournament(tournament_id)
            .await
            .map_err(ApiError::from)?
            .ok_or(ApiError::NotFound)?;
        if tournament.user_id != user_id {
            return Err(ApiError::Forbidden);
        }
        Ok(tournament)
    }

    async fn match_response(&self, m: &Match) -> Result<MatchResponse, ApiError> {
        Ok(MatchResponse {
            id: m.id,
            round_number: m.round_number,
            match_order: m.match_order,
            photo_a: self.photo_ref(m.photo_a_id).await?,
            photo_b: self.photo_ref(m.photo_b_id).await?,
            winner_photo_id: m.winner_photo_id,
        })
    }

    async fn photo_ref(&self, photo_id: Uuid) -> Result<PhotoInMatch, ApiError> {
        let photo = sqlx::query_as::<_, PhotoInMatch>("SELECT id, url FROM photos WHERE id = $1")
            .bind(photo_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(photo)
    }
}
