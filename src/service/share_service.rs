use crate::api_error::ApiError;
use crate::db::{is_unique_violation, DbPool};
use crate::models::share::{
    Share, ShareCreateRequest, ShareResponse, VoteRequest, VoteResponse,
};
use crate::models::tournament::{PhotoInMatch, RankingEntry, Tournament, TournamentStatus};
use crate::models::user::User;
use crate::service::bracket_service::{BracketEngine, BracketStore};
use crate::service::bracket_store::PgBracketStore;
use crate::service::card_service::{CardDocument, CardRenderer, RankedCardPhoto};
use crate::service::insight_service::{InsightGenerator, InsightReport, RankedPhotoRef};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::FromRow;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct SharedTournamentResponse {
    pub tournament_id: Uuid,
    pub username: String,
    pub round_type: i32,
    pub rankings: Vec<RankingEntry>,
    pub insight: Option<InsightReport>,
    pub cards: Option<Vec<CardDocument>>,
    pub vote_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct RankedPhotoRow {
    id: Uuid,
    url: String,
    file_path: String,
}

/// Share links over completed tournaments, plus the public view that
/// assembles rankings, cached-or-generated insights, cards and votes.
#[derive(Clone)]
pub struct ShareService {
    pool: DbPool,
    engine: BracketEngine<PgBracketStore>,
    insights: Arc<dyn InsightGenerator>,
    cards: Arc<dyn CardRenderer>,
    public_base_url: String,
}

impl ShareService {
    pub fn new(
        pool: DbPool,
        insights: Arc<dyn InsightGenerator>,
        cards: Arc<dyn CardRenderer>,
        public_base_url: String,
    ) -> Self {
        let engine = BracketEngine::new(PgBracketStore::new(pool.clone()));
        Self {
            pool,
            engine,
            insights,
            cards,
            public_base_url,
        }
    }

    pub async fn create_share(
        &self,
        user_id: Uuid,
        tournament_id: Uuid,
        request: ShareCreateRequest,
    ) -> Result<ShareResponse, ApiError> {
        let tournament = self.tournament(tournament_id).await?;
        if tournament.user_id != user_id {
            return Err(ApiError::Forbidden);
        }
        if tournament.status != TournamentStatus::Completed {
            return Err(ApiError::bad_request(
                "only completed tournaments can be shared",
            ));
        }

        let expires_at = request.expires_days.map(|days| Utc::now() + Duration::days(days));

        let existing = sqlx::query_as::<_, Share>(
            "SELECT * FROM shares WHERE tournament_id = $1 AND user_id = $2",
        )
        .bind(tournament_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let share = match existing {
            Some(share) => {
                sqlx::query_as::<_, Share>(
                    "UPDATE shares SET is_public = $2, expires_at = $3 WHERE id = $1 RETURNING *",
                )
                .bind(&share.id)
                .bind(request.is_public)
                .bind(expires_at)
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                let share_id = new_share_id();
                sqlx::query_as::<_, Share>(
                    r#"
                    INSERT INTO shares (id, tournament_id, user_id, is_public, expires_at)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING *
                    "#,
                )
                .bind(&share_id)
                .bind(tournament_id)
                .bind(user_id)
                .bind(request.is_public)
                .bind(expires_at)
                .fetch_one(&self.pool)
                .await?
            }
        };

        info!(share_id = %share.id, tournament_id = %tournament_id, "Share link ready");
        Ok(ShareResponse {
            share_url: format!(
                "{}/share/{}",
                self.public_base_url.trim_end_matches('/'),
                share.id
            ),
            share_id: share.id,
            tournament_id: share.tournament_id,
            is_public: share.is_public,
            expires_at: share.expires_at,
            created_at: share.created_at,
        })
    }

    /// Public view of a shared tournament. Insight generation may fail (or
    /// be disabled); the share still renders without it.
    pub async fn shared_view(&self, share_id: &str) -> Result<SharedTournamentResponse, ApiError> {
        let share = self.valid_share(share_id).await?;
        let tournament = self.tournament(share.tournament_id).await?;
        let owner = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(tournament.user_id)
            .fetch_one(&self.pool)
            .await?;

        let ranked = self.engine.rankings(tournament.id).await?;
        let mut rankings = Vec::with_capacity(ranked.len());
        let mut photo_rows = Vec::with_capacity(ranked.len());
        for entry in &ranked {
            let row = sqlx::query_as::<_, RankedPhotoRow>(
                "SELECT id, url, file_path FROM photos WHERE id = $1",
            )
            .bind(entry.photo_id)
            .fetch_one(&self.pool)
            .await?;
            rankings.push(RankingEntry {
                rank: entry.rank,
                photo: PhotoInMatch {
                    id: row.id,
                    url: row.url.clone(),
                },
            });
            photo_rows.push(row);
        }

        let insight = self.insight_for(&tournament, &ranked, &photo_rows).await;
        let cards = match &insight {
            Some(report) => {
                let card_photos: Vec<RankedCardPhoto> = rankings
                    .iter()
                    .map(|entry| RankedCardPhoto {
                        rank: entry.rank,
                        photo_url: entry.photo.url.clone(),
                        keywords: report.winner_analysis.keywords.clone(),
                    })
                    .collect();
                match self.cards.render(report, &card_photos, owner.is_premium).await {
                    Ok(cards) => Some(cards),
                    Err(e) => {
                        warn!(share_id = %share.id, error = %e, "Card rendering failed");
                        None
                    }
                }
            }
            None => None,
        };

        let vote_count = self.vote_count(tournament.id).await?;

        Ok(SharedTournamentResponse {
            tournament_id: tournament.id,
            username: owner.username,
            round_type: tournament.round_type,
            rankings,
            insight,
            cards,
            vote_count,
            created_at: tournament.created_at,
        })
    }

    pub async fn cast_vote(
        &self,
        share_id: &str,
        ip_address: &str,
        user_id: Option<Uuid>,
        request: VoteRequest,
    ) -> Result<VoteResponse, ApiError> {
        let share = self.valid_share(share_id).await?;

        let vote_id = Uuid::new_v4();
        let result = sqlx::query(
            r#"
            INSERT INTO votes (id, tournament_id, user_id, ip_address, rankings)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(vote_id)
        .bind(share.tournament_id)
        .bind(user_id)
        .bind(ip_address)
        .bind(&request.rankings)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(ApiError::conflict("this address has already voted"));
            }
            Err(e) => return Err(e.into()),
        }

        Ok(VoteResponse {
            vote_id,
            vote_count: self.vote_count(share.tournament_id).await?,
        })
    }

    /// Cached insight report, or a fresh one persisted for next time.
    /// Never fails the share view: errors degrade to None.
    async fn insight_for(
        &self,
        tournament: &Tournament,
        ranked: &[crate::service::bracket_service::RankedPhoto],
        photo_rows: &[RankedPhotoRow],
    ) -> Option<InsightReport> {
        if let Some(cached) = &tournament.analysis {
            match serde_json::from_value::<InsightReport>(cached.clone()) {
                Ok(report) => return Some(report),
                Err(e) => {
                    warn!(tournament_id = %tournament.id, error = %e, "Discarding unreadable cached analysis");
                }
            }
        }

        let refs: Vec<RankedPhotoRef> = ranked
            .iter()
            .zip(photo_rows)
            .map(|(entry, row)| RankedPhotoRef {
                rank: entry.rank,
                file_path: row.file_path.clone(),
            })
            .collect();

        match self.insights.generate(&refs).await {
            Ok(report) => {
                match serde_json::to_value(&report) {
                    Ok(value) => {
                        if let Err(e) = sqlx::query(
                            "UPDATE tournaments SET analysis = $2 WHERE id = $1",
                        )
                        .bind(tournament.id)
                        .bind(value)
                        .execute(&self.pool)
                        .await
                        {
                            warn!(tournament_id = %tournament.id, error = %e, "Failed to cache analysis");
                        }
                    }
                    Err(e) => {
                        warn!(tournament_id = %tournament.id, error = %e, "Failed to serialize analysis");
                    }
                }
                Some(report)
            }
            Err(e) => {
                warn!(tournament_id = %tournament.id, error = %e, "Insight generation failed");
                None
            }
        }
    }

    async fn valid_share(&self, share_id: &str) -> Result<Share, ApiError> {
        let share = sqlx::query_as::<_, Share>("SELECT * FROM shares WHERE id = $1")
            .bind(share_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ApiError::NotFound)?;
        if share.is_expired(Utc::now()) {
            return Err(ApiError::Gone("this share link has expired".to_string()));
        }
        if !share.is_public {
            return Err(ApiError::Forbidden);
        }
        Ok(share)
    }

    async fn tournament(&self, tournament_id: Uuid) -> Result<Tournament, ApiError> {
        self.engine
            .store()
            .tournament(tournament_id)
            .await
            .map_err(ApiError::from)?
            .ok_or(ApiError::NotFound)
    }

    async fn vote_count(&self, tournament_id: Uuid) -> Result<i64, ApiError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM votes WHERE tournament_id = $1")
            .bind(tournament_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn new_share_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}
