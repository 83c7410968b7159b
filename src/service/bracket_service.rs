use crate::models::tournament::{Match, Tournament, TournamentStatus, VALID_ROUND_TYPES};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum BracketError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("tournament or match not found")]
    NotFound,

    #[error("match already has a winner")]
    AlreadyDecided,

    #[error("winner must be one of the match participants")]
    InvalidParticipant,

    #[error("tournament is still in progress")]
    NotCompleted,

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

/// One entry of a completed bracket's ranking. Semifinal losers share rank 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankedPhoto {
    pub rank: i32,
    pub photo_id: Uuid,
}

/// Persistence seam for the bracket engine. The guarded operations
/// (`claim_winner`, `insert_round`, `complete`) carry the concurrency
/// contract: each must be atomic and report via its return value whether
/// this caller performed the transition.
#[async_trait]
pub trait BracketStore: Send + Sync {
    async fn tournament(&self, id: Uuid) -> Result<Option<Tournament>, BracketError>;

    async fn match_by_id(&self, id: Uuid) -> Result<Option<Match>, BracketError>;

    /// All matches of a tournament, in no particular order.
    async fn matches(&self, tournament_id: Uuid) -> Result<Vec<Match>, BracketError>;

    /// Set the winner iff none is set yet. Returns false when the match was
    /// already decided (or does not exist).
    async fn claim_winner(&self, match_id: Uuid, winner_photo_id: Uuid)
        -> Result<bool, BracketError>;

    /// Insert a whole round iff the tournament has no match in that round
    /// yet. Returns false when another writer created the round first.
    async fn insert_round(
        &self,
        tournament_id: Uuid,
        round_number: i32,
        matches: &[Match],
    ) -> Result<bool, BracketError>;

    /// Transition IN_PROGRESS -> COMPLETED, recording winner and timestamp.
    /// Returns false when the tournament was already completed.
    async fn complete(
        &self,
        tournament_id: Uuid,
        winner_photo_id: Uuid,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, BracketError>;
}

/// Single-elimination bracket engine: construction, match progression,
/// completion detection and ranking computation over a [`BracketStore`].
#[derive(Clone)]
pub struct BracketEngine<S> {
    store: S,
}

impl<S: BracketStore> BracketEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Build round 1 from the seed photos: uniform shuffle, then consecutive
    /// pairing. Refuses duplicate seeds, wrong seed counts, and
    /// re-construction of an already bracketed tournament.
    pub async fn construct_bracket(
        &self,
        tournament: &Tournament,
        photo_ids: &[Uuid],
    ) -> Result<Vec<Match>, BracketError> {
        if !VALID_ROUND_TYPES.contains(&tournament.round_type) {
            return Err(BracketError::Validation(format!(
                "round_type must be one of {:?}, got {}",
                VALID_ROUND_TYPES, tournament.round_type
            )));
        }
        if photo_ids.len() as i32 != tournament.round_type {
            return Err(BracketError::Validation(format!(
                "a {}-seed tournament requires exactly {} photos, got {}",
                tournament.round_type,
                tournament.round_type,
                photo_ids.len()
            )));
        }
        let distinct: HashSet<Uuid> = photo_ids.iter().copied().collect();
        if distinct.len() != photo_ids.len() {
            return Err(BracketError::Validation(
                "seed photos must be distinct".to_string(),
            ));
        }

        let mut shuffled = photo_ids.to_vec();
        shuffled.shuffle(&mut rand::thread_rng());

        let matches = pair_into_matches(tournament.id, 1, &shuffled);
        if !self.store.insert_round(tournament.id, 1, &matches).await? {
            return Err(BracketError::Validation(
                "tournament already has a bracket".to_string(),
            ));
        }

        info!(
            tournament_id = %tournament.id,
            matches = matches.len(),
            "Bracket constructed"
        );
        Ok(matches)
    }

    /// The undecided match with the lowest `(round_number, match_order)`,
    /// or None once every match has a winner.
    pub async fn next_match(&self, tournament_id: Uuid) -> Result<Option<Match>, BracketError> {
        let tournament = self.require_tournament(tournament_id).await?;
        let pending = self.first_pending(tournament_id).await?;
        if pending.is_none() && tournament.status == TournamentStatus::InProgress {
            // A fully decided bracket that is still in progress means an
            // advancement was interrupted mid-flight. Advancement is a pure
            // recomputation from the stored matches, so re-run it and look
            // again.
            self.advance_round(tournament_id).await?;
            return self.first_pending(tournament_id).await;
        }
        Ok(pending)
    }

    /// Record a winner for a match, then advance the owning tournament.
    /// Any second submission fails with `AlreadyDecided`, even for the same
    /// candidate.
    pub async fn select_winner(
        &self,
        match_id: Uuid,
        winner_photo_id: Uuid,
    ) -> Result<Match, BracketError> {
        let m = self
            .store
            .match_by_id(match_id)
            .await?
            .ok_or(BracketError::NotFound)?;

        if m.is_decided() {
            return Err(BracketError::AlreadyDecided);
        }
        if !m.has_participant(winner_photo_id) {
            return Err(BracketError::InvalidParticipant);
        }

        if !self.store.claim_winner(match_id, winner_photo_id).await? {
            // Another submission won the race between our read and the claim.
            return Err(BracketError::AlreadyDecided);
        }

        debug!(match_id = %match_id, winner = %winner_photo_id, "Winner recorded");
        self.advance_round(m.tournament_id).await?;

        Ok(Match {
            winner_photo_id: Some(winner_photo_id),
            ..m
        })
    }

    /// If the current round is fully decided, create the next round or
    /// complete the tournament. Safe to invoke redundantly: round creation
    /// and completion are both guarded at the store.
    pub async fn advance_round(&self, tournament_id: Uuid) -> Result<(), BracketError> {
        let tournament = self.require_tournament(tournament_id).await?;
        if tournament.status == TournamentStatus::Completed {
            return Ok(());
        }

        let matches = self.store.matches(tournament_id).await?;
        let Some(current_round) = matches.iter().map(|m| m.round_number).max() else {
            return Ok(());
        };

        let mut current: Vec<&Match> = matches
            .iter()
            .filter(|m| m.round_number == current_round)
            .collect();
        current.sort_by_key(|m| m.match_order);

        if current.iter().any(|m| !m.is_decided()) {
            // Round still open. Expected steady state between selections.
            return Ok(());
        }

        let winners: Vec<Uuid> = current.iter().filter_map(|m| m.winner_photo_id).collect();

        if winners.len() == 1 {
            let champion = winners[0];
            if self
                .store
                .complete(tournament_id, champion, Utc::now())
                .await?
            {
                info!(
                    tournament_id = %tournament_id,
                    winner = %champion,
                    "Tournament completed"
                );
            }
            return Ok(());
        }

        // Winners pair up in match_order; no reshuffle between rounds.
        let next_round = current_round + 1;
        let next_matches = pair_into_matches(tournament_id, next_round, &winners);
        if self
            .store
            .insert_round(tournament_id, next_round, &next_matches)
            .await?
        {
            info!(
                tournament_id = %tournament_id,
                round = next_round,
                matches = next_matches.len(),
                "Advanced to next round"
            );
        }
        Ok(())
    }

    /// Final ranking of a completed tournament: champion, final loser, then
    /// the semifinal losers tied at rank 3 in match order. Earlier rounds
    /// are not ranked.
    pub async fn rankings(&self, tournament_id: Uuid) -> Result<Vec<RankedPhoto>, BracketError> {
        let tournament = self.require_tournament(tournament_id).await?;
        if tournament.status != TournamentStatus::Completed {
            return Err(BracketError::NotCompleted);
        }
        let champion = tournament
            .winner_photo_id
            .ok_or(BracketError::NotCompleted)?;

        let matches = self.store.matches(tournament_id).await?;
        let final_round = matches
            .iter()
            .map(|m| m.round_number)
            .max()
            .ok_or(BracketError::NotCompleted)?;
        let final_match = matches
            .iter()
            .find(|m| m.round_number == final_round)
            .ok_or(BracketError::NotCompleted)?;
        let runner_up = if final_match.photo_a_id == champion {
            final_match.photo_b_id
        } else {
            final_match.photo_a_id
        };

        let mut rankings = vec![
            RankedPhoto {
                rank: 1,
                photo_id: champion,
            },
            RankedPhoto {
                rank: 2,
                photo_id: runner_up,
            },
        ];

        let mut semifinals: Vec<&Match> = matches
            .iter()
            .filter(|m| m.round_number == final_round - 1)
            .collect();
        semifinals.sort_by_key(|m| m.match_order);
        for m in semifinals {
            if let Some(loser) = m.loser() {
                rankings.push(RankedPhoto {
                    rank: 3,
                    photo_id: loser,
                });
            }
        }

        Ok(rankings)
    }

    async fn first_pending(&self, tournament_id: Uuid) -> Result<Option<Match>, BracketError> {
        let mut matches = self.store.matches(tournament_id).await?;
        matches.sort_by_key(|m| (m.round_number, m.match_order));
        Ok(matches.into_iter().find(|m| !m.is_decided()))
    }

    async fn require_tournament(&self, id: Uuid) -> Result<Tournament, BracketError> {
        self.store.tournament(id).await?.ok_or(BracketError::NotFound)
    }
}

fn pair_into_matches(tournament_id: Uuid, round_number: i32, photo_ids: &[Uuid]) -> Vec<Match> {
    photo_ids
        .chunks(2)
        .enumerate()
        .map(|(i, pair)| Match::new(tournament_id, round_number, i as i32 + 1, pair[0], pair[1]))
        .collect()
}
