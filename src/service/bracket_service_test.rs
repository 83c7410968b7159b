use crate::models::tournament::{Match, Tournament, TournamentStatus};
use crate::service::bracket_service::{BracketEngine, BracketError, BracketStore, RankedPhoto};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    tournaments: HashMap<Uuid, Tournament>,
    matches: HashMap<Uuid, Match>,
}

/// In-memory store mirroring the guarded semantics of the Postgres store.
#[derive(Default)]
struct MemoryBracketStore {
    state: Mutex<MemoryState>,
}

impl MemoryBracketStore {
    fn with_tournament(round_type: i32) -> (Self, Tournament) {
        let tournament = Tournament {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            round_type,
            status: TournamentStatus::InProgress,
            winner_photo_id: None,
            analysis: None,
            created_at: Utc::now(),
            completed_at: None,
        };
        let store = Self::default();
        store
            .state
            .lock()
            .unwrap()
            .tournaments
            .insert(tournament.id, tournament.clone());
        (store, tournament)
    }
}

#[async_trait]
impl BracketStore for MemoryBracketStore {
    async fn tournament(&self, id: Uuid) -> Result<Option<Tournament>, BracketError> {
        Ok(self.state.lock().unwrap().tournaments.get(&id).cloned())
    }

    async fn match_by_id(&self, id: Uuid) -> Result<Option<Match>, BracketError> {
        Ok(self.state.lock().unwrap().matches.get(&id).cloned())
    }

    async fn matches(&self, tournament_id: Uuid) -> Result<Vec<Match>, BracketError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .matches
            .values()
            .filter(|m| m.tournament_id == tournament_id)
            .cloned()
            .collect())
    }

    async fn claim_winner(
        &self,
        match_id: Uuid,
        winner_photo_id: Uuid,
    ) -> Result<bool, BracketError> {
        let mut state = self.state.lock().unwrap();
        match state.matches.get_mut(&match_id) {
            Some(m) if m.winner_photo_id.is_none() => {
                m.winner_photo_id = Some(winner_photo_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_round(
        &self,
        tournament_id: Uuid,
        round_number: i32,
        matches: &[Match],
    ) -> Result<bool, BracketError> {
        let mut state = self.state.lock().unwrap();
        let exists = state
            .matches
            .values()
            .any(|m| m.tournament_id == tournament_id && m.round_number == round_number);
        if exists {
            return Ok(false);
        }
        for m in matches {
            state.matches.insert(m.id, m.clone());
        }
        Ok(true)
    }

    async fn complete(
        &self,
        tournament_id: Uuid,
        winner_photo_id: Uuid,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, BracketError> {
        let mut state = self.state.lock().unwrap();
        match state.tournaments.get_mut(&tournament_id) {
            Some(t) if t.status == TournamentStatus::InProgress => {
                t.status = TournamentStatus::Completed;
                t.winner_photo_id = Some(winner_photo_id);
                t.completed_at = Some(completed_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

fn seeds(n: usize) -> Vec<Uuid> {
    (0..n).map(|_| Uuid::new_v4()).collect()
}

async fn match_count(engine: &BracketEngine<MemoryBracketStore>, tournament_id: Uuid) -> usize {
    engine.store().matches(tournament_id).await.unwrap().len()
}

/// Drive a tournament to completion by always picking photo_a of the next
/// pending match. Returns the number of selections made.
async fn play_through(engine: &BracketEngine<MemoryBracketStore>, tournament_id: Uuid) -> usize {
    let mut selections = 0;
    while let Some(m) = engine.next_match(tournament_id).await.unwrap() {
        engine.select_winner(m.id, m.photo_a_id).await.unwrap();
        selections += 1;
    }
    selections
}

#[tokio::test]
async fn test_construct_partitions_all_seeds() {
    for round_type in [4, 8, 16] {
        let (store, tournament) = MemoryBracketStore::with_tournament(round_type);
        let engine = BracketEngine::new(store);
        let photo_ids = seeds(round_type as usize);

        let matches = engine
            .construct_bracket(&tournament, &photo_ids)
            .await
            .unwrap();

        assert_eq!(matches.len(), round_type as usize / 2);
        assert!(matches.iter().all(|m| m.round_number == 1));
        let orders: Vec<i32> = matches.iter().map(|m| m.match_order).collect();
        assert_eq!(orders, (1..=round_type / 2).collect::<Vec<i32>>());

        let mut participants: Vec<Uuid> = matches
            .iter()
            .flat_map(|m| [m.photo_a_id, m.photo_b_id])
            .collect();
        participants.sort();
        let mut expected = photo_ids.clone();
        expected.sort();
        assert_eq!(participants, expected, "every seed placed exactly once");
    }
}

#[tokio::test]
async fn test_construct_rejects_seed_count_mismatch() {
    let (store, tournament) = MemoryBracketStore::with_tournament(8);
    let engine = BracketEngine::new(store);

    let err = engine
        .construct_bracket(&tournament, &seeds(4))
        .await
        .unwrap_err();
    assert!(matches!(err, BracketError::Validation(_)));
    assert_eq!(match_count(&engine, tournament.id).await, 0);
}

#[tokio::test]
async fn test_construct_rejects_duplicate_seeds() {
    let (store, tournament) = MemoryBracketStore::with_tournament(4);
    let engine = BracketEngine::new(store);

    let mut photo_ids = seeds(3);
    photo_ids.push(photo_ids[0]);
    let err = engine
        .construct_bracket(&tournament, &photo_ids)
        .await
        .unwrap_err();
    assert!(matches!(err, BracketError::Validation(_)));
}

#[tokio::test]
async fn test_construct_rejects_second_bracket() {
    let (store, tournament) = MemoryBracketStore::with_tournament(4);
    let engine = BracketEngine::new(store);

    engine
        .construct_bracket(&tournament, &seeds(4))
        .await
        .unwrap();
    let err = engine
        .construct_bracket(&tournament, &seeds(4))
        .await
        .unwrap_err();
    assert!(matches!(err, BracketError::Validation(_)));
    assert_eq!(match_count(&engine, tournament.id).await, 2);
}

#[tokio::test]
async fn test_next_match_canonical_order_never_repeats() {
    let (store, tournament) = MemoryBracketStore::with_tournament(8);
    let engine = BracketEngine::new(store);
    engine
        .construct_bracket(&tournament, &seeds(8))
        .await
        .unwrap();

    let mut visited = HashSet::new();
    let mut last = (0, 0);
    while let Some(m) = engine.next_match(tournament.id).await.unwrap() {
        assert!(visited.insert(m.id), "a decided match came back");
        assert!(
            (m.round_number, m.match_order) > last,
            "matches must arrive in (round, order) sequence"
        );
        last = (m.round_number, m.match_order);
        engine.select_winner(m.id, m.photo_b_id).await.unwrap();
    }
    // 4 + 2 + 1 matches for an 8-seed bracket.
    assert_eq!(visited.len(), 7);
}

#[tokio::test]
async fn test_reselect_always_rejected() {
    let (store, tournament) = MemoryBracketStore::with_tournament(4);
    let engine = BracketEngine::new(store);
    engine
        .construct_bracket(&tournament, &seeds(4))
        .await
        .unwrap();

    let m = engine.next_match(tournament.id).await.unwrap().unwrap();
    engine.select_winner(m.id, m.photo_a_id).await.unwrap();

    // Same candidate again: still rejected, not a no-op.
    let err = engine.select_winner(m.id, m.photo_a_id).await.unwrap_err();
    assert!(matches!(err, BracketError::AlreadyDecided));

    // Different candidate: rejected too.
    let err = engine.select_winner(m.id, m.photo_b_id).await.unwrap_err();
    assert!(matches!(err, BracketError::AlreadyDecided));
}

#[tokio::test]
async fn test_select_rejects_non_participant() {
    let (store, tournament) = MemoryBracketStore::with_tournament(4);
    let engine = BracketEngine::new(store);
    engine
        .construct_bracket(&tournament, &seeds(4))
        .await
        .unwrap();

    let m = engine.next_match(tournament.id).await.unwrap().unwrap();
    let err = engine
        .select_winner(m.id, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, BracketError::InvalidParticipant));
}

#[tokio::test]
async fn test_select_unknown_match_not_found() {
    let (store, _) = MemoryBracketStore::with_tournament(4);
    let engine = BracketEngine::new(store);
    let err = engine
        .select_winner(Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, BracketError::NotFound));
}

#[tokio::test]
async fn test_four_seed_exact_scenario() {
    // Fixed round 1: (a vs b), (c vs d). Select a, c, then a.
    let (store, tournament) = MemoryBracketStore::with_tournament(4);
    let [a, b, c, d] = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
    store
        .insert_round(
            tournament.id,
            1,
            &[
                Match::new(tournament.id, 1, 1, a, b),
                Match::new(tournament.id, 1, 2, c, d),
            ],
        )
        .await
        .unwrap();
    let engine = BracketEngine::new(store);

    let m1 = engine.next_match(tournament.id).await.unwrap().unwrap();
    assert_eq!((m1.photo_a_id, m1.photo_b_id), (a, b));
    engine.select_winner(m1.id, a).await.unwrap();

    let m2 = engine.next_match(tournament.id).await.unwrap().unwrap();
    assert_eq!((m2.photo_a_id, m2.photo_b_id), (c, d));
    engine.select_winner(m2.id, c).await.unwrap();

    // Round 2 holds exactly one match pairing the winners in order.
    let final_match = engine.next_match(tournament.id).await.unwrap().unwrap();
    assert_eq!(final_match.round_number, 2);
    assert_eq!((final_match.photo_a_id, final_match.photo_b_id), (a, c));
    assert_eq!(match_count(&engine, tournament.id).await, 3);

    engine.select_winner(final_match.id, a).await.unwrap();

    let completed = engine
        .store()
        .tournament(tournament.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(completed.status, TournamentStatus::Completed);
    assert_eq!(completed.winner_photo_id, Some(a));
    assert!(completed.completed_at.is_some());
    assert!(engine.next_match(tournament.id).await.unwrap().is_none());

    let rankings = engine.rankings(tournament.id).await.unwrap();
    assert_eq!(
        rankings,
        vec![
            RankedPhoto { rank: 1, photo_id: a },
            RankedPhoto { rank: 2, photo_id: c },
            RankedPhoto { rank: 3, photo_id: b },
            RankedPhoto { rank: 3, photo_id: d },
        ]
    );
}

#[tokio::test]
async fn test_four_seed_completes_after_three_selections() {
    let (store, tournament) = MemoryBracketStore::with_tournament(4);
    let engine = BracketEngine::new(store);
    engine
        .construct_bracket(&tournament, &seeds(4))
        .await
        .unwrap();

    assert_eq!(play_through(&engine, tournament.id).await, 3);
    let t = engine
        .store()
        .tournament(tournament.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(t.status, TournamentStatus::Completed);
}

#[tokio::test]
async fn test_eight_seed_completes_after_seven_selections() {
    let (store, tournament) = MemoryBracketStore::with_tournament(8);
    let engine = BracketEngine::new(store);
    engine
        .construct_bracket(&tournament, &seeds(8))
        .await
        .unwrap();

    assert_eq!(play_through(&engine, tournament.id).await, 7);

    let rankings = engine.rankings(tournament.id).await.unwrap();
    assert_eq!(
        rankings.iter().map(|r| r.rank).collect::<Vec<i32>>(),
        vec![1, 2, 3, 3]
    );

    // Rank-3 entries are exactly the semifinal (round 2) losers.
    let matches = engine.store().matches(tournament.id).await.unwrap();
    let semifinal_losers: HashSet<Uuid> = matches
        .iter()
        .filter(|m| m.round_number == 2)
        .filter_map(|m| m.loser())
        .collect();
    let ranked_third: HashSet<Uuid> = rankings
        .iter()
        .filter(|r| r.rank == 3)
        .map(|r| r.photo_id)
        .collect();
    assert_eq!(ranked_third, semifinal_losers);
}

#[tokio::test]
async fn test_sixteen_seed_rankings_exclude_quarterfinal_losers() {
    let (store, tournament) = MemoryBracketStore::with_tournament(16);
    let engine = BracketEngine::new(store);
    engine
        .construct_bracket(&tournament, &seeds(16))
        .await
        .unwrap();

    assert_eq!(play_through(&engine, tournament.id).await, 15);

    let rankings = engine.rankings(tournament.id).await.unwrap();
    assert_eq!(rankings.len(), 4);
    assert_eq!(
        rankings.iter().map(|r| r.rank).collect::<Vec<i32>>(),
        vec![1, 2, 3, 3]
    );
}

#[tokio::test]
async fn test_advance_round_idempotent() {
    let (store, tournament) = MemoryBracketStore::with_tournament(4);
    let engine = BracketEngine::new(store);
    engine
        .construct_bracket(&tournament, &seeds(4))
        .await
        .unwrap();

    // Decide round 1; select_winner already ran advancement once.
    for _ in 0..2 {
        let m = engine.next_match(tournament.id).await.unwrap().unwrap();
        engine.select_winner(m.id, m.photo_a_id).await.unwrap();
    }
    assert_eq!(match_count(&engine, tournament.id).await, 3);

    engine.advance_round(tournament.id).await.unwrap();
    engine.advance_round(tournament.id).await.unwrap();
    assert_eq!(
        match_count(&engine, tournament.id).await,
        3,
        "redundant advancement must not duplicate rounds"
    );
}

#[tokio::test]
async fn test_completion_is_terminal_and_idempotent() {
    let (store, tournament) = MemoryBracketStore::with_tournament(4);
    let engine = BracketEngine::new(store);
    engine
        .construct_bracket(&tournament, &seeds(4))
        .await
        .unwrap();
    play_through(&engine, tournament.id).await;

    let before = engine
        .store()
        .tournament(tournament.id)
        .await
        .unwrap()
        .unwrap();
    engine.advance_round(tournament.id).await.unwrap();
    engine.advance_round(tournament.id).await.unwrap();
    let after = engine
        .store()
        .tournament(tournament.id)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(after.status, TournamentStatus::Completed);
    assert_eq!(after.winner_photo_id, before.winner_photo_id);
    assert_eq!(after.completed_at, before.completed_at);
    assert_eq!(match_count(&engine, tournament.id).await, 3);
}

#[tokio::test]
async fn test_rankings_before_completion_rejected() {
    let (store, tournament) = MemoryBracketStore::with_tournament(4);
    let engine = BracketEngine::new(store);
    engine
        .construct_bracket(&tournament, &seeds(4))
        .await
        .unwrap();

    let err = engine.rankings(tournament.id).await.unwrap_err();
    assert!(matches!(err, BracketError::NotCompleted));
}

#[tokio::test]
async fn test_next_match_heals_interrupted_advancement() {
    // Round 1 fully decided but round 2 never created, as if the process
    // died between the winner claim and the advancement write.
    let (store, tournament) = MemoryBracketStore::with_tournament(4);
    let [a, b, c, d] = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
    let round_one = [
        Match::new(tournament.id, 1, 1, a, b),
        Match::new(tournament.id, 1, 2, c, d),
    ];
    store
        .insert_round(tournament.id, 1, &round_one)
        .await
        .unwrap();
    store.claim_winner(round_one[0].id, a).await.unwrap();
    store.claim_winner(round_one[1].id, d).await.unwrap();
    let engine = BracketEngine::new(store);

    let healed = engine.next_match(tournament.id).await.unwrap().unwrap();
    assert_eq!(healed.round_number, 2);
    assert_eq!((healed.photo_a_id, healed.photo_b_id), (a, d));
}

#[tokio::test]
async fn test_unknown_tournament_not_found() {
    let store = MemoryBracketStore::default();
    let engine = BracketEngine::new(store);
    assert!(matches!(
        engine.next_match(Uuid::new_v4()).await.unwrap_err(),
        BracketError::NotFound
    ));
    assert!(matches!(
        engine.rankings(Uuid::new_v4()).await.unwrap_err(),
        BracketError::NotFound
    ));
}
