//! Persistent storage of matches and pending challenges.
//!
//! [`GameStore`] is the seam the session and the challenge handshake are
//! written against. [`PgStore`] is the production backend, [`MemoryStore`]
//! keeps everything in process and is what the tests run on.

use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::PgPool;

use crate::crud::{
    crud_create_challenge, crud_delete_challenge, crud_delete_match, crud_find_challenge,
    crud_find_match, crud_get_match, crud_get_opponents, crud_get_or_create_match,
    crud_update_draw, crud_upsert_match,
};
use crate::error::{GameError, StoreError};
use crate::schema::{Challenge, GroupId, MatchKey, MatchRecord, PlayerId, Side};

/// Keyed select/upsert/delete over the `games` and `challenges` tables.
///
/// Every write touches a single row with a single statement.
#[async_trait]
pub trait GameStore: Send + Sync {
    /// Returns the stored match for `fresh.key`, inserting `fresh` first if none exists.
    async fn load_or_create_match(&self, fresh: &MatchRecord) -> Result<MatchRecord, GameError>;

    async fn get_match(&self, key: &MatchKey) -> Result<Option<MatchRecord>, GameError>;

    /// Writes the whole record in one statement.
    async fn save_match(&self, record: &MatchRecord) -> Result<(), GameError>;

    async fn update_draw_offer(&self, key: &MatchKey, draw: Option<Side>)
        -> Result<(), GameError>;

    /// Deleting a key with no row is a no-op.
    async fn delete_match(&self, key: &MatchKey) -> Result<(), GameError>;

    /// Finds the match between `a` and `b` regardless of colours.
    async fn find_match(
        &self,
        group: GroupId,
        a: PlayerId,
        b: PlayerId,
    ) -> Result<Option<MatchKey>, GameError>;

    /// Opponents of `player` in every match they are playing in `group`.
    async fn opponents(&self, group: GroupId, player: PlayerId)
        -> Result<Vec<PlayerId>, GameError>;

    /// Finds the pending challenge between `a` and `b` in either direction.
    async fn find_challenge(
        &self,
        group: GroupId,
        a: PlayerId,
        b: PlayerId,
    ) -> Result<Option<Challenge>, GameError>;

    /// Inserting an existing challenge is a no-op.
    async fn create_challenge(&self, challenge: &Challenge) -> Result<(), GameError>;

    /// Deleting a missing challenge is a no-op.
    async fn delete_challenge(&self, challenge: &Challenge) -> Result<(), GameError>;
}

/// Postgres backend.
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Applies the embedded migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.db).await?;
        Ok(())
    }
}

#[async_trait]
impl GameStore for PgStore {
    async fn load_or_create_match(&self, fresh: &MatchRecord) -> Result<MatchRecord, GameError> {
        crud_get_or_create_match(&self.db, fresh).await?.try_into()
    }

    async fn get_match(&self, key: &MatchKey) -> Result<Option<MatchRecord>, GameError> {
        crud_get_match(&self.db, key)
            .await?
            .map(MatchRecord::try_from)
            .transpose()
    }

    async fn save_match(&self, record: &MatchRecord) -> Result<(), GameError> {
        Ok(crud_upsert_match(&self.db, record).await?)
    }

    async fn update_draw_offer(
        &self,
        key: &MatchKey,
        draw: Option<Side>,
    ) -> Result<(), GameError> {
        Ok(crud_update_draw(&self.db, key, draw).await?)
    }

    async fn delete_match(&self, key: &MatchKey) -> Result<(), GameError> {
        Ok(crud_delete_match(&self.db, key).await?)
    }

    async fn find_match(
        &self,
        group: GroupId,
        a: PlayerId,
        b: PlayerId,
    ) -> Result<Option<MatchKey>, GameError> {
        crud_find_match(&self.db, group, a, b)
            .await?
            .map(|m| MatchRecord::try_from(m).map(|r| r.key))
            .transpose()
    }

    async fn opponents(
        &self,
        group: GroupId,
        player: PlayerId,
    ) -> Result<Vec<PlayerId>, GameError> {
        Ok(crud_get_opponents(&self.db, group, player).await?)
    }

    async fn find_challenge(
        &self,
        group: GroupId,
        a: PlayerId,
        b: PlayerId,
    ) -> Result<Option<Challenge>, GameError> {
        Ok(crud_find_challenge(&self.db, group, a, b)
            .await?
            .map(Challenge::from))
    }

    async fn create_challenge(&self, challenge: &Challenge) -> Result<(), GameError> {
        Ok(crud_create_challenge(&self.db, challenge).await?)
    }

    async fn delete_challenge(&self, challenge: &Challenge) -> Result<(), GameError> {
        Ok(crud_delete_challenge(&self.db, challenge).await?)
    }
}

/// In-process backend.
///
/// Matches are kept in insertion order per group so `opponents` lists them the
/// way the Postgres backend does (oldest first).
#[derive(Default)]
pub struct MemoryStore {
    matches: DashMap<MatchKey, (u64, MatchRecord)>,
    challenges: DashMap<Challenge, u64>,
    seq: std::sync::atomic::AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, std::sync::atomic::Ordering::SeqCst)
    }

    pub fn match_count(&self) -> usize {
        self.matches.len()
    }

    pub fn challenge_count(&self) -> usize {
        self.challenges.len()
    }
}

#[async_trait]
impl GameStore for MemoryStore {
    async fn load_or_create_match(&self, fresh: &MatchRecord) -> Result<MatchRecord, GameError> {
        let seq = self.next_seq();
        let entry = self
            .matches
            .entry(fresh.key)
            .or_insert_with(|| (seq, fresh.clone()));
        Ok(entry.1.clone())
    }

    async fn get_match(&self, key: &MatchKey) -> Result<Option<MatchRecord>, GameError> {
        Ok(self.matches.get(key).map(|entry| entry.1.clone()))
    }

    async fn save_match(&self, record: &MatchRecord) -> Result<(), GameError> {
        let seq = self.next_seq();
        self.matches
            .entry(record.key)
            .and_modify(|entry| entry.1 = record.clone())
            .or_insert_with(|| (seq, record.clone()));
        Ok(())
    }

    async fn update_draw_offer(
        &self,
        key: &MatchKey,
        draw: Option<Side>,
    ) -> Result<(), GameError> {
        let mut entry = self
            .matches
            .get_mut(key)
            .ok_or(StoreError::NotFound(*key))?;
        entry.1.draw = draw;
        Ok(())
    }

    async fn delete_match(&self, key: &MatchKey) -> Result<(), GameError> {
        self.matches.remove(key);
        Ok(())
    }

    async fn find_match(
        &self,
        group: GroupId,
        a: PlayerId,
        b: PlayerId,
    ) -> Result<Option<MatchKey>, GameError> {
        let found = [(a, b), (b, a)]
            .into_iter()
            .filter(|(white, black)| white != black)
            .map(|(white, black)| MatchKey {
                group,
                white,
                black,
            })
            .find(|key| self.matches.contains_key(key));
        Ok(found)
    }

    async fn opponents(
        &self,
        group: GroupId,
        player: PlayerId,
    ) -> Result<Vec<PlayerId>, GameError> {
        let mut found: Vec<(u64, PlayerId)> = self
            .matches
            .iter()
            .filter(|entry| entry.key().group == group)
            .filter_map(|entry| {
                entry
                    .key()
                    .opponent_of(player)
                    .map(|opponent| (entry.value().0, opponent))
            })
            .collect();
        found.sort_by_key(|(seq, _)| *seq);
        Ok(found.into_iter().map(|(_, opponent)| opponent).collect())
    }

    async fn find_challenge(
        &self,
        group: GroupId,
        a: PlayerId,
        b: PlayerId,
    ) -> Result<Option<Challenge>, GameError> {
        let mut found: Vec<(u64, Challenge)> = self
            .challenges
            .iter()
            .filter(|entry| entry.key().group == group && entry.key().involves(a, b))
            .map(|entry| (*entry.value(), *entry.key()))
            .collect();
        found.sort_by_key(|(seq, _)| *seq);
        Ok(found.into_iter().next().map(|(_, challenge)| challenge))
    }

    async fn create_challenge(&self, challenge: &Challenge) -> Result<(), GameError> {
        let seq = self.next_seq();
        self.challenges.entry(*challenge).or_insert(seq);
        Ok(())
    }

    async fn delete_challenge(&self, challenge: &Challenge) -> Result<(), GameError> {
        self.challenges.remove(challenge);
        Ok(())
    }
}
