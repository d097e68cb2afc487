//! Two-step invitation handshake that gates match creation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::GameError;
use crate::schema::{Challenge, GroupId, MatchKey, PlayerId};
use crate::store::GameStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum ChallengeOutcome {
    /// Stored, waiting for the opponent to challenge back.
    Pending,
    /// Both players challenged each other. The challenge is gone and the
    /// caller should open the match under `key`; the first challenger is white.
    Accepted { key: MatchKey },
}

#[derive(Clone)]
pub struct ChallengeNegotiator {
    store: Arc<dyn GameStore>,
}

impl ChallengeNegotiator {
    pub fn new(store: Arc<dyn GameStore>) -> Self {
        Self { store }
    }

    pub async fn challenge(
        &self,
        challenger: PlayerId,
        opponent: PlayerId,
        group: GroupId,
    ) -> Result<ChallengeOutcome, GameError> {
        if challenger == opponent {
            return Err(GameError::SelfChallenge);
        }
        if self
            .store
            .find_match(group, challenger, opponent)
            .await?
            .is_some()
        {
            return Err(GameError::AlreadyInMatch(challenger, opponent));
        }

        match self.store.find_challenge(group, challenger, opponent).await? {
            None => {
                let challenge = Challenge {
                    group,
                    challenger,
                    challenged: opponent,
                };
                self.store.create_challenge(&challenge).await?;
                debug!(%group, %challenger, %opponent, "challenge pending");
                Ok(ChallengeOutcome::Pending)
            }
            Some(existing) if existing.challenger == challenger => {
                Err(GameError::DuplicateChallenge(opponent))
            }
            Some(existing) => {
                self.store.delete_challenge(&existing).await?;
                let key = MatchKey::new(group, existing.challenger, existing.challenged)?;
                info!(%group, white = %key.white, black = %key.black, "challenge accepted");
                Ok(ChallengeOutcome::Accepted { key })
            }
        }
    }

    /// Removes the challenge `challenger` sent to `opponent`.
    pub async fn withdraw(
        &self,
        challenger: PlayerId,
        opponent: PlayerId,
        group: GroupId,
    ) -> Result<(), GameError> {
        match self.store.find_challenge(group, challenger, opponent).await? {
            Some(existing) if existing.challenger == challenger => {
                self.store.delete_challenge(&existing).await?;
                debug!(%group, %challenger, %opponent, "challenge withdrawn");
                Ok(())
            }
            _ => Err(GameError::NoPendingChallenge {
                challenger,
                opponent,
            }),
        }
    }

    /// The pending challenge between `a` and `b`, in either direction.
    pub async fn pending(
        &self,
        a: PlayerId,
        b: PlayerId,
        group: GroupId,
    ) -> Result<Option<Challenge>, GameError> {
        self.store.find_challenge(group, a, b).await
    }
}
