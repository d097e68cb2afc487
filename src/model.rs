use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GameError;
use crate::schema::{Challenge, GroupId, MatchKey, MatchRecord, PlayerId, PlayerNames, Side};

// For sqlx
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct MatchModel {
    pub group_id: GroupId,
    pub white_id: PlayerId,
    pub black_id: PlayerId,
    pub board: String,
    pub turn: Side,
    pub pawn_move: Option<String>,
    pub moved: String,
    pub draw: Option<Side>,
    pub white_name: String,
    pub black_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct ChallengeModel {
    pub group_id: GroupId,
    pub challenger: PlayerId,
    pub challenged: PlayerId,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<MatchModel> for MatchRecord {
    type Error = GameError;

    fn try_from(m: MatchModel) -> Result<Self, Self::Error> {
        let key = MatchKey::new(m.group_id, m.white_id, m.black_id)
            .map_err(|e| GameError::CorruptRecord(e.to_string()))?;
        Ok(Self {
            key,
            board: m.board,
            turn: m.turn,
            pawn_move: m.pawn_move,
            moved: m.moved,
            draw: m.draw,
            names: PlayerNames::new(m.white_name, m.black_name),
        })
    }
}

impl From<ChallengeModel> for Challenge {
    fn from(c: ChallengeModel) -> Self {
        Self {
            group: c.group_id,
            challenger: c.challenger,
            challenged: c.challenged,
        }
    }
}
