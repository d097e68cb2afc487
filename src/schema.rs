use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::Type;

use crate::error::GameError;

/// Identifier of the group (namespace) a match or challenge lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct GroupId(pub i64);

/// Identifier of a player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct PlayerId(pub i64);

macro_rules! id_impls {
    ($ty:ident) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $ty {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse().map($ty)
            }
        }
    };
}

id_impls!(GroupId);
id_impls!(PlayerId);

/// One side of the board. White is player A and always moves first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "side", rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::White => "white",
            Side::Black => "black",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result state of a match as reported by the rules engine, or drawn by agreement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum Status {
    Ongoing,
    Decisive { winner: Side },
    Drawn,
}

impl Status {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Status::Ongoing)
    }
}

/// Key of a match row: `(group, white, black)`. White and black always differ.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchKey {
    pub group: GroupId,
    pub white: PlayerId,
    pub black: PlayerId,
}

impl MatchKey {
    pub fn new(group: GroupId, white: PlayerId, black: PlayerId) -> Result<Self, GameError> {
        if white == black {
            return Err(GameError::SamePlayer(white));
        }
        Ok(Self {
            group,
            white,
            black,
        })
    }

    pub fn player(&self, side: Side) -> PlayerId {
        match side {
            Side::White => self.white,
            Side::Black => self.black,
        }
    }

    /// The side `player` plays in this match, if they are one of the two players.
    pub fn side_of(&self, player: PlayerId) -> Option<Side> {
        if player == self.white {
            Some(Side::White)
        } else if player == self.black {
            Some(Side::Black)
        } else {
            None
        }
    }

    pub fn opponent_of(&self, player: PlayerId) -> Option<PlayerId> {
        self.side_of(player).map(|side| self.player(side.opposite()))
    }
}

impl fmt::Display for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.group, self.white, self.black)
    }
}

/// Display names shown next to the board.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerNames {
    pub white: String,
    pub black: String,
}

impl PlayerNames {
    pub fn new(white: impl Into<String>, black: impl Into<String>) -> Self {
        Self {
            white: white.into(),
            black: black.into(),
        }
    }
}

/// Persisted state of one match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchRecord {
    pub key: MatchKey,
    pub board: String,
    pub turn: Side,
    pub pawn_move: Option<String>,
    pub moved: String,
    pub draw: Option<Side>,
    pub names: PlayerNames,
}

/// A pending invitation. Stored directed, looked up as an unordered pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Challenge {
    pub group: GroupId,
    pub challenger: PlayerId,
    pub challenged: PlayerId,
}

impl Challenge {
    pub fn involves(&self, a: PlayerId, b: PlayerId) -> bool {
        (self.challenger == a && self.challenged == b)
            || (self.challenger == b && self.challenged == a)
    }
}

/// Snapshot of a match as printed by the command line.
#[derive(Debug, Deserialize, Serialize)]
pub struct MatchSummary {
    pub group: GroupId,
    pub white: PlayerId,
    pub black: PlayerId,
    pub white_name: String,
    pub black_name: String,
    pub turn: Side,
    pub draw_offer: Option<Side>,
    pub status: Status,
    pub board: String,
    pub last_move: Option<String>,
}
