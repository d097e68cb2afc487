use crate::schema::{MatchKey, PlayerId, Status};

/// Failures of the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("no match stored for {0}")]
    NotFound(MatchKey),
}

/// Failures while producing or saving a board rendering.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("unable to write rendering: {0}")]
    Io(#[from] std::io::Error),

    #[error("unable to encode rendering: {reason}")]
    Encoding { reason: String },
}

/// Every failure a session or challenge operation can surface.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("invalid move notation: {0:?}")]
    InvalidNotation(String),

    #[error("illegal move: {0}")]
    IllegalMove(String),

    #[error("it is not your turn")]
    WrongTurn,

    #[error("you have already offered a draw")]
    DrawAlreadyOffered,

    #[error("no draw has been offered to you")]
    DrawNotOffered,

    #[error("you can't challenge yourself")]
    SelfChallenge,

    #[error("there is an unresolved game between {0} and {1} already")]
    AlreadyInMatch(PlayerId, PlayerId),

    #[error("you have already challenged {0}, wait for them to accept")]
    DuplicateChallenge(PlayerId),

    #[error("no pending challenge from {challenger} to {opponent}")]
    NoPendingChallenge {
        challenger: PlayerId,
        opponent: PlayerId,
    },

    #[error("player {0} is not playing in this game")]
    NotInMatch(PlayerId),

    #[error("player {0} cannot play against themselves")]
    SamePlayer(PlayerId),

    #[error("the game is over ({0:?})")]
    GameOver(Status),

    #[error("stored match is corrupt: {0}")]
    CorruptRecord(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Render(#[from] RenderError),
}
