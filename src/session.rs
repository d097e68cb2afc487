//! Turn, draw and termination state of one match.
//!
//! A [`MatchSession`] is bound to the two players of a [`MatchKey`]. It either
//! lives only in memory, or is opened against a [`GameStore`] in one of two
//! [`SyncMode`]s:
//!
//! - `Auto`: every mutation is written through as it happens and a finished
//!   match is deleted immediately.
//! - `Manual`: nothing is written until [`MatchSession::sync_now`].
//!
//! Operations on the same key are not serialized here. Callers that can see
//! both players at once hold a [`KeyedLocks`](crate::locks::KeyedLocks) guard
//! per operation.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{GameError, RenderError};
use crate::notation::Notation;
use crate::render::{Artifact, BoardView, Renderer, TextRenderer};
use crate::rules::{EncodedBoard, MoveDescriptor, RulesEngine, StandardRules};
use crate::schema::{
    GroupId, MatchKey, MatchRecord, MatchSummary, PlayerId, PlayerNames, Side, Status,
};
use crate::store::GameStore;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncMode {
    #[default]
    Manual,
    Auto,
}

#[derive(Clone, Debug, Default)]
pub struct MoveOptions {
    /// Return a rendering of the board after the move.
    pub render: bool,
    /// Also write the rendering to this path. Implies `render`.
    pub save_to: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct MoveResult {
    pub descriptor: MoveDescriptor,
    pub status: Status,
    /// The match is over after this move.
    pub finished: bool,
    /// The finished match was deleted from the store. Stays `false` in manual
    /// mode, where the record goes on the next [`MatchSession::sync_now`].
    pub reaped: bool,
    pub artifact: Option<Artifact>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawOutcome {
    /// The offer is recorded and waits for the opponent.
    Offered,
    /// The opponent had already offered, so the match is drawn.
    Accepted,
}

pub struct MatchSession<E: RulesEngine = StandardRules> {
    key: MatchKey,
    names: PlayerNames,
    engine: E,
    board: E::Board,
    turn: Side,
    draw: Option<Side>,
    status: Status,
    last_move: Option<MoveDescriptor>,
    store: Option<Arc<dyn GameStore>>,
    mode: SyncMode,
    renderer: Arc<dyn Renderer>,
}

impl MatchSession<StandardRules> {
    /// A fresh in-memory match with standard rules.
    pub fn new(key: MatchKey, names: PlayerNames) -> Self {
        Self::with_engine(StandardRules, key, names)
    }

    /// Loads the match stored under `key`, creating it first if needed.
    pub async fn open(
        store: Arc<dyn GameStore>,
        key: MatchKey,
        names: PlayerNames,
        mode: SyncMode,
    ) -> Result<Self, GameError> {
        Self::open_with_engine(StandardRules, store, key, names, mode).await
    }
}

impl<E: RulesEngine> MatchSession<E> {
    pub fn with_engine(engine: E, key: MatchKey, names: PlayerNames) -> Self {
        let board = engine.initial_board();
        let status = engine.status(&board);
        Self {
            key,
            names,
            engine,
            board,
            turn: Side::White,
            draw: None,
            status,
            last_move: None,
            store: None,
            mode: SyncMode::Manual,
            renderer: Arc::new(TextRenderer),
        }
    }

    pub async fn open_with_engine(
        engine: E,
        store: Arc<dyn GameStore>,
        key: MatchKey,
        names: PlayerNames,
        mode: SyncMode,
    ) -> Result<Self, GameError> {
        let mut session = Self::with_engine(engine, key, names);
        let record = store.load_or_create_match(&session.record()).await?;

        session.board = session.engine.decode_board(
            &EncodedBoard {
                squares: record.board,
                moved: record.moved,
                pawn_move: record.pawn_move,
            },
            record.turn,
        )?;
        session.turn = record.turn;
        session.draw = record.draw;
        session.names = record.names;
        session.status = session.engine.status(&session.board);
        session.store = Some(store);
        session.mode = mode;

        info!(key = %key, turn = %session.turn, ?mode, "opened match");
        Ok(session)
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn key(&self) -> &MatchKey {
        &self.key
    }

    pub fn names(&self) -> &PlayerNames {
        &self.names
    }

    pub fn turn(&self) -> Side {
        self.turn
    }

    pub fn draw_offer(&self) -> Option<Side> {
        self.draw
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn board(&self) -> &E::Board {
        &self.board
    }

    pub fn encoded_board(&self) -> EncodedBoard {
        self.engine.encode_board(&self.board)
    }

    pub fn last_move(&self) -> Option<&MoveDescriptor> {
        self.last_move.as_ref()
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    pub fn is_persistent(&self) -> bool {
        self.store.is_some()
    }

    pub fn is_players_turn(&self, player: PlayerId) -> bool {
        self.key.player(self.turn) == player
    }

    pub async fn apply_move(&mut self, notation: &str) -> Result<MoveResult, GameError> {
        self.apply_move_with(notation, MoveOptions::default()).await
    }

    /// Applies one move for the side to move.
    ///
    /// After the turn flips, a pending draw offer is kept only while the side
    /// to move differs from the offeror; once the offeror is back on move the
    /// offer is cleared, in memory and in storage alike.
    pub async fn apply_move_with(
        &mut self,
        notation: &str,
        options: MoveOptions,
    ) -> Result<MoveResult, GameError> {
        let notation = Notation::parse(notation)?;
        self.ensure_ongoing()?;

        let (board, descriptor) = self.engine.apply_move(&self.board, &notation, self.turn)?;
        self.board = board;
        self.turn = self.turn.opposite();
        self.status = self.engine.status(&self.board);
        if self.draw == Some(self.turn) {
            self.draw = None;
        }
        self.last_move = Some(descriptor.clone());
        debug!(
            key = %self.key,
            mv = %descriptor.san,
            turn = %self.turn,
            draw = ?self.draw,
            status = ?self.status,
            "applied move"
        );

        if let Some(store) = self.auto_store() {
            store.save_match(&self.record()).await?;
        }
        let finished = self.check_and_reap().await?;
        let reaped = finished && self.auto_store().is_some();

        let artifact = if options.render || options.save_to.is_some() {
            let artifact = self.render_with(self.last_move.as_ref())?;
            if let Some(path) = &options.save_to {
                artifact.save(path).await?;
            }
            Some(artifact)
        } else {
            None
        };

        Ok(MoveResult {
            descriptor,
            status: self.status,
            finished,
            reaped,
            artifact,
        })
    }

    /// Applies moves in order and stops at the first failure. Moves applied
    /// before the failure stay applied.
    pub async fn apply_moves<I, S>(&mut self, moves: I) -> Result<Vec<MoveResult>, GameError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut results = Vec::new();
        for mv in moves {
            results.push(self.apply_move(mv.as_ref()).await?);
        }
        Ok(results)
    }

    /// Offers a draw on the player's own turn, or accepts if the opponent has
    /// an offer outstanding.
    pub async fn offer_draw(&mut self, player: PlayerId) -> Result<DrawOutcome, GameError> {
        let side = self.side_of(player)?;
        self.ensure_ongoing()?;

        match self.draw {
            Some(offeror) if offeror == side => Err(GameError::DrawAlreadyOffered),
            Some(_) => {
                self.accept_draw(player).await?;
                Ok(DrawOutcome::Accepted)
            }
            None => {
                if self.turn != side {
                    return Err(GameError::WrongTurn);
                }
                self.draw = Some(side);
                debug!(key = %self.key, offeror = %side, "draw offered");

                if let Some(store) = self.auto_store() {
                    store.update_draw_offer(&self.key, self.draw).await?;
                }
                Ok(DrawOutcome::Offered)
            }
        }
    }

    /// Accepts the opponent's offer. Returns whether the match record was
    /// deleted, which only happens in auto mode.
    pub async fn accept_draw(&mut self, player: PlayerId) -> Result<bool, GameError> {
        self.ensure_offered_to(player)?;
        self.ensure_ongoing()?;

        self.status = Status::Drawn;
        self.draw = None;
        info!(key = %self.key, by = %player, "draw agreed");

        let finished = self.check_and_reap().await?;
        Ok(finished && self.auto_store().is_some())
    }

    pub async fn decline_draw(&mut self, player: PlayerId) -> Result<(), GameError> {
        self.ensure_offered_to(player)?;
        self.ensure_ongoing()?;

        self.draw = None;
        debug!(key = %self.key, by = %player, "draw declined");

        if let Some(store) = self.auto_store() {
            store.update_draw_offer(&self.key, None).await?;
        }
        Ok(())
    }

    /// Returns whether the match is over. In auto mode a finished match is
    /// removed from the store; removing it twice is harmless.
    pub async fn check_and_reap(&mut self) -> Result<bool, GameError> {
        if !self.status.is_terminal() {
            return Ok(false);
        }
        if let Some(store) = self.auto_store() {
            store.delete_match(&self.key).await?;
            info!(key = %self.key, status = ?self.status, "reaped finished match");
        }
        Ok(true)
    }

    /// Pushes the in-memory state to the store, or removes the record if the
    /// match is over. Returns `false` when the session has no store.
    pub async fn sync_now(&mut self) -> Result<bool, GameError> {
        let Some(store) = &self.store else {
            return Ok(false);
        };

        if self.status.is_terminal() {
            store.delete_match(&self.key).await?;
            info!(key = %self.key, status = ?self.status, "reaped finished match");
        } else {
            store.save_match(&self.record()).await?;
            debug!(key = %self.key, "synced match");
        }
        Ok(true)
    }

    /// Renders the current board with the last move highlighted.
    pub fn render(&self) -> Result<Artifact, RenderError> {
        self.render_with(self.last_move.as_ref())
    }

    /// Writes a rendering of the current board to `path`.
    pub async fn save_image(&self, path: impl Into<PathBuf>) -> Result<(), GameError> {
        let artifact = self.render_with(None)?;
        artifact.save(path.into()).await?;
        Ok(())
    }

    pub fn summary(&self) -> MatchSummary {
        MatchSummary {
            group: self.key.group,
            white: self.key.white,
            black: self.key.black,
            white_name: self.names.white.clone(),
            black_name: self.names.black.clone(),
            turn: self.turn,
            draw_offer: self.draw,
            status: self.status,
            board: self.encoded_board().squares,
            last_move: self.last_move.as_ref().map(|m| m.san.clone()),
        }
    }

    fn record(&self) -> MatchRecord {
        let encoded = self.encoded_board();
        MatchRecord {
            key: self.key,
            board: encoded.squares,
            turn: self.turn,
            pawn_move: encoded.pawn_move,
            moved: encoded.moved,
            draw: self.draw,
            names: self.names.clone(),
        }
    }

    fn render_with(&self, last_move: Option<&MoveDescriptor>) -> Result<Artifact, RenderError> {
        let encoded = self.encoded_board();
        self.renderer.render(&BoardView {
            board: &encoded,
            white: &self.names.white,
            black: &self.names.black,
            last_move,
        })
    }

    fn auto_store(&self) -> Option<&Arc<dyn GameStore>> {
        match self.mode {
            SyncMode::Auto => self.store.as_ref(),
            SyncMode::Manual => None,
        }
    }

    fn side_of(&self, player: PlayerId) -> Result<Side, GameError> {
        self.key
            .side_of(player)
            .ok_or(GameError::NotInMatch(player))
    }

    fn ensure_ongoing(&self) -> Result<(), GameError> {
        if self.status.is_terminal() {
            return Err(GameError::GameOver(self.status));
        }
        Ok(())
    }

    /// A live offer from the other player must exist.
    fn ensure_offered_to(&self, player: PlayerId) -> Result<(), GameError> {
        let side = self.side_of(player)?;
        match self.draw {
            Some(offeror) if offeror != side => Ok(()),
            _ => Err(GameError::DrawNotOffered),
        }
    }
}

impl<E: RulesEngine> fmt::Display for MatchSession<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let artifact = TextRenderer
            .render(&BoardView {
                board: &self.encoded_board(),
                white: &self.names.white,
                black: &self.names.black,
                last_move: self.last_move.as_ref(),
            })
            .map_err(|_| fmt::Error)?;
        f.write_str(artifact.as_text().ok_or(fmt::Error)?)
    }
}

/// Opponents `player` currently has a match with in `group`.
pub async fn current_opponents(
    store: &dyn GameStore,
    group: GroupId,
    player: PlayerId,
) -> Result<Vec<PlayerId>, GameError> {
    store.opponents(group, player).await
}

/// The key of the match between `a` and `b` in `group`, whichever side each plays.
pub async fn find_existing(
    store: &dyn GameStore,
    group: GroupId,
    a: PlayerId,
    b: PlayerId,
) -> Result<Option<MatchKey>, GameError> {
    store.find_match(group, a, b).await
}
