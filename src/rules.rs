//! Board rules collaborator.
//!
//! The session never looks inside a board. It asks a [`RulesEngine`] to apply
//! moves, to report the result state and to convert boards to and from the
//! row format stored in the `games` table:
//!
//! - `board`: eight `;`-separated rows, rank 8 first, files a..h. Each square
//!   is a piece letter followed by `0` (white) or `1` (black), or `--`.
//! - `moved`: six `0`/`1` flags, white king, white a-rook, white h-rook, then
//!   the same three for black. Castling rights follow from them.
//! - `pawn_move`: the square skipped by the last two-square pawn advance.
//!   This is the en passant target square, not the square the pawn landed on
//!   as in earlier versions of this format.

use shakmaty::{
    fen::Fen, san::San, uci::UciMove, CastlingMode, Chess, Color, EnPassantMode, Position,
};

use crate::error::GameError;
use crate::notation::Notation;
use crate::schema::{Side, Status};

pub const START_BOARD: &str = "R1 N1 B1 Q1 K1 B1 N1 R1;P1 P1 P1 P1 P1 P1 P1 P1;\
-- -- -- -- -- -- -- --;-- -- -- -- -- -- -- --;-- -- -- -- -- -- -- --;\
-- -- -- -- -- -- -- --;P0 P0 P0 P0 P0 P0 P0 P0;R0 N0 B0 Q0 K0 B0 N0 R0";

pub const START_MOVED: &str = "000000";

/// Storage form of a board.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedBoard {
    pub squares: String,
    pub moved: String,
    pub pawn_move: Option<String>,
}

/// What the engine reports about a move it applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveDescriptor {
    pub uci: String,
    pub san: String,
}

pub trait RulesEngine: Send + Sync {
    type Board: Clone + Send + Sync;

    fn initial_board(&self) -> Self::Board;

    /// Applies `notation` for `side`. A rejected move leaves `board` untouched.
    fn apply_move(
        &self,
        board: &Self::Board,
        notation: &Notation,
        side: Side,
    ) -> Result<(Self::Board, MoveDescriptor), GameError>;

    fn encode_board(&self, board: &Self::Board) -> EncodedBoard;

    fn decode_board(&self, encoded: &EncodedBoard, turn: Side) -> Result<Self::Board, GameError>;

    fn status(&self, board: &Self::Board) -> Status;
}

/// Standard chess backed by shakmaty.
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardRules;

impl From<Color> for Side {
    fn from(c: Color) -> Self {
        match c {
            Color::White => Side::White,
            Color::Black => Side::Black,
        }
    }
}

impl From<Side> for Color {
    fn from(s: Side) -> Self {
        match s {
            Side::White => Color::White,
            Side::Black => Color::Black,
        }
    }
}

impl RulesEngine for StandardRules {
    type Board = Chess;

    fn initial_board(&self) -> Chess {
        Chess::default()
    }

    fn apply_move(
        &self,
        board: &Chess,
        notation: &Notation,
        side: Side,
    ) -> Result<(Chess, MoveDescriptor), GameError> {
        if Side::from(board.turn()) != side {
            return Err(GameError::IllegalMove(format!(
                "{notation}: {side} is not to move"
            )));
        }

        let uci: UciMove = notation
            .as_str()
            .parse()
            .map_err(|_| GameError::InvalidNotation(notation.to_string()))?;
        let m = uci
            .to_move(board)
            .map_err(|_| GameError::IllegalMove(notation.to_string()))?;

        // SAN depends on the position before the move
        let san = San::from_move(board, &m);
        let next = board
            .clone()
            .play(&m)
            .map_err(|_| GameError::IllegalMove(notation.to_string()))?;

        Ok((
            next,
            MoveDescriptor {
                uci: notation.to_string(),
                san: san.to_string(),
            },
        ))
    }

    fn encode_board(&self, board: &Chess) -> EncodedBoard {
        let fen = Fen::from_position(board.clone(), EnPassantMode::Always).to_string();
        let mut fields = fen.split(' ');
        let placement = fields.next().unwrap_or_default();
        let _turn = fields.next();
        let castling = fields.next().unwrap_or("-");
        let ep = fields.next().unwrap_or("-");

        EncodedBoard {
            squares: squares_from_placement(placement),
            moved: moved_from_castling(castling),
            pawn_move: (ep != "-").then(|| ep.to_owned()),
        }
    }

    fn decode_board(&self, encoded: &EncodedBoard, turn: Side) -> Result<Chess, GameError> {
        let placement = placement_from_squares(&encoded.squares)?;
        let castling = castling_from_moved(&encoded.moved)?;
        let ep = encoded.pawn_move.as_deref().unwrap_or("-");
        let turn = match turn {
            Side::White => 'w',
            Side::Black => 'b',
        };

        let fen: Fen = format!("{placement} {turn} {castling} {ep} 0 1")
            .parse()
            .map_err(|e| GameError::CorruptRecord(format!("{e}")))?;
        fen.into_position(CastlingMode::Standard)
            .map_err(|e| GameError::CorruptRecord(format!("{e}")))
    }

    fn status(&self, board: &Chess) -> Status {
        if board.is_checkmate() {
            // The side to move is mated
            Status::Decisive {
                winner: Side::from(board.turn()).opposite(),
            }
        } else if board.is_stalemate() || board.is_insufficient_material() {
            Status::Drawn
        } else {
            Status::Ongoing
        }
    }
}

fn squares_from_placement(placement: &str) -> String {
    placement
        .split('/')
        .map(|row| {
            let mut tokens = Vec::with_capacity(8);
            for c in row.chars() {
                if let Some(empty) = c.to_digit(10) {
                    tokens.extend((0..empty).map(|_| "--".to_owned()));
                } else if c.is_ascii_uppercase() {
                    tokens.push(format!("{c}0"));
                } else {
                    tokens.push(format!("{}1", c.to_ascii_uppercase()));
                }
            }
            tokens.join(" ")
        })
        .collect::<Vec<_>>()
        .join(";")
}

fn placement_from_squares(squares: &str) -> Result<String, GameError> {
    let corrupt = || GameError::CorruptRecord(format!("bad board encoding {squares:?}"));

    let rows: Vec<&str> = squares.split(';').collect();
    if rows.len() != 8 {
        return Err(corrupt());
    }

    let mut placement = String::with_capacity(72);
    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            placement.push('/');
        }
        let tokens: Vec<&str> = row.split(' ').collect();
        if tokens.len() != 8 {
            return Err(corrupt());
        }

        let mut empty = 0;
        for token in tokens {
            let mut chars = token.chars();
            match (chars.next(), chars.next(), chars.next()) {
                (Some('-'), Some('-'), None) => empty += 1,
                (Some(piece), Some(colour), None) if "PNBRQK".contains(piece) => {
                    if empty > 0 {
                        placement.push_str(&empty.to_string());
                        empty = 0;
                    }
                    match colour {
                        '0' => placement.push(piece),
                        '1' => placement.push(piece.to_ascii_lowercase()),
                        _ => return Err(corrupt()),
                    }
                }
                _ => return Err(corrupt()),
            }
        }
        if empty > 0 {
            placement.push_str(&empty.to_string());
        }
    }
    Ok(placement)
}

fn moved_from_castling(castling: &str) -> String {
    let flag = |moved: bool| if moved { '1' } else { '0' };
    let has = |c: char| castling.contains(c);

    [
        flag(!has('K') && !has('Q')),
        flag(!has('Q')),
        flag(!has('K')),
        flag(!has('k') && !has('q')),
        flag(!has('q')),
        flag(!has('k')),
    ]
    .iter()
    .collect()
}

fn castling_from_moved(moved: &str) -> Result<String, GameError> {
    let flags: Vec<bool> = moved
        .chars()
        .map(|c| match c {
            '0' => Ok(false),
            '1' => Ok(true),
            _ => Err(()),
        })
        .collect::<Result<_, _>>()
        .map_err(|_| GameError::CorruptRecord(format!("bad moved flags {moved:?}")))?;
    let &[wk, wa, wh, bk, ba, bh] = flags.as_slice() else {
        return Err(GameError::CorruptRecord(format!(
            "bad moved flags {moved:?}"
        )));
    };

    let mut castling = String::new();
    if !wk && !wh {
        castling.push('K');
    }
    if !wk && !wa {
        castling.push('Q');
    }
    if !bk && !bh {
        castling.push('k');
    }
    if !bk && !ba {
        castling.push('q');
    }
    if castling.is_empty() {
        castling.push('-');
    }
    Ok(castling)
}
