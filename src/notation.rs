//! Coordinate move notation: `e2e4`, `e7e8q`.

use std::fmt;

use crate::error::GameError;

/// A move string that passed the grammar check. Legality is not known yet.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Notation(String);

impl Notation {
    /// Accepts `[a-h][1-8][a-h][1-8]` with an optional `q`, `r`, `b` or `n` promotion suffix.
    pub fn parse(s: &str) -> Result<Self, GameError> {
        if is_valid(s.as_bytes()) {
            Ok(Self(s.to_owned()))
        } else {
            Err(GameError::InvalidNotation(s.to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Notation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_square(file: u8, rank: u8) -> bool {
    (b'a'..=b'h').contains(&file) && (b'1'..=b'8').contains(&rank)
}

fn is_valid(s: &[u8]) -> bool {
    match s {
        [f1, r1, f2, r2] => is_square(*f1, *r1) && is_square(*f2, *r2),
        [f1, r1, f2, r2, promo] => {
            is_square(*f1, *r1) && is_square(*f2, *r2) && matches!(promo, b'q' | b'r' | b'b' | b'n')
        }
        _ => false,
    }
}
