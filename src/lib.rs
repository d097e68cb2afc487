//! Persisted two-player chess matches inside a group.
//!
//! - [`challenge::ChallengeNegotiator`] runs the invitation handshake. Two
//!   players challenging each other is what creates a match.
//! - [`session::MatchSession`] owns the turn, draw offers and the end of one
//!   match, and removes the match from the store once it is over.
//! - [`store::GameStore`] is the persistence seam, with a Postgres and an
//!   in-memory backend.
//!
//! Move legality and board encoding come from a [`rules::RulesEngine`];
//! pictures of the board from a [`render::Renderer`].

pub mod challenge;
pub mod config;
pub mod crud;
pub mod error;
pub mod locks;
pub mod model;
pub mod notation;
pub mod render;
pub mod rules;
pub mod schema;
pub mod session;
pub mod store;

pub use challenge::{ChallengeNegotiator, ChallengeOutcome};
pub use error::{GameError, RenderError, StoreError};
pub use locks::KeyedLocks;
pub use schema::{Challenge, GroupId, MatchKey, MatchSummary, PlayerId, PlayerNames, Side, Status};
pub use session::{DrawOutcome, MatchSession, MoveOptions, MoveResult, SyncMode};
pub use store::{GameStore, MemoryStore, PgStore};
