//! Board rendering collaborator.

use std::path::Path;

use crate::error::RenderError;
use crate::rules::{EncodedBoard, MoveDescriptor};

/// Output of a renderer. Image renderers put encoded image bytes here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    pub media_type: &'static str,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn as_text(&self) -> Option<&str> {
        if self.media_type.starts_with("text/") {
            std::str::from_utf8(&self.bytes).ok()
        } else {
            None
        }
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), RenderError> {
        tokio::fs::write(path, &self.bytes).await?;
        Ok(())
    }
}

/// Everything a renderer gets to see.
#[derive(Clone, Copy, Debug)]
pub struct BoardView<'a> {
    pub board: &'a EncodedBoard,
    pub white: &'a str,
    pub black: &'a str,
    pub last_move: Option<&'a MoveDescriptor>,
}

/// Pure function of its inputs; never touches the store.
pub trait Renderer: Send + Sync {
    fn render(&self, view: &BoardView<'_>) -> Result<Artifact, RenderError>;
}

/// Plain-text diagram, white at the bottom.
#[derive(Clone, Copy, Debug, Default)]
pub struct TextRenderer;

impl Renderer for TextRenderer {
    fn render(&self, view: &BoardView<'_>) -> Result<Artifact, RenderError> {
        let mut out = String::new();
        out.push_str(&format!("   {}\n", label(view.black, "black")));

        let rows: Vec<&str> = view.board.squares.split(';').collect();
        if rows.len() != 8 {
            return Err(RenderError::Encoding {
                reason: format!("expected 8 rows, got {}", rows.len()),
            });
        }
        for (i, row) in rows.iter().enumerate() {
            let cells = row
                .split(' ')
                .map(cell)
                .collect::<Result<Vec<_>, _>>()?;
            if cells.len() != 8 {
                return Err(RenderError::Encoding {
                    reason: format!("bad row {row:?}"),
                });
            }
            out.push_str(&format!("{}  {}\n", 8 - i, cells.join(" ")));
        }

        out.push_str("   a b c d e f g h\n");
        out.push_str(&format!("   {}\n", label(view.white, "white")));
        if let Some(m) = view.last_move {
            out.push_str(&format!("last move: {} ({})\n", m.san, m.uci));
        }

        Ok(Artifact {
            media_type: "text/plain",
            bytes: out.into_bytes(),
        })
    }
}

fn label<'a>(name: &'a str, fallback: &'a str) -> &'a str {
    if name.is_empty() {
        fallback
    } else {
        name
    }
}

fn cell(token: &str) -> Result<String, RenderError> {
    let mut chars = token.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some('-'), Some('-'), None) => Ok(".".to_owned()),
        (Some(piece), Some('0'), None) => Ok(piece.to_string()),
        (Some(piece), Some('1'), None) => Ok(piece.to_ascii_lowercase().to_string()),
        _ => Err(RenderError::Encoding {
            reason: format!("bad square {token:?}"),
        }),
    }
}
