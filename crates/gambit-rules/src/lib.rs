//! Chess rules oracle backed by the `chess` crate.
//!
//! Positions travel as FEN strings; the oracle re-parses the position
//! on every call, so it holds no state and one instance serves every
//! session.

use std::str::FromStr;

use chess::{Board, BoardStatus, ChessMove, Piece, Square, ALL_SQUARES};
use gambit_protocol::Promotion;
use gambit_session::{
    MoveVerdict, OracleError, RulesOracle, TerminalClassification,
};

/// FEN for the standard chess starting position.
const STARTING_FEN: &str =
    "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Stateless [`RulesOracle`] for standard chess.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChessOracle;

impl ChessOracle {
    pub fn new() -> Self {
        Self
    }
}

fn parse_square(text: &str) -> Result<Square, OracleError> {
    Square::from_str(text)
        .map_err(|_| OracleError::Malformed(format!("bad square: {text}")))
}

fn promotion_piece(promotion: Promotion) -> Piece {
    match promotion {
        Promotion::Queen => Piece::Queen,
        Promotion::Rook => Piece::Rook,
        Promotion::Bishop => Piece::Bishop,
        Promotion::Knight => Piece::Knight,
    }
}

/// Neither side can deliver mate with only kings and at most one minor
/// piece on the board.
fn insufficient_material(board: &Board) -> bool {
    let mut minors = 0u32;
    for square in ALL_SQUARES {
        match board.piece_on(square) {
            None | Some(Piece::King) => {}
            Some(Piece::Bishop) | Some(Piece::Knight) => minors += 1,
            Some(_) => return false,
        }
    }
    minors <= 1
}

impl RulesOracle for ChessOracle {
    fn starting_position(&self) -> String {
        STARTING_FEN.to_string()
    }

    fn validate_move(
        &self,
        position: &str,
        from: &str,
        to: &str,
        promotion: Option<Promotion>,
    ) -> Result<MoveVerdict, OracleError> {
        let board = Board::from_str(position)
            .map_err(|e| OracleError::Malformed(format!("bad position: {e}")))?;

        let mv = ChessMove::new(
            parse_square(from)?,
            parse_square(to)?,
            promotion.map(promotion_piece),
        );
        if !board.legal(mv) {
            return Err(OracleError::Illegal(format!(
                "illegal move {from}{to} in this position"
            )));
        }

        let after = board.make_move_new(mv);
        let terminal = match after.status() {
            BoardStatus::Checkmate => Some(TerminalClassification::Checkmate),
            BoardStatus::Stalemate => Some(TerminalClassification::Stalemate),
            BoardStatus::Ongoing => insufficient_material(&after)
                .then_some(TerminalClassification::RuleDraw),
        };

        Ok(MoveVerdict {
            // Board's Display form is the FEN of the position.
            new_position: after.to_string(),
            terminal,
        })
    }
}
