//! The rating engine boundary and the standard Elo implementation.

use gambit_protocol::{Outcome, Seat};

/// A finished game reduced to the three results a rating system can
/// score. `Abandoned` outcomes never reach the rating engine, which is
/// why this is a separate type rather than [`Outcome`] itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatedResult {
    WhiteWins,
    BlackWins,
    Draw,
}

impl RatedResult {
    /// Maps a session outcome to a ratable result, or `None` for
    /// abandonment.
    pub fn from_outcome(outcome: Outcome) -> Option<Self> {
        match outcome {
            Outcome::Win(Seat::White) => Some(Self::WhiteWins),
            Outcome::Win(Seat::Black) => Some(Self::BlackWins),
            Outcome::Draw => Some(Self::Draw),
            Outcome::Abandoned => None,
        }
    }
}

/// A pure pairwise rating function.
///
/// Given both players' current ratings and the result, returns the
/// adjustment for (white, black). Implementations must be deterministic
/// and side-effect free; the session layer applies the deltas exactly
/// once per finished session.
pub trait RatingEngine: Send + Sync + 'static {
    fn compute_deltas(
        &self,
        rating_white: i32,
        rating_black: i32,
        result: RatedResult,
    ) -> (i32, i32);
}

/// Standard Elo with a fixed K-factor.
#[derive(Debug, Clone, Copy)]
pub struct EloRating {
    /// Maximum points exchanged on one game.
    pub k: f64,
}

impl Default for EloRating {
    fn default() -> Self {
        Self { k: 32.0 }
    }
}

impl RatingEngine for EloRating {
    fn compute_deltas(
        &self,
        rating_white: i32,
        rating_black: i32,
        result: RatedResult,
    ) -> (i32, i32) {
        let expected_white = 1.0
            / (1.0
                + 10f64.powf((rating_black as f64 - rating_white as f64) / 400.0));
        let score_white = match result {
            RatedResult::WhiteWins => 1.0,
            RatedResult::BlackWins => 0.0,
            RatedResult::Draw => 0.5,
        };
        let delta_white = (self.k * (score_white - expected_white)).round() as i32;
        // Zero-sum: black loses exactly what white gains.
        (delta_white, -delta_white)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_ratings_win_moves_half_k() {
        let elo = EloRating::default();
        let (dw, db) = elo.compute_deltas(1500, 1500, RatedResult::WhiteWins);
        assert_eq!(dw, 16);
        assert_eq!(db, -16);
    }

    #[test]
    fn test_equal_ratings_draw_moves_nothing() {
        let elo = EloRating::default();
        let (dw, db) = elo.compute_deltas(1500, 1500, RatedResult::Draw);
        assert_eq!(dw, 0);
        assert_eq!(db, 0);
    }

    #[test]
    fn test_upset_win_pays_more_than_expected_win() {
        let elo = EloRating::default();
        // Underdog white beats a much stronger black.
        let (upset, _) = elo.compute_deltas(1200, 1600, RatedResult::WhiteWins);
        // Favourite white beats a much weaker black.
        let (expected, _) = elo.compute_deltas(1600, 1200, RatedResult::WhiteWins);
        assert!(upset > expected);
        assert!(expected >= 1);
    }

    #[test]
    fn test_deltas_are_zero_sum() {
        let elo = EloRating::default();
        for result in [
            RatedResult::WhiteWins,
            RatedResult::BlackWins,
            RatedResult::Draw,
        ] {
            let (dw, db) = elo.compute_deltas(1432, 1187, result);
            assert_eq!(dw + db, 0);
        }
    }

    #[test]
    fn test_rated_result_from_outcome() {
        use gambit_protocol::{Outcome, Seat};
        assert_eq!(
            RatedResult::from_outcome(Outcome::Win(Seat::White)),
            Some(RatedResult::WhiteWins)
        );
        assert_eq!(
            RatedResult::from_outcome(Outcome::Win(Seat::Black)),
            Some(RatedResult::BlackWins)
        );
        assert_eq!(
            RatedResult::from_outcome(Outcome::Draw),
            Some(RatedResult::Draw)
        );
        assert_eq!(RatedResult::from_outcome(Outcome::Abandoned), None);
    }
}
