// Scoring and comparison of critique results

use super::types::{CritiqueResult, Grade};

/// Numeric rank of a grade: C=1 through A++=5.
pub fn rank(grade: Grade) -> u8 {
    match grade {
        Grade::C => 1,
        Grade::B => 2,
        Grade::A => 3,
        Grade::APlus => 4,
        Grade::APlusPlus => 5,
    }
}

/// True when `a` beats `b`: higher grade, or same grade and higher mean rating.
pub fn is_better(a: &CritiqueResult, b: &CritiqueResult) -> bool {
    let (ra, rb) = (rank(a.overall_score), rank(b.overall_score));
    ra > rb || (ra == rb && a.average_rating() > b.average_rating())
}

/// Fractional change of the mean rating relative to the previous iteration.
///
/// `None` (first iteration) yields 0. A previous mean of 0 yields 1.0 if the
/// new mean is positive and 0 otherwise.
pub fn fractional_improvement(previous_avg: Option<f64>, current_avg: f64) -> f64 {
    match previous_avg {
        None => 0.0,
        Some(prev) if prev <= 0.0 => {
            if current_avg > 0.0 {
                1.0
            } else {
                0.0
            }
        }
        Some(prev) => (current_avg - prev) / prev,
    }
}
