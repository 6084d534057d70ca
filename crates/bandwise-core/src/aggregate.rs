//! Reduction of per-task criterion scores to one overall band.
//!
//! Task 2 carries twice the weight of Task 1. The result is rounded to the nearest
//! half band with ties going up: 6.75 becomes 7.0, never 6.5. Round-half-to-even
//! would report 6.5 there, which is wrong for this scale.

use crate::model::TaskEvaluation;

pub const MIN_BAND: f64 = 0.0;
pub const MAX_BAND: f64 = 9.0;

const TASK1_WEIGHT: f64 = 1.0;
const TASK2_WEIGHT: f64 = 2.0;

/// Round to the nearest multiple of 0.5, ties up.
pub fn round_to_half_band(raw: f64) -> f64 {
    ((raw * 2.0) + 0.5).floor() / 2.0
}

/// Whether a value is usable as a band score.
pub fn is_valid_band(score: f64) -> bool {
    score.is_finite() && (MIN_BAND..=MAX_BAND).contains(&score)
}

/// Mean of the usable criterion scores of one task.
///
/// Criteria without a numeric score are left out instead of counting as zero.
/// Returns `None` when no criterion has a usable score.
pub fn task_average(evaluation: &TaskEvaluation) -> Option<f64> {
    let scores: Vec<f64> = evaluation
        .criteria
        .values()
        .filter_map(|c| c.score)
        .filter(|s| is_valid_band(*s))
        .collect();
    if scores.is_empty() {
        return None;
    }
    Some(scores.iter().sum::<f64>() / scores.len() as f64)
}

/// Overall band for a run. Always a multiple of 0.5 in `[0, 9]`.
///
/// A task whose criteria carry no usable score counts as absent.
pub fn aggregate(task1: Option<&TaskEvaluation>, task2: Option<&TaskEvaluation>) -> f64 {
    let avg1 = task1.and_then(task_average);
    let avg2 = task2.and_then(task_average);

    let raw = match (avg1, avg2) {
        (Some(a), Some(b)) => (TASK1_WEIGHT * a + TASK2_WEIGHT * b) / (TASK1_WEIGHT + TASK2_WEIGHT),
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => return MIN_BAND,
    };

    round_to_half_band(raw).clamp(MIN_BAND, MAX_BAND)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Criterion, CriterionScore, TaskNumber};

    fn eval(task: TaskNumber, scores: [Option<f64>; 4]) -> TaskEvaluation {
        TaskEvaluation {
            criteria: task
                .criteria()
                .into_iter()
                .zip(scores)
                .map(|(c, s)| {
                    (
                        c,
                        CriterionScore {
                            score: s,
                            ..Default::default()
                        },
                    )
                })
                .collect(),
            ..Default::default()
        }
    }

    fn uniform(task: TaskNumber, score: f64) -> TaskEvaluation {
        eval(task, [Some(score); 4])
    }

    #[test]
    fn ties_round_up() {
        assert_eq!(round_to_half_band(6.75), 7.0);
        assert_eq!(round_to_half_band(6.25), 6.5);
        assert_eq!(round_to_half_band(6.74), 6.5);
        assert_eq!(round_to_half_band(6.76), 7.0);
        assert_eq!(round_to_half_band(0.0), 0.0);
        assert_eq!(round_to_half_band(9.0), 9.0);
    }

    #[test]
    fn rounding_stays_on_half_grid_and_within_quarter() {
        let mut raw = 0.0;
        while raw <= 9.0 {
            let out = round_to_half_band(raw);
            assert_eq!((out * 2.0).fract(), 0.0, "{out} is not a half band");
            assert!((out - raw).abs() <= 0.25 + 1e-9, "{raw} -> {out}");
            raw += 0.01;
        }
    }

    #[test]
    fn task2_counts_double() {
        let t1 = uniform(TaskNumber::One, 5.0);
        let t2 = uniform(TaskNumber::Two, 8.0);
        assert_eq!(aggregate(Some(&t1), Some(&t2)), 7.0);
    }

    #[test]
    fn single_task_uses_its_own_average() {
        let t2 = eval(TaskNumber::Two, [Some(6.0), Some(6.5), Some(6.5), Some(6.0)]);
        assert_eq!(task_average(&t2), Some(6.25));
        assert_eq!(aggregate(None, Some(&t2)), 6.5);
    }

    #[test]
    fn missing_scores_are_excluded_not_zeroed() {
        let t1 = eval(TaskNumber::One, [Some(7.0), None, Some(7.0), None]);
        assert_eq!(task_average(&t1), Some(7.0));
        assert_eq!(aggregate(Some(&t1), None), 7.0);
    }

    #[test]
    fn out_of_range_scores_are_ignored() {
        let mut t1 = uniform(TaskNumber::One, 6.0);
        t1.criteria.insert(
            Criterion::LexicalResource,
            CriterionScore::new(42.0),
        );
        assert_eq!(task_average(&t1), Some(6.0));
    }

    #[test]
    fn nothing_usable_scores_zero() {
        let t1 = eval(TaskNumber::One, [None; 4]);
        assert_eq!(task_average(&t1), None);
        assert_eq!(aggregate(Some(&t1), None), 0.0);
        assert_eq!(aggregate(None, None), 0.0);
    }

    #[test]
    fn task_without_usable_scores_does_not_drag_the_other() {
        let t1 = eval(TaskNumber::One, [None; 4]);
        let t2 = uniform(TaskNumber::Two, 6.0);
        assert_eq!(aggregate(Some(&t1), Some(&t2)), 6.0);
    }
}
