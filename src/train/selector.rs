//! Per-pool winner selection

use std::collections::BTreeMap;

use super::dispatcher::JobOutcome;
use super::report::{CandidateReport, CandidateStatus, PoolReport, TrainReport};
use super::metrics::selection_error;
use crate::config::SelectionMetric;
use crate::data::Dataset;
use crate::error::{Coord, Error, Result};
use crate::learner::Learner;

/// Index of the lowest error among usable candidates
///
/// `None` and non-finite entries never win; ties go to the lowest index.
/// Returns `None` when no candidate is usable.
pub fn pick_winner(errors: &[Option<f32>]) -> Option<usize> {
    errors
        .iter()
        .enumerate()
        .filter_map(|(idx, err)| err.filter(|e| e.is_finite()).map(|e| (idx, e)))
        .fold(None, |best: Option<(usize, f32)>, (idx, e)| match best {
            Some((_, b)) if b <= e => best,
            _ => Some((idx, e)),
        })
        .map(|(idx, _)| idx)
}

/// Selection error of a trained learner on the validation rows
///
/// Falls back to the learn rows when the validation subset is empty.
pub fn evaluate<L: Learner>(learner: &L, dataset: &Dataset, metric: SelectionMetric) -> Result<f32> {
    let subset = dataset.selection_subset();
    let predictions = learner.predict(&subset.inputs)?;
    if predictions.dim() != subset.targets.dim() {
        return Err(Error::Data(format!(
            "learner predicted {:?}, expected {:?}",
            predictions.dim(),
            subset.targets.dim()
        )));
    }
    Ok(selection_error(metric, predictions.view(), subset.targets.view()))
}

/// Turn a round's outcomes into per-pool reports with one winner per pool
pub fn select_winners(
    pools: usize,
    candidates: usize,
    outcomes: &BTreeMap<Coord, JobOutcome>,
    metric: SelectionMetric,
) -> TrainReport {
    let pools = (0..pools)
        .map(|pool| {
            let candidates: Vec<CandidateReport> = (0..candidates)
                .map(|candidate| {
                    let coord = Coord::new(pool, candidate);
                    match outcomes.get(&coord) {
                        Some(JobOutcome::Trained { summary, error }) if error.is_finite() => {
                            CandidateReport {
                                coord,
                                status: CandidateStatus::Trained,
                                error: Some(*error),
                                epochs_run: summary.epochs_run,
                                failure: None,
                            }
                        }
                        Some(JobOutcome::Trained { error, .. }) => {
                            CandidateReport::failed(coord, format!("non-finite selection error {error}"))
                        }
                        Some(JobOutcome::Failed(failure)) => {
                            CandidateReport::failed(coord, failure.cause.clone())
                        }
                        None => CandidateReport::failed(coord, "job did not report".to_string()),
                    }
                })
                .collect();

            let errors: Vec<Option<f32>> = candidates.iter().map(|c| c.error).collect();
            let winner = pick_winner(&errors);
            match winner {
                Some(w) => log::info!(
                    "pool_{pool}: candidate_{w} wins with {metric:?} {:.6}",
                    errors[w].unwrap_or(f32::NAN)
                ),
                None => log::warn!("pool_{pool}: every candidate failed, no winner"),
            }
            PoolReport {
                pool,
                winner,
                candidates,
            }
        })
        .collect();

    TrainReport { metric, pools }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrainingFailure;
    use crate::learner::FitSummary;

    #[test]
    fn test_pick_winner_lowest_error() {
        assert_eq!(pick_winner(&[Some(0.9), Some(0.1), Some(0.5)]), Some(1));
    }

    #[test]
    fn test_pick_winner_tie_goes_to_lowest_index() {
        assert_eq!(pick_winner(&[Some(0.1), Some(0.1)]), Some(0));
        assert_eq!(pick_winner(&[Some(0.3), Some(0.1), Some(0.1)]), Some(1));
    }

    #[test]
    fn test_pick_winner_skips_failed_and_non_finite() {
        assert_eq!(pick_winner(&[None, Some(f32::NAN), Some(0.7)]), Some(2));
        assert_eq!(pick_winner(&[Some(f32::INFINITY), None]), None);
        assert_eq!(pick_winner(&[]), None);
    }

    fn trained(error: f32) -> JobOutcome {
        JobOutcome::Trained {
            summary: FitSummary {
                epochs_run: 3,
                learn_loss: 0.0,
                best_valid_loss: None,
            },
            error,
        }
    }

    #[test]
    fn test_select_winners_builds_reports() {
        let mut outcomes = BTreeMap::new();
        outcomes.insert(Coord::new(0, 0), trained(0.9));
        outcomes.insert(Coord::new(0, 1), trained(0.1));
        outcomes.insert(
            Coord::new(1, 0),
            JobOutcome::Failed(TrainingFailure {
                coord: Coord::new(1, 0),
                cause: "boom".to_string(),
            }),
        );
        outcomes.insert(Coord::new(1, 1), trained(f32::NAN));

        let report = select_winners(2, 2, &outcomes, SelectionMetric::Rmse);
        assert_eq!(report.winners(), vec![Some(1), None]);
        assert_eq!(report.pools[0].candidates[1].status, CandidateStatus::Trained);
        assert_eq!(report.pools[1].candidates[0].status, CandidateStatus::Failed);
        assert_eq!(report.failures().len(), 2);
        assert_eq!(report.failures()[0].cause, "boom");
    }

    #[test]
    fn test_missing_outcome_is_a_failure() {
        let report = select_winners(1, 2, &BTreeMap::new(), SelectionMetric::Mae);
        assert_eq!(report.winners(), vec![None]);
        assert_eq!(report.failures().len(), 2);
    }
}
