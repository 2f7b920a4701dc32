//! Grid search with k-fold cross-validation.
//!
//! The search is deterministic: folds are contiguous index ranges and grid
//! candidates are evaluated in declaration order, with the first best mean
//! score winning ties.

use tracing::debug;

use crate::errors::PipelineError;

/// Contiguous k-fold index splits over `0..len`.
///
/// Every fold holds out at least one row; `len < folds` is a tuning error
/// because some fold would be empty.
pub fn fold_indices(len: usize, folds: usize) -> Result<Vec<(Vec<usize>, Vec<usize>)>, PipelineError> {
    if folds < 2 {
        return Err(PipelineError::Tuning(format!(
            "cross-validation needs at least 2 folds, got {folds}"
        )));
    }
    if len < folds {
        return Err(PipelineError::Tuning(format!(
            "{len} rows cannot be split into {folds} cross-validation folds"
        )));
    }
    let base = len / folds;
    let remainder = len % folds;
    let mut splits = Vec::with_capacity(folds);
    let mut start = 0;
    for fold in 0..folds {
        let size = base + usize::from(fold < remainder);
        let test: Vec<usize> = (start..start + size).collect();
        let train: Vec<usize> = (0..len).filter(|idx| !(start..start + size).contains(idx)).collect();
        splits.push((train, test));
        start += size;
    }
    Ok(splits)
}

/// Evaluate every candidate in `grid` by mean cross-validated score and
/// return the best one.
///
/// `fit_score` trains on the first index set and scores on the second.
/// Candidates are compared by strict `>`, so the first candidate with the
/// best mean score wins ties.
pub fn grid_search<P, F>(
    grid: &[P],
    len: usize,
    folds: usize,
    mut fit_score: F,
) -> Result<P, PipelineError>
where
    P: Clone + std::fmt::Debug,
    F: FnMut(&P, &[usize], &[usize]) -> Result<f64, PipelineError>,
{
    if grid.is_empty() {
        return Err(PipelineError::Tuning(
            "hyperparameter grid is empty".to_string(),
        ));
    }
    let splits = fold_indices(len, folds)?;
    let mut best: Option<(f64, P)> = None;
    for candidate in grid {
        let mut total = 0.0;
        for (train, test) in &splits {
            total += fit_score(candidate, train, test)?;
        }
        let mean = total / splits.len() as f64;
        debug!(?candidate, mean_score = mean, "evaluated grid candidate");
        let improved = best.as_ref().is_none_or(|(score, _)| mean > *score);
        if improved {
            best = Some((mean, candidate.clone()));
        }
    }
    let (score, params) = best.ok_or_else(|| {
        PipelineError::Tuning("grid search produced no scored candidate".to_string())
    })?;
    debug!(?params, best_score = score, "selected grid candidate");
    Ok(params)
}
