use thiserror::Error;

use crate::models::Column;
use crate::selector::Hypothesis;

/// Failure of a single hypothesis; the other hypotheses still evaluate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoreError {
    #[error("{hypothesis}: column `{column}` is missing from the dataset")]
    MissingColumn { hypothesis: Hypothesis, column: Column },

    #[error("{hypothesis}: no values to compute a reference statistic for `{column}`")]
    EmptyDataset { hypothesis: Hypothesis, column: Column },
}

pub type ScoreResult<T> = Result<T, ScoreError>;
