use std::fmt::Write;

use crate::dataset::Dataset;
use crate::impute::ImputationSummary;
use crate::models::{ColumnSummary, Correlation};
use crate::selector::{Hypothesis, Scorecard};
use crate::stats;

const STRONG_CORRELATION: f64 = 0.5;
const SAMPLE_ACCOUNTS: usize = 5;

pub fn summarize_columns(dataset: &Dataset) -> Vec<ColumnSummary> {
    dataset
        .numeric_columns()
        .into_iter()
        .filter_map(|column| stats::describe(column, &dataset.sample(column)))
        .collect()
}

/// Column pairs whose |r| reaches the threshold, strongest first.
pub fn strong_correlations(dataset: &Dataset, threshold: f64) -> Vec<Correlation> {
    let columns = dataset.numeric_columns();
    let mut correlations = Vec::new();

    for (index, left) in columns.iter().enumerate() {
        for right in columns.iter().skip(index + 1) {
            let pairs = dataset.paired(*left, *right);
            if let Some(coefficient) = stats::pearson(&pairs) {
                if coefficient.abs() >= threshold {
                    correlations.push(Correlation {
                        left: *left,
                        right: *right,
                        coefficient,
                        pairs: pairs.len(),
                    });
                }
            }
        }
    }

    correlations.sort_by(|a, b| b.coefficient.abs().total_cmp(&a.coefficient.abs()));
    correlations
}

pub fn build_report(
    dataset: &Dataset,
    scorecard: &Scorecard,
    imputation: Option<&ImputationSummary>,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Upsell Candidate Report");
    let _ = writeln!(
        output,
        "Snapshot {} from {} ({} customers, as of {})",
        dataset.snapshot_id,
        dataset.source,
        dataset.len(),
        dataset.as_of
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Data Quality");

    for column in dataset.columns() {
        let nulls = dataset.null_count(column);
        if nulls > 0 {
            let _ = writeln!(output, "- {}: {} missing", column, nulls);
        }
    }
    match imputation {
        Some(summary) if summary.total() > 0 => {
            let _ = writeln!(output, "- Imputed {} cells:", summary.total());
            for (column, count) in &summary.filled {
                let _ = writeln!(output, "  - {}: {}", column, count);
            }
        }
        Some(_) => {
            let _ = writeln!(output, "- Imputation ran, nothing to fill.");
        }
        None => {
            let _ = writeln!(output, "- No imputation applied.");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Descriptive Statistics");

    let summaries = summarize_columns(dataset);
    if summaries.is_empty() {
        let _ = writeln!(output, "No numeric values recorded.");
    } else {
        let _ = writeln!(
            output,
            "| column | count | mean | std | min | p25 | median | p75 | max |"
        );
        let _ = writeln!(output, "|---|---|---|---|---|---|---|---|---|");
        for s in summaries.iter() {
            let _ = writeln!(
                output,
                "| {} | {} | {:.2} | {:.2} | {:.2} | {:.2} | {:.2} | {:.2} | {:.2} |",
                s.column, s.count, s.mean, s.std_dev, s.min, s.p25, s.median, s.p75, s.max
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Strong Correlations");

    let correlations = strong_correlations(dataset, STRONG_CORRELATION);
    if correlations.is_empty() {
        let _ = writeln!(output, "No column pairs with |r| >= {STRONG_CORRELATION}.");
    } else {
        for correlation in correlations.iter() {
            let _ = writeln!(
                output,
                "- {} vs {}: r = {:.2} over {} rows",
                correlation.left, correlation.right, correlation.coefficient, correlation.pairs
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Hypotheses");

    for hypothesis in Hypothesis::ALL {
        let Some(result) = scorecard.get(hypothesis) else {
            continue;
        };
        let _ = writeln!(output);
        let _ = writeln!(output, "### {}", hypothesis);
        let _ = writeln!(output, "{}", hypothesis.description());
        match result {
            Ok(set) => {
                let share = if dataset.is_empty() {
                    0.0
                } else {
                    set.len() as f64 / dataset.len() as f64 * 100.0
                };
                let _ = writeln!(
                    output,
                    "- {} candidates ({:.1}% of customers)",
                    set.len(),
                    share
                );
                let labels = set.labels(dataset);
                if !labels.is_empty() {
                    let shown: Vec<&str> = labels
                        .iter()
                        .take(SAMPLE_ACCOUNTS)
                        .map(String::as_str)
                        .collect();
                    let _ = writeln!(output, "- e.g. {}", shown.join(", "));
                }
            }
            Err(err) => {
                let _ = writeln!(output, "- Not evaluated: {}", err);
            }
        }
    }

    output
}
