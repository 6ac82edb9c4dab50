use std::collections::BTreeMap;

use crate::dataset::Dataset;
use crate::models::Column;
use crate::stats;

/// Flags and counts where a missing value means "none".
const ZERO_FILL: [Column; 6] = [
    Column::AgentUtilizationIncrease,
    Column::TeamPlus,
    Column::ProPlus,
    Column::EntPlus,
    Column::SegmentEnterprise,
    Column::ProductCounts,
];

const MEDIAN_FILL: [Column; 7] = [
    Column::AgentUtilization,
    Column::MaxTicketsPerAgent,
    Column::ProductCountsPercentage,
    Column::MaxSeats,
    Column::CustomerAgeQuarters,
    Column::Agents,
    Column::Arr,
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImputationSummary {
    pub filled: BTreeMap<Column, usize>,
}

impl ImputationSummary {
    pub fn total(&self) -> usize {
        self.filled.values().sum()
    }
}

/// Returns a filled copy of `dataset`. Satisfaction scores are never imputed.
pub fn impute(dataset: &Dataset) -> (Dataset, ImputationSummary) {
    let mut fills: Vec<(Column, f64)> = ZERO_FILL
        .into_iter()
        .filter(|column| dataset.has_column(*column))
        .map(|column| (column, 0.0))
        .collect();

    for column in MEDIAN_FILL {
        if !dataset.has_column(column) {
            continue;
        }
        match stats::median(&dataset.sample(column)) {
            Some(median) => fills.push((column, median)),
            None => tracing::debug!(column = column.name(), "column entirely null, not imputed"),
        }
    }

    let mut summary = ImputationSummary::default();
    let mut records = dataset.records().to_vec();
    for record in records.iter_mut() {
        for (column, fill) in &fills {
            if !record.is_null(*column) {
                continue;
            }
            if let Some(slot) = record.slot_mut(*column) {
                *slot = Some(*fill);
                *summary.filled.entry(*column).or_insert(0) += 1;
            }
        }
    }

    tracing::info!(
        source = %dataset.source,
        cells = summary.total(),
        columns = summary.filled.len(),
        "imputed missing values"
    );

    (dataset.with_records(records), summary)
}
