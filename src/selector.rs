use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::config::Thresholds;
use crate::dataset::Dataset;
use crate::error::{ScoreError, ScoreResult};
use crate::models::{Column, CustomerRecord};
use crate::stats;

/// The five candidate filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Hypothesis {
    SeatUpsell,
    ProductUpsell,
    CrossSellGrowth,
    CrossSellSatisfied,
    EnterpriseCrossSell,
}

impl Hypothesis {
    pub const ALL: [Hypothesis; 5] = [
        Hypothesis::SeatUpsell,
        Hypothesis::ProductUpsell,
        Hypothesis::CrossSellGrowth,
        Hypothesis::CrossSellSatisfied,
        Hypothesis::EnterpriseCrossSell,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Hypothesis::SeatUpsell => "seat_upsell",
            Hypothesis::ProductUpsell => "product_upsell",
            Hypothesis::CrossSellGrowth => "cross_sell_growth",
            Hypothesis::CrossSellSatisfied => "cross_sell_satisfied",
            Hypothesis::EnterpriseCrossSell => "enterprise_cross_sell",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Hypothesis::SeatUpsell => {
                "Highly utilized accounts with growing usage and fewer seats than the median"
            }
            Hypothesis::ProductUpsell => {
                "Heavy ticket load per agent without any premium plan"
            }
            Hypothesis::CrossSellGrowth => {
                "Established accounts already adopting more products than the median"
            }
            Hypothesis::CrossSellSatisfied => {
                "Very satisfied accounts that own fewer products than the median"
            }
            Hypothesis::EnterpriseCrossSell => {
                "Enterprise accounts behind their segment's median product count"
            }
        }
    }

    /// Columns the predicate reads; a null in any of them excludes the row.
    pub fn columns(self) -> &'static [Column] {
        match self {
            Hypothesis::SeatUpsell => &[
                Column::AgentUtilization,
                Column::MaxSeats,
                Column::AgentUtilizationIncrease,
            ],
            Hypothesis::ProductUpsell => &[
                Column::MaxTicketsPerAgent,
                Column::TeamPlus,
                Column::ProPlus,
                Column::EntPlus,
            ],
            Hypothesis::CrossSellGrowth => &[
                Column::ProductCounts,
                Column::ProductCountsPercentage,
                Column::CustomerAgeQuarters,
            ],
            Hypothesis::CrossSellSatisfied => &[
                Column::NpsScore,
                Column::CsatScore,
                Column::ProductCounts,
            ],
            Hypothesis::EnterpriseCrossSell => {
                &[Column::SegmentEnterprise, Column::ProductCounts]
            }
        }
    }

    pub fn evaluate(self, dataset: &Dataset, thresholds: &Thresholds) -> ScoreResult<CandidateSet> {
        for column in self.columns() {
            if !dataset.has_column(*column) {
                return Err(ScoreError::MissingColumn {
                    hypothesis: self,
                    column: *column,
                });
            }
        }

        let rows = match self {
            Hypothesis::SeatUpsell => seat_upsell(dataset, thresholds)?,
            Hypothesis::ProductUpsell => product_upsell(dataset, thresholds)?,
            Hypothesis::CrossSellGrowth => cross_sell_growth(dataset, thresholds)?,
            Hypothesis::CrossSellSatisfied => cross_sell_satisfied(dataset, thresholds)?,
            Hypothesis::EnterpriseCrossSell => enterprise_cross_sell(dataset)?,
        };

        Ok(CandidateSet {
            hypothesis: self,
            rows,
        })
    }
}

impl fmt::Display for Hypothesis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rows (by dataset position) satisfying one hypothesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateSet {
    pub hypothesis: Hypothesis,
    pub rows: Vec<usize>,
}

impl CandidateSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn records<'a>(
        &'a self,
        dataset: &'a Dataset,
    ) -> impl Iterator<Item = (usize, &'a CustomerRecord)> + 'a {
        self.rows
            .iter()
            .filter_map(move |row| dataset.records().get(*row).map(|record| (*row, record)))
    }

    pub fn labels(&self, dataset: &Dataset) -> Vec<String> {
        self.records(dataset)
            .map(|(row, record)| record.label(row))
            .collect()
    }
}

/// Outcome of every hypothesis over one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Scorecard {
    results: BTreeMap<Hypothesis, ScoreResult<CandidateSet>>,
}

impl Scorecard {
    pub fn get(&self, hypothesis: Hypothesis) -> Option<&ScoreResult<CandidateSet>> {
        self.results.get(&hypothesis)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Hypothesis, &ScoreResult<CandidateSet>)> {
        self.results.iter().map(|(hypothesis, result)| (*hypothesis, result))
    }

    pub fn candidates(&self) -> impl Iterator<Item = &CandidateSet> {
        self.results.values().filter_map(|result| result.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ScoreError> {
        self.results.values().filter_map(|result| result.as_ref().err())
    }

    pub fn to_json(&self, dataset: &Dataset) -> serde_json::Result<serde_json::Value> {
        let mut hypotheses = serde_json::Map::new();
        for (hypothesis, result) in self.iter() {
            let value = match result {
                Ok(set) => {
                    let mut value = serde_json::to_value(set)?;
                    value["count"] = set.len().into();
                    value["accounts"] = set.labels(dataset).into();
                    value
                }
                Err(err) => serde_json::json!({
                    "hypothesis": hypothesis,
                    "error": err.to_string(),
                }),
            };
            hypotheses.insert(hypothesis.name().to_string(), value);
        }

        Ok(serde_json::json!({
            "snapshot_id": dataset.snapshot_id,
            "source": dataset.source,
            "as_of": dataset.as_of,
            "rows": dataset.len(),
            "hypotheses": hypotheses,
        }))
    }
}

/// Evaluates every hypothesis independently over `dataset`.
pub fn score(dataset: &Dataset, thresholds: &Thresholds) -> Scorecard {
    let results = Hypothesis::ALL
        .into_iter()
        .map(|hypothesis| {
            let result = hypothesis.evaluate(dataset, thresholds);
            match &result {
                Ok(set) => tracing::info!(
                    hypothesis = hypothesis.name(),
                    candidates = set.len(),
                    rows = dataset.len(),
                    "hypothesis evaluated"
                ),
                Err(err) => tracing::warn!(
                    hypothesis = hypothesis.name(),
                    error = %err,
                    "hypothesis failed"
                ),
            }
            (hypothesis, result)
        })
        .collect();

    Scorecard { results }
}

/// Reference statistic over `sample`. Only a dataset without rows is an error;
/// an all-null sample yields `None` and the hypothesis matches nothing.
fn reference(
    hypothesis: Hypothesis,
    column: Column,
    dataset: &Dataset,
    statistic: Option<f64>,
) -> ScoreResult<Option<f64>> {
    if dataset.is_empty() {
        return Err(ScoreError::EmptyDataset { hypothesis, column });
    }
    if statistic.is_none() {
        tracing::debug!(
            hypothesis = hypothesis.name(),
            column = column.name(),
            "no values for reference statistic"
        );
    }
    Ok(statistic)
}

fn median_of(
    hypothesis: Hypothesis,
    column: Column,
    dataset: &Dataset,
    sample: &[f64],
) -> ScoreResult<Option<f64>> {
    reference(hypothesis, column, dataset, stats::median(sample))
}

fn quantile_of(
    hypothesis: Hypothesis,
    column: Column,
    dataset: &Dataset,
    sample: &[f64],
    q: f64,
) -> ScoreResult<Option<f64>> {
    reference(hypothesis, column, dataset, stats::percentile(sample, q))
}

/// Rows whose predicate yields `Some(true)`; `None` (a null input) never matches.
fn select<F>(dataset: &Dataset, predicate: F) -> Vec<usize>
where
    F: Fn(&CustomerRecord) -> Option<bool>,
{
    dataset
        .records()
        .iter()
        .enumerate()
        .filter(|(_, record)| predicate(record).unwrap_or(false))
        .map(|(row, _)| row)
        .collect()
}

fn is_set(flag: f64) -> bool {
    flag == 1.0
}

fn seat_upsell(dataset: &Dataset, thresholds: &Thresholds) -> ScoreResult<Vec<usize>> {
    let median_seats = median_of(
        Hypothesis::SeatUpsell,
        Column::MaxSeats,
        dataset,
        &dataset.sample(Column::MaxSeats),
    )?;
    let Some(median_seats) = median_seats else {
        return Ok(Vec::new());
    };

    Ok(select(dataset, |record| {
        let utilization = record.value(Column::AgentUtilization)?;
        let seats = record.value(Column::MaxSeats)?;
        let increase = record.value(Column::AgentUtilizationIncrease)?;
        Some(utilization > thresholds.high_utilization && seats < median_seats && is_set(increase))
    }))
}

fn product_upsell(dataset: &Dataset, thresholds: &Thresholds) -> ScoreResult<Vec<usize>> {
    let busy_tickets = quantile_of(
        Hypothesis::ProductUpsell,
        Column::MaxTicketsPerAgent,
        dataset,
        &dataset.sample(Column::MaxTicketsPerAgent),
        thresholds.upper_quantile,
    )?;
    let Some(busy_tickets) = busy_tickets else {
        return Ok(Vec::new());
    };

    Ok(select(dataset, |record| {
        let tickets = record.value(Column::MaxTicketsPerAgent)?;
        let premium = record.value(Column::TeamPlus)?
            + record.value(Column::ProPlus)?
            + record.value(Column::EntPlus)?;
        Some(tickets > busy_tickets && premium == 0.0)
    }))
}

fn cross_sell_growth(dataset: &Dataset, thresholds: &Thresholds) -> ScoreResult<Vec<usize>> {
    let median_products = median_of(
        Hypothesis::CrossSellGrowth,
        Column::ProductCounts,
        dataset,
        &dataset.sample(Column::ProductCounts),
    )?;
    let Some(median_products) = median_products else {
        return Ok(Vec::new());
    };

    Ok(select(dataset, |record| {
        let products = record.value(Column::ProductCounts)?;
        let growth = record.value(Column::ProductCountsPercentage)?;
        let age = record.value(Column::CustomerAgeQuarters)?;
        Some(
            products > median_products
                && growth > 0.0
                && age > thresholds.min_customer_age_quarters,
        )
    }))
}

fn cross_sell_satisfied(dataset: &Dataset, thresholds: &Thresholds) -> ScoreResult<Vec<usize>> {
    let hypothesis = Hypothesis::CrossSellSatisfied;
    let top_nps = quantile_of(
        hypothesis,
        Column::NpsScore,
        dataset,
        &dataset.sample(Column::NpsScore),
        thresholds.upper_quantile,
    )?;
    let top_csat = quantile_of(
        hypothesis,
        Column::CsatScore,
        dataset,
        &dataset.sample(Column::CsatScore),
        thresholds.upper_quantile,
    )?;
    let median_products = median_of(
        hypothesis,
        Column::ProductCounts,
        dataset,
        &dataset.sample(Column::ProductCounts),
    )?;
    let (Some(top_nps), Some(top_csat), Some(median_products)) =
        (top_nps, top_csat, median_products)
    else {
        return Ok(Vec::new());
    };

    Ok(select(dataset, |record| {
        let nps = record.value(Column::NpsScore)?;
        let csat = record.value(Column::CsatScore)?;
        let products = record.value(Column::ProductCounts)?;
        Some(nps > top_nps && csat > top_csat && products < median_products)
    }))
}

// The median here is taken within the enterprise segment only.
fn enterprise_cross_sell(dataset: &Dataset) -> ScoreResult<Vec<usize>> {
    let is_enterprise = |record: &CustomerRecord| {
        record
            .value(Column::SegmentEnterprise)
            .is_some_and(is_set)
    };
    let median_products = median_of(
        Hypothesis::EnterpriseCrossSell,
        Column::ProductCounts,
        dataset,
        &dataset.sample_where(Column::ProductCounts, is_enterprise),
    )?;
    let Some(median_products) = median_products else {
        return Ok(Vec::new());
    };

    Ok(select(dataset, |record| {
        let enterprise = record.value(Column::SegmentEnterprise)?;
        let products = record.value(Column::ProductCounts)?;
        Some(is_set(enterprise) && products < median_products)
    }))
}
