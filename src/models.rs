use std::fmt;

use chrono::NaiveDate;
use serde::Deserialize;

/// Every column the loader recognises, raw and derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Column {
    AccountId,
    Arr,
    Agents,
    ScoringDate,
    AgentUtilization,
    AgentUtilizationIncrease,
    MaxSeats,
    MaxTicketsPerAgent,
    TeamPlus,
    ProPlus,
    EntPlus,
    ProductCounts,
    ProductCountsPercentage,
    CustomerAgeQuarters,
    NpsScore,
    CsatScore,
    SegmentEnterprise,
    MonthsSinceScoring,
    UtilizationRatio,
    ArrPerSeat,
}

impl Column {
    pub const RAW: [Column; 17] = [
        Column::AccountId,
        Column::Arr,
        Column::Agents,
        Column::ScoringDate,
        Column::AgentUtilization,
        Column::AgentUtilizationIncrease,
        Column::MaxSeats,
        Column::MaxTicketsPerAgent,
        Column::TeamPlus,
        Column::ProPlus,
        Column::EntPlus,
        Column::ProductCounts,
        Column::ProductCountsPercentage,
        Column::CustomerAgeQuarters,
        Column::NpsScore,
        Column::CsatScore,
        Column::SegmentEnterprise,
    ];

    pub const DERIVED: [Column; 3] = [
        Column::MonthsSinceScoring,
        Column::UtilizationRatio,
        Column::ArrPerSeat,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Column::AccountId => "account_id",
            Column::Arr => "arr",
            Column::Agents => "agents",
            Column::ScoringDate => "scoring_date",
            Column::AgentUtilization => "agent_utilization",
            Column::AgentUtilizationIncrease => "agent_utilization_increase",
            Column::MaxSeats => "max_seats",
            Column::MaxTicketsPerAgent => "max_tickets_per_agent",
            Column::TeamPlus => "team_plus",
            Column::ProPlus => "pro_plus",
            Column::EntPlus => "ent_plus",
            Column::ProductCounts => "product_counts",
            Column::ProductCountsPercentage => "product_counts_percentage",
            Column::CustomerAgeQuarters => "customer_age_quarters",
            Column::NpsScore => "nps_score",
            Column::CsatScore => "csat_score",
            Column::SegmentEnterprise => "segment_enterprise",
            Column::MonthsSinceScoring => "months_since_scoring",
            Column::UtilizationRatio => "utilization_ratio",
            Column::ArrPerSeat => "arr_per_seat",
        }
    }

    pub fn from_header(header: &str) -> Option<Column> {
        Column::RAW.into_iter().find(|column| column.name() == header)
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, Column::AccountId | Column::ScoringDate)
    }

    /// Raw columns a derived column is computed from.
    pub fn inputs(self) -> &'static [Column] {
        match self {
            Column::MonthsSinceScoring => &[Column::ScoringDate],
            Column::UtilizationRatio => &[Column::Agents, Column::MaxSeats],
            Column::ArrPerSeat => &[Column::Arr, Column::MaxSeats],
            _ => &[],
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DerivedMetrics {
    pub months_since_scoring: Option<f64>,
    pub utilization_ratio: Option<f64>,
    pub arr_per_seat: Option<f64>,
}

/// One customer row. Numeric columns are floats so exported integers like `5.0` parse.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CustomerRecord {
    pub account_id: Option<String>,
    pub arr: Option<f64>,
    pub agents: Option<f64>,
    pub scoring_date: Option<NaiveDate>,
    pub agent_utilization: Option<f64>,
    pub agent_utilization_increase: Option<f64>,
    pub max_seats: Option<f64>,
    pub max_tickets_per_agent: Option<f64>,
    pub team_plus: Option<f64>,
    pub pro_plus: Option<f64>,
    pub ent_plus: Option<f64>,
    pub product_counts: Option<f64>,
    pub product_counts_percentage: Option<f64>,
    pub customer_age_quarters: Option<f64>,
    pub nps_score: Option<f64>,
    pub csat_score: Option<f64>,
    pub segment_enterprise: Option<f64>,
    #[serde(skip_deserializing)]
    pub derived: DerivedMetrics,
}

impl CustomerRecord {
    /// Numeric value of `column`, with `NaN` read as null.
    pub fn value(&self, column: Column) -> Option<f64> {
        let value = match column {
            Column::AccountId | Column::ScoringDate => None,
            Column::Arr => self.arr,
            Column::Agents => self.agents,
            Column::AgentUtilization => self.agent_utilization,
            Column::AgentUtilizationIncrease => self.agent_utilization_increase,
            Column::MaxSeats => self.max_seats,
            Column::MaxTicketsPerAgent => self.max_tickets_per_agent,
            Column::TeamPlus => self.team_plus,
            Column::ProPlus => self.pro_plus,
            Column::EntPlus => self.ent_plus,
            Column::ProductCounts => self.product_counts,
            Column::ProductCountsPercentage => self.product_counts_percentage,
            Column::CustomerAgeQuarters => self.customer_age_quarters,
            Column::NpsScore => self.nps_score,
            Column::CsatScore => self.csat_score,
            Column::SegmentEnterprise => self.segment_enterprise,
            Column::MonthsSinceScoring => self.derived.months_since_scoring,
            Column::UtilizationRatio => self.derived.utilization_ratio,
            Column::ArrPerSeat => self.derived.arr_per_seat,
        };
        value.filter(|v| !v.is_nan())
    }

    pub fn is_null(&self, column: Column) -> bool {
        match column {
            Column::AccountId => self.account_id.is_none(),
            Column::ScoringDate => self.scoring_date.is_none(),
            other => self.value(other).is_none(),
        }
    }

    /// Mutable slot for a numeric raw column; derived and text columns have none.
    pub fn slot_mut(&mut self, column: Column) -> Option<&mut Option<f64>> {
        match column {
            Column::Arr => Some(&mut self.arr),
            Column::Agents => Some(&mut self.agents),
            Column::AgentUtilization => Some(&mut self.agent_utilization),
            Column::AgentUtilizationIncrease => Some(&mut self.agent_utilization_increase),
            Column::MaxSeats => Some(&mut self.max_seats),
            Column::MaxTicketsPerAgent => Some(&mut self.max_tickets_per_agent),
            Column::TeamPlus => Some(&mut self.team_plus),
            Column::ProPlus => Some(&mut self.pro_plus),
            Column::EntPlus => Some(&mut self.ent_plus),
            Column::ProductCounts => Some(&mut self.product_counts),
            Column::ProductCountsPercentage => Some(&mut self.product_counts_percentage),
            Column::CustomerAgeQuarters => Some(&mut self.customer_age_quarters),
            Column::NpsScore => Some(&mut self.nps_score),
            Column::CsatScore => Some(&mut self.csat_score),
            Column::SegmentEnterprise => Some(&mut self.segment_enterprise),
            _ => None,
        }
    }

    pub fn label(&self, row: usize) -> String {
        self.account_id
            .clone()
            .unwrap_or_else(|| format!("row-{row}"))
    }
}

#[derive(Debug, Clone)]
pub struct ColumnSummary {
    pub column: Column,
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
    pub max: f64,
}

#[derive(Debug, Clone)]
pub struct Correlation {
    pub left: Column,
    pub right: Column,
    pub coefficient: f64,
    pub pairs: usize,
}

#[derive(Debug, Clone)]
pub struct SnapshotHistory {
    pub snapshot_id: uuid::Uuid,
    pub source: String,
    pub as_of: NaiveDate,
    pub row_count: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub hypothesis: Option<String>,
    pub candidate_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_map_to_raw_columns() {
        assert_eq!(Column::from_header("max_seats"), Some(Column::MaxSeats));
        assert_eq!(Column::from_header("nps_score"), Some(Column::NpsScore));
        assert_eq!(Column::from_header("utilization_ratio"), None);
        assert_eq!(Column::from_header("region"), None);
    }

    #[test]
    fn nan_reads_as_null() {
        let record = CustomerRecord {
            nps_score: Some(f64::NAN),
            csat_score: Some(4.5),
            ..Default::default()
        };
        assert_eq!(record.value(Column::NpsScore), None);
        assert!(record.is_null(Column::NpsScore));
        assert_eq!(record.value(Column::CsatScore), Some(4.5));
    }

    #[test]
    fn label_falls_back_to_row_position() {
        let record = CustomerRecord::default();
        assert_eq!(record.label(3), "row-3");
    }
}
