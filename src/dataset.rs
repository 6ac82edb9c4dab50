use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Context;
use chrono::{Datelike, NaiveDate};
use uuid::Uuid;

use crate::models::{Column, CustomerRecord, DerivedMetrics};

/// An immutable snapshot of customer rows plus the columns its header carried.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub snapshot_id: Uuid,
    pub source: String,
    pub as_of: NaiveDate,
    columns: BTreeSet<Column>,
    records: Vec<CustomerRecord>,
}

impl Dataset {
    pub fn new(
        source: impl Into<String>,
        as_of: NaiveDate,
        columns: impl IntoIterator<Item = Column>,
        records: Vec<CustomerRecord>,
    ) -> Self {
        let mut columns: BTreeSet<Column> = columns
            .into_iter()
            .filter(|column| Column::RAW.contains(column))
            .collect();
        for derived in Column::DERIVED {
            if derived.inputs().iter().all(|input| columns.contains(input)) {
                columns.insert(derived);
            }
        }

        let mut dataset = Self {
            snapshot_id: Uuid::new_v4(),
            source: source.into(),
            as_of,
            columns,
            records,
        };
        dataset.derive();
        dataset
    }

    pub fn from_reader<R: std::io::Read>(
        reader: R,
        source: &str,
        as_of: NaiveDate,
    ) -> anyhow::Result<Self> {
        let mut reader = csv::Reader::from_reader(reader);
        let columns: Vec<Column> = reader
            .headers()
            .context("failed to read CSV header")?
            .iter()
            .filter_map(Column::from_header)
            .collect();

        let mut records = Vec::new();
        for (index, result) in reader.deserialize::<CustomerRecord>().enumerate() {
            let record = result.with_context(|| format!("invalid customer row {}", index + 1))?;
            records.push(record);
        }

        let dataset = Self::new(source, as_of, columns, records);
        tracing::info!(
            source,
            snapshot_id = %dataset.snapshot_id,
            rows = dataset.len(),
            columns = dataset.columns.len(),
            "loaded customer dataset"
        );
        Ok(dataset)
    }

    pub fn load_csv(path: &Path, as_of: NaiveDate) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        Self::from_reader(file, &path.display().to_string(), as_of)
    }

    /// Same header and source, new rows, new snapshot id.
    pub fn with_records(&self, records: Vec<CustomerRecord>) -> Self {
        Self::new(
            self.source.clone(),
            self.as_of,
            self.columns.iter().copied(),
            records,
        )
    }

    fn derive(&mut self) {
        let as_of = self.as_of;
        for record in self.records.iter_mut() {
            record.derived = DerivedMetrics {
                months_since_scoring: record
                    .scoring_date
                    .map(|scored| months_between(scored, as_of) as f64),
                utilization_ratio: ratio(record.agents, record.max_seats),
                arr_per_seat: ratio(record.arr, record.max_seats),
            };
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[CustomerRecord] {
        &self.records
    }

    pub fn has_column(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }

    pub fn columns(&self) -> impl Iterator<Item = Column> + '_ {
        self.columns.iter().copied()
    }

    pub fn numeric_columns(&self) -> Vec<Column> {
        self.columns().filter(|column| column.is_numeric()).collect()
    }

    /// Non-null values of `column` in row order.
    pub fn sample(&self, column: Column) -> Vec<f64> {
        self.sample_where(column, |_| true)
    }

    pub fn sample_where<F>(&self, column: Column, keep: F) -> Vec<f64>
    where
        F: Fn(&CustomerRecord) -> bool,
    {
        self.records
            .iter()
            .filter(|record| keep(record))
            .filter_map(|record| record.value(column))
            .collect()
    }

    pub fn null_count(&self, column: Column) -> usize {
        self.records
            .iter()
            .filter(|record| record.is_null(column))
            .count()
    }

    /// Rows where both columns are non-null.
    pub fn paired(&self, left: Column, right: Column) -> Vec<(f64, f64)> {
        self.records
            .iter()
            .filter_map(|record| Some((record.value(left)?, record.value(right)?)))
            .collect()
    }
}

fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    let denominator = denominator.filter(|d| *d != 0.0 && !d.is_nan())?;
    numerator
        .filter(|n| !n.is_nan())
        .map(|n| n / denominator)
}

/// Whole calendar months elapsed from `from` to `to`.
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    let mut months =
        (to.year() as i64 - from.year() as i64) * 12 + to.month() as i64 - from.month() as i64;
    if months > 0 && to.day() < from.day() {
        months -= 1;
    } else if months < 0 && to.day() > from.day() {
        months += 1;
    }
    months
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    #[test]
    fn loads_rows_and_tracks_present_columns() {
        let csv = "\
account_id,max_seats,agent_utilization,region
acme,5,0.9,emea
globex,10,,na
";
        let dataset = Dataset::from_reader(csv.as_bytes(), "inline", as_of()).unwrap();
        assert_eq!(dataset.len(), 2);
        assert!(dataset.has_column(Column::MaxSeats));
        assert!(dataset.has_column(Column::AgentUtilization));
        assert!(!dataset.has_column(Column::NpsScore));
        assert_eq!(dataset.records()[1].agent_utilization, None);
        assert_eq!(dataset.null_count(Column::AgentUtilization), 1);
        assert_eq!(dataset.sample(Column::MaxSeats), vec![5.0, 10.0]);
    }

    #[test]
    fn integer_columns_accept_float_exports() {
        let csv = "max_seats,product_counts\n5.0,3\n";
        let dataset = Dataset::from_reader(csv.as_bytes(), "inline", as_of()).unwrap();
        assert_eq!(dataset.records()[0].max_seats, Some(5.0));
        assert_eq!(dataset.records()[0].product_counts, Some(3.0));
    }

    #[test]
    fn malformed_values_fail_with_row_context() {
        let csv = "max_seats\nfive\n";
        let err = Dataset::from_reader(csv.as_bytes(), "inline", as_of()).unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn derived_columns_follow_their_inputs() {
        let csv = "\
account_id,arr,agents,max_seats,scoring_date
acme,12000,8,10,2024-01-20
globex,,4,0,
";
        let dataset = Dataset::from_reader(csv.as_bytes(), "inline", as_of()).unwrap();
        assert!(dataset.has_column(Column::UtilizationRatio));
        assert!(dataset.has_column(Column::ArrPerSeat));
        assert!(dataset.has_column(Column::MonthsSinceScoring));

        let acme = &dataset.records()[0].derived;
        assert_eq!(acme.utilization_ratio, Some(0.8));
        assert_eq!(acme.arr_per_seat, Some(1200.0));
        assert_eq!(acme.months_since_scoring, Some(4.0));

        let globex = &dataset.records()[1].derived;
        assert_eq!(globex.utilization_ratio, None);
        assert_eq!(globex.arr_per_seat, None);
        assert_eq!(globex.months_since_scoring, None);
    }

    #[test]
    fn derived_columns_absent_without_inputs() {
        let csv = "agents,arr\n4,100\n";
        let dataset = Dataset::from_reader(csv.as_bytes(), "inline", as_of()).unwrap();
        assert!(!dataset.has_column(Column::UtilizationRatio));
        assert!(!dataset.has_column(Column::ArrPerSeat));
    }

    #[test]
    fn months_between_counts_whole_months() {
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();
        assert_eq!(months_between(d(2024, 1, 15), d(2024, 6, 15)), 5);
        assert_eq!(months_between(d(2024, 1, 20), d(2024, 6, 15)), 4);
        assert_eq!(months_between(d(2023, 11, 1), d(2024, 2, 1)), 3);
        assert_eq!(months_between(d(2024, 6, 15), d(2024, 6, 1)), 0);
    }

    #[test]
    fn with_records_issues_new_snapshot() {
        let dataset = Dataset::new("inline", as_of(), [Column::MaxSeats], vec![]);
        let copy = dataset.with_records(vec![CustomerRecord::default()]);
        assert_ne!(dataset.snapshot_id, copy.snapshot_id);
        assert!(copy.has_column(Column::MaxSeats));
        assert_eq!(copy.len(), 1);
    }
}
