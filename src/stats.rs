use crate::models::{Column, ColumnSummary};

fn sorted(sample: &[f64]) -> Vec<f64> {
    let mut values = sample.to_vec();
    values.sort_by(|a, b| a.total_cmp(b));
    values
}

fn percentile_of_sorted(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let position = q.clamp(0.0, 1.0) * (values.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;

    Some(values[lower] + (values[upper] - values[lower]) * fraction)
}

/// Percentile with linear interpolation between closest ranks.
pub fn percentile(sample: &[f64], q: f64) -> Option<f64> {
    percentile_of_sorted(&sorted(sample), q)
}

pub fn median(sample: &[f64]) -> Option<f64> {
    percentile(sample, 0.5)
}

pub fn describe(column: Column, sample: &[f64]) -> Option<ColumnSummary> {
    let values = sorted(sample);
    let count = values.len();
    if count == 0 {
        return None;
    }

    let mean = values.iter().sum::<f64>() / count as f64;
    let std_dev = if count > 1 {
        let squares: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
        (squares / (count - 1) as f64).sqrt()
    } else {
        0.0
    };

    Some(ColumnSummary {
        column,
        count,
        mean,
        std_dev,
        min: values[0],
        p25: percentile_of_sorted(&values, 0.25)?,
        median: percentile_of_sorted(&values, 0.5)?,
        p75: percentile_of_sorted(&values, 0.75)?,
        max: values[count - 1],
    })
}

/// Pearson coefficient over pairwise-complete observations.
pub fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut covariance = 0.0;
    let mut variance_x = 0.0;
    let mut variance_y = 0.0;
    for (x, y) in pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        covariance += dx * dy;
        variance_x += dx * dx;
        variance_y += dy * dy;
    }

    if variance_x == 0.0 || variance_y == 0.0 {
        return None;
    }

    Some(covariance / (variance_x.sqrt() * variance_y.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_interpolates_even_samples() {
        assert_eq!(median(&[10.0, 5.0]), Some(7.5));
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
    }

    #[test]
    fn percentile_uses_linear_interpolation() {
        let sample = [1.0, 2.0, 3.0, 4.0];
        // position 0.75 * 3 = 2.25 -> 3 + 0.25 * (4 - 3)
        assert!((percentile(&sample, 0.75).unwrap() - 3.25).abs() < 1e-9);
        assert_eq!(percentile(&sample, 0.0), Some(1.0));
        assert_eq!(percentile(&sample, 1.0), Some(4.0));
    }

    #[test]
    fn empty_sample_has_no_statistics() {
        assert_eq!(median(&[]), None);
        assert_eq!(percentile(&[], 0.75), None);
        assert!(describe(Column::MaxSeats, &[]).is_none());
    }

    #[test]
    fn describe_reports_spread() {
        let summary = describe(Column::MaxSeats, &[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(summary.count, 8);
        assert!((summary.mean - 5.0).abs() < 1e-9);
        assert!((summary.std_dev - (32.0f64 / 7.0).sqrt()).abs() < 1e-9);
        assert_eq!(summary.min, 2.0);
        assert_eq!(summary.max, 9.0);
        assert_eq!(summary.median, 4.5);
    }

    #[test]
    fn pearson_detects_linear_relationships() {
        let rising = [(1.0, 2.0), (2.0, 4.0), (3.0, 6.0)];
        let falling = [(1.0, 3.0), (2.0, 2.0), (3.0, 1.0)];
        assert!((pearson(&rising).unwrap() - 1.0).abs() < 1e-9);
        assert!((pearson(&falling).unwrap() + 1.0).abs() < 1e-9);
    }

    #[test]
    fn pearson_needs_variance() {
        assert_eq!(pearson(&[(1.0, 1.0)]), None);
        assert_eq!(pearson(&[(1.0, 5.0), (2.0, 5.0)]), None);
    }
}
