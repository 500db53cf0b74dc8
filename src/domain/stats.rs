// Per-metric statistics for chart cards and history views
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricSummary {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub count: usize,
}

impl MetricSummary {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg = values.iter().sum::<f64>() / values.len() as f64;

        Some(Self {
            min,
            max,
            avg,
            count: values.len(),
        })
    }
}

/// Padded Y-axis range so a line never hugs the chart edges
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YAxisBounds {
    pub min: f64,
    pub max: f64,
}

impl YAxisBounds {
    pub fn for_values(values: &[f64]) -> Self {
        let Some(summary) = MetricSummary::from_values(values) else {
            return Self { min: 0.0, max: 100.0 };
        };

        let (min, max) = (summary.min, summary.max);
        let range = max - min;
        let integer_like = values.iter().all(|v| (v - v.round()).abs() < 0.01);

        let (lower, upper) = if integer_like {
            if range < 10.0 {
                (min.floor() - 5.0, max.ceil() + 5.0)
            } else if range < 50.0 {
                (min.floor() - 10.0, max.ceil() + 10.0)
            } else {
                (min - range * 0.15, max + range * 0.15)
            }
        } else if range < 0.1 {
            (min - 0.05, max + 0.05)
        } else if range < 1.0 {
            (min - 0.2, max + 0.2)
        } else {
            (min - range * 0.15, max + range * 0.15)
        };

        // telemetry values are never negative
        Self {
            min: lower.max(0.0),
            max: upper,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-9, "{} != {}", actual, expected);
    }

    #[test]
    fn test_summary() {
        let summary = MetricSummary::from_values(&[60.0, 70.0, 65.0]).unwrap();
        assert_eq!(summary.min, 60.0);
        assert_eq!(summary.max, 70.0);
        assert_close(summary.avg, 65.0);
        assert_eq!(summary.count, 3);
        assert!(MetricSummary::from_values(&[]).is_none());
    }

    #[test]
    fn test_bounds_default_without_values() {
        assert_eq!(YAxisBounds::for_values(&[]), YAxisBounds { min: 0.0, max: 100.0 });
    }

    #[test]
    fn test_bounds_small_integer_range() {
        let bounds = YAxisBounds::for_values(&[62.0, 65.0, 68.0]);
        assert_eq!(bounds, YAxisBounds { min: 57.0, max: 73.0 });
    }

    #[test]
    fn test_bounds_medium_integer_range() {
        let bounds = YAxisBounds::for_values(&[40.0, 70.0]);
        assert_eq!(bounds, YAxisBounds { min: 30.0, max: 80.0 });
    }

    #[test]
    fn test_bounds_large_integer_range_uses_percentage() {
        let bounds = YAxisBounds::for_values(&[400.0, 600.0]);
        assert_close(bounds.min, 370.0);
        assert_close(bounds.max, 630.0);
    }

    #[test]
    fn test_bounds_decimal_ranges() {
        let tiny = YAxisBounds::for_values(&[0.21, 0.25]);
        assert_close(tiny.min, 0.16);
        assert_close(tiny.max, 0.30);

        let medium = YAxisBounds::for_values(&[21.3, 21.9]);
        assert_close(medium.min, 21.1);
        assert_close(medium.max, 22.1);
    }

    #[test]
    fn test_bounds_clamped_at_zero() {
        let bounds = YAxisBounds::for_values(&[1.0, 3.0]);
        assert_eq!(bounds.min, 0.0);
        assert_eq!(bounds.max, 8.0);
    }
}
