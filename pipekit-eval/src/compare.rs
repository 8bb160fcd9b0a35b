//! Ranked comparison of fitted models
//!
//! ```ignore
//! let report = evaluate(&x, &y, &[("linear", &linear), ("mixture", &mixture)], &Metric::ALL)?;
//! println!("{}", report);
//! assert_eq!(report.best(Metric::Mae), Some("mixture"));
//! ```

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use pipekit_core::{Matrix, Predictor};

use crate::error::{EvalError, Result};
use crate::metrics::Metric;

/// Scores of one model, aligned with [`ComparisonReport::metrics`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelScores {
    pub name: String,
    pub scores: Vec<f64>,
}

/// Metric values per named model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    metrics: Vec<Metric>,
    rows: Vec<ModelScores>,
}

/// Score every named predictor on `(x, y)`
///
/// An empty `metrics` slice means every [`Metric`].
pub fn evaluate(
    x: &Matrix,
    y: &Matrix,
    pipelines: &[(&str, &dyn Predictor)],
    metrics: &[Metric],
) -> Result<ComparisonReport> {
    if pipelines.is_empty() {
        return Err(EvalError::NoPipelines);
    }
    if x.rows() != y.rows() {
        return Err(EvalError::InvalidInput(format!(
            "x has {} rows but y has {}",
            x.rows(),
            y.rows()
        )));
    }

    let mut seen = HashSet::new();
    for (name, _) in pipelines {
        if !seen.insert(*name) {
            return Err(EvalError::DuplicateName(name.to_string()));
        }
    }

    let metrics = if metrics.is_empty() {
        Metric::ALL.to_vec()
    } else {
        metrics.to_vec()
    };

    let mut rows = Vec::with_capacity(pipelines.len());
    for (name, predictor) in pipelines {
        let pred = predictor.predict(x)?;
        let scores = metrics
            .iter()
            .map(|m| m.compute(&pred, y))
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!(model = %name, ?scores, "evaluated");
        rows.push(ModelScores {
            name: name.to_string(),
            scores,
        });
    }

    Ok(ComparisonReport { metrics, rows })
}

impl ComparisonReport {
    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    /// Rows in evaluation order
    pub fn rows(&self) -> &[ModelScores] {
        &self.rows
    }

    pub fn score(&self, model: &str, metric: Metric) -> Option<f64> {
        let column = self.column(metric)?;
        self.rows
            .iter()
            .find(|r| r.name == model)
            .map(|r| r.scores[column])
    }

    /// Models ordered best first; ties keep evaluation order
    pub fn ranking(&self, metric: Metric) -> Vec<(&str, f64)> {
        let Some(column) = self.column(metric) else {
            return Vec::new();
        };
        let mut ranked: Vec<(&str, f64)> = self
            .rows
            .iter()
            .map(|r| (r.name.as_str(), r.scores[column]))
            .collect();
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
        ranked
    }

    pub fn best(&self, metric: Metric) -> Option<&str> {
        self.ranking(metric).first().map(|(name, _)| *name)
    }

    fn column(&self, metric: Metric) -> Option<usize> {
        self.metrics.iter().position(|m| *m == metric)
    }
}

impl fmt::Display for ComparisonReport {
    /// Table ranked by the first metric
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name_width = self
            .rows
            .iter()
            .map(|r| r.name.len())
            .chain(std::iter::once("model".len()))
            .max()
            .unwrap_or(5);
        const CELL: usize = 12;
        let line_width = 4 + name_width + self.metrics.len() * (CELL + 3);

        writeln!(f, "{}", "=".repeat(line_width))?;
        write!(f, "| {:<w$} |", "model", w = name_width)?;
        for metric in &self.metrics {
            write!(f, " {:>w$} |", metric.name(), w = CELL)?;
        }
        writeln!(f)?;
        writeln!(f, "{}", "-".repeat(line_width))?;

        let order = match self.metrics.first() {
            Some(first) => self.ranking(*first).into_iter().map(|(n, _)| n).collect(),
            None => self.rows.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
        };
        for name in order {
            let Some(row) = self.rows.iter().find(|r| r.name == name) else {
                continue;
            };
            write!(f, "| {:<w$} |", row.name, w = name_width)?;
            for score in &row.scores {
                write!(f, " {:>w$.6} |", score, w = CELL)?;
            }
            writeln!(f)?;
        }
        write!(f, "{}", "=".repeat(line_width))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Predicts a constant everywhere
    struct Constant(f64);

    impl Predictor for Constant {
        fn predict(&self, x: &Matrix) -> pipekit_core::Result<Matrix> {
            Ok(Matrix::filled(x.rows(), 1, self.0))
        }
    }

    fn data() -> (Matrix, Matrix) {
        (Matrix::zeros(4, 2), Matrix::column(vec![1.0, 1.0, 1.0, 1.0]))
    }

    #[test]
    fn test_ranking_lower_is_better() {
        let (x, y) = data();
        let (near, far, exact) = (Constant(1.5), Constant(3.0), Constant(1.0));
        let pipelines: [(&str, &dyn Predictor); 3] = [("far", &far), ("exact", &exact), ("near", &near)];
        let report = evaluate(&x, &y, &pipelines, &[]).unwrap();

        assert_eq!(report.metrics(), &Metric::ALL);
        let names: Vec<&str> = report.ranking(Metric::Mse).iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["exact", "near", "far"]);
        assert_eq!(report.best(Metric::Mae), Some("exact"));
        assert_eq!(report.score("far", Metric::Mae), Some(2.0));
        assert_eq!(report.score("far", Metric::Mse), Some(4.0));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let (x, y) = data();
        let a = Constant(0.0);
        let pipelines: [(&str, &dyn Predictor); 2] = [("m", &a), ("m", &a)];
        let err = evaluate(&x, &y, &pipelines, &[]).unwrap_err();
        assert_eq!(err, EvalError::DuplicateName("m".into()));
    }

    #[test]
    fn test_empty_pipelines_rejected() {
        let (x, y) = data();
        assert_eq!(evaluate(&x, &y, &[], &[]).unwrap_err(), EvalError::NoPipelines);
    }

    #[test]
    fn test_selected_metric_only() {
        let (x, y) = data();
        let a = Constant(0.0);
        let pipelines: [(&str, &dyn Predictor); 1] = [("zero", &a)];
        let report = evaluate(&x, &y, &pipelines, &[Metric::Mse]).unwrap();
        assert_eq!(report.score("zero", Metric::Mse), Some(1.0));
        assert_eq!(report.score("zero", Metric::Mae), None);
        assert!(report.ranking(Metric::Mae).is_empty());
    }

    #[test]
    fn test_display_ranks_rows() {
        let (x, y) = data();
        let (worse, better) = (Constant(5.0), Constant(2.0));
        let pipelines: [(&str, &dyn Predictor); 2] = [("worse", &worse), ("better", &better)];
        let table = evaluate(&x, &y, &pipelines, &[]).unwrap().to_string();

        let better_at = table.find("better").unwrap();
        let worse_at = table.find("worse").unwrap();
        assert!(better_at < worse_at);
        assert!(table.contains("mae"));
        assert!(table.contains("16.000000"));
    }
}
