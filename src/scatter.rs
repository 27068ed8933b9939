//! Turns coordinate rows into coloured point series for the UMAP plot.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use log::info;
use serde::Serialize;

use crate::domain::{DOMAINS, Rgb, cluster_color, domain_code, expression_color};
use crate::error::{DashboardError, Result};
use crate::models::{Coordinate, GeneExpression};
use crate::query::cluster_number;

/// Number of colour buckets the continuous expression scale is split into.
pub const EXPRESSION_BINS: usize = 24;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterSeries {
    pub name: String,
    pub color: Rgb,
    pub points: Vec<[f64; 2]>,
    /// Hover text, parallel to `points`.
    pub labels: Vec<String>,
    /// Whether the series gets its own legend entry.
    pub in_legend: bool,
}

impl ScatterSeries {
    fn new(name: impl Into<String>, color: Rgb, in_legend: bool) -> Self {
        Self {
            name: name.into(),
            color,
            points: Vec::new(),
            labels: Vec::new(),
            in_legend,
        }
    }

    fn push(&mut self, point: &Coordinate, label: String) {
        self.points.push([point.x, point.y]);
        self.labels.push(label);
    }
}

fn hover(point: &Coordinate) -> String {
    format!("{}\nIPN: {}", point.cluster_id, domain_code(point.domain))
}

/// One series per cluster, clusters in numeric order, palette assigned in that order.
pub fn by_cluster(points: &[Coordinate]) -> Vec<ScatterSeries> {
    let mut seen = HashSet::new();
    let mut clusters: Vec<&str> = points
        .iter()
        .map(|point| point.cluster_id.as_str())
        .filter(|id| seen.insert(*id))
        .collect();
    clusters.sort_by_key(|id| cluster_number(id));

    let mut series: Vec<ScatterSeries> = clusters
        .iter()
        .enumerate()
        .map(|(ordinal, id)| ScatterSeries::new(*id, cluster_color(ordinal), true))
        .collect();
    let slot: HashMap<&str, usize> = clusters
        .iter()
        .enumerate()
        .map(|(ordinal, id)| (*id, ordinal))
        .collect();

    for point in points {
        if let Some(&i) = slot.get(point.cluster_id.as_str()) {
            series[i].push(point, hover(point));
        }
    }
    series
}

/// One series per IPN domain, always all six in domain order.
pub fn by_domain(points: &[Coordinate]) -> Vec<ScatterSeries> {
    let mut series: Vec<ScatterSeries> = DOMAINS
        .iter()
        .map(|info| ScatterSeries::new(info.code, info.color, true))
        .collect();
    for point in points {
        if let Some(i) = (point.domain as usize).checked_sub(1).filter(|i| *i < series.len()) {
            series[i].push(point, hover(point));
        }
    }
    series
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpressionRange {
    pub min: f64,
    pub max: f64,
}

/// Colours every point by its expression of one gene. Cells missing from
/// `expression` count as 0.
pub fn by_expression(points: &[Coordinate], expression: &[GeneExpression]) -> (Vec<ScatterSeries>, ExpressionRange) {
    let lookup: HashMap<&str, f64> = expression
        .iter()
        .map(|row| (row.observation_id.as_str(), row.expression))
        .collect();
    let values: Vec<f64> = points
        .iter()
        .map(|point| lookup.get(point.observation_id.as_str()).copied().unwrap_or(0.0))
        .collect();

    let range = values.iter().fold(None, |acc: Option<ExpressionRange>, &v| {
        Some(match acc {
            None => ExpressionRange { min: v, max: v },
            Some(r) => ExpressionRange { min: r.min.min(v), max: r.max.max(v) },
        })
    });
    let range = range.unwrap_or(ExpressionRange { min: 0.0, max: 0.0 });

    // low bins first so high expression is drawn on top
    let mut series: Vec<ScatterSeries> = (0..EXPRESSION_BINS)
        .map(|bin| {
            let mid = range.min + (range.max - range.min) * (bin as f64 + 0.5) / EXPRESSION_BINS as f64;
            ScatterSeries::new(
                format!("{:.2}", mid),
                expression_color(mid, range.min, range.max),
                false,
            )
        })
        .collect();

    for (point, value) in points.iter().zip(&values) {
        let bin = expression_bin(*value, range);
        series[bin].push(point, format!("{}\nExpr: {:.2}", hover(point), value));
    }
    series.retain(|s| !s.points.is_empty());
    (series, range)
}

fn expression_bin(value: f64, range: ExpressionRange) -> usize {
    if range.max <= range.min {
        return 0;
    }
    let t = ((value - range.min) / (range.max - range.min)).clamp(0.0, 1.0);
    ((t * EXPRESSION_BINS as f64) as usize).min(EXPRESSION_BINS - 1)
}

/// Hover text of the point closest to `(x, y)` across all series.
pub fn nearest_label(series: &[ScatterSeries], x: f64, y: f64) -> Option<&str> {
    series
        .iter()
        .flat_map(|s| s.points.iter().zip(&s.labels))
        .map(|(p, label)| ((p[0] - x).powi(2) + (p[1] - y).powi(2), label))
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, label)| label.as_str())
}

pub fn export_series_json(series: &[ScatterSeries], path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| DashboardError::unavailable(path, e))?;
    serde_json::to_writer_pretty(BufWriter::new(file), series)?;
    info!("exported {} plot series to {}", series.len(), path.display());
    Ok(())
}
