use chrono::{DateTime, Utc};
use std::collections::VecDeque;

use crate::strategy::aligner::AlignedFrame;

pub const DEFAULT_ROLLING_WINDOW: usize = 30;

// below this the window is treated as flat and no z-score is produced
const FLAT_STD_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpreadRow {
    pub ts: DateTime<Utc>,
    pub spread: f64,
    pub rolling_mean: Option<f64>,
    pub rolling_std: Option<f64>,
    pub z_score: Option<f64>,
}

/// Sample mean and standard deviation (n - 1 denominator).
fn sample_mean_std(window: &VecDeque<f64>) -> Option<(f64, f64)> {
    if window.len() < 2 {
        return None;
    }
    let n = window.len() as f64;
    let mean = window.iter().sum::<f64>() / n;
    let var = window
        .iter()
        .map(|v| {
            let d = v - mean;
            d * d
        })
        .sum::<f64>()
        / (n - 1.0);
    Some((mean, var.max(0.0).sqrt()))
}

/// Computes `spread = A - beta * B` per row, with trailing-window statistics.
/// The first `window - 1` rows carry no mean, std or z-score.
pub fn compute_spread_rows(frame: &AlignedFrame, beta: f64, window: usize) -> Vec<SpreadRow> {
    let window = window.max(2);
    let mut history: VecDeque<f64> = VecDeque::with_capacity(window);
    let mut out = Vec::with_capacity(frame.len());

    for row in frame.rows() {
        let spread = row.price_a - beta * row.price_b;
        if history.len() >= window {
            history.pop_front();
        }
        history.push_back(spread);

        let stats = if history.len() == window {
            sample_mean_std(&history)
        } else {
            None
        };
        let z_score = stats.and_then(|(mean, std)| {
            if std <= FLAT_STD_EPSILON {
                None
            } else {
                Some((spread - mean) / std)
            }
        });
        out.push(SpreadRow {
            ts: row.ts,
            spread,
            rolling_mean: stats.map(|(mean, _)| mean),
            rolling_std: stats.map(|(_, std)| std),
            z_score,
        });
    }
    out
}
