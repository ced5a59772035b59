use chrono::{DateTime, Utc};
use std::cmp::Ordering;

use crate::error::PairTradeError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub ts: DateTime<Utc>,
    pub price: f64,
}

/// Closes for one symbol, sorted by timestamp with at most one point per timestamp.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    pub symbol: String,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(symbol: &str, mut points: Vec<PricePoint>) -> Self {
        points.sort_by(|a, b| a.ts.cmp(&b.ts));
        // keep the latest sample when a timestamp repeats
        let mut unique: Vec<PricePoint> = Vec::with_capacity(points.len());
        for point in points {
            match unique.last_mut() {
                Some(last) if last.ts == point.ts => *last = point,
                _ => unique.push(point),
            }
        }
        Self {
            symbol: symbol.to_string(),
            points: unique,
        }
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignedRow {
    pub ts: DateTime<Utc>,
    pub price_a: f64,
    pub price_b: f64,
}

#[derive(Debug, Clone)]
pub struct AlignedFrame {
    pub symbol_a: String,
    pub symbol_b: String,
    rows: Vec<AlignedRow>,
}

impl AlignedFrame {
    pub fn rows(&self) -> &[AlignedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn prices_a(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.price_a).collect()
    }

    pub fn prices_b(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.price_b).collect()
    }
}

/// Inner-joins both series on timestamp. Timestamps present in only one series
/// are dropped; the join fails if fewer than `min_rows` survive.
pub fn align(
    a: &PriceSeries,
    b: &PriceSeries,
    min_rows: usize,
) -> Result<AlignedFrame, PairTradeError> {
    let (pa, pb) = (a.points(), b.points());
    let mut rows = Vec::with_capacity(pa.len().min(pb.len()));
    let (mut i, mut j) = (0, 0);
    while i < pa.len() && j < pb.len() {
        match pa[i].ts.cmp(&pb[j].ts) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                rows.push(AlignedRow {
                    ts: pa[i].ts,
                    price_a: pa[i].price,
                    price_b: pb[j].price,
                });
                i += 1;
                j += 1;
            }
        }
    }

    let dropped = (pa.len() - rows.len()) + (pb.len() - rows.len());
    if dropped > 0 {
        log::debug!(
            "[ALIGN] {}/{} dropped {} unmatched samples",
            a.symbol,
            b.symbol,
            dropped
        );
    }
    if rows.len() < min_rows {
        return Err(PairTradeError::InsufficientData {
            rows: rows.len(),
            required: min_rows,
        });
    }

    Ok(AlignedFrame {
        symbol_a: a.symbol.clone(),
        symbol_b: b.symbol.clone(),
        rows,
    })
}
