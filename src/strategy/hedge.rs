use crate::error::PairTradeError;
use crate::strategy::aligner::AlignedFrame;

pub const DEFAULT_MIN_CORRELATION: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HedgeRatio {
    pub beta: f64,
    pub correlation: f64,
}

struct Moments {
    cov: f64,
    var_x: f64,
    var_y: f64,
}

fn central_moments(x: &[f64], y: &[f64]) -> Moments {
    let n = x.len().min(y.len());
    let mean_x = x[..n].iter().sum::<f64>() / n as f64;
    let mean_y = y[..n].iter().sum::<f64>() / n as f64;
    let mut m = Moments {
        cov: 0.0,
        var_x: 0.0,
        var_y: 0.0,
    };
    for i in 0..n {
        let dx = x[i] - mean_x;
        let dy = y[i] - mean_y;
        m.cov += dx * dy;
        m.var_x += dx * dx;
        m.var_y += dy * dy;
    }
    m
}

/// Pearson correlation; 0.0 when either column is flat or too short.
pub fn pearson_correlation(x: &[f64], y: &[f64]) -> f64 {
    if x.len().min(y.len()) < 2 {
        return 0.0;
    }
    let m = central_moments(x, y);
    let denom = (m.var_x * m.var_y).sqrt();
    if denom < 1e-12 || !denom.is_finite() {
        return 0.0;
    }
    (m.cov / denom).clamp(-1.0, 1.0)
}

/// OLS slope of `y = alpha + beta * x`. The intercept is not needed downstream.
pub fn ols_beta(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len().min(y.len()) < 2 {
        return None;
    }
    let m = central_moments(x, y);
    if m.var_x.abs() < 1e-12 {
        None
    } else {
        Some(m.cov / m.var_x)
    }
}

/// Gates the pair on correlation, then regresses A on B for the hedge ratio.
pub fn estimate(frame: &AlignedFrame, min_correlation: f64) -> Result<HedgeRatio, PairTradeError> {
    let a = frame.prices_a();
    let b = frame.prices_b();
    let correlation = pearson_correlation(&a, &b);
    if correlation.abs() < min_correlation {
        return Err(PairTradeError::WeakCorrelation {
            correlation,
            threshold: min_correlation,
        });
    }
    // a passing correlation implies var(B) > 0
    let beta = ols_beta(&b, &a).ok_or(PairTradeError::WeakCorrelation {
        correlation,
        threshold: min_correlation,
    })?;
    log::info!(
        "[HEDGE] {}/{} correlation={:.4} beta={:.4} rows={}",
        frame.symbol_a,
        frame.symbol_b,
        correlation,
        beta,
        frame.len()
    );
    Ok(HedgeRatio { beta, correlation })
}
