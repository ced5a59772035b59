use std::fmt;

use crate::strategy::spread::SpreadRow;

pub const DEFAULT_ENTRY_Z: f64 = 2.0;
pub const DEFAULT_EXIT_Z: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Hold,
    /// Spread is cheap: buy A, sell B.
    Long,
    /// Spread is rich: sell A, buy B.
    Short,
    Exit,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Signal::Hold => "Hold",
            Signal::Long => "Long",
            Signal::Short => "Short",
            Signal::Exit => "Exit",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalThresholds {
    pub entry_z: f64,
    pub exit_z: f64,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            entry_z: DEFAULT_ENTRY_Z,
            exit_z: DEFAULT_EXIT_Z,
        }
    }
}

impl SignalThresholds {
    /// Strict inequalities at the entry band, inclusive at the exit band.
    pub fn classify(&self, z_score: Option<f64>) -> Signal {
        let Some(z) = z_score else {
            return Signal::Hold;
        };
        if z.is_nan() {
            return Signal::Hold;
        }
        if z > self.entry_z {
            Signal::Short
        } else if z < -self.entry_z {
            Signal::Long
        } else if z >= -self.exit_z && z <= self.exit_z {
            Signal::Exit
        } else {
            Signal::Hold
        }
    }

    pub fn classify_rows(&self, rows: &[SpreadRow]) -> Vec<Signal> {
        rows.iter().map(|row| self.classify(row.z_score)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_match_threshold_table() {
        let t = SignalThresholds::default();
        assert_eq!(t.classify(Some(2.0)), Signal::Hold);
        assert_eq!(t.classify(Some(2.0001)), Signal::Short);
        assert_eq!(t.classify(Some(-2.0)), Signal::Hold);
        assert_eq!(t.classify(Some(-2.0001)), Signal::Long);
        assert_eq!(t.classify(Some(0.5)), Signal::Exit);
        assert_eq!(t.classify(Some(-0.5)), Signal::Exit);
        assert_eq!(t.classify(Some(0.5001)), Signal::Hold);
        assert_eq!(t.classify(Some(-0.5001)), Signal::Hold);
        assert_eq!(t.classify(Some(0.0)), Signal::Exit);
        assert_eq!(t.classify(Some(1.2)), Signal::Hold);
    }

    #[test]
    fn undefined_z_is_hold() {
        let t = SignalThresholds::default();
        assert_eq!(t.classify(None), Signal::Hold);
        assert_eq!(t.classify(Some(f64::NAN)), Signal::Hold);
    }

    #[test]
    fn custom_thresholds_are_respected() {
        let t = SignalThresholds {
            entry_z: 1.5,
            exit_z: 0.25,
        };
        assert_eq!(t.classify(Some(1.6)), Signal::Short);
        assert_eq!(t.classify(Some(0.3)), Signal::Hold);
        assert_eq!(t.classify(Some(-0.25)), Signal::Exit);
    }
}
