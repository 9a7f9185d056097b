use crate::domain::dividend::DividendRecord;
use crate::domain::Symbol;
use serde::Serialize;

/// Weights of the dividend and risk factors in the total score. The price factor is
/// reported but does not contribute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactorWeights {
    pub dividend: f64,
    pub risk: f64,
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self {
            dividend: 0.5,
            risk: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Grade {
    Excellent,
    Good,
    Average,
    Poor,
}

impl Grade {
    pub fn from_score(score: u32) -> Self {
        match score {
            80.. => Self::Excellent,
            60..=79 => Self::Good,
            40..=59 => Self::Average,
            _ => Self::Poor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactorScore {
    pub symbol: Symbol,
    pub dividend_factor: u32,
    pub risk_factor: u32,
    pub price_factor: f64,
    pub price_change_pct: f64,
    pub total: u32,
    pub grade: Grade,
}

impl FactorScore {
    /// Weighted linear score from yield (percent), payout ratio (percent) and the
    /// day's price change. Missing inputs count as zero.
    pub fn compute(record: &DividendRecord, weights: FactorWeights) -> Self {
        let dividend = clamp_score(record.dividend_yield.unwrap_or(0.0) * 20.0);
        let risk = clamp_score(100.0 - record.payout_ratio.unwrap_or(0.0));

        let price_change_pct = match (record.current_price, record.previous_close) {
            (Some(cur), Some(prev)) if cur != 0.0 && prev != 0.0 => (cur - prev) / prev * 100.0,
            _ => 0.0,
        };
        let price = clamp_score(50.0 + price_change_pct * 2.0);

        let weight_sum = weights.dividend + weights.risk;
        let weighted = if weight_sum > 0.0 {
            (dividend * weights.dividend + risk * weights.risk) / weight_sum
        } else {
            0.0
        };
        let total = weighted.round() as u32;

        Self {
            symbol: record.symbol.clone(),
            dividend_factor: dividend.round() as u32,
            risk_factor: risk.round() as u32,
            price_factor: price,
            price_change_pct,
            total,
            grade: Grade::from_score(total),
        }
    }
}

fn clamp_score(v: f64) -> f64 {
    if v.is_nan() {
        return 0.0;
    }
    v.clamp(0.0, 100.0)
}
