//! Short-horizon demand forecast
//!
//! A naive linear extrapolation over the trailing week. Confidence is a display
//! heuristic that decays with the horizon, not a statistical interval.

use chrono::Duration;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use super::types::*;
use super::{FORECAST_HORIZON_DAYS, FORECAST_WINDOW};
use crate::domain::deal::Deal;

/// Revenue slope used as a proxy when no independent revenue trend is fitted.
const REVENUE_TREND_MULTIPLIER: f64 = 50.0;

const TREND_DEADBAND: f64 = 0.1;

const CONFIDENCE_START: f64 = 95.0;
const CONFIDENCE_DECAY_PER_DAY: f64 = 5.0;
const CONFIDENCE_FLOOR: f64 = 50.0;

pub fn forecast(
    time_series: &[TimeSeriesPoint],
    deals: &[Deal],
    performance: &[DealPerformanceRecord],
) -> PredictiveData {
    let has_active_deal = deals.iter().any(|deal| deal.is_active);
    let Some(last_point) = time_series.last() else {
        return PredictiveData::empty();
    };
    if !has_active_deal {
        return PredictiveData::empty();
    }

    let window = &time_series[time_series.len().saturating_sub(FORECAST_WINDOW)..];
    let redemptions: Vec<f64> = window.iter().map(|point| point.redemptions as f64).collect();
    let revenue: Vec<f64> =
        window.iter().map(|point| point.revenue.to_f64().unwrap_or(0.0)).collect();

    let redemption_avg = mean(&redemptions);
    let revenue_avg = mean(&revenue);
    let trend = slope(&redemptions);
    let revenue_trend = trend * REVENUE_TREND_MULTIPLIER;

    let mut redemption_forecast = Vec::with_capacity(FORECAST_HORIZON_DAYS as usize);
    let mut revenue_forecast = Vec::with_capacity(FORECAST_HORIZON_DAYS as usize);
    for day in 1..=FORECAST_HORIZON_DAYS {
        let date = last_point.date + Duration::days(i64::from(day));
        let confidence = confidence_for_day(day);
        let step = f64::from(day);

        redemption_forecast.push(ForecastPoint {
            date,
            predicted: (redemption_avg + trend * step).max(0.0).round(),
            confidence,
        });
        revenue_forecast.push(ForecastPoint {
            date,
            predicted: (revenue_avg + revenue_trend * step).max(0.0),
            confidence,
        });
    }

    let optimal_threshold = optimal_threshold(deals, performance);
    let confidence = redemption_forecast.first().map(|point| point.confidence).unwrap_or(0.0);

    tracing::debug!(
        event_name = "analytics.forecast.computed",
        window = window.len(),
        trend,
        %optimal_threshold,
        "forecast computed"
    );

    PredictiveData {
        redemption_forecast,
        revenue_forecast,
        optimal_threshold,
        recommended_threshold: (optimal_threshold * Decimal::new(9, 1)).round_dp(2),
        trend_direction: trend_direction(trend),
        confidence,
        horizon_days: FORECAST_HORIZON_DAYS,
    }
}

/// `max(50, 95 - 5 * day)`.
pub fn confidence_for_day(day: u32) -> f64 {
    (CONFIDENCE_START - CONFIDENCE_DECAY_PER_DAY * f64::from(day)).max(CONFIDENCE_FLOOR)
}

pub fn trend_direction(trend: f64) -> TrendDirection {
    if trend > TREND_DEADBAND {
        TrendDirection::Up
    } else if trend < -TREND_DEADBAND {
        TrendDirection::Down
    } else {
        TrendDirection::Stable
    }
}

/// Threshold of the active deal with the best `redemptions * conversion / threshold`.
/// Zero thresholds are skipped; on equal values the earlier deal wins.
pub fn optimal_threshold(deals: &[Deal], performance: &[DealPerformanceRecord]) -> Decimal {
    let mut best: Option<(Decimal, f64)> = None;

    for deal in deals.iter().filter(|deal| deal.is_active) {
        let threshold = deal.threshold_amount.to_f64().unwrap_or(0.0);
        if threshold <= 0.0 {
            continue;
        }

        let value = performance
            .iter()
            .find(|record| record.deal_id == deal.id)
            .map(|record| record.redemptions as f64 * record.conversion_rate / threshold)
            .unwrap_or(0.0);

        if best.map_or(true, |(_, best_value)| value > best_value) {
            best = Some((deal.threshold_amount, value));
        }
    }

    best.map(|(threshold, _)| threshold).unwrap_or(Decimal::ZERO)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// `(last - first) / n`; a single point has no slope.
fn slope(values: &[f64]) -> f64 {
    match values {
        [] | [_] => 0.0,
        [first, .., last] => (last - first) / values.len() as f64,
    }
}
