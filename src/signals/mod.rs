//! Alert and play generation: fixed threshold rules over the movers,
//! volatility, and sentiment slices of a snapshot. No AI call; these feed
//! the dashboard's "what's moving right now" tabs.
//!
//! Confidence and priority are monotonic in move magnitude and volume and
//! clamped to a display range; entry/stop/target levels are fixed
//! percentage offsets from the current price. These are display
//! heuristics, ranked and truncated, not trading advice machinery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::thresholds as th;
use crate::data::{MarketSnapshot, Mover};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: Uuid,
    pub alert_type: String, // "breakout" | "volatility" | "sentiment"
    pub priority: String,   // "medium" | "high"
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    pub title: String,
    pub description: String,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub targets: Vec<f64>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayRecord {
    pub id: Uuid,
    pub strategy: String,  // "breakout" | "momentum"
    pub direction: String, // "long" | "short"
    pub confidence: f64,
    pub ticker: String,
    pub title: String,
    pub description: String,
    pub action: String,
    pub entry: f64,
    pub stop_loss: f64,
    pub targets: Vec<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Result batch; `reason` explains an empty list instead of fabricating
/// records for a quiet tape.
#[derive(Debug, Serialize)]
pub struct AlertBatch {
    pub alerts: Vec<AlertRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PlayBatch {
    pub plays: Vec<PlayRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn priority_rank(priority: &str) -> u8 {
    match priority {
        "high" => 2,
        "medium" => 1,
        _ => 0,
    }
}

/// Movers deduplicated by ticker, first occurrence wins
fn dedup_movers(snapshot: &MarketSnapshot) -> Vec<&Mover> {
    let mut seen = std::collections::HashSet::new();
    snapshot
        .all_movers()
        .into_iter()
        .filter(|m| seen.insert(m.ticker.as_str()))
        .collect()
}

fn breakout_alert(mover: &Mover, now: DateTime<Utc>) -> AlertRecord {
    let pct = mover.change_percent;
    let long = pct > 0.0;
    let priority = if pct.abs() >= th::ALERT_HIGH_PRIORITY_PCT {
        "high"
    } else {
        "medium"
    };
    let confidence = (th::ALERT_CONFIDENCE_MIN + th::ALERT_CONFIDENCE_SLOPE * pct.abs())
        .clamp(th::ALERT_CONFIDENCE_MIN, th::ALERT_CONFIDENCE_MAX);

    let (entry, stop, targets) = if long {
        (
            round2(mover.price * th::PLAY_ENTRY_OFFSET),
            round2(mover.price * th::PLAY_STOP_OFFSET),
            vec![
                round2(mover.price * th::PLAY_NEAR_TARGET_OFFSET),
                round2(mover.price * th::PLAY_TARGET_OFFSET),
            ],
        )
    } else {
        (
            round2(mover.price * (2.0 - th::PLAY_ENTRY_OFFSET)),
            round2(mover.price * (2.0 - th::PLAY_STOP_OFFSET)),
            vec![
                round2(mover.price * (2.0 - th::PLAY_NEAR_TARGET_OFFSET)),
                round2(mover.price * (2.0 - th::PLAY_TARGET_OFFSET)),
            ],
        )
    };

    let direction = if long { "up" } else { "down" };
    AlertRecord {
        id: Uuid::new_v4(),
        alert_type: "breakout".to_string(),
        priority: priority.to_string(),
        confidence: round2(confidence),
        ticker: Some(mover.ticker.clone()),
        title: format!("{} breaking {} {:.1}%", mover.ticker, direction, pct.abs()),
        description: format!(
            "{} moved {:.1}% on {} shares, clearing the {:.0}% breakout threshold",
            mover.ticker,
            pct,
            mover.volume,
            th::ALERT_MOVE_PCT
        ),
        action: if long {
            format!("Watch for continuation above {:.2}", mover.price)
        } else {
            format!("Watch for continuation below {:.2}", mover.price)
        },
        entry: Some(entry),
        stop_loss: Some(stop),
        targets,
        timestamp: now,
    }
}

/// Threshold alerts over the movers, volatility, and sentiment slices.
pub fn generate_alerts(snapshot: &MarketSnapshot) -> AlertBatch {
    let now = Utc::now();
    let mut alerts = Vec::new();

    for mover in dedup_movers(snapshot) {
        if mover.change_percent.abs() >= th::ALERT_MOVE_PCT
            && mover.volume >= th::ALERT_VOLUME_FLOOR
        {
            alerts.push(breakout_alert(mover, now));
        }
    }

    if let Some(vol) = &snapshot.volatility {
        if vol.regime == "High" || vol.regime == "Very High" {
            let priority = if vol.regime == "Very High" { "high" } else { "medium" };
            alerts.push(AlertRecord {
                id: Uuid::new_v4(),
                alert_type: "volatility".to_string(),
                priority: priority.to_string(),
                confidence: th::ALERT_CONFIDENCE_MIN,
                ticker: None,
                title: format!("Volatility {} at {:.1}", vol.regime.to_lowercase(), vol.level),
                description: format!(
                    "Volatility index at {:.1} ({}), {} on the day",
                    vol.level,
                    vol.regime,
                    vol.direction.to_lowercase()
                ),
                action: "Reduce position sizes and widen stops".to_string(),
                entry: None,
                stop_loss: None,
                targets: Vec::new(),
                timestamp: now,
            });
        }
    }

    if let Some(sentiment) = &snapshot.sentiment {
        if sentiment.label == "Very Bullish" || sentiment.label == "Very Bearish" {
            alerts.push(AlertRecord {
                id: Uuid::new_v4(),
                alert_type: "sentiment".to_string(),
                priority: "medium".to_string(),
                confidence: th::ALERT_CONFIDENCE_MIN,
                ticker: None,
                title: format!("News sentiment {}", sentiment.label.to_lowercase()),
                description: format!(
                    "{} articles averaging {:.2} sentiment",
                    sentiment.article_count, sentiment.score
                ),
                action: "Check the news tab for the driving stories".to_string(),
                entry: None,
                stop_loss: None,
                targets: Vec::new(),
                timestamp: now,
            });
        }
    }

    alerts.sort_by(|a, b| {
        priority_rank(&b.priority)
            .cmp(&priority_rank(&a.priority))
            .then(
                b.confidence
                    .partial_cmp(&a.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
    });
    alerts.truncate(th::ALERT_TOP_N);

    let reason = alerts.is_empty().then(|| {
        format!(
            "No mover cleared |{:.0}%| on {} volume and no volatility or sentiment extreme is active",
            th::ALERT_MOVE_PCT,
            th::ALERT_VOLUME_FLOOR
        )
    });

    AlertBatch { alerts, reason }
}

/// Threshold play candidates over the movers slices.
pub fn generate_plays(snapshot: &MarketSnapshot) -> PlayBatch {
    let now = Utc::now();
    let mut plays = Vec::new();

    for mover in dedup_movers(snapshot) {
        let pct = mover.change_percent;
        if pct.abs() < th::PLAY_MOVE_PCT || mover.volume < th::PLAY_VOLUME_FLOOR {
            continue;
        }

        let long = pct > 0.0;
        let strategy = if pct.abs() >= th::ALERT_MOVE_PCT {
            "breakout"
        } else {
            "momentum"
        };
        let confidence = (th::PLAY_CONFIDENCE_MIN + th::PLAY_CONFIDENCE_SLOPE * pct.abs())
            .clamp(th::PLAY_CONFIDENCE_MIN, th::PLAY_CONFIDENCE_MAX);

        let (entry, stop, targets) = if long {
            (
                round2(mover.price * th::PLAY_ENTRY_OFFSET),
                round2(mover.price * th::PLAY_STOP_OFFSET),
                vec![
                    round2(mover.price * th::PLAY_NEAR_TARGET_OFFSET),
                    round2(mover.price * th::PLAY_TARGET_OFFSET),
                ],
            )
        } else {
            (
                round2(mover.price * (2.0 - th::PLAY_ENTRY_OFFSET)),
                round2(mover.price * (2.0 - th::PLAY_STOP_OFFSET)),
                vec![
                    round2(mover.price * (2.0 - th::PLAY_NEAR_TARGET_OFFSET)),
                    round2(mover.price * (2.0 - th::PLAY_TARGET_OFFSET)),
                ],
            )
        };

        plays.push(PlayRecord {
            id: Uuid::new_v4(),
            strategy: strategy.to_string(),
            direction: if long { "long" } else { "short" }.to_string(),
            confidence: round2(confidence),
            ticker: mover.ticker.clone(),
            title: format!(
                "{} {} {}",
                mover.ticker,
                strategy,
                if long { "long" } else { "short" }
            ),
            description: format!(
                "{} is {} {:.1}% on {} shares",
                mover.ticker,
                if long { "up" } else { "down" },
                pct.abs(),
                mover.volume
            ),
            action: format!(
                "{} near {:.2}, stop {:.2}",
                if long { "Enter long" } else { "Enter short" },
                entry,
                stop
            ),
            entry,
            stop_loss: stop,
            targets,
            timestamp: now,
        });
    }

    plays.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    plays.truncate(th::PLAY_TOP_N);

    let reason = plays.is_empty().then(|| {
        format!(
            "No mover cleared |{:.0}%| on {} volume",
            th::PLAY_MOVE_PCT,
            th::PLAY_VOLUME_FLOOR
        )
    });

    PlayBatch { plays, reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::derived::VolatilitySummary;
    use crate::data::SentimentSummary;

    fn mover(ticker: &str, price: f64, pct: f64, volume: i64) -> Mover {
        Mover {
            ticker: ticker.to_string(),
            price,
            change_amount: price * pct / 100.0,
            change_percent: pct,
            volume,
            quote: None,
        }
    }

    fn snapshot_with_gainers(gainers: Vec<Mover>) -> MarketSnapshot {
        let mut snapshot = MarketSnapshot::default();
        snapshot.top_gainers = Some(gainers);
        snapshot
    }

    #[test]
    fn test_breakout_alert_at_twelve_percent() {
        let snapshot = snapshot_with_gainers(vec![mover("ABCD", 20.0, 12.0, 600_000)]);
        let batch = generate_alerts(&snapshot);

        assert_eq!(batch.alerts.len(), 1);
        let alert = &batch.alerts[0];
        assert_eq!(alert.alert_type, "breakout");
        assert_eq!(alert.priority, "medium");
        assert_eq!(alert.stop_loss, Some(19.0)); // 20.0 * 0.95
        assert!(batch.reason.is_none());
    }

    #[test]
    fn test_eight_percent_move_is_not_a_breakout() {
        let snapshot = snapshot_with_gainers(vec![mover("ABCD", 20.0, 8.0, 900_000)]);
        let batch = generate_alerts(&snapshot);
        assert!(batch.alerts.is_empty());
        assert!(batch.reason.is_some());
    }

    #[test]
    fn test_volume_floor_gates_alerts() {
        let snapshot = snapshot_with_gainers(vec![mover("THIN", 20.0, 14.0, 400_000)]);
        let batch = generate_alerts(&snapshot);
        assert!(batch.alerts.is_empty());
    }

    #[test]
    fn test_fifteen_percent_is_high_priority() {
        let snapshot = snapshot_with_gainers(vec![mover("FAST", 10.0, 15.0, 700_000)]);
        let batch = generate_alerts(&snapshot);
        assert_eq!(batch.alerts[0].priority, "high");
    }

    #[test]
    fn test_alerts_sorted_high_before_medium() {
        let snapshot = snapshot_with_gainers(vec![
            mover("MED", 10.0, 12.0, 700_000),
            mover("HIGH", 10.0, 18.0, 700_000),
        ]);
        let batch = generate_alerts(&snapshot);
        assert_eq!(batch.alerts[0].ticker.as_deref(), Some("HIGH"));
        assert_eq!(batch.alerts[1].ticker.as_deref(), Some("MED"));
    }

    #[test]
    fn test_volatility_extreme_emits_alert() {
        let mut snapshot = MarketSnapshot::default();
        snapshot.volatility = Some(VolatilitySummary {
            level: 33.0,
            regime: "Very High".to_string(),
            change: 2.0,
            direction: "Rising".to_string(),
        });
        let batch = generate_alerts(&snapshot);
        assert_eq!(batch.alerts.len(), 1);
        assert_eq!(batch.alerts[0].alert_type, "volatility");
        assert_eq!(batch.alerts[0].priority, "high");
    }

    #[test]
    fn test_extreme_sentiment_emits_alert() {
        let mut snapshot = MarketSnapshot::default();
        snapshot.sentiment = Some(SentimentSummary {
            score: 0.31,
            label: "Very Bullish".to_string(),
            article_count: 18,
            window_label: "all".to_string(),
        });
        let batch = generate_alerts(&snapshot);
        assert_eq!(batch.alerts.len(), 1);
        assert_eq!(batch.alerts[0].alert_type, "sentiment");
    }

    #[test]
    fn test_play_thresholds_and_levels() {
        let snapshot = snapshot_with_gainers(vec![
            mover("GOOD", 100.0, 6.0, 200_000),
            mover("WEAK", 100.0, 4.0, 900_000), // below move floor
            mover("THIN", 100.0, 9.0, 50_000),  // below volume floor
        ]);
        let batch = generate_plays(&snapshot);

        assert_eq!(batch.plays.len(), 1);
        let play = &batch.plays[0];
        assert_eq!(play.ticker, "GOOD");
        assert_eq!(play.strategy, "momentum");
        assert_eq!(play.direction, "long");
        assert_eq!(play.entry, 99.5); // 100 * 0.995
        assert_eq!(play.stop_loss, 95.0); // 100 * 0.95
        assert_eq!(play.targets, vec![104.0, 108.0]);
    }

    #[test]
    fn test_short_play_mirrors_levels() {
        let mut snapshot = MarketSnapshot::default();
        snapshot.top_losers = Some(vec![mover("DUMP", 100.0, -11.0, 800_000)]);
        let batch = generate_plays(&snapshot);

        let play = &batch.plays[0];
        assert_eq!(play.direction, "short");
        assert_eq!(play.strategy, "breakout");
        assert_eq!(play.entry, 100.5); // 100 * 1.005
        assert_eq!(play.stop_loss, 105.0); // 100 * 1.05
        assert_eq!(play.targets, vec![96.0, 92.0]);
    }

    #[test]
    fn test_play_confidence_is_clamped() {
        let snapshot = snapshot_with_gainers(vec![mover("MOON", 10.0, 40.0, 5_000_000)]);
        let batch = generate_plays(&snapshot);
        assert_eq!(batch.plays[0].confidence, 95.0);
    }

    #[test]
    fn test_empty_tape_returns_reason() {
        let batch = generate_plays(&MarketSnapshot::default());
        assert!(batch.plays.is_empty());
        let reason = batch.reason.expect("reason present");
        assert!(!reason.is_empty());
    }

    #[test]
    fn test_duplicate_tickers_collapse() {
        let mut snapshot = MarketSnapshot::default();
        snapshot.top_gainers = Some(vec![mover("DUP", 20.0, 12.0, 900_000)]);
        snapshot.most_actively_traded = Some(vec![mover("DUP", 20.0, 12.0, 900_000)]);
        let batch = generate_alerts(&snapshot);
        assert_eq!(batch.alerts.len(), 1);
    }

    #[test]
    fn test_truncation_to_top_n() {
        let gainers: Vec<Mover> = (0..12)
            .map(|i| mover(&format!("T{i}"), 10.0, 11.0 + i as f64, 900_000))
            .collect();
        let batch = generate_plays(&snapshot_with_gainers(gainers));
        assert_eq!(batch.plays.len(), crate::config::thresholds::PLAY_TOP_N);
    }
}
