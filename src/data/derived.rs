//! Derived display metrics computed from a snapshot's raw slices.
//!
//! Everything here is a pure function over already-fetched data; a missing
//! input skips the computation and the derived key is simply absent. The
//! options-flow and social-sentiment fields are synthetic heuristics with a
//! randomized component: they are display color, not measured quantities,
//! and the RNG is injected so tests can pin a seed.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::thresholds;

use super::{Mover, NewsArticle, Quote, SentimentSummary};

/// Volatility-index reading bucketed into a regime and a direction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolatilitySummary {
    pub level: f64,
    pub regime: String,
    pub change: f64,
    pub direction: String,
}

/// Synthetic options-flow heuristic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionsFlow {
    pub put_call_ratio: f64,
    pub implied_volatility: String,
    pub unusual_activity: String,
    /// Marked so downstream consumers never mistake this for exchange data
    pub synthetic: bool,
}

/// Synthetic per-platform social mood
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialSentiment {
    pub platforms: Vec<PlatformMood>,
    pub synthetic: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformMood {
    pub platform: String,
    pub mood: String,
    pub trending_tickers: usize,
    pub buzz: String,
}

/// Map a mean sentiment score onto the 7-level display ladder
pub fn sentiment_label(score: f64) -> &'static str {
    if score > 0.2 {
        "Very Bullish"
    } else if score > 0.1 {
        "Bullish"
    } else if score > 0.05 {
        "Slightly Bullish"
    } else if score >= -0.05 {
        "Neutral"
    } else if score >= -0.1 {
        "Slightly Bearish"
    } else if score >= -0.2 {
        "Bearish"
    } else {
        "Very Bearish"
    }
}

fn summarize(scores: &[f64], window_label: &str) -> SentimentSummary {
    let mean = if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    };
    SentimentSummary {
        score: mean,
        label: sentiment_label(mean).to_string(),
        article_count: scores.len(),
        window_label: window_label.to_string(),
    }
}

/// Overall plus trailing-24h sentiment summaries over a news slice.
/// Returns None when there are no articles at all.
pub fn summarize_sentiment(
    articles: &[NewsArticle],
    now: DateTime<Utc>,
) -> Option<(SentimentSummary, SentimentSummary)> {
    if articles.is_empty() {
        return None;
    }

    let all: Vec<f64> = articles.iter().map(|a| a.sentiment).collect();
    let cutoff = now - Duration::hours(24);
    let recent: Vec<f64> = articles
        .iter()
        .filter(|a| a.published_at >= cutoff)
        .map(|a| a.sentiment)
        .collect();

    Some((summarize(&all, "all"), summarize(&recent, "24h")))
}

/// Bucket a volatility-index quote into regime and direction labels
pub fn classify_volatility(quote: &Quote) -> VolatilitySummary {
    let level = quote.price;
    let regime = if level < thresholds::VOL_LOW {
        "Low"
    } else if level < thresholds::VOL_NORMAL {
        "Normal"
    } else if level < thresholds::VOL_ELEVATED {
        "Elevated"
    } else if level < thresholds::VOL_HIGH {
        "High"
    } else {
        "Very High"
    };

    let direction = if quote.change.abs() <= thresholds::VOL_STABLE_BAND {
        "Stable"
    } else if quote.change > 0.0 {
        "Rising"
    } else {
        "Falling"
    };

    VolatilitySummary {
        level,
        regime: regime.to_string(),
        change: quote.change,
        direction: direction.to_string(),
    }
}

/// Count of movers beyond the strong-move threshold, the anchor input for
/// the synthetic heuristics below
pub fn strong_mover_count(movers: &[Mover]) -> usize {
    movers
        .iter()
        .filter(|m| m.change_percent.abs() >= thresholds::STRONG_MOVE_PCT)
        .count()
}

/// Synthetic options-flow heuristic. Leans on the volatility regime and
/// the count of strong movers; the jitter makes repeat calls non-reproducible.
pub fn options_flow<R: Rng>(
    volatility: Option<&VolatilitySummary>,
    strong_movers: usize,
    rng: &mut R,
) -> OptionsFlow {
    let vol_level = volatility.map(|v| v.level).unwrap_or(thresholds::VOL_NORMAL);

    // Put/call drifts above 1.0 as volatility climbs
    let base_ratio = 0.7 + (vol_level / 100.0) + (strong_movers as f64 * 0.02);
    let put_call_ratio = (base_ratio + rng.gen_range(-0.1..0.1)).clamp(0.4, 1.8);

    let implied_volatility = match volatility.map(|v| v.regime.as_str()) {
        Some("Low") => "Subdued",
        Some("Normal") | None => "Average",
        Some("Elevated") => "Rich",
        _ => "Extreme",
    };

    let unusual_activity = if strong_movers >= 5 || rng.gen_bool(0.2) {
        "Detected"
    } else {
        "None"
    };

    OptionsFlow {
        put_call_ratio: (put_call_ratio * 100.0).round() / 100.0,
        implied_volatility: implied_volatility.to_string(),
        unusual_activity: unusual_activity.to_string(),
        synthetic: true,
    }
}

/// Synthetic per-platform social mood derived from real movers and news
/// sentiment; no social API is consulted.
pub fn social_sentiment<R: Rng>(
    strong_movers: usize,
    sentiment_mean: Option<f64>,
    rng: &mut R,
) -> SocialSentiment {
    let mood_anchor = sentiment_mean.unwrap_or(0.0);

    let platforms = ["X", "Reddit", "StockTwits"]
        .iter()
        .map(|name| {
            let jitter = rng.gen_range(-0.05..0.05);
            let mood = sentiment_label(mood_anchor + jitter).to_string();
            let trending = strong_movers.min(10) + rng.gen_range(0..3);
            let buzz = if trending >= 6 {
                "High"
            } else if trending >= 3 {
                "Moderate"
            } else {
                "Quiet"
            };
            PlatformMood {
                platform: name.to_string(),
                mood,
                trending_tickers: trending,
                buzz: buzz.to_string(),
            }
        })
        .collect();

    SocialSentiment {
        platforms,
        synthetic: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn vol_quote(price: f64, change: f64) -> Quote {
        Quote {
            symbol: "VIXY".to_string(),
            price,
            open: price,
            high: price,
            low: price,
            volume: 1_000_000,
            change,
            change_percent: 0.0,
            as_of: Utc::now(),
        }
    }

    fn article(sentiment: f64, hours_ago: i64) -> NewsArticle {
        NewsArticle {
            title: "t".to_string(),
            url: "https://example.com".to_string(),
            source: "s".to_string(),
            published_at: Utc::now() - Duration::hours(hours_ago),
            sentiment,
            summary: None,
        }
    }

    #[test]
    fn test_sentiment_label_ladder() {
        assert_eq!(sentiment_label(0.25), "Very Bullish");
        assert_eq!(sentiment_label(0.15), "Bullish");
        assert_eq!(sentiment_label(0.07), "Slightly Bullish");
        assert_eq!(sentiment_label(0.0), "Neutral");
        assert_eq!(sentiment_label(-0.07), "Slightly Bearish");
        assert_eq!(sentiment_label(-0.15), "Bearish");
        assert_eq!(sentiment_label(-0.3), "Very Bearish");
    }

    #[test]
    fn test_label_boundaries() {
        // Cutoffs are exclusive upward: exactly 0.05 is still Neutral
        assert_eq!(sentiment_label(0.05), "Neutral");
        assert_eq!(sentiment_label(-0.05), "Neutral");
        assert_eq!(sentiment_label(0.2), "Bullish");
        assert_eq!(sentiment_label(-0.2), "Bearish");
    }

    #[test]
    fn test_summarize_sentiment_windows() {
        let now = Utc::now();
        let articles = vec![article(0.6, 1), article(0.0, 2), article(-0.6, 48)];

        let (all, recent) = summarize_sentiment(&articles, now).expect("summaries");
        assert_eq!(all.article_count, 3);
        assert!((all.score - 0.0).abs() < 1e-9);
        assert_eq!(all.label, "Neutral");

        // Only the two recent articles fall inside the 24h window
        assert_eq!(recent.article_count, 2);
        assert!((recent.score - 0.3).abs() < 1e-9);
        assert_eq!(recent.label, "Very Bullish");
        assert_eq!(recent.window_label, "24h");
    }

    #[test]
    fn test_summarize_sentiment_empty_is_none() {
        assert!(summarize_sentiment(&[], Utc::now()).is_none());
    }

    #[test]
    fn test_volatility_regimes() {
        assert_eq!(classify_volatility(&vol_quote(12.0, 0.1)).regime, "Low");
        assert_eq!(classify_volatility(&vol_quote(17.0, 0.1)).regime, "Normal");
        assert_eq!(classify_volatility(&vol_quote(22.0, 0.1)).regime, "Elevated");
        assert_eq!(classify_volatility(&vol_quote(27.0, 0.1)).regime, "High");
        assert_eq!(classify_volatility(&vol_quote(35.0, 0.1)).regime, "Very High");
    }

    #[test]
    fn test_volatility_direction() {
        assert_eq!(classify_volatility(&vol_quote(20.0, 0.4)).direction, "Stable");
        assert_eq!(classify_volatility(&vol_quote(20.0, 1.2)).direction, "Rising");
        assert_eq!(classify_volatility(&vol_quote(20.0, -0.8)).direction, "Falling");
    }

    #[test]
    fn test_options_flow_is_clamped_and_marked_synthetic() {
        let mut rng = StdRng::seed_from_u64(7);
        let vol = classify_volatility(&vol_quote(45.0, 2.0));
        let flow = options_flow(Some(&vol), 12, &mut rng);
        assert!(flow.put_call_ratio >= 0.4 && flow.put_call_ratio <= 1.8);
        assert!(flow.synthetic);
        assert_eq!(flow.implied_volatility, "Extreme");
    }

    #[test]
    fn test_social_sentiment_covers_three_platforms() {
        let mut rng = StdRng::seed_from_u64(7);
        let social = social_sentiment(4, Some(0.3), &mut rng);
        assert_eq!(social.platforms.len(), 3);
        assert!(social.synthetic);
        for p in &social.platforms {
            assert!(!p.mood.is_empty());
        }
    }

    #[test]
    fn test_strong_mover_count() {
        let mover = |pct: f64| Mover {
            ticker: "T".to_string(),
            price: 10.0,
            change_amount: 1.0,
            change_percent: pct,
            volume: 1_000_000,
            quote: None,
        };
        let movers = vec![mover(12.0), mover(-15.0), mover(4.0)];
        assert_eq!(strong_mover_count(&movers), 2);
    }
}
