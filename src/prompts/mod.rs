//! Prompt templates for the generative-text API.
//! Template text lives here as data; the builders serialize a snapshot and
//! append the per-mode instruction block spelling out the exact JSON shape
//! the dashboard expects back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::MarketSnapshot;

/// Expected shape of a single-symbol analysis response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisVerdict {
    pub symbol: String,
    pub recommendation: String, // "BUY" | "SELL" | "HOLD"
    pub confidence: f64,        // 0 to 100
    pub summary: String,
    pub key_factors: Vec<String>,
    pub risk_factors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_target: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
}

/// One turn of dashboard chat; history is supplied by the caller and never
/// stored server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String, // "user" | "assistant"
    pub content: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

/// Prompt template builder
pub struct Prompts;

impl Prompts {
    /// Single-symbol analysis prompt
    pub fn analysis(snapshot: &MarketSnapshot, symbol: &str) -> String {
        format!(
            r#"You are the analysis engine behind a trading dashboard. Analyze the following market snapshot for {symbol}.

MARKET SNAPSHOT:
{snapshot}

TASK:
Produce a concise trading analysis for {symbol}. Your response must be valid JSON matching this exact format:
{{
    "symbol": "{symbol}",
    "recommendation": "BUY" | "SELL" | "HOLD",
    "confidence": 72.5,
    "summary": "Two or three sentences on the setup",
    "key_factors": ["Factor 1", "Factor 2", "Factor 3"],
    "risk_factors": ["Risk 1", "Risk 2"],
    "price_target": 123.45,
    "stop_loss": 110.00
}}

RULES:
- confidence is a number from 0 to 100
- price_target and stop_loss are numbers, or null when a recommendation is HOLD
- Base the analysis only on the snapshot above; missing slices simply were not available
- Do not include any text outside the JSON object"#,
            symbol = symbol,
            snapshot = pretty(snapshot),
        )
    }

    /// Market-wide smart-plays prompt
    pub fn smart_plays(snapshot: &MarketSnapshot) -> String {
        format!(
            r#"You are the smart-plays engine behind a trading dashboard. Scan the market snapshot below for short-term opportunities.

MARKET SNAPSHOT:
{snapshot}

TASK:
Propose up to 5 plays drawn from the movers, sector, and volatility data above. Your response must be valid JSON matching this exact format:
{{
    "market_outlook": "One or two sentences on the broad tape",
    "plays": [
        {{
            "ticker": "ABCD",
            "strategy": "momentum" | "reversal" | "breakout",
            "direction": "long" | "short",
            "confidence": 78,
            "entry": 12.34,
            "stop_loss": 11.50,
            "targets": [13.00, 13.80],
            "rationale": "One sentence on why"
        }}
    ]
}}

RULES:
- Only reference tickers that appear in the snapshot
- confidence is a number from 0 to 100
- An empty tape is a valid answer: return "plays": [] with the outlook explaining why
- Do not include any text outside the JSON object"#,
            snapshot = pretty(snapshot),
        )
    }

    /// Dashboard chat prompt with optional market context
    pub fn chat(
        message: &str,
        history: &[ChatTurn],
        context: Option<&MarketSnapshot>,
    ) -> String {
        let history_text = if history.is_empty() {
            "(no prior turns)".to_string()
        } else {
            history
                .iter()
                .map(|turn| format!("{}: {}", turn.role, turn.content))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let context_text = context
            .map(pretty)
            .unwrap_or_else(|| "(market data unavailable)".to_string());

        format!(
            r#"You are a market assistant embedded in a trading dashboard. Answer the user's question using the market context when it is relevant.

CURRENT MARKET CONTEXT:
{context_text}

CONVERSATION SO FAR:
{history_text}

USER QUESTION:
{message}

Answer in plain prose, two short paragraphs at most. Never present heuristic dashboard values as guarantees."#,
        )
    }
}

fn pretty(snapshot: &MarketSnapshot) -> String {
    serde_json::to_string_pretty(snapshot).unwrap_or_else(|_| "(snapshot unavailable)".to_string())
}
