use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::data::snapshot::{apply_heuristics, SnapshotDepth};
use crate::data::{classify, MarketSnapshot};
use crate::llm::extract::extract_json;
use crate::prompts::{ChatTurn, Prompts};
use crate::signals;

use super::error::ApiError;
use super::state::AppState;

// ── Request shapes ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    #[serde(default)]
    symbol: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalysisRequest {
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default = "default_analysis_type", rename = "type")]
    kind: String,
}

fn default_analysis_type() -> String {
    "analysis".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    message: String,
    #[serde(default)]
    history: Vec<ChatTurn>,
}

// ── Route definitions ────────────────────────────────────────────────────

pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .route("/api/session", get(session))
        .route("/api/quote", get(quote))
        .route("/api/market", get(market))
        .route("/api/alerts", get(alerts))
        .route("/api/plays", get(plays))
        .route("/api/analysis", get(analysis_get).post(analysis_post))
        .route("/api/chat", post(chat))
}

// ── Handlers ─────────────────────────────────────────────────────────────

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "market_data_configured": state.config.apis.market_data_api_key.is_some(),
        "generative_configured": state.config.llm.api_key.is_some(),
        "timestamp": Utc::now(),
    }))
}

async fn session() -> Json<Value> {
    let now = Utc::now();
    let session = classify(now);
    Json(json!({
        "session": session,
        "data_source": session.data_source(),
        "extended_hours": session.is_extended_hours(),
        "timestamp": now,
    }))
}

async fn quote(
    State(state): State<Arc<AppState>>,
    Query(q): Query<QuoteQuery>,
) -> Result<Json<Value>, ApiError> {
    state.require_market()?;
    let symbol = required_symbol(q.symbol.as_deref())?;

    let quote = state.market.fetch_quote(&symbol).await?;
    Ok(Json(json!({
        "quote": quote,
        "session": classify(Utc::now()),
        "timestamp": Utc::now(),
    })))
}

/// Market-wide snapshot with derived metrics. Degraded slices are absent
/// keys plus entries in `warnings`; the response is still 200.
async fn market(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    state.require_market()?;

    let mut snapshot = state
        .snapshots
        .build(None, SnapshotDepth::Comprehensive)
        .await?;
    apply_heuristics(&mut snapshot, &mut rand::thread_rng());

    Ok(Json(json!({
        "snapshot": snapshot,
        "timestamp": Utc::now(),
    })))
}

async fn alerts(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    state.require_market()?;

    let snapshot = state.snapshots.build(None, SnapshotDepth::Basic).await?;
    let batch = signals::generate_alerts(&snapshot);

    Ok(Json(json!({
        "alerts": batch.alerts,
        "reason": batch.reason,
        "session": snapshot.session,
        "timestamp": Utc::now(),
    })))
}

async fn plays(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    state.require_market()?;

    let snapshot = state.snapshots.build(None, SnapshotDepth::Basic).await?;
    let batch = signals::generate_plays(&snapshot);

    Ok(Json(json!({
        "plays": batch.plays,
        "reason": batch.reason,
        "session": snapshot.session,
        "timestamp": Utc::now(),
    })))
}

async fn analysis_get(
    State(state): State<Arc<AppState>>,
    Query(request): Query<AnalysisRequest>,
) -> Result<Json<Value>, ApiError> {
    run_analysis(state, request).await
}

async fn analysis_post(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalysisRequest>,
) -> Result<Json<Value>, ApiError> {
    run_analysis(state, request).await
}

/// Snapshot, prompt, generate, extract. A generation whose text contains
/// no parseable JSON still answers 200; the analysis field becomes an
/// error object carrying the raw text.
async fn run_analysis(
    state: Arc<AppState>,
    request: AnalysisRequest,
) -> Result<Json<Value>, ApiError> {
    let llm = state.require_ai()?;

    let kind = request.kind.trim().to_lowercase();
    let (mut snapshot, symbol) = match kind.as_str() {
        "analysis" => {
            let symbol = required_symbol(request.symbol.as_deref())?;
            let snapshot = state
                .snapshots
                .build(Some(&symbol), SnapshotDepth::Comprehensive)
                .await?;
            (snapshot, Some(symbol))
        }
        "smartplays" => {
            let snapshot = state
                .snapshots
                .build(None, SnapshotDepth::Comprehensive)
                .await?;
            (snapshot, None)
        }
        other => {
            return Err(ApiError::BadRequest(format!(
                "Unknown analysis type: {other} (expected analysis or smartplays)"
            )))
        }
    };
    apply_heuristics(&mut snapshot, &mut rand::thread_rng());

    let prompt = match &symbol {
        Some(sym) => Prompts::analysis(&snapshot, sym),
        None => Prompts::smart_plays(&snapshot),
    };

    let response = llm
        .generate(&prompt)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    let analysis = match extract_json(&response.content) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("generation did not contain parseable JSON: {}", e);
            json!({
                "error": e.to_string(),
                "raw_text": response.content,
            })
        }
    };

    Ok(Json(json!({
        "type": kind,
        "symbol": symbol,
        "analysis": analysis,
        "model": response.model,
        "session": snapshot.session,
        "timestamp": Utc::now(),
    })))
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<Value>, ApiError> {
    let llm = state.require_ai()?;

    let message = request.message.trim();
    if message.is_empty() {
        return Err(ApiError::BadRequest("message is required".to_string()));
    }

    // Market context is best-effort; chat still answers without it
    let context = market_context(&state).await;
    let prompt = Prompts::chat(message, &request.history, context.as_ref());

    let response = llm
        .generate(&prompt)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    Ok(Json(json!({
        "reply": response.content,
        "model": response.model,
        "timestamp": Utc::now(),
    })))
}

async fn market_context(state: &Arc<AppState>) -> Option<MarketSnapshot> {
    match state.snapshots.build(None, SnapshotDepth::Basic).await {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            tracing::warn!("chat market context unavailable: {}", e);
            None
        }
    }
}

fn required_symbol(raw: Option<&str>) -> Result<String, ApiError> {
    let symbol = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest("symbol parameter is required".to_string()))?;
    Ok(symbol.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_symbol_rejects_missing_and_blank() {
        assert!(required_symbol(None).is_err());
        assert!(required_symbol(Some("   ")).is_err());
        assert_eq!(required_symbol(Some(" nvda ")).expect("symbol"), "NVDA");
    }

    #[test]
    fn test_analysis_request_defaults_to_analysis_type() {
        let request: AnalysisRequest = serde_json::from_str(r#"{"symbol":"AAPL"}"#).expect("parses");
        assert_eq!(request.kind, "analysis");
        assert_eq!(request.symbol.as_deref(), Some("AAPL"));
    }

    #[test]
    fn test_chat_request_history_defaults_empty() {
        let request: ChatRequest =
            serde_json::from_str(r#"{"message":"how is the market?"}"#).expect("parses");
        assert!(request.history.is_empty());
    }
}
