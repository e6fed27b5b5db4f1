//! Snapshot aggregation: one pass fans out the upstream slice fetches,
//! merges whatever succeeded, and records a warning for whatever did not.
//!
//! A snapshot is exclusively owned by the request that built it. It is a
//! best-effort point-in-time read: slices carry no cross-slice consistency
//! guarantee and nothing here is cached or persisted.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::thresholds;

use super::client::{BollingerBands, Macd, MarketDataClient, Rsi};
use super::derived::{self, OptionsFlow, SocialSentiment, VolatilitySummary};
use super::errors::{DataError, DataResult};
use super::session::{self, DataSource, SessionState};
use super::{EconomicIndicators, Mover, NewsArticle, Quote, SentimentSummary};

/// Index proxies used for the futures and extended-hours slices
pub const INDEX_PROXIES: [&str; 4] = ["SPY", "QQQ", "DIA", "IWM"];

/// The eleven sector ETFs
pub const SECTOR_ETFS: [&str; 11] = [
    "XLK", "XLF", "XLV", "XLE", "XLY", "XLP", "XLI", "XLB", "XLRE", "XLU", "XLC",
];

/// Volatility-index proxy ETF
pub const VOLATILITY_PROXY: &str = "VIXY";

/// Crypto proxy ETF
pub const CRYPTO_PROXY: &str = "BITO";

/// How much of the slice battery one pass issues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotDepth {
    /// Quote, news, movers, volatility, crypto
    Basic,
    /// Adds technicals, sectors, economic indicators, futures, and the
    /// per-mover detail loop
    Comprehensive,
}

/// Merged result of one aggregation pass. Every slice is optional and a
/// missing slice is omitted from the serialized form entirely; presence of
/// a key means the value passed validation.
#[derive(Debug, Default, Serialize)]
pub struct MarketSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    pub session: SessionState,
    pub data_source: DataSource,
    pub generated_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<Quote>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsi: Option<Rsi>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macd: Option<Macd>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bollinger_bands: Option<BollingerBands>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub news: Option<Vec<NewsArticle>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<SentimentSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent_sentiment: Option<SentimentSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_gainers: Option<Vec<Mover>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_losers: Option<Vec<Mover>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub most_actively_traded: Option<Vec<Mover>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub futures: Option<BTreeMap<String, Quote>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extended_hours: Option<BTreeMap<String, Quote>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sectors: Option<BTreeMap<String, Quote>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub economic_indicators: Option<EconomicIndicators>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crypto: Option<Quote>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volatility: Option<VolatilitySummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options_flow: Option<OptionsFlow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub social_sentiment: Option<SocialSentiment>,

    /// One entry per degraded slice
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl MarketSnapshot {
    fn new(symbol: Option<&str>, session: SessionState) -> Self {
        Self {
            symbol: symbol.map(String::from),
            session,
            data_source: session.data_source(),
            generated_at: Utc::now(),
            ..Default::default()
        }
    }

    /// All movers currently present in the snapshot
    pub fn all_movers(&self) -> Vec<&Mover> {
        self.top_gainers
            .iter()
            .chain(self.top_losers.iter())
            .chain(self.most_actively_traded.iter())
            .flatten()
            .collect()
    }

    fn record<T>(&mut self, slice: &str, result: DataResult<T>) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(slice, "slice degraded: {}", e);
                self.warnings.push(format!("{slice}: {e}"));
                None
            }
        }
    }
}

/// Attach the synthetic heuristic fields. Separate from the fetch pass so
/// tests can drive it with a seeded RNG over a hand-built snapshot.
pub fn apply_heuristics<R: Rng>(snapshot: &mut MarketSnapshot, rng: &mut R) {
    let movers: Vec<Mover> = snapshot.all_movers().into_iter().cloned().collect();
    let strong = derived::strong_mover_count(&movers);

    snapshot.options_flow = Some(derived::options_flow(
        snapshot.volatility.as_ref(),
        strong,
        rng,
    ));
    snapshot.social_sentiment = Some(derived::social_sentiment(
        strong,
        snapshot.sentiment.as_ref().map(|s| s.score),
        rng,
    ));
}

/// Builds snapshots against one upstream client.
#[derive(Clone)]
pub struct SnapshotBuilder {
    client: Arc<MarketDataClient>,
}

impl SnapshotBuilder {
    pub fn new(client: Arc<MarketDataClient>) -> Self {
        Self { client }
    }

    /// One aggregation pass. When `symbol` is present its quote is the one
    /// hard dependency: its failure fails the pass (404/429 at the edge).
    /// Every other slice fails open: it is omitted and a warning recorded.
    /// With no symbol, only the market-wide slices populate.
    pub async fn build(
        &self,
        symbol: Option<&str>,
        depth: SnapshotDepth,
    ) -> DataResult<MarketSnapshot> {
        let session = session::classify(Utc::now());
        let mut snapshot = MarketSnapshot::new(symbol, session);
        let comprehensive = depth == SnapshotDepth::Comprehensive;

        tracing::info!(
            symbol = symbol.unwrap_or("<market>"),
            session = session.as_str(),
            comprehensive,
            "building snapshot"
        );

        // The whole battery is issued together; slices share no data
        // dependency and completion order does not matter.
        let quote_fut = maybe(symbol, |s| self.client.fetch_quote(s));
        let rsi_fut = maybe(symbol.filter(|_| comprehensive), |s| self.client.fetch_rsi(s));
        let macd_fut = maybe(symbol.filter(|_| comprehensive), |s| self.client.fetch_macd(s));
        let bbands_fut = maybe(symbol.filter(|_| comprehensive), |s| {
            self.client.fetch_bbands(s)
        });
        let news_fut = self.client.fetch_news(symbol);
        let movers_fut = self.client.fetch_movers();
        let volatility_fut = self.client.fetch_quote(VOLATILITY_PROXY);
        let crypto_fut = self.client.fetch_quote(CRYPTO_PROXY);
        let futures_fut = opt(comprehensive, self.quote_batch(&INDEX_PROXIES));
        let sectors_fut = opt(comprehensive, self.quote_batch(&SECTOR_ETFS));
        let econ_fut = opt(comprehensive, self.client.fetch_economic_indicators());
        let extended_fut = opt(session.is_extended_hours(), self.quote_batch(&INDEX_PROXIES));

        let (quote, rsi, macd, bbands, news, movers, volatility, crypto, futures, sectors, econ, extended) = tokio::join!(
            quote_fut,
            rsi_fut,
            macd_fut,
            bbands_fut,
            news_fut,
            movers_fut,
            volatility_fut,
            crypto_fut,
            futures_fut,
            sectors_fut,
            econ_fut,
            extended_fut,
        );

        // Required quote failure propagates; the caller maps it to a status.
        if let Some(result) = quote {
            snapshot.quote = Some(result?);
        }

        snapshot.rsi = rsi.and_then(|r| snapshot.record("rsi", r));
        snapshot.macd = macd.and_then(|r| snapshot.record("macd", r));
        snapshot.bollinger_bands = bbands.and_then(|r| snapshot.record("bollinger_bands", r));

        if let Some(articles) = snapshot.record("news", news) {
            if let Some((all, recent)) =
                derived::summarize_sentiment(&articles, snapshot.generated_at)
            {
                snapshot.sentiment = Some(all);
                snapshot.recent_sentiment = Some(recent);
            }
            snapshot.news = Some(articles);
        }

        if let Some(movers) = snapshot.record("movers", movers) {
            snapshot.top_gainers = Some(movers.top_gainers);
            snapshot.top_losers = Some(movers.top_losers);
            snapshot.most_actively_traded = Some(movers.most_actively_traded);
        }

        snapshot.volatility = snapshot
            .record("volatility", volatility)
            .map(|q| derived::classify_volatility(&q));
        snapshot.crypto = snapshot.record("crypto", crypto);

        if let Some(result) = futures {
            snapshot.futures = snapshot.record("futures", result);
        }
        if let Some(result) = sectors {
            snapshot.sectors = snapshot.record("sectors", result);
        }
        if let Some(result) = econ {
            snapshot.economic_indicators = snapshot.record("economic_indicators", result);
        }
        if let Some(result) = extended {
            snapshot.extended_hours = snapshot.record("extended_hours", result);
        }

        if comprehensive {
            self.enrich_movers(&mut snapshot).await;
        }

        tracing::info!(
            warnings = snapshot.warnings.len(),
            "snapshot assembled"
        );
        Ok(snapshot)
    }

    /// Fetch quotes for a fixed symbol set concurrently. Individual symbol
    /// failures drop that symbol; the batch fails only when all do.
    async fn quote_batch(&self, symbols: &[&str]) -> DataResult<BTreeMap<String, Quote>> {
        let mut handles = Vec::with_capacity(symbols.len());
        for &sym in symbols {
            let client = Arc::clone(&self.client);
            let sym = sym.to_string();
            handles.push(tokio::spawn(async move {
                let result = client.fetch_quote(&sym).await;
                (sym, result)
            }));
        }

        let mut quotes = BTreeMap::new();
        for handle in handles {
            match handle.await {
                Ok((sym, Ok(quote))) => {
                    quotes.insert(sym, quote);
                }
                Ok((sym, Err(e))) => tracing::warn!("batch quote {} failed: {}", sym, e),
                Err(e) => tracing::warn!("batch quote task failed: {}", e),
            }
        }

        if quotes.is_empty() {
            return Err(DataError::parse_error("No quotes in batch"));
        }
        Ok(quotes)
    }

    /// Detail quotes for the top movers. Deliberately sequential with a
    /// fixed inter-call delay: the upstream enforces a request-rate ceiling
    /// and this loop is the one place we would otherwise burst past it.
    async fn enrich_movers(&self, snapshot: &mut MarketSnapshot) {
        let Some(gainers) = snapshot.top_gainers.as_mut() else {
            return;
        };

        for (i, mover) in gainers
            .iter_mut()
            .take(thresholds::MOVER_DETAIL_LIMIT)
            .enumerate()
        {
            if i > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(
                    thresholds::MOVER_DETAIL_DELAY_MS,
                ))
                .await;
            }
            match self.client.fetch_quote(&mover.ticker).await {
                Ok(quote) => mover.quote = Some(quote),
                Err(e) => tracing::warn!("mover detail for {} failed: {}", mover.ticker, e),
            }
        }
    }
}

/// Run the future only when a symbol is present
async fn maybe<'a, F, Fut, T>(symbol: Option<&'a str>, f: F) -> Option<DataResult<T>>
where
    F: FnOnce(&'a str) -> Fut,
    Fut: std::future::Future<Output = DataResult<T>>,
{
    match symbol {
        Some(s) => Some(f(s).await),
        None => None,
    }
}

/// Run the future only when the flag holds
async fn opt<Fut, T>(enabled: bool, fut: Fut) -> Option<DataResult<T>>
where
    Fut: std::future::Future<Output = DataResult<T>>,
{
    if enabled {
        Some(fut.await)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn quote(symbol: &str, price: f64) -> Quote {
        Quote {
            symbol: symbol.to_string(),
            price,
            open: price,
            high: price,
            low: price,
            volume: 1_000_000,
            change: 0.2,
            change_percent: 0.1,
            as_of: Utc::now(),
        }
    }

    #[test]
    fn test_failed_slice_is_omitted_not_null() {
        let mut snapshot = MarketSnapshot::new(Some("SPY"), SessionState::MarketOpen);
        snapshot.quote = Some(quote("SPY", 450.0));
        let degraded: Option<()> = snapshot.record("movers", Err(DataError::parse_error("boom")));
        assert!(degraded.is_none());

        let json = serde_json::to_value(&snapshot).expect("serializes");
        assert!(json.get("quote").is_some());
        assert!(json.get("top_gainers").is_none());
        assert!(json.get("top_losers").is_none());
        // The degradation is visible as a warning, not a null slice
        assert_eq!(snapshot.warnings.len(), 1);
        assert!(snapshot.warnings[0].starts_with("movers:"));
    }

    #[test]
    fn test_heuristics_fill_synthetic_slices() {
        let mut snapshot = MarketSnapshot::new(None, SessionState::MarketOpen);
        snapshot.volatility = Some(derived::classify_volatility(&quote("VIXY", 22.0)));

        let mut rng = StdRng::seed_from_u64(42);
        apply_heuristics(&mut snapshot, &mut rng);

        assert!(snapshot.options_flow.is_some());
        assert!(snapshot.social_sentiment.is_some());
    }

    #[test]
    fn test_all_movers_chains_every_list() {
        let mover = |t: &str| Mover {
            ticker: t.to_string(),
            price: 10.0,
            change_amount: 1.0,
            change_percent: 11.0,
            volume: 600_000,
            quote: None,
        };
        let mut snapshot = MarketSnapshot::new(None, SessionState::MarketOpen);
        snapshot.top_gainers = Some(vec![mover("A")]);
        snapshot.top_losers = Some(vec![mover("B")]);
        snapshot.most_actively_traded = Some(vec![mover("C")]);
        assert_eq!(snapshot.all_movers().len(), 3);
    }
}
