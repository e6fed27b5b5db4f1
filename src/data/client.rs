use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::{DataError, DataResult};
use super::{validation, EconomicIndicators, Mover, NewsArticle, Quote};

/// Latest RSI reading
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rsi {
    pub value: f64,
    pub as_of: NaiveDate,
}

/// Latest MACD reading
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Macd {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
    pub as_of: NaiveDate,
}

/// Latest Bollinger-band levels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    pub as_of: NaiveDate,
}

/// Top gainers/losers/most-active lists from one movers call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movers {
    pub top_gainers: Vec<Mover>,
    pub top_losers: Vec<Mover>,
    pub most_actively_traded: Vec<Mover>,
}

/// Client for the market-data provider. One instance per process; each
/// method issues a single parameterized GET and reshapes the JSON body.
pub struct MarketDataClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl MarketDataClient {
    pub fn new(base_url: String, api_key: Option<String>, timeout_seconds: u64) -> DataResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_seconds))
            .user_agent(concat!("pulseboard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(DataError::Network)?;

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    fn api_key(&self) -> DataResult<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            DataError::Config("MARKET_DATA_API_KEY is required but not set".to_string())
        })
    }

    /// Issue one provider call and return the parsed JSON body, after
    /// screening transport errors and provider-level error/rate-limit notes.
    async fn get_json(&self, params: &[(&str, &str)]) -> DataResult<Value> {
        let api_key = self.api_key()?;

        let query: String = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let url = format!("{}?{}&apikey={}", self.base_url, query, api_key);

        tracing::debug!("market-data request: GET {}", url.replace(api_key, "***"));

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status_code = response.status().as_u16();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("market-data API failed ({}): {}", status_code, message);
            return Err(DataError::api_error(status_code, message));
        }

        let body: Value = response.json().await?;
        check_provider_note(&body)?;
        Ok(body)
    }

    /// Current quote for one symbol
    pub async fn fetch_quote(&self, symbol: &str) -> DataResult<Quote> {
        validation::validate_symbol(symbol)?;
        tracing::info!("Fetching quote for {}", symbol);

        let body = self
            .get_json(&[("function", "GLOBAL_QUOTE"), ("symbol", symbol)])
            .await?;

        // Unknown symbols come back as an empty Global Quote object
        let empty = body
            .get("Global Quote")
            .and_then(|v| v.as_object())
            .map(|o| o.is_empty())
            .unwrap_or(true);
        if empty {
            return Err(DataError::NoData {
                symbol: symbol.to_string(),
            });
        }
        parse_global_quote(&body)
    }

    /// Latest daily RSI(14)
    pub async fn fetch_rsi(&self, symbol: &str) -> DataResult<Rsi> {
        let body = self
            .get_json(&[
                ("function", "RSI"),
                ("symbol", symbol),
                ("interval", "daily"),
                ("time_period", "14"),
                ("series_type", "close"),
            ])
            .await?;
        parse_rsi(&body)
    }

    /// Latest daily MACD(12,26,9)
    pub async fn fetch_macd(&self, symbol: &str) -> DataResult<Macd> {
        let body = self
            .get_json(&[
                ("function", "MACD"),
                ("symbol", symbol),
                ("interval", "daily"),
                ("series_type", "close"),
            ])
            .await?;
        parse_macd(&body)
    }

    /// Latest daily Bollinger bands (20, 2σ)
    pub async fn fetch_bbands(&self, symbol: &str) -> DataResult<BollingerBands> {
        let body = self
            .get_json(&[
                ("function", "BBANDS"),
                ("symbol", symbol),
                ("interval", "daily"),
                ("time_period", "20"),
                ("series_type", "close"),
            ])
            .await?;
        parse_bbands(&body)
    }

    /// Market-wide top gainers / losers / most-active lists
    pub async fn fetch_movers(&self) -> DataResult<Movers> {
        tracing::info!("Fetching market movers");
        let body = self.get_json(&[("function", "TOP_GAINERS_LOSERS")]).await?;
        parse_movers(&body)
    }

    /// News with per-article sentiment, optionally filtered to one symbol
    pub async fn fetch_news(&self, symbol: Option<&str>) -> DataResult<Vec<NewsArticle>> {
        let mut params = vec![("function", "NEWS_SENTIMENT"), ("limit", "50")];
        if let Some(sym) = symbol {
            params.push(("tickers", sym));
        }
        let body = self.get_json(&params).await?;
        parse_news_feed(&body)
    }

    /// One macro series; returns the most recent value
    async fn fetch_series(&self, params: &[(&str, &str)]) -> DataResult<f64> {
        let body = self.get_json(params).await?;
        parse_latest_series_value(&body)
    }

    /// All four macro indicators. Individual series failures degrade to
    /// absent fields; the slice as a whole only fails when every series does.
    pub async fn fetch_economic_indicators(&self) -> DataResult<EconomicIndicators> {
        let (fed, treasury, cpi, unemployment) = tokio::join!(
            self.fetch_series(&[("function", "FEDERAL_FUNDS_RATE"), ("interval", "monthly")]),
            self.fetch_series(&[
                ("function", "TREASURY_YIELD"),
                ("interval", "daily"),
                ("maturity", "10year"),
            ]),
            self.fetch_series(&[("function", "CPI"), ("interval", "monthly")]),
            self.fetch_series(&[("function", "UNEMPLOYMENT")]),
        );

        let indicators = EconomicIndicators {
            fed_funds_rate: ok_or_warn(fed, "fed_funds_rate"),
            treasury_10y: ok_or_warn(treasury, "treasury_10y"),
            cpi: ok_or_warn(cpi, "cpi"),
            unemployment: ok_or_warn(unemployment, "unemployment"),
        };

        if indicators.is_empty() {
            return Err(DataError::parse_error("No economic indicator series available"));
        }
        Ok(indicators)
    }
}

fn ok_or_warn(result: DataResult<f64>, series: &str) -> Option<f64> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!("economic series {} unavailable: {}", series, e);
            None
        }
    }
}

/// Providers signal rate limiting and soft errors inside a 200 body.
pub fn check_provider_note(body: &Value) -> DataResult<()> {
    if let Some(note) = body.get("Note").and_then(|n| n.as_str()) {
        return Err(DataError::RateLimit(note.to_string()));
    }
    if let Some(info) = body.get("Information").and_then(|n| n.as_str()) {
        return Err(DataError::RateLimit(info.to_string()));
    }
    if let Some(err) = body.get("Error Message").and_then(|n| n.as_str()) {
        return Err(DataError::parse_error(err.to_string()));
    }
    Ok(())
}

/// Strip the provider's "%" suffix and parse the remainder
pub fn parse_percent(raw: &str) -> DataResult<f64> {
    raw.trim()
        .trim_end_matches('%')
        .parse::<f64>()
        .map_err(|_| DataError::parse_error(format!("Invalid percent value: {raw}")))
}

fn str_field<'a>(obj: &'a Value, key: &str) -> DataResult<&'a str> {
    obj.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| DataError::parse_error(format!("Missing field: {key}")))
}

fn num_field(obj: &Value, key: &str) -> DataResult<f64> {
    let raw = str_field(obj, key)?;
    raw.trim()
        .parse::<f64>()
        .map_err(|_| DataError::parse_error(format!("Invalid number in {key}: {raw}")))
}

pub fn parse_global_quote(body: &Value) -> DataResult<Quote> {
    let q = body
        .get("Global Quote")
        .filter(|v| v.as_object().map(|o| !o.is_empty()).unwrap_or(false))
        .ok_or_else(|| DataError::parse_error("Missing Global Quote object"))?;

    let symbol = str_field(q, "01. symbol")?.to_string();
    let as_of = str_field(q, "07. latest trading day")?
        .parse::<NaiveDate>()
        .map_err(|e| DataError::parse_error(format!("Invalid trading day: {e}")))?
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or_else(Utc::now);

    let quote = Quote {
        symbol,
        price: num_field(q, "05. price")?,
        open: num_field(q, "02. open")?,
        high: num_field(q, "03. high")?,
        low: num_field(q, "04. low")?,
        volume: num_field(q, "06. volume")? as i64,
        change: num_field(q, "09. change")?,
        change_percent: parse_percent(str_field(q, "10. change percent")?)?,
        as_of,
    };

    validation::validate_quote(&quote)?;
    Ok(quote)
}

/// Latest dated entry of a "Technical Analysis: X" map
fn latest_technical<'a>(body: &'a Value, key: &str) -> DataResult<(NaiveDate, &'a Value)> {
    let series = body
        .get(key)
        .and_then(|v| v.as_object())
        .ok_or_else(|| DataError::parse_error(format!("Missing {key} map")))?;

    let (date_str, entry) = series
        .iter()
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .ok_or_else(|| DataError::parse_error(format!("Empty {key} map")))?;

    let date = date_str
        .parse::<NaiveDate>()
        .map_err(|e| DataError::parse_error(format!("Invalid date in {key}: {e}")))?;
    Ok((date, entry))
}

pub fn parse_rsi(body: &Value) -> DataResult<Rsi> {
    let (as_of, entry) = latest_technical(body, "Technical Analysis: RSI")?;
    Ok(Rsi {
        value: num_field(entry, "RSI")?,
        as_of,
    })
}

pub fn parse_macd(body: &Value) -> DataResult<Macd> {
    let (as_of, entry) = latest_technical(body, "Technical Analysis: MACD")?;
    Ok(Macd {
        macd: num_field(entry, "MACD")?,
        signal: num_field(entry, "MACD_Signal")?,
        histogram: num_field(entry, "MACD_Hist")?,
        as_of,
    })
}

pub fn parse_bbands(body: &Value) -> DataResult<BollingerBands> {
    let (as_of, entry) = latest_technical(body, "Technical Analysis: BBANDS")?;
    Ok(BollingerBands {
        upper: num_field(entry, "Real Upper Band")?,
        middle: num_field(entry, "Real Middle Band")?,
        lower: num_field(entry, "Real Lower Band")?,
        as_of,
    })
}

fn parse_mover_list(body: &Value, key: &str) -> DataResult<Vec<Mover>> {
    let list = body
        .get(key)
        .and_then(|v| v.as_array())
        .ok_or_else(|| DataError::parse_error(format!("Missing {key} array")))?;

    let mut movers = Vec::with_capacity(list.len());
    for item in list {
        // Skip entries with unparseable numerics rather than failing the list
        let parsed = (|| -> DataResult<Mover> {
            Ok(Mover {
                ticker: str_field(item, "ticker")?.to_string(),
                price: str_field(item, "price")?
                    .parse()
                    .map_err(|_| DataError::parse_error("Invalid mover price"))?,
                change_amount: str_field(item, "change_amount")?
                    .parse()
                    .map_err(|_| DataError::parse_error("Invalid mover change"))?,
                change_percent: parse_percent(str_field(item, "change_percentage")?)?,
                volume: str_field(item, "volume")?
                    .parse()
                    .map_err(|_| DataError::parse_error("Invalid mover volume"))?,
                quote: None,
            })
        })();

        match parsed {
            Ok(m) => movers.push(m),
            Err(e) => tracing::warn!("Skipping malformed mover in {}: {}", key, e),
        }
    }
    Ok(movers)
}

pub fn parse_movers(body: &Value) -> DataResult<Movers> {
    Ok(Movers {
        top_gainers: parse_mover_list(body, "top_gainers")?,
        top_losers: parse_mover_list(body, "top_losers")?,
        most_actively_traded: parse_mover_list(body, "most_actively_traded")?,
    })
}

/// Provider news timestamps look like `20250829T123000`
fn parse_news_timestamp(raw: &str) -> DataResult<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%Y%m%dT%H%M%S")
        .map(|dt| dt.and_utc())
        .map_err(|_| DataError::parse_error(format!("Invalid news timestamp: {raw}")))
}

pub fn parse_news_feed(body: &Value) -> DataResult<Vec<NewsArticle>> {
    let feed = body
        .get("feed")
        .and_then(|v| v.as_array())
        .ok_or_else(|| DataError::parse_error("Missing news feed array"))?;

    let mut articles = Vec::with_capacity(feed.len());
    for item in feed {
        let parsed = (|| -> DataResult<NewsArticle> {
            Ok(NewsArticle {
                title: str_field(item, "title")?.to_string(),
                url: str_field(item, "url")?.to_string(),
                source: str_field(item, "source")?.to_string(),
                published_at: parse_news_timestamp(str_field(item, "time_published")?)?,
                sentiment: item
                    .get("overall_sentiment_score")
                    .and_then(|v| v.as_f64())
                    .ok_or_else(|| DataError::parse_error("Missing sentiment score"))?,
                summary: item.get("summary").and_then(|v| v.as_str()).map(String::from),
            })
        })();

        match parsed {
            Ok(a) => articles.push(a),
            Err(e) => tracing::warn!("Skipping malformed news article: {}", e),
        }
    }
    Ok(articles)
}

/// Most recent value out of an economic series response `{"data": [...]}`
pub fn parse_latest_series_value(body: &Value) -> DataResult<f64> {
    let data = body
        .get("data")
        .and_then(|v| v.as_array())
        .ok_or_else(|| DataError::parse_error("Missing data array in series response"))?;

    // Series arrive newest-first; skip the provider's "." placeholders
    for entry in data {
        if let Ok(raw) = str_field(entry, "value") {
            if let Ok(v) = raw.parse::<f64>() {
                return Ok(v);
            }
        }
    }

    Err(DataError::parse_error("No numeric value in series response"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_global_quote_strips_percent_suffix() {
        let body = json!({
            "Global Quote": {
                "01. symbol": "NVDA",
                "02. open": "120.50",
                "03. high": "125.10",
                "04. low": "119.80",
                "05. price": "124.33",
                "06. volume": "45210000",
                "07. latest trading day": "2025-06-02",
                "08. previous close": "121.00",
                "09. change": "3.33",
                "10. change percent": "2.7521%"
            }
        });

        let quote = parse_global_quote(&body).expect("quote parses");
        assert_eq!(quote.symbol, "NVDA");
        assert!((quote.change_percent - 2.7521).abs() < 1e-9);
        assert_eq!(quote.volume, 45_210_000);
    }

    #[test]
    fn test_parse_global_quote_rejects_empty_object() {
        // The provider returns an empty Global Quote for unknown symbols
        let body = json!({ "Global Quote": {} });
        assert!(parse_global_quote(&body).is_err());
    }

    #[test]
    fn test_provider_note_maps_to_rate_limit() {
        let body = json!({ "Note": "Thank you for using our API. Call frequency exceeded." });
        let err = check_provider_note(&body).expect_err("note is an error");
        assert!(err.is_rate_limit());
    }

    #[test]
    fn test_parse_movers_skips_malformed_entries() {
        let body = json!({
            "top_gainers": [
                {"ticker": "ABC", "price": "10.00", "change_amount": "1.20",
                 "change_percentage": "13.6%", "volume": "700000"},
                {"ticker": "BAD", "price": "not-a-number", "change_amount": "0",
                 "change_percentage": "0%", "volume": "0"}
            ],
            "top_losers": [],
            "most_actively_traded": []
        });

        let movers = parse_movers(&body).expect("movers parse");
        assert_eq!(movers.top_gainers.len(), 1);
        assert!((movers.top_gainers[0].change_percent - 13.6).abs() < 1e-9);
    }

    #[test]
    fn test_parse_rsi_takes_latest_date() {
        let body = json!({
            "Technical Analysis: RSI": {
                "2025-06-01": { "RSI": "48.1" },
                "2025-06-02": { "RSI": "55.3" }
            }
        });
        let rsi = parse_rsi(&body).expect("rsi parses");
        assert!((rsi.value - 55.3).abs() < 1e-9);
        assert_eq!(rsi.as_of.to_string(), "2025-06-02");
    }

    #[test]
    fn test_parse_series_skips_placeholders() {
        let body = json!({
            "data": [
                {"date": "2025-05-01", "value": "."},
                {"date": "2025-04-01", "value": "4.33"}
            ]
        });
        let v = parse_latest_series_value(&body).expect("series parses");
        assert!((v - 4.33).abs() < 1e-9);
    }

    #[test]
    fn test_parse_news_feed_timestamp() {
        let body = json!({
            "feed": [{
                "title": "Chipmaker rallies",
                "url": "https://example.com/a",
                "source": "Newswire",
                "time_published": "20250602T143000",
                "overall_sentiment_score": 0.31,
                "summary": "Strong quarter."
            }]
        });
        let articles = parse_news_feed(&body).expect("feed parses");
        assert_eq!(articles.len(), 1);
        assert!((articles[0].sentiment - 0.31).abs() < 1e-9);
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let client =
            MarketDataClient::new("https://example.com/query".to_string(), None, 5).expect("client");
        let err = client.api_key().expect_err("missing key");
        assert!(matches!(err, DataError::Config(_)));
    }
}
