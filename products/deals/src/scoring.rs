//! AI scoring of deals through the Anthropic Messages API.
//!
//! The model is asked for a single JSON object. [`parse_score_response`] is
//! lenient about what actually comes back: fenced blocks, chatter around the
//! object and missing sections are all tolerated, and a response that is not
//! JSON at all still yields an analysis with a best-effort score.

use std::{sync::OnceLock, time::Duration};

use entity::{PriceType, deal};
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, instrument, warn};

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
pub const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
pub const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 8192;
const FALLBACK_SCORE: u8 = 50;
const RAW_EXCERPT_CHARS: usize = 1000;

const SYSTEM_PROMPT: &str = r#"You are a senior commodity trading advisor covering metals, agricultural products, energy and digital assets.

Assess the deal you are given and answer with exactly one JSON object and nothing else:

{
  "score": <integer 0-100>,
  "executive_summary": "<overall assessment and recommendation>",
  "market_analysis": "<market conditions, trends, supply and demand>",
  "origin_analysis": "<country factors, licences, export rules>",
  "buyer_profile": "<who buys this and why>",
  "price_analysis": "<comparison with LME/COMEX/spot benchmarks>",
  "payment_logistics": "<payment instrument and Incoterms assessment>",
  "red_flags": ["<concern>", ...],
  "unusual_patterns": ["<pattern>", ...],
  "strengths": ["<strength>", ...],
  "next_steps": ["<verification step>", ...],
  "recommendation": "<one paragraph>",
  "risk_level": "low" | "medium" | "high",
  "reasoning": ["POSITIVE: ...", "CONCERN: ...", "INFO: ..."]
}

Scoring weights:
- Source reliability 25%: rating 8-10 earns 20-25 points, 5-7 earns 12-19, 0-4 earns 0-11.
- Price competitiveness 25%: market-aligned pricing scores well; more than 18% below market is a red flag.
- Payment terms 20%: DLC/LC 15-20, SBLC 12-18, BCL 10-15, wire transfer 5-10.
- Compliance 15%: required licences present earn full points.
- Logistics 10%: clear Incoterms and sensible routes earn full points.
- Completeness 5%.

Subtract 20-30 points for each critical red flag: prices 20% or more below market without explanation, sanctioned banks or countries, missing licences, unexplained urgency, unverifiable supplier details."#;

/// Overall risk band reported by the model. Unknown values read as `Medium`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum RiskLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl From<String> for RiskLevel {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => RiskLevel::Low,
            "high" => RiskLevel::High,
            _ => RiskLevel::Medium,
        }
    }
}

/// Structured analysis stored in `deals.ai_analysis`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DealAnalysis {
    pub score: u8,
    #[serde(default = "pending::summary")]
    pub executive_summary: String,
    #[serde(default = "pending::market")]
    pub market_analysis: String,
    #[serde(default = "pending::origin")]
    pub origin_analysis: String,
    #[serde(default = "pending::buyer")]
    pub buyer_profile: String,
    #[serde(default = "pending::price")]
    pub price_analysis: String,
    #[serde(default = "pending::payment")]
    pub payment_logistics: String,
    #[serde(default)]
    pub red_flags: Vec<String>,
    #[serde(default)]
    pub unusual_patterns: Vec<String>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub next_steps: Vec<String>,
    #[serde(default = "pending::recommendation")]
    pub recommendation: String,
    #[serde(default)]
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub reasoning: Vec<String>,
}

mod pending {
    pub fn summary() -> String {
        "Analysis in progress...".into()
    }
    pub fn market() -> String {
        "Market data being analyzed...".into()
    }
    pub fn origin() -> String {
        "Origin analysis pending...".into()
    }
    pub fn buyer() -> String {
        "Buyer analysis pending...".into()
    }
    pub fn price() -> String {
        "Price analysis pending...".into()
    }
    pub fn payment() -> String {
        "Payment analysis pending...".into()
    }
    pub fn recommendation() -> String {
        "Review detailed analysis".into()
    }
}

impl DealAnalysis {
    /// Placeholder analysis for a response that could not be read.
    fn unreadable(score: u8, raw: &str, failure: String) -> Self {
        let excerpt: String = raw.chars().take(RAW_EXCERPT_CHARS).collect();
        let see_summary = "See executive summary for the raw response".to_string();
        Self {
            score,
            executive_summary: format!("Could not parse the scoring response. Raw response:\n\n{excerpt}"),
            market_analysis: see_summary.clone(),
            origin_analysis: see_summary.clone(),
            buyer_profile: see_summary.clone(),
            price_analysis: see_summary.clone(),
            payment_logistics: see_summary,
            red_flags: vec![failure],
            unusual_patterns: Vec::new(),
            strengths: Vec::new(),
            next_steps: vec!["Re-run the analysis".into()],
            recommendation: "Re-run the analysis".into(),
            risk_level: RiskLevel::Medium,
            reasoning: vec!["Scoring response was not valid JSON".into()],
        }
    }
}

/// Render the user prompt for a deal.
pub fn build_prompt(deal: &deal::Model) -> String {
    let price = match (deal.price_type, deal.price) {
        (PriceType::LmeDiscount, _) => format!(
            "LME discount pricing - gross: {}%, commission: {}%, net: {}%",
            display_opt(deal.gross_discount),
            display_opt(deal.commission),
            display_opt(deal.net_discount),
        ),
        (PriceType::FixedPrice, Some(price)) => format!(
            "{price} {}",
            deal.price_currency.as_deref().unwrap_or("USD")
        ),
        (PriceType::FixedPrice, None) => "Not specified".to_string(),
    };
    let reliability = deal
        .source_reliability
        .map(|rating| rating.to_string())
        .unwrap_or_else(|| "N/A".into());
    let quantity = match deal.quantity {
        Some(quantity) => format!(
            "{quantity} {}",
            deal.quantity_unit.as_deref().unwrap_or_default()
        )
        .trim_end()
        .to_string(),
        None => "Not specified".to_string(),
    };

    format!(
        "Analyze this commodity trading deal.\n\n\
         DEAL DETAILS\n\
         Commodity: {commodity}\n\
         Source: {source} (reliability: {reliability}/10)\n\
         Price: {price}\n\
         Quantity: {quantity}\n\
         Origin: {origin}\n\
         Payment method: {payment}\n\
         Shipping terms: {shipping}\n\n\
         RAW DEAL TEXT\n{text}\n\n\
         ADDITIONAL NOTES\n{notes}\n\n\
         Score the deal from 0 to 100 and return the JSON object described in the system prompt.",
        commodity = deal.commodity_type,
        source = deal.source_name,
        origin = deal.origin_country.as_deref().unwrap_or("Not specified"),
        payment = deal.payment_method.as_deref().unwrap_or("Not specified"),
        shipping = deal.shipping_terms.as_deref().unwrap_or("Not specified"),
        text = deal
            .deal_text
            .as_deref()
            .unwrap_or("No additional details provided"),
        notes = deal.additional_notes.as_deref().unwrap_or("None"),
    )
}

fn display_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| v.to_string())
}

/// Turn a model reply into an analysis. Never fails: unreadable replies
/// produce a placeholder analysis describing the failure.
pub fn parse_score_response(text: &str) -> DealAnalysis {
    let cleaned = strip_fences(text);
    let candidate = outermost_object(cleaned).unwrap_or(cleaned);

    let mut value = match serde_json::from_str::<Value>(candidate) {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "scoring response is not valid JSON");
            let score = fallback_score(text);
            return DealAnalysis::unreadable(score, text, format!("JSON parsing failed: {err}"));
        }
    };

    let Some(score) = value.get("score").and_then(read_score) else {
        warn!("scoring response has no usable score");
        return DealAnalysis::unreadable(
            FALLBACK_SCORE,
            text,
            "Response missing 'score' field".into(),
        );
    };
    if let Some(object) = value.as_object_mut() {
        object.insert("score".into(), json!(score));
    }

    match serde_json::from_value::<DealAnalysis>(value) {
        Ok(analysis) => {
            debug!(score, "parsed scoring response");
            analysis
        }
        Err(err) => {
            warn!(error = %err, "scoring response has unexpected shape");
            DealAnalysis::unreadable(score, text, err.to_string())
        }
    }
}

fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn read_score(value: &Value) -> Option<u8> {
    let raw = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if raw.is_nan() {
        return None;
    }
    Some(raw.trunc().clamp(0.0, 100.0) as u8)
}

fn fallback_score(text: &str) -> u8 {
    static SCORE: OnceLock<Option<Regex>> = OnceLock::new();
    SCORE
        .get_or_init(|| Regex::new(r#""score"\s*:\s*(\d+)"#).ok())
        .as_ref()
        .and_then(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .map(|score| score.min(100) as u8)
        .unwrap_or(FALLBACK_SCORE)
}

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("ANTHROPIC_API_KEY is not configured")]
    MissingApiKey,
    #[error("scoring request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("scoring API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("scoring API returned no text content")]
    EmptyResponse,
}

#[derive(Clone, Debug)]
pub struct ScorerConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(120),
        }
    }
}

impl ScorerConfig {
    /// Reads `ANTHROPIC_API_KEY` and `SCORER_MODEL`.
    pub fn from_env() -> Self {
        let non_blank = |key: &str| {
            std::env::var(key)
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        Self {
            api_key: non_blank("ANTHROPIC_API_KEY"),
            model: non_blank("SCORER_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Clone, Debug)]
pub struct AnthropicScorer {
    client: Client,
    api_key: String,
    config: ScorerConfig,
}

impl AnthropicScorer {
    pub fn new(config: ScorerConfig) -> Result<Self, ScoringError> {
        let api_key = config.api_key.clone().ok_or(ScoringError::MissingApiKey)?;
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    #[instrument(skip(self, deal), fields(deal_id = deal.id, model = %self.config.model))]
    pub async fn score_deal(&self, deal: &deal::Model) -> Result<DealAnalysis, ScoringError> {
        let body = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "system": SYSTEM_PROMPT,
            "messages": [{ "role": "user", "content": build_prompt(deal) }],
        });
        let response = self
            .client
            .post(&self.config.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScoringError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let payload: MessagesResponse = response.json().await?;
        let text = payload
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .find_map(|block| block.text)
            .ok_or(ScoringError::EmptyResponse)?;
        Ok(parse_score_response(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entity::DealStatus;
    use sea_orm::prelude::{Date, DateTime};

    fn sample_deal() -> deal::Model {
        let date = Date::from_ymd_opt(2025, 10, 20).unwrap();
        let stamp: DateTime = date.and_hms_opt(9, 0, 0).unwrap();
        deal::Model {
            id: 7,
            commodity_type: "Gold".into(),
            source_name: "John Mensah".into(),
            source_reliability: Some(7),
            deal_text: Some("50kg dore bars, Accra".into()),
            price: None,
            price_currency: Some("USD".into()),
            price_type: PriceType::LmeDiscount,
            gross_discount: Some(12.0),
            commission: Some(2.0),
            net_discount: Some(10.0),
            quantity: Some(50.0),
            quantity_unit: Some("kg".into()),
            origin_country: Some("Ghana".into()),
            payment_method: Some("DLC".into()),
            shipping_terms: None,
            additional_notes: None,
            date_received: date,
            status: DealStatus::Unassigned,
            ai_score: None,
            ai_reasoning: None,
            ai_analysis: None,
            manual_score: None,
            file_path: None,
            created_at: stamp,
            updated_at: stamp,
        }
    }

    #[test]
    fn prompt_renders_lme_pricing_and_gaps() {
        let prompt = build_prompt(&sample_deal());
        assert!(prompt.contains("gross: 12%, commission: 2%, net: 10%"));
        assert!(prompt.contains("Source: John Mensah (reliability: 7/10)"));
        assert!(prompt.contains("Quantity: 50 kg"));
        assert!(prompt.contains("Shipping terms: Not specified"));
    }

    #[test]
    fn prompt_renders_fixed_price() {
        let mut deal = sample_deal();
        deal.price_type = PriceType::FixedPrice;
        deal.price = Some(1850.5);
        deal.price_currency = Some("EUR".into());
        assert!(build_prompt(&deal).contains("Price: 1850.5 EUR"));
        deal.price = None;
        assert!(build_prompt(&deal).contains("Price: Not specified"));
    }

    #[test]
    fn fenced_response_is_parsed_with_defaults() {
        let reply = "```json\n{\"score\": 82, \"risk_level\": \"LOW\", \"reasoning\": [\"POSITIVE: DLC\"]}\n```";
        let analysis = parse_score_response(reply);
        assert_eq!(analysis.score, 82);
        assert_eq!(analysis.risk_level, RiskLevel::Low);
        assert_eq!(analysis.reasoning, vec!["POSITIVE: DLC".to_string()]);
        assert_eq!(analysis.recommendation, "Review detailed analysis");
        assert!(analysis.red_flags.is_empty());
    }

    #[test]
    fn chatter_around_object_is_ignored_and_score_clamped() {
        let analysis = parse_score_response("Here you go: {\"score\": \"140\"} hope it helps");
        assert_eq!(analysis.score, 100);
        assert_eq!(parse_score_response("{\"score\": -3}").score, 0);
    }

    #[test]
    fn unknown_risk_level_reads_as_medium() {
        let analysis = parse_score_response("{\"score\": 40, \"risk_level\": \"extreme\"}");
        assert_eq!(analysis.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn malformed_json_falls_back_to_score_pattern() {
        let analysis = parse_score_response("{\"score\": 64, \"market_analysis\": \"truncated");
        assert_eq!(analysis.score, 64);
        assert!(analysis.red_flags[0].starts_with("JSON parsing failed"));

        let analysis = parse_score_response("I cannot score this deal.");
        assert_eq!(analysis.score, 50);
    }

    #[test]
    fn missing_score_uses_default() {
        let analysis = parse_score_response("{\"recommendation\": \"walk away\"}");
        assert_eq!(analysis.score, 50);
        assert_eq!(analysis.red_flags, vec!["Response missing 'score' field".to_string()]);
    }

    #[test]
    fn scorer_requires_api_key() {
        let err = AnthropicScorer::new(ScorerConfig::default()).unwrap_err();
        assert!(matches!(err, ScoringError::MissingApiKey));
    }
}
