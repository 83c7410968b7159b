use crate::config::AiConfig;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// How many ranked photos feed the aggregate analysis.
const ANALYSIS_DEPTH: usize = 4;
const MAX_OVERALL_KEYWORDS: usize = 5;

#[derive(Debug, Error)]
pub enum InsightError {
    #[error("insight generation disabled: no API key configured")]
    Disabled,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoAnalysis {
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub emotion: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightStory {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub detail: String,
}

/// Descriptive commentary over a completed tournament, cached on the
/// tournament row after first generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightReport {
    pub overall_keywords: Vec<String>,
    pub primary_emotion: String,
    pub insight_story: InsightStory,
    pub winner_analysis: PhotoAnalysis,
}

/// A photo handed to the generator, already ordered by final rank.
#[derive(Debug, Clone)]
pub struct RankedPhotoRef {
    pub rank: i32,
    pub file_path: String,
}

#[async_trait]
pub trait InsightGenerator: Send + Sync {
    async fn generate(&self, photos: &[RankedPhotoRef]) -> Result<InsightReport, InsightError>;
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 10000,
            backoff_multiplier: 2.0,
        }
    }
}

/// Vision-model insight generator backed by the OpenAI chat completions API.
pub struct OpenAiInsightGenerator {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    retry_config: RetryConfig,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

impl OpenAiInsightGenerator {
    pub fn new(config: &AiConfig) -> Self {
        Self::with_retry_config(config, RetryConfig::default())
    }

    pub fn with_retry_config(config: &AiConfig, retry_config: RetryConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            retry_config,
        }
    }

    async fn analyze_photo(&self, file_path: &str) -> Result<PhotoAnalysis, InsightError> {
        let bytes = tokio::fs::read(file_path).await?;
        let encoded = BASE64.encode(&bytes);

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": 300,
            "messages": [{
                "role": "user",
                "content": [
                    {
                        "type": "text",
                        "text": "Analyze this photo and answer in JSON only, with \
                                 keys: keywords (3 short keywords), emotion (one of \
                                 happy/peaceful/excited/nostalgic), description (one \
                                 sentence, at most 20 words)."
                    },
                    {
                        "type": "image_url",
                        "image_url": { "url": format!("data:image/jpeg;base64,{encoded}") }
                    }
                ]
            }]
        });

        let content = self.chat_with_retry(&body).await?;
        parse_json_content::<PhotoAnalysis>(&content)
    }

    async fn compose_story(
        &self,
        overall_keywords: &[String],
        primary_emotion: &str,
        winner: &PhotoAnalysis,
    ) -> Result<InsightStory, InsightError> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": 300,
            "messages": [{
                "role": "user",
                "content": format!(
                    "A user ranked their favorite photos in a tournament. The set's \
                     keywords are [{}], the dominant emotion is \"{}\" and the winning \
                     photo is described as \"{}\". Write a warm, personal insight about \
                     what this says about the user's year. Answer in JSON only, with \
                     keys: summary (one short sentence) and detail (two sentences).",
                    overall_keywords.join(", "),
                    primary_emotion,
                    winner.description
                )
            }]
        });

        let content = self.chat_with_retry(&body).await?;
        parse_json_content::<InsightStory>(&content)
    }

    async fn chat_with_retry(&self, body: &serde_json::Value) -> Result<String, InsightError> {
        let mut delay = self.retry_config.initial_delay_ms;
        let mut attempt = 0;
        loop {
            match self.chat(body).await {
                Ok(content) => return Ok(content),
                Err(err) => {
                    if attempt >= self.retry_config.max_retries {
                        return Err(err);
                    }
                    attempt += 1;
                    warn!(
                        attempt,
                        delay_ms = delay,
                        error = %err,
                        "Insight request failed, backing off"
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    delay = ((delay as f64) * self.retry_config.backoff_multiplier) as u64;
                    delay = delay.min(self.retry_config.max_delay_ms);
                }
            }
        }
    }

    async fn chat(&self, body: &serde_json::Value) -> Result<String, InsightError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(InsightError::InvalidResponse(format!(
                "upstream returned status {}",
                response.status()
            )));
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| InsightError::InvalidResponse("no choices in response".to_string()))
    }
}

#[async_trait]
impl InsightGenerator for OpenAiInsightGenerator {
    async fn generate(&self, photos: &[RankedPhotoRef]) -> Result<InsightReport, InsightError> {
        if self.api_key.is_empty() {
            return Err(InsightError::Disabled);
        }
        if photos.is_empty() {
            return Err(InsightError::InvalidResponse(
                "no photos to analyze".to_string(),
            ));
        }

        let mut analyses = Vec::new();
        for photo in photos.iter().take(ANALYSIS_DEPTH) {
            debug!(rank = photo.rank, path = %photo.file_path, "Analyzing photo");
            analyses.push(self.analyze_photo(&photo.file_path).await?);
        }

        let overall_keywords = aggregate_keywords(&analyses);
        let primary_emotion = dominant_emotion(&analyses);
        let winner_analysis = analyses[0].clone();
        let insight_story = self
            .compose_story(&overall_keywords, &primary_emotion, &winner_analysis)
            .await?;

        Ok(InsightReport {
            overall_keywords,
            primary_emotion,
            insight_story,
            winner_analysis,
        })
    }
}

/// Models often wrap JSON answers in markdown fences despite instructions.
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn parse_json_content<T: serde::de::DeserializeOwned>(content: &str) -> Result<T, InsightError> {
    serde_json::from_str(strip_code_fences(content))
        .map_err(|e| InsightError::InvalidResponse(format!("malformed JSON answer: {e}")))
}

/// Keywords across the analyzed set, most frequent first; ties keep the
/// order they were first seen in.
fn aggregate_keywords(analyses: &[PhotoAnalysis]) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for analysis in analyses {
        for keyword in &analysis.keywords {
            let entry = counts.entry(keyword.as_str()).or_insert(0);
            if *entry == 0 {
                order.push(keyword.as_str());
            }
            *entry += 1;
        }
    }
    order.sort_by_key(|k| std::cmp::Reverse(counts[k]));
    order
        .into_iter()
        .take(MAX_OVERALL_KEYWORDS)
        .map(str::to_string)
        .collect()
}

fn dominant_emotion(analyses: &[PhotoAnalysis]) -> String {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for analysis in analyses {
        if analysis.emotion.is_empty() {
            continue;
        }
        let entry = counts.entry(analysis.emotion.as_str()).or_insert(0);
        if *entry == 0 {
            order.push(analysis.emotion.as_str());
        }
        *entry += 1;
    }
    order.sort_by_key(|e| std::cmp::Reverse(counts[e]));
    order
        .first()
        .map(|e| e.to_string())
        .unwrap_or_else(|| "peaceful".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis(keywords: &[&str], emotion: &str) -> PhotoAnalysis {
        PhotoAnalysis {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            emotion: emotion.to_string(),
            description: String::new(),
        }
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn test_parse_photo_analysis() {
        let parsed: PhotoAnalysis = parse_json_content(
            "```json\n{\"keywords\":[\"sea\",\"sunset\"],\"emotion\":\"peaceful\",\
             \"description\":\"A beach at dusk\"}\n```",
        )
        .unwrap();
        assert_eq!(parsed.keywords, vec!["sea", "sunset"]);
        assert_eq!(parsed.emotion, "peaceful");

        // Missing fields fall back to defaults instead of failing.
        let sparse: PhotoAnalysis = parse_json_content("{\"emotion\":\"happy\"}").unwrap();
        assert!(sparse.keywords.is_empty());

        assert!(parse_json_content::<PhotoAnalysis>("not json at all").is_err());
    }

    #[test]
    fn test_aggregate_keywords_by_frequency() {
        let analyses = vec![
            analysis(&["sea", "friends"], "happy"),
            analysis(&["sea", "food"], "happy"),
            analysis(&["sea", "friends"], "peaceful"),
        ];
        let keywords = aggregate_keywords(&analyses);
        assert_eq!(keywords[0], "sea");
        assert_eq!(keywords[1], "friends");
        assert_eq!(keywords[2], "food");
    }

    #[test]
    fn test_aggregate_keywords_capped() {
        let analyses = vec![
            analysis(&["a", "b", "c"], "happy"),
            analysis(&["d", "e", "f"], "happy"),
        ];
        assert_eq!(aggregate_keywords(&analyses).len(), MAX_OVERALL_KEYWORDS);
    }

    #[test]
    fn test_dominant_emotion() {
        let analyses = vec![
            analysis(&[], "happy"),
            analysis(&[], "nostalgic"),
            analysis(&[], "nostalgic"),
        ];
        assert_eq!(dominant_emotion(&analyses), "nostalgic");
        assert_eq!(dominant_emotion(&[]), "peaceful");
    }
}
