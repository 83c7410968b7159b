use crate::service::insight_service::InsightReport;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const WATERMARK: &str = "Made with PhotoCup";
const MAX_RANK_CARDS: usize = 3;
const COVER_KEYWORDS: usize = 3;
const COVER_LINE_LEN: usize = 40;

#[derive(Debug, Error)]
pub enum CardError {
    #[error("card rendering failed: {0}")]
    Render(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardKind {
    Cover,
    Rank,
}

/// One shareable card. The frontend lays these out; the backend only decides
/// what goes on them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardDocument {
    pub kind: CardKind,
    pub title: String,
    pub lines: Vec<String>,
    pub keywords: Vec<String>,
    pub rank: Option<i32>,
    pub photo_url: Option<String>,
    pub watermark: Option<String>,
    pub generated_on: String,
}

/// A ranked photo as the renderer sees it.
#[derive(Debug, Clone)]
pub struct RankedCardPhoto {
    pub rank: i32,
    pub photo_url: String,
    pub keywords: Vec<String>,
}

#[async_trait]
pub trait CardRenderer: Send + Sync {
    async fn render(
        &self,
        report: &InsightReport,
        rankings: &[RankedCardPhoto],
        premium: bool,
    ) -> Result<Vec<CardDocument>, CardError>;
}

/// Renders cards as structured documents: a cover with the insight story,
/// then one card per top-ranked photo. Free-tier cards carry a watermark.
#[derive(Debug, Clone, Default)]
pub struct DocumentCardRenderer;

impl DocumentCardRenderer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CardRenderer for DocumentCardRenderer {
    async fn render(
        &self,
        report: &InsightReport,
        rankings: &[RankedCardPhoto],
        premium: bool,
    ) -> Result<Vec<CardDocument>, CardError> {
        let generated_on = Utc::now().format("%Y.%m.%d").to_string();
        let watermark = (!premium).then(|| WATERMARK.to_string());

        let mut lines = wrap_text(&report.insight_story.summary, COVER_LINE_LEN / 2);
        lines.truncate(2);
        let mut detail_lines = wrap_text(&report.insight_story.detail, COVER_LINE_LEN);
        detail_lines.truncate(2);
        lines.extend(detail_lines);

        let mut cards = vec![CardDocument {
            kind: CardKind::Cover,
            title: format!("My Top {}", rankings.len()),
            lines,
            keywords: report
                .overall_keywords
                .iter()
                .take(COVER_KEYWORDS)
                .cloned()
                .collect(),
            rank: None,
            photo_url: None,
            watermark: watermark.clone(),
            generated_on: generated_on.clone(),
        }];

        for photo in rankings.iter().take(MAX_RANK_CARDS) {
            cards.push(CardDocument {
                kind: CardKind::Rank,
                title: format!("Rank {}", photo.rank),
                lines: Vec::new(),
                keywords: photo.keywords.iter().take(COVER_KEYWORDS).cloned().collect(),
                rank: Some(photo.rank),
                photo_url: Some(photo.photo_url.clone()),
                watermark: watermark.clone(),
                generated_on: generated_on.clone(),
            });
        }

        Ok(cards)
    }
}

fn wrap_text(text: &str, max_length: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + word.chars().count() + 1 > max_length {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::insight_service::{InsightStory, PhotoAnalysis};

    fn report() -> InsightReport {
        InsightReport {
            overall_keywords: vec![
                "sea".to_string(),
                "friends".to_string(),
                "food".to_string(),
                "sunset".to_string(),
            ],
            primary_emotion: "happy".to_string(),
            insight_story: InsightStory {
                summary: "A year by the water".to_string(),
                detail: "Most of the winning photos were taken outdoors with friends"
                    .to_string(),
            },
            winner_analysis: PhotoAnalysis {
                keywords: vec!["sea".to_string()],
                emotion: "happy".to_string(),
                description: "Waves at dusk".to_string(),
            },
        }
    }

    fn rankings(n: usize) -> Vec<RankedCardPhoto> {
        (0..n)
            .map(|i| RankedCardPhoto {
                rank: i as i32 + 1,
                photo_url: format!("/uploads/photos/{i}.jpg"),
                keywords: vec!["sea".to_string()],
            })
            .collect()
    }

    #[tokio::test]
    async fn test_render_cover_plus_top_three() {
        let cards = DocumentCardRenderer::new()
            .render(&report(), &rankings(4), false)
            .await
            .unwrap();

        assert_eq!(cards.len(), 1 + MAX_RANK_CARDS);
        assert_eq!(cards[0].kind, CardKind::Cover);
        assert_eq!(cards[0].keywords.len(), COVER_KEYWORDS);
        assert!(cards[1..].iter().all(|c| c.kind == CardKind::Rank));
        assert_eq!(cards[1].rank, Some(1));
        assert_eq!(cards[3].rank, Some(3));
    }

    #[tokio::test]
    async fn test_watermark_only_for_free_tier() {
        let renderer = DocumentCardRenderer::new();
        let free = renderer.render(&report(), &rankings(2), false).await.unwrap();
        assert!(free.iter().all(|c| c.watermark.as_deref() == Some(WATERMARK)));

        let premium = renderer.render(&report(), &rankings(2), true).await.unwrap();
        assert!(premium.iter().all(|c| c.watermark.is_none()));
    }

    #[test]
    fn test_wrap_text() {
        assert_eq!(wrap_text("short", 20), vec!["short"]);
        let wrapped = wrap_text("one two three four five six", 9);
        assert!(wrapped.iter().all(|l| l.chars().count() <= 9));
        assert_eq!(wrapped.join(" "), "one two three four five six");
        assert!(wrap_text("", 10).is_empty());
    }
}
