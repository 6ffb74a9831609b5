//! Enrichment strategies: summarise or translate fetched articles

use crate::api::TranslateClient;
use crate::error::{Result, StockError};
use crate::model::{NewsItem, RosterEntry};
use crate::prompts;
use async_trait::async_trait;
use brief_llm::{CompletionRequest, LLMProvider, Message};
use tracing::{debug, instrument};

/// Shown in place of a digest that could not be produced
pub const DIGEST_APOLOGY: &str = "⚠️ 요약 중 오류가 발생했습니다. 원문 제목을 확인해 주세요.";

/// Shown in place of a digest once the LLM quota is gone
pub const DIGEST_QUOTA_NOTICE: &str = "⚠️ 오늘은 요약 한도를 초과해 원문 제목만 전달합니다.";

/// Output of an enricher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enrichment {
    /// Free-text summary of all articles
    Digest(String),
    /// One translated title per article, same order
    Translations(Vec<String>),
}

impl Enrichment {
    /// Apply to the articles; returns the digest, if any
    pub fn apply(self, items: &mut [NewsItem]) -> Option<String> {
        match self {
            Enrichment::Digest(text) => Some(text),
            Enrichment::Translations(titles) => {
                for (item, title) in items.iter_mut().zip(titles) {
                    item.translated_title = Some(title);
                }
                None
            }
        }
    }
}

/// Summariser or translator applied to one entry's articles
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(&self, entry: &RosterEntry, items: &[NewsItem]) -> Result<Enrichment>;
}

/// LLM-written Korean digest
pub struct LlmDigest {
    provider: Box<dyn LLMProvider>,
    model: String,
    max_tokens: usize,
}

impl LlmDigest {
    pub fn new(provider: Box<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens: 1024,
        }
    }
}

#[async_trait]
impl Enricher for LlmDigest {
    #[instrument(skip(self, items), fields(symbol = %entry.symbol, provider = self.provider.name()))]
    async fn enrich(&self, entry: &RosterEntry, items: &[NewsItem]) -> Result<Enrichment> {
        let prompt = prompts::digest_prompt(&entry.symbol, &entry.name, items)?;
        let request = CompletionRequest::builder(&self.model)
            .system(prompts::DIGEST_SYSTEM)
            .add_message(Message::user(prompt))
            .max_tokens(self.max_tokens)
            .build();

        let text = self.provider.complete_text(request).await?;
        debug!("Digest of {} chars", text.len());
        Ok(Enrichment::Digest(text))
    }
}

/// LLM translation of titles, one line per title
pub struct LlmTranslator {
    provider: Box<dyn LLMProvider>,
    model: String,
}

impl LlmTranslator {
    pub fn new(provider: Box<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Enricher for LlmTranslator {
    #[instrument(skip(self, items), fields(symbol = %entry.symbol))]
    async fn enrich(&self, entry: &RosterEntry, items: &[NewsItem]) -> Result<Enrichment> {
        let request = CompletionRequest::builder(&self.model)
            .system(prompts::TRANSLATE_SYSTEM)
            .add_message(Message::user(prompts::translate_prompt(items)?))
            .temperature(0.0)
            .build();

        let text = self.provider.complete_text(request).await?;
        parse_translation_lines(&text, items.len()).map(Enrichment::Translations)
    }
}

/// Split an LLM answer into exactly `expected` non-empty lines
fn parse_translation_lines(text: &str, expected: usize) -> Result<Vec<String>> {
    let lines: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(ToString::to_string)
        .collect();

    if lines.len() == expected {
        Ok(lines)
    } else {
        Err(StockError::ApiError(format!(
            "expected {expected} translated lines, got {}",
            lines.len()
        )))
    }
}

/// Translation API, titles translated in one batch
pub struct ApiTranslator {
    client: TranslateClient,
    target: String,
}

impl ApiTranslator {
    pub fn new(client: TranslateClient) -> Self {
        Self {
            client,
            target: "ko".to_string(),
        }
    }
}

#[async_trait]
impl Enricher for ApiTranslator {
    async fn enrich(&self, _entry: &RosterEntry, items: &[NewsItem]) -> Result<Enrichment> {
        let titles: Vec<String> = items.iter().map(|i| i.title.clone()).collect();
        let translated = self.client.translate(&titles, &self.target).await?;
        Ok(Enrichment::Translations(translated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brief_llm::{CompletionResponse, LLMError, StopReason, TokenUsage};

    /// Provider answering with a fixed text, or failing
    struct CannedProvider {
        answer: std::result::Result<String, u16>,
    }

    #[async_trait]
    impl LLMProvider for CannedProvider {
        async fn complete(&self, _request: CompletionRequest) -> brief_llm::Result<CompletionResponse> {
            match &self.answer {
                Ok(text) => Ok(CompletionResponse {
                    message: Message::assistant(text.clone()),
                    stop_reason: StopReason::EndTurn,
                    usage: TokenUsage::default(),
                }),
                Err(status) => Err(LLMError::from_status(*status, "RESOURCE_EXHAUSTED".into(), "m")),
            }
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    fn canned(answer: std::result::Result<&str, u16>) -> Box<dyn LLMProvider> {
        Box::new(CannedProvider {
            answer: answer.map(ToString::to_string),
        })
    }

    fn items() -> Vec<NewsItem> {
        vec![
            NewsItem::new("Apple beats estimates", "https://a"),
            NewsItem::new("iPhone sales slow", "https://b"),
        ]
    }

    #[tokio::test]
    async fn test_llm_digest() {
        let enricher = LlmDigest::new(canned(Ok("  1. 실적 호조\n2. 긍정\n3. 보유  ")), "m");
        let result = enricher.enrich(&RosterEntry::new("AAPL", "애플"), &items()).await;
        assert_eq!(result.unwrap(), Enrichment::Digest("1. 실적 호조\n2. 긍정\n3. 보유".into()));
    }

    #[tokio::test]
    async fn test_llm_quota_surfaces_as_quota_error() {
        let enricher = LlmDigest::new(canned(Err(429)), "m");
        let err = enricher
            .enrich(&RosterEntry::new("AAPL", "애플"), &items())
            .await
            .unwrap_err();
        assert!(err.is_quota());
    }

    #[tokio::test]
    async fn test_llm_translator() {
        let enricher = LlmTranslator::new(canned(Ok("애플, 예상치 상회\n\n아이폰 판매 둔화\n")), "m");
        let result = enricher
            .enrich(&RosterEntry::new("AAPL", "애플"), &items())
            .await
            .unwrap();

        let mut articles = items();
        assert_eq!(result.apply(&mut articles), None);
        assert_eq!(articles[0].display_title(), "애플, 예상치 상회");
        assert_eq!(articles[1].display_title(), "아이폰 판매 둔화");
    }

    #[tokio::test]
    async fn test_blank_digest_is_an_error() {
        let enricher = LlmDigest::new(canned(Ok("  \n ")), "m");
        let err = enricher
            .enrich(&RosterEntry::new("AAPL", "애플"), &items())
            .await
            .unwrap_err();
        assert!(matches!(err, StockError::LlmError(LLMError::UnexpectedResponse(_))));
    }

    #[test]
    fn test_translation_line_mismatch() {
        assert!(parse_translation_lines("하나뿐", 2).is_err());
    }

    #[test]
    fn test_digest_apply_leaves_titles() {
        let mut articles = items();
        let digest = Enrichment::Digest("요약".into()).apply(&mut articles);
        assert_eq!(digest.as_deref(), Some("요약"));
        assert!(articles.iter().all(|a| a.translated_title.is_none()));
    }
}
