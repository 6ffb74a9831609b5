//! Prompt templates for the LLM enrichment steps

use crate::error::Result;
use crate::model::NewsItem;
use minijinja::{Environment, context};

// ============================================================================
// System prompts
// ============================================================================

/// System prompt for the Korean news digest
pub const DIGEST_SYSTEM: &str = "당신은 월스트리트의 수석 애널리스트입니다. \
미국 현지 영문 뉴스를 한국 개인 투자자가 이해하기 쉬운 한국어로 정리합니다.";

/// System prompt for headline translation
pub const TRANSLATE_SYSTEM: &str = "You translate English financial news headlines into natural Korean. \
Keep tickers, company names and numbers accurate.";

// ============================================================================
// User messages
// ============================================================================

const DIGEST_TEMPLATE: &str = "\
다음은 미국 현지에서 발행된 {{ symbol }}({{ name }}) 관련 영문 뉴스입니다.

아래 양식에 맞춰 한국어로 번역 및 요약해 주세요.
1. 이 기사들이 다루는 핵심 내용 (3줄 요약)
2. 현지 투자자들의 분위기 (긍정/부정/중립)
3. 오늘의 투자 조언 한마디

영문 뉴스 내용:
{% for item in items -%}
Title: {{ item.title }}
Description: {{ item.description or \"\" }}
{% endfor %}";

const TRANSLATE_TEMPLATE: &str = "\
Translate each headline into Korean. Answer with exactly {{ items | length }} lines, \
one translation per line, in the same order, with no numbering or commentary.

{% for item in items -%}
{{ item.title }}
{% endfor %}";

fn render(template: &str, ctx: minijinja::Value) -> Result<String> {
    let env = Environment::new();
    Ok(env.render_str(template, ctx)?)
}

/// User message asking for a Korean digest of the articles
pub fn digest_prompt(symbol: &str, name: &str, items: &[NewsItem]) -> Result<String> {
    render(DIGEST_TEMPLATE, context! { symbol, name, items })
}

/// User message asking for one Korean line per headline
pub fn translate_prompt(items: &[NewsItem]) -> Result<String> {
    render(TRANSLATE_TEMPLATE, context! { items })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items() -> Vec<NewsItem> {
        let mut first = NewsItem::new("Nvidia unveils Rubin", "https://example.com/1");
        first.description = Some("The chip ships next year.".to_string());
        vec![first, NewsItem::new("NVDA hits record", "https://example.com/2")]
    }

    #[test]
    fn test_digest_prompt() {
        let prompt = digest_prompt("NVDA", "엔비디아", &items()).unwrap();
        assert!(prompt.contains("NVDA(엔비디아)"));
        assert!(prompt.contains("Title: Nvidia unveils Rubin\nDescription: The chip ships next year."));
        assert!(prompt.contains("Title: NVDA hits record\nDescription: \n"));
        assert!(prompt.contains("긍정/부정/중립"));
    }

    #[test]
    fn test_translate_prompt_lists_titles() {
        let prompt = translate_prompt(&items()).unwrap();
        assert!(prompt.contains("exactly 2 lines"));
        assert!(prompt.ends_with("Nvidia unveils Rubin\nNVDA hits record\n"));
    }
}
