//! Plain-text digest

use super::{BodyFormat, RenderedReport, ReportRenderer, report_view};
use crate::error::Result;
use crate::report::Report;
use minijinja::Environment;

const TEMPLATE_NAME: &str = "digest.txt";

/// Renders the plain-text e-mail body
pub struct TextRenderer {
    env: Environment<'static>,
}

impl TextRenderer {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.add_template(TEMPLATE_NAME, include_str!("templates/digest.txt"))?;
        Ok(Self { env })
    }
}

impl ReportRenderer for TextRenderer {
    fn render(&self, report: &Report) -> Result<RenderedReport> {
        let view = report_view(report, false);
        let body = self.env.get_template(TEMPLATE_NAME)?.render(&view)?;

        Ok(RenderedReport {
            subject: view.subject,
            body,
            format: BodyFormat::Text,
        })
    }
}

impl std::fmt::Debug for TextRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextRenderer").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReportKind;
    use crate::model::NewsItem;
    use crate::render::{NEWS_QUOTA_EXCEEDED, NO_NEWS, fixtures};
    use crate::report::NewsBlock;

    #[test]
    fn test_digest_text() {
        let mut report = fixtures::report(ReportKind::NewsDigest);
        report.market.clear();
        for section in &mut report.sections {
            section.quote = None;
        }
        report.sections[0].news = NewsBlock::Articles {
            items: vec![NewsItem::new("Apple & Nvidia rally", "https://example.com/a")],
            digest: Some("1. 실적 호조\n2. 긍정\n3. 보유 유지".to_string()),
        };

        let out = TextRenderer::new().unwrap().render(&report).unwrap();
        assert_eq!(out.format, BodyFormat::Text);
        assert_eq!(out.subject, "[2026-03-02] 월스트리트 현지 뉴스 요약 🇺🇸");
        assert!(out.body.contains("📊 [AAPL - 애플]\n1. 실적 호조\n2. 긍정\n3. 보유 유지\n"));
        assert!(out.body.contains("• Apple & Nvidia rally\n  https://example.com/a\n"));
        assert!(out.body.contains("📊 [MSFT - 마이크로소프트]"));
        assert!(out.body.contains(NEWS_QUOTA_EXCEEDED));
        assert!(!out.body.contains("🌍"));
        assert_eq!(out.body.lines().filter(|l| l.starts_with("====")).count(), 2);
    }

    #[test]
    fn test_empty_news_placeholder() {
        let mut report = fixtures::report(ReportKind::NewsDigest);
        report.sections.truncate(1);
        report.sections[0].news = NewsBlock::Empty;

        let out = TextRenderer::new().unwrap().render(&report).unwrap();
        assert!(out.body.contains(NO_NEWS));
        assert!(out.body.contains("🌍 나스닥 +0.56% | 공포지수(VIX) 22.50"));
    }
}
