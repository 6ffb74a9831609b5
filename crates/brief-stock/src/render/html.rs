//! HTML brief

use super::{BodyFormat, RenderedReport, ReportRenderer, report_view};
use crate::config::ReportKind;
use crate::error::Result;
use crate::report::Report;
use minijinja::Environment;

const TEMPLATE_NAME: &str = "brief.html";

/// Renders the e-mail HTML; names, titles, URLs and digests are auto-escaped
pub struct HtmlRenderer {
    env: Environment<'static>,
}

impl HtmlRenderer {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        // `.html` names get HTML auto-escaping
        env.add_template(TEMPLATE_NAME, include_str!("templates/brief.html"))?;
        Ok(Self { env })
    }
}

impl ReportRenderer for HtmlRenderer {
    fn render(&self, report: &Report) -> Result<RenderedReport> {
        let view = report_view(report, report.kind == ReportKind::StockBrief);
        let body = self.env.get_template(TEMPLATE_NAME)?.render(&view)?;

        Ok(RenderedReport {
            subject: view.subject,
            body,
            format: BodyFormat::Html,
        })
    }
}

impl std::fmt::Debug for HtmlRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HtmlRenderer").finish_non_exhaustive()
    }
}
