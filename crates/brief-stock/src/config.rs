//! Configuration for report runs

use crate::classifier::{Thresholds, YieldUnit};
use crate::error::{Result, StockError};
use crate::throttle::RateLimit;
use brief_utils::config::{env_bool, env_list, env_parse, env_string};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Which report a run produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportKind {
    /// HTML brief with prices, classified fundamentals and Korean headlines
    StockBrief,
    /// Plain-text digest of English news, optionally summarised
    NewsDigest,
}

/// News provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NewsProvider {
    /// Google News RSS search (Korean, last day)
    GoogleNews,
    /// newsapi.org `everything` search (English)
    NewsApi,
}

/// Optional step applied to fetched articles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnrichmentMode {
    None,
    /// LLM writes a Korean summary of the articles
    Digest,
    /// LLM translates the headlines
    Translate,
    /// Translation API translates the headlines
    TranslateApi,
}

/// LLM backend used by the LLM enrichment modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LlmBackend {
    Gemini,
    OpenAi,
}

/// Where the ticker roster comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RosterKind {
    /// Built-in list of large US stocks
    Static,
    /// Google Sheets worksheet read with a service account
    Sheet,
}

macro_rules! parse_choice {
    ($ty:ty, $what:literal, { $($($alias:literal)|+ => $variant:expr),+ $(,)? }) => {
        impl FromStr for $ty {
            type Err = StockError;

            fn from_str(s: &str) -> Result<Self> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($($alias)|+ => Ok($variant),)+
                    other => Err(StockError::ConfigError(format!(
                        concat!("unknown ", $what, " '{}'"),
                        other
                    ))),
                }
            }
        }
    };
}

parse_choice!(ReportKind, "report", {
    "stock" | "brief" | "stock-brief" => ReportKind::StockBrief,
    "news" | "digest" | "news-digest" => ReportKind::NewsDigest,
});

parse_choice!(NewsProvider, "news provider", {
    "google" | "google-news" | "rss" => NewsProvider::GoogleNews,
    "newsapi" | "news-api" => NewsProvider::NewsApi,
});

parse_choice!(EnrichmentMode, "enrichment mode", {
    "none" | "off" => EnrichmentMode::None,
    "digest" | "summary" | "summarize" => EnrichmentMode::Digest,
    "translate" | "llm-translate" => EnrichmentMode::Translate,
    "translate-api" | "google-translate" => EnrichmentMode::TranslateApi,
});

parse_choice!(LlmBackend, "LLM provider", {
    "gemini" | "google" => LlmBackend::Gemini,
    "openai" | "openai-compatible" => LlmBackend::OpenAi,
});

parse_choice!(RosterKind, "roster source", {
    "static" | "builtin" => RosterKind::Static,
    "sheet" | "sheets" | "google-sheet" => RosterKind::Sheet,
});

/// SMTP delivery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailSettings {
    /// Login and sender address
    pub address: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Recipients; the sender when empty
    pub recipients: Vec<String>,
    pub smtp_host: String,
    /// 465 means implicit TLS
    pub smtp_port: u16,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            address: None,
            password: None,
            recipients: Vec::new(),
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 465,
        }
    }
}

impl MailSettings {
    /// Recipients with the sender as fallback
    pub fn effective_recipients(&self) -> Vec<String> {
        if self.recipients.is_empty() {
            self.address.iter().cloned().collect()
        } else {
            self.recipients.clone()
        }
    }
}

/// Configuration for one report run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BriefConfig {
    pub report: ReportKind,
    pub news_provider: NewsProvider,
    pub enrichment: EnrichmentMode,
    pub llm_backend: LlmBackend,
    pub llm_model: String,
    pub roster: RosterKind,

    /// Sheet id from the spreadsheet URL
    pub spreadsheet_id: Option<String>,
    pub worksheet: String,
    #[serde(skip_serializing)]
    pub service_account_json: Option<String>,

    #[serde(skip_serializing)]
    pub news_api_key: Option<String>,
    #[serde(skip_serializing)]
    pub gemini_api_key: Option<String>,
    #[serde(skip_serializing)]
    pub openai_api_key: Option<String>,
    pub openai_api_base: Option<String>,
    #[serde(skip_serializing)]
    pub translate_api_key: Option<String>,

    pub mail: MailSettings,

    /// How far back the news search reaches
    pub news_lookback_days: i64,
    /// Articles kept per ticker
    pub news_limit: usize,

    pub thresholds: Thresholds,
    /// Overrides the unit declared by the market data source
    pub yield_unit: Option<YieldUnit>,

    /// Attempts per external call, including the first
    pub max_retries: u32,
    /// Linear backoff step between attempts
    pub retry_step: Duration,
    /// Token bucket applied to each provider
    pub rate_limit: RateLimit,
    pub request_timeout: Duration,

    /// Print the rendered report instead of sending it
    pub dry_run: bool,
}

impl Default for BriefConfig {
    fn default() -> Self {
        Self::for_report(ReportKind::StockBrief)
    }
}

impl BriefConfig {
    /// Defaults matching each report flavour
    pub fn for_report(report: ReportKind) -> Self {
        let (news_provider, enrichment, roster, news_limit) = match report {
            ReportKind::StockBrief => (
                NewsProvider::GoogleNews,
                EnrichmentMode::None,
                RosterKind::Static,
                3,
            ),
            ReportKind::NewsDigest => (
                NewsProvider::NewsApi,
                EnrichmentMode::Digest,
                RosterKind::Sheet,
                5,
            ),
        };

        Self {
            report,
            news_provider,
            enrichment,
            llm_backend: LlmBackend::Gemini,
            llm_model: "gemini-2.0-flash".to_string(),
            roster,
            spreadsheet_id: None,
            worksheet: "주식키워드".to_string(),
            service_account_json: None,
            news_api_key: None,
            gemini_api_key: None,
            openai_api_key: None,
            openai_api_base: None,
            translate_api_key: None,
            mail: MailSettings::default(),
            news_lookback_days: 3,
            news_limit,
            thresholds: Thresholds::default(),
            yield_unit: None,
            max_retries: 3,
            retry_step: Duration::from_secs(1),
            rate_limit: RateLimit::default(),
            request_timeout: Duration::from_secs(10),
            dry_run: false,
        }
    }

    /// Create a new configuration builder
    pub fn builder(report: ReportKind) -> BriefConfigBuilder {
        BriefConfigBuilder::new(report)
    }

    /// Load from the environment (and `.env`), then validate
    ///
    /// `report` overrides `BRIEF_REPORT`; `dry_run` is OR-ed with
    /// `BRIEF_DRY_RUN`.
    pub fn from_env_with(report: Option<ReportKind>, dry_run: bool) -> Result<Self> {
        let config = Self::load_env_with(report, dry_run)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the environment (and `.env`) without validating
    ///
    /// Only malformed values fail here; missing credentials are left for
    /// [`BriefConfig::validate`] to report.
    pub fn load_env_with(report: Option<ReportKind>, dry_run: bool) -> Result<Self> {
        brief_utils::load_dotenv();

        let report = match report {
            Some(r) => r,
            None => env_string("BRIEF_REPORT")
                .map(|s| s.parse())
                .transpose()?
                .unwrap_or(ReportKind::StockBrief),
        };

        let mut config = Self::for_report(report);
        config.apply_env()?;
        config.dry_run = dry_run || env_bool("BRIEF_DRY_RUN", false);
        Ok(config)
    }

    /// Load from the environment using `BRIEF_REPORT`
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(None, false)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(v) = env_string("BRIEF_NEWS_PROVIDER") {
            self.news_provider = v.parse()?;
        }
        if let Some(v) = env_string("BRIEF_ENRICHMENT") {
            self.enrichment = v.parse()?;
        }
        if let Some(v) = env_string("BRIEF_LLM_PROVIDER") {
            self.llm_backend = v.parse()?;
        }
        if let Some(v) = env_string("BRIEF_LLM_MODEL") {
            self.llm_model = v;
        }
        if let Some(v) = env_string("BRIEF_ROSTER") {
            self.roster = v.parse()?;
        }
        if let Some(v) = env_string("BRIEF_WORKSHEET") {
            self.worksheet = v;
        }
        if let Some(v) = env_string("BRIEF_YIELD_UNIT") {
            self.yield_unit = Some(v.parse().map_err(StockError::ConfigError)?);
        }

        self.spreadsheet_id = env_string("BRIEF_SPREADSHEET_ID");
        self.service_account_json = env_string("SERVICE_ACCOUNT_JSON");
        self.news_api_key = env_string("NEWS_API_KEY");
        self.gemini_api_key = env_string("GEMINI_API_KEY");
        self.openai_api_key = env_string("OPENAI_API_KEY");
        self.openai_api_base = env_string("OPENAI_API_BASE");
        self.translate_api_key = env_string("GOOGLE_TRANSLATE_API_KEY");

        self.mail.address = env_string("EMAIL_ADDRESS");
        self.mail.password = env_string("EMAIL_PASSWORD");
        self.mail.recipients = env_list("BRIEF_MAIL_TO");
        if let Some(host) = env_string("BRIEF_SMTP_HOST") {
            self.mail.smtp_host = host;
        }
        self.mail.smtp_port = env_parse("BRIEF_SMTP_PORT", self.mail.smtp_port)?;

        self.news_lookback_days = env_parse("BRIEF_NEWS_LOOKBACK_DAYS", self.news_lookback_days)?;
        self.news_limit = env_parse("BRIEF_NEWS_LIMIT", self.news_limit)?;
        self.max_retries = env_parse("BRIEF_MAX_RETRIES", self.max_retries)?;
        self.retry_step = Duration::from_millis(env_parse(
            "BRIEF_RETRY_STEP_MS",
            self.retry_step.as_millis() as u64,
        )?);
        self.rate_limit = RateLimit::new(
            env_parse("BRIEF_RATE_BURST", self.rate_limit.burst)?,
            env_parse("BRIEF_RATE_PER_MINUTE", self.rate_limit.per_minute)?,
        );
        self.request_timeout = Duration::from_secs(env_parse(
            "BRIEF_REQUEST_TIMEOUT_SECS",
            self.request_timeout.as_secs(),
        )?);
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let mut issues: Vec<String> = Vec::new();

        if !self.dry_run && (self.mail.address.is_none() || self.mail.password.is_none()) {
            issues.push("EMAIL_ADDRESS and EMAIL_PASSWORD are required to send mail".into());
        }
        if self.news_provider == NewsProvider::NewsApi && self.news_api_key.is_none() {
            issues.push("NEWS_API_KEY is required for the newsapi provider".into());
        }
        match self.enrichment {
            EnrichmentMode::Digest | EnrichmentMode::Translate => match self.llm_backend {
                LlmBackend::Gemini if self.gemini_api_key.is_none() => {
                    issues.push("GEMINI_API_KEY is required for LLM enrichment".into());
                }
                LlmBackend::OpenAi if self.openai_api_key.is_none() => {
                    issues.push("OPENAI_API_KEY is required for LLM enrichment".into());
                }
                _ => {}
            },
            EnrichmentMode::TranslateApi if self.translate_api_key.is_none() => {
                issues.push("GOOGLE_TRANSLATE_API_KEY is required for translate-api".into());
            }
            _ => {}
        }
        if self.roster == RosterKind::Sheet {
            if self.service_account_json.is_none() {
                issues.push("SERVICE_ACCOUNT_JSON is required for the sheet roster".into());
            }
            if self.spreadsheet_id.is_none() {
                issues.push("BRIEF_SPREADSHEET_ID is required for the sheet roster".into());
            }
        }
        if self.news_limit == 0 {
            issues.push("news_limit must be greater than 0".into());
        }
        if self.news_lookback_days < 0 {
            issues.push("news_lookback_days must be >= 0".into());
        }
        if self.max_retries == 0 {
            issues.push("max_retries must be greater than 0".into());
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(StockError::ConfigError(format!(
                "Invalid config:\n - {}",
                issues.join("\n - ")
            )))
        }
    }
}

/// Builder for BriefConfig
#[derive(Debug)]
pub struct BriefConfigBuilder {
    config: BriefConfig,
}

impl BriefConfigBuilder {
    pub fn new(report: ReportKind) -> Self {
        Self {
            config: BriefConfig::for_report(report),
        }
    }

    pub fn news_provider(mut self, provider: NewsProvider) -> Self {
        self.config.news_provider = provider;
        self
    }

    pub fn enrichment(mut self, mode: EnrichmentMode) -> Self {
        self.config.enrichment = mode;
        self
    }

    pub fn roster(mut self, roster: RosterKind) -> Self {
        self.config.roster = roster;
        self
    }

    pub fn news_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.news_api_key = Some(key.into());
        self
    }

    pub fn gemini_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.gemini_api_key = Some(key.into());
        self
    }

    pub fn mail_credentials(mut self, address: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.mail.address = Some(address.into());
        self.config.mail.password = Some(password.into());
        self
    }

    pub fn thresholds(mut self, thresholds: Thresholds) -> Self {
        self.config.thresholds = thresholds;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn retry_step(mut self, step: Duration) -> Self {
        self.config.retry_step = step;
        self
    }

    pub fn rate_limit(mut self, limit: RateLimit) -> Self {
        self.config.rate_limit = limit;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.config.dry_run = dry_run;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<BriefConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
