//! API clients for market data, news, rosters and translation

pub mod google_news;
pub mod news_api;
pub mod sheets;
pub mod translate;
pub mod yahoo;

pub use google_news::GoogleNewsClient;
pub use news_api::NewsApiClient;
pub use sheets::{ServiceAccountKey, SheetsClient};
pub use translate::TranslateClient;
pub use yahoo::YahooFinanceClient;
