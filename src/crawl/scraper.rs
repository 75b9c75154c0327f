//! Entry point used by the crawl workers
//!
//! [`Scraper::scrape`] takes one fetched page and returns the links that
//! should be added to the frontier: the page is filtered and recorded by the
//! [`PageFilterPipeline`], then each outlink is checked by the
//! [`UrlValidator`].

use std::sync::Arc;

use super::dedup::DuplicateDetector;
use super::pipeline::{PageFilterPipeline, PageOutcome, PipelineStatsSnapshot};
use super::robots::{RobotsCache, RobotsFetcher};
use super::tokenizer::Tokenizer;
use super::trap_detection::TrapDetector;
use super::validator::UrlValidator;
use crate::config::Config;
use crate::error::FilterError;
use crate::store::CrawlStores;
use crate::types::FetchedPage;

/// Page filter and link validator over one set of crawl stores
pub struct Scraper {
    pipeline: PageFilterPipeline,
    validator: UrlValidator,
    stores: CrawlStores,
}

impl Scraper {
    /// Build every component from configuration.
    ///
    /// The page history is loaded from `stores` here; robots and trap state
    /// are read lazily per host.
    pub fn new(
        config: &Config,
        stores: CrawlStores,
        fetcher: Arc<dyn RobotsFetcher>,
    ) -> Result<Self, FilterError> {
        let robots = Arc::new(RobotsCache::new(stores.robots.clone(), fetcher, &config.robots));
        let traps = Arc::new(TrapDetector::new(stores.trap_stats.clone(), config.trap.clone()));
        let dedup = Arc::new(DuplicateDetector::load(stores.pages.clone(), &config.dedup)?);

        let pipeline = PageFilterPipeline::new(
            config.filter.clone(),
            Tokenizer::new(&config.tokenizer),
            traps.clone(),
            dedup,
        );
        let validator = UrlValidator::new(&config.validator, robots, traps);

        Ok(Self {
            pipeline,
            validator,
            stores,
        })
    }

    /// Filter a fetched page and return its validated outlinks, in page order
    pub async fn scrape(&self, page: &FetchedPage) -> Result<Vec<String>, FilterError> {
        let links = match self.pipeline.process(page)? {
            PageOutcome::Accepted { links, .. } => links,
            PageOutcome::Rejected(_) => return Ok(Vec::new()),
        };

        let mut valid = Vec::with_capacity(links.len());
        for link in links {
            if self.validator.is_valid(&link).await? {
                valid.push(link);
            }
        }

        self.pipeline.counters().record_links_emitted(valid.len());
        Ok(valid)
    }

    pub fn pipeline(&self) -> &PageFilterPipeline {
        &self.pipeline
    }

    pub fn validator(&self) -> &UrlValidator {
        &self.validator
    }

    pub fn stats(&self) -> PipelineStatsSnapshot {
        self.pipeline.stats()
    }

    /// Flush the durable stores
    pub fn flush(&self) -> Result<(), FilterError> {
        Ok(self.stores.flush()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawl::robots::RobotsResponse;
    use crate::error::FetchError;
    use async_trait::async_trait;
    use url::Url;

    struct AllowAll;

    #[async_trait]
    impl RobotsFetcher for AllowAll {
        async fn fetch_robots(&self, _robots_url: &Url) -> Result<RobotsResponse, FetchError> {
            Ok(RobotsResponse {
                status: 404,
                body: String::new(),
            })
        }
    }

    fn page(url: &str, links: &[&str]) -> FetchedPage {
        let anchors: String = links
            .iter()
            .map(|href| format!(r#"<a href="{}">more</a>"#, href))
            .collect();
        let body = format!(
            "<html><body><p>The department hosts weekly colloquia on theory, \
             networked systems and human computer interaction, open to all \
             students and visiting scholars.</p>{}</body></html>",
            anchors
        );
        FetchedPage::new(url, 200, body)
    }

    #[tokio::test]
    async fn test_scrape_returns_only_valid_links() {
        let scraper =
            Scraper::new(&Config::default(), CrawlStores::in_memory(), Arc::new(AllowAll)).unwrap();

        let links = scraper
            .scrape(&page(
                "https://www.ics.uci.edu/events",
                &[
                    "/events/colloquia",
                    "https://www.google.com/",
                    "/files/slides.pdf",
                    "mailto:events@ics.uci.edu",
                    "https://www.stat.uci.edu/seminars",
                ],
            ))
            .await
            .unwrap();

        assert_eq!(
            links,
            vec![
                "https://www.ics.uci.edu/events/colloquia",
                "https://www.stat.uci.edu/seminars",
            ]
        );
        assert_eq!(scraper.stats().links_emitted, 2);
    }

    #[tokio::test]
    async fn test_scrape_rejected_page_yields_nothing() {
        let scraper =
            Scraper::new(&Config::default(), CrawlStores::in_memory(), Arc::new(AllowAll)).unwrap();

        let missing = FetchedPage::new("https://www.ics.uci.edu/gone", 404, "not found");
        assert!(scraper.scrape(&missing).await.unwrap().is_empty());
        assert_eq!(scraper.stats().pages_accepted, 0);
    }
}
