//! Search runner
//!
//! Processes one recorded search query: fetches its results page,
//! extracts candidate lead sources via the AI collaborator, and marks the
//! search completed. Discovered sources are deduplicated against the
//! cache at append time, so the runner itself stays cache-free.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;
use url::form_urlencoded;

use crate::domain::entities::{
    FieldPatch, SearchPatch, SearchStatus, SheetRow, SourceRow, SourceStatus, Tab,
};
use crate::domain::gateways::{FailureKind, Fetcher, TextExtractor};

use super::page;
use super::{ItemProcessor, ItemYield, ProcessorError, wrong_shape};

/// Processor that turns one search query into candidate sources.
pub struct SearchRunner {
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn TextExtractor>,
    url_template: String,
}

impl SearchRunner {
    /// Creates a search runner. `url_template` carries a `{query}`
    /// placeholder replaced with the URL-encoded query text.
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn TextExtractor>,
        url_template: String,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            url_template,
        }
    }

    fn results_url(&self, query: &str) -> String {
        let encoded: String = form_urlencoded::byte_serialize(query.as_bytes()).collect();
        self.url_template.replace("{query}", &encoded)
    }
}

#[async_trait]
impl ItemProcessor for SearchRunner {
    fn name(&self) -> &'static str {
        "SearchRunner"
    }

    fn tab(&self) -> Tab {
        Tab::Searches
    }

    async fn process(&self, row: &SheetRow) -> Result<ItemYield, ProcessorError> {
        let SheetRow::Search(search) = row else {
            return Err(wrong_shape("search", row));
        };
        if search.query.trim().is_empty() {
            return Err(ProcessorError::from(FailureKind::InvalidInput {
                detail: "search row has no query".to_string(),
            }));
        }

        let url = self.results_url(&search.query);
        let fetched = self.fetcher.fetch(&url).await?;
        if !fetched.is_success() {
            return Err(FailureKind::HttpStatus {
                status: fetched.status,
            }
            .into());
        }

        let extraction = self.extractor.extract_leads(&fetched).await?;
        debug!(
            "query '{}': {} candidate source(s)",
            search.query,
            extraction.sources.len()
        );

        let date_found = Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let discovered = extraction
            .sources
            .iter()
            .filter(|candidate| !candidate.url.trim().is_empty())
            .map(|candidate| {
                SheetRow::Source(SourceRow {
                    title: candidate.title.clone(),
                    url: page::normalize_url(&candidate.url),
                    description: candidate.description.clone(),
                    date_found: date_found.clone(),
                    status: SourceStatus::New,
                    leads_found: 0,
                })
            })
            .collect();

        let patch = FieldPatch::Search(SearchPatch {
            returns: Some(SearchStatus::Completed),
        });

        Ok(ItemYield { patch, discovered })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{LeadRow, SearchRow};
    use crate::domain::gateways::{
        DraftContent, ExtractedSource, FetchedPage, LeadAnnotation, LeadExtraction,
    };
    use crate::domain::templates::EmailTemplate;
    use std::sync::Mutex;

    struct RecordingFetcher {
        requested: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Fetcher for RecordingFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedPage, FailureKind> {
            self.requested.lock().unwrap().push(url.to_string());
            Ok(FetchedPage {
                status: 200,
                body: "<html></html>".to_string(),
                final_url: url.to_string(),
            })
        }
    }

    struct SourcesExtractor {
        sources: Vec<ExtractedSource>,
    }

    #[async_trait]
    impl TextExtractor for SourcesExtractor {
        async fn extract_leads(&self, _page: &FetchedPage) -> Result<LeadExtraction, FailureKind> {
            Ok(LeadExtraction {
                leads: Vec::new(),
                sources: self.sources.clone(),
            })
        }

        async fn annotate_lead(
            &self,
            _lead: &LeadRow,
            _content: &str,
        ) -> Result<LeadAnnotation, FailureKind> {
            Ok(LeadAnnotation::default())
        }

        async fn personalize_email(
            &self,
            _lead: &LeadRow,
            _template: &EmailTemplate,
        ) -> Result<DraftContent, FailureKind> {
            Err(FailureKind::Other {
                detail: "not used".into(),
            })
        }
    }

    fn search_row(query: &str) -> SheetRow {
        SheetRow::Search(SearchRow {
            date: "2025-11-02".to_string(),
            query: query.to_string(),
            returns: SearchStatus::New,
        })
    }

    #[tokio::test]
    async fn query_is_encoded_into_the_results_url() {
        let fetcher = Arc::new(RecordingFetcher {
            requested: Mutex::new(Vec::new()),
        });
        let runner = SearchRunner::new(
            fetcher.clone(),
            Arc::new(SourcesExtractor { sources: Vec::new() }),
            "https://search.example/?q={query}".to_string(),
        );

        runner
            .process(&search_row("yoga studios near portland"))
            .await
            .expect("success");

        let requested = fetcher.requested.lock().unwrap().clone();
        assert_eq!(
            requested,
            vec!["https://search.example/?q=yoga+studios+near+portland"]
        );
    }

    #[tokio::test]
    async fn candidate_sources_become_discovered_rows() {
        let runner = SearchRunner::new(
            Arc::new(RecordingFetcher {
                requested: Mutex::new(Vec::new()),
            }),
            Arc::new(SourcesExtractor {
                sources: vec![ExtractedSource {
                    url: "community-spaces.example/list".to_string(),
                    title: "Community Spaces List".to_string(),
                    description: "regional directory".to_string(),
                }],
            }),
            "https://search.example/?q={query}".to_string(),
        );

        let yielded = runner.process(&search_row("community spaces")).await.expect("success");

        let FieldPatch::Search(patch) = &yielded.patch else {
            panic!("wrong patch shape")
        };
        assert_eq!(patch.returns, Some(SearchStatus::Completed));
        assert_eq!(yielded.discovered.len(), 1);
        let SheetRow::Source(source) = &yielded.discovered[0] else {
            panic!("expected a source")
        };
        assert_eq!(source.url, "https://community-spaces.example/list");
        assert_eq!(source.status, SourceStatus::New);
    }
}
