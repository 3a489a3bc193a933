//! Source checker
//!
//! Fetches a source page, extracts contact leads and further sources via
//! the AI collaborator, and marks the source checked. Finding zero leads
//! on a reachable page is a valid business outcome, not a failure.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use crate::domain::entities::{
    FieldPatch, LeadRow, SheetRow, SourcePatch, SourceRow, SourceStatus, Tab,
};
use crate::domain::gateways::{FailureKind, Fetcher, TextExtractor};

use super::page;
use super::{ItemProcessor, ItemYield, ProcessorError, wrong_shape};

/// Processor that checks one source page for extractable leads.
pub struct SourceChecker {
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn TextExtractor>,
}

impl SourceChecker {
    /// Creates a source checker over the given collaborators.
    pub fn new(fetcher: Arc<dyn Fetcher>, extractor: Arc<dyn TextExtractor>) -> Self {
        Self { fetcher, extractor }
    }
}

#[async_trait]
impl ItemProcessor for SourceChecker {
    fn name(&self) -> &'static str {
        "SourceChecker"
    }

    fn tab(&self) -> Tab {
        Tab::Sources
    }

    async fn process(&self, row: &SheetRow) -> Result<ItemYield, ProcessorError> {
        let SheetRow::Source(source) = row else {
            return Err(wrong_shape("source", row));
        };

        let url = page::normalize_url(&source.url);
        let fetched = self.fetcher.fetch(&url).await?;
        if !fetched.is_success() {
            return Err(FailureKind::HttpStatus {
                status: fetched.status,
            }
            .into());
        }

        let title = page::page_title(&fetched.body);
        let extraction = self.extractor.extract_leads(&fetched).await?;
        debug!(
            "{}: {} lead(s), {} further source(s) extracted",
            url,
            extraction.leads.len(),
            extraction.sources.len()
        );

        let fallback_name = title.clone().unwrap_or_else(|| source.title.clone());
        let mut discovered = Vec::new();
        for lead in &extraction.leads {
            if lead.url.trim().is_empty() {
                continue;
            }
            let org_name = page::anchor_text_for(&fetched.body, &lead.url)
                .or_else(|| (!fallback_name.is_empty()).then(|| fallback_name.clone()))
                .unwrap_or_else(|| "Unknown Name".to_string());
            discovered.push(SheetRow::Lead(LeadRow {
                org_name,
                link: page::normalize_url(&lead.url),
                phone: lead.phone.clone(),
                email: lead.email.clone(),
                notes: String::new(),
                checked: false,
                emailed: false,
            }));
        }

        let date_found = Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        for further in &extraction.sources {
            if further.url.trim().is_empty() {
                continue;
            }
            let further_title = if further.title.is_empty() {
                page::anchor_text_for(&fetched.body, &further.url).unwrap_or_default()
            } else {
                further.title.clone()
            };
            discovered.push(SheetRow::Source(SourceRow {
                title: further_title,
                url: page::normalize_url(&further.url),
                description: further.description.clone(),
                date_found: date_found.clone(),
                status: SourceStatus::New,
                leads_found: 0,
            }));
        }

        let patch = FieldPatch::Source(SourcePatch {
            title,
            status: Some(SourceStatus::Checked),
            leads_found: Some(extraction.leads.len() as u32),
            annotation: None,
        });

        Ok(ItemYield { patch, discovered })
    }
}
