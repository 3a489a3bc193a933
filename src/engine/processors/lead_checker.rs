//! Lead checker
//!
//! Re-verifies that a lead's site is reachable, gathers its landing page
//! plus a few same-domain contact/about pages, and regenerates contact
//! fields and talking-point notes via the AI collaborator. Extraction
//! only fills blanks: a manually entered phone or email is never
//! overwritten by an empty result.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::entities::{FieldPatch, LeadPatch, SheetRow, Tab};
use crate::domain::gateways::{FailureKind, Fetcher, TextExtractor};

use super::page;
use super::{ItemProcessor, ItemYield, ProcessorError, wrong_shape};

/// Processor that re-verifies one lead and refreshes its notes.
pub struct LeadChecker {
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn TextExtractor>,
    max_subpages: usize,
}

impl LeadChecker {
    /// Creates a lead checker over the given collaborators.
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn TextExtractor>,
        max_subpages: usize,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            max_subpages,
        }
    }
}

#[async_trait]
impl ItemProcessor for LeadChecker {
    fn name(&self) -> &'static str {
        "LeadChecker"
    }

    fn tab(&self) -> Tab {
        Tab::Leads
    }

    async fn process(&self, row: &SheetRow) -> Result<ItemYield, ProcessorError> {
        let SheetRow::Lead(lead) = row else {
            return Err(wrong_shape("lead", row));
        };
        if lead.link.trim().is_empty() {
            return Err(ProcessorError::from(FailureKind::InvalidInput {
                detail: "lead has no link".to_string(),
            }));
        }

        let url = page::normalize_url(&lead.link);
        let landing = self.fetcher.fetch(&url).await?;
        if !landing.is_success() {
            return Err(FailureKind::HttpStatus {
                status: landing.status,
            }
            .into());
        }

        // Landing page first, then up to a few contact/about pages.
        // Subpage failures are tolerated; the landing page already proved
        // the site reachable.
        let mut sections = vec![("landing".to_string(), page::visible_text(&landing.body))];
        let subpages = page::contact_about_links(&landing.body, &url, self.max_subpages);
        for link in subpages {
            match self.fetcher.fetch(&link.href).await {
                Ok(fetched) if fetched.is_success() => {
                    sections.push((link.text.to_lowercase(), page::visible_text(&fetched.body)));
                }
                Ok(fetched) => {
                    debug!("subpage {} returned HTTP {}", link.href, fetched.status);
                }
                Err(kind) => {
                    debug!("subpage {} failed: {}", link.href, kind);
                }
            }
        }

        let combined = sections
            .iter()
            .map(|(name, text)| format!("=== {} PAGE ===\n{}", name.to_uppercase(), text))
            .collect::<Vec<_>>()
            .join("\n");

        let annotation = self.extractor.annotate_lead(lead, &combined).await?;

        let patch = FieldPatch::Lead(LeadPatch {
            phone: (!annotation.phone.is_empty()).then(|| annotation.phone.clone()),
            email: (!annotation.email.is_empty()).then(|| annotation.email.clone()),
            notes: (!annotation.notes.is_empty()).then(|| page::bulletize(&annotation.notes)),
            checked: Some(true),
            emailed: None,
            annotation: None,
        });

        Ok(ItemYield::patch_only(patch))
    }
}
