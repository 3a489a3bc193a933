//! Gateway interfaces to external collaborators
//!
//! Trait definitions for everything the engine talks to but does not own:
//! the spreadsheet store, the page fetcher, the AI text service, and the
//! email draft service. Concrete implementations live in the
//! infrastructure layer (or in test stubs).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::entities::{LeadRow, RowId, SheetRow, Tab};
use crate::domain::templates::EmailTemplate;

/// Structured failure signal raised by any collaborator call.
///
/// This is the single vocabulary the failure classifier understands;
/// gateway implementations are responsible for folding their transport
/// errors into it.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum FailureKind {
    #[error("DNS resolution failed for {host}")]
    Dns { host: String },

    #[error("TLS certificate failure: {detail}")]
    Tls { detail: String },

    #[error("connection refused by {host}")]
    ConnectionRefused { host: String },

    #[error("connection reset")]
    ConnectionReset,

    #[error("timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("HTTP status {status}")]
    HttpStatus { status: u16 },

    #[error("service quota exceeded: {detail}")]
    QuotaExceeded { detail: String },

    #[error("invalid input: {detail}")]
    InvalidInput { detail: String },

    #[error("{detail}")]
    Other { detail: String },
}

/// A fetched page: final status, decoded body, and the URL after redirects.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
    pub final_url: String,
}

impl FetchedPage {
    /// Whether the response carries a usable body.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Error raised by the external sheet store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("sheet store unavailable: {0}")]
    Unavailable(String),

    #[error("sheet store rejected {} row(s): {detail}", failed.len())]
    PartialWrite { failed: Vec<RowId>, detail: String },
}

/// The external spreadsheet, system of record for all tabs.
///
/// `write_rows` overwrites by row identity; `append_rows` adds new rows at
/// the end of the tab. Both are idempotent from the engine's point of
/// view: re-sending the same rows yields the same sheet state.
#[async_trait]
pub trait SheetStore: Send + Sync {
    async fn read_tab(&self, tab: Tab) -> Result<Vec<SheetRow>, StoreError>;
    async fn write_rows(&self, tab: Tab, rows: &[SheetRow]) -> Result<(), StoreError>;
    async fn append_rows(&self, tab: Tab, rows: &[SheetRow]) -> Result<(), StoreError>;
}

/// Outbound page fetcher.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches a URL, following redirects. Non-2xx statuses are returned
    /// as pages, not errors; transport failures map to a `FailureKind`.
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FailureKind>;
}

/// A contact extracted from a source page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedLead {
    pub url: String,
    pub phone: String,
    pub email: String,
}

/// An additional lead source discovered on a page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedSource {
    pub url: String,
    pub title: String,
    pub description: String,
}

/// Result of running lead extraction over page content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeadExtraction {
    pub leads: Vec<ExtractedLead>,
    pub sources: Vec<ExtractedSource>,
}

/// Result of re-verifying a single lead's pages.
///
/// Empty fields mean "nothing found"; the patch rules in the domain layer
/// keep blanks from clobbering operator-entered data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeadAnnotation {
    pub phone: String,
    pub email: String,
    pub notes: String,
}

/// Personalized draft content produced for one lead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftContent {
    pub subject: String,
    pub body_html: String,
}

/// The AI text service: turns raw page text into structured fields.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extracts contact leads and further sources from a source page.
    async fn extract_leads(&self, page: &FetchedPage) -> Result<LeadExtraction, FailureKind>;

    /// Re-reads a lead's site content and produces fresh contact fields
    /// and talking-point notes.
    async fn annotate_lead(
        &self,
        lead: &LeadRow,
        content: &str,
    ) -> Result<LeadAnnotation, FailureKind>;

    /// Personalizes an outreach template for one lead.
    async fn personalize_email(
        &self,
        lead: &LeadRow,
        template: &EmailTemplate,
    ) -> Result<DraftContent, FailureKind>;
}

/// A fully assembled draft handed to the email service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailDraft {
    pub to: String,
    pub subject: String,
    pub body_html: String,
    pub from_address: String,
}

/// The external email system. Draft creation is confirmed by id; the
/// engine marks a lead emailed only after that confirmation arrives.
#[async_trait]
pub trait EmailService: Send + Sync {
    async fn create_draft(&self, draft: &EmailDraft) -> Result<String, FailureKind>;
}
