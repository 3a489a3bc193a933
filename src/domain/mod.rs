//! Domain module - Core business types and collaborator contracts
//!
//! This module contains the typed row shapes, batch events, outreach
//! templates, and the gateway traits for every external collaborator.

pub mod entities;
pub mod events;
pub mod gateways;
pub mod templates;

// Re-export commonly used items
pub use entities::*;
pub use events::*;
pub use gateways::{
    DraftContent, EmailDraft, EmailService, ExtractedLead, ExtractedSource, FailureKind,
    FetchedPage, Fetcher, LeadAnnotation, LeadExtraction, SheetStore, StoreError, TextExtractor,
};
pub use templates::{BusinessType, EmailTemplate, classify_business, template_for};
