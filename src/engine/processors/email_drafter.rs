//! Email drafter
//!
//! Builds a personalized outreach draft for one lead and submits it to
//! the email collaborator. The lead is marked emailed only after the
//! collaborator confirms draft creation; a request that may still fail
//! never marks an item done.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::domain::entities::{FieldPatch, LeadPatch, SheetRow, Tab};
use crate::domain::gateways::{EmailDraft, EmailService, FailureKind, TextExtractor};
use crate::domain::templates::{classify_business, template_for};

use super::page;
use super::{ItemProcessor, ItemYield, ProcessorError, wrong_shape};

/// Processor that drafts one outreach email per lead.
pub struct EmailDrafter {
    extractor: Arc<dyn TextExtractor>,
    email_service: Arc<dyn EmailService>,
    from_address: String,
}

impl EmailDrafter {
    /// Creates an email drafter over the given collaborators.
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        email_service: Arc<dyn EmailService>,
        from_address: String,
    ) -> Self {
        Self {
            extractor,
            email_service,
            from_address,
        }
    }
}

#[async_trait]
impl ItemProcessor for EmailDrafter {
    fn name(&self) -> &'static str {
        "EmailDrafter"
    }

    fn tab(&self) -> Tab {
        Tab::Leads
    }

    async fn process(&self, row: &SheetRow) -> Result<ItemYield, ProcessorError> {
        let SheetRow::Lead(lead) = row else {
            return Err(wrong_shape("lead", row));
        };

        // A missing or malformed address can never succeed; fail before
        // spending a collaborator call.
        if !page::is_valid_email(&lead.email) {
            return Err(ProcessorError::from(FailureKind::InvalidInput {
                detail: format!("no valid email address for '{}'", lead.org_name),
            }));
        }

        let business_type = classify_business(&lead.org_name, &lead.notes);
        let template = template_for(business_type);
        let content = self.extractor.personalize_email(lead, &template).await?;

        let draft = EmailDraft {
            to: lead.email.clone(),
            subject: content.subject,
            body_html: content.body_html,
            from_address: self.from_address.clone(),
        };
        let draft_id = self.email_service.create_draft(&draft).await?;
        info!(
            "Draft {} created for '{}' ({})",
            draft_id, lead.org_name, business_type
        );

        // Only a confirmed draft id flips the emailed flag.
        let patch = FieldPatch::Lead(LeadPatch {
            emailed: Some(true),
            ..Default::default()
        });

        Ok(ItemYield::patch_only(patch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::LeadRow;
    use crate::domain::gateways::{
        DraftContent, FetchedPage, LeadAnnotation, LeadExtraction,
    };
    use crate::domain::templates::EmailTemplate;
    use std::sync::Mutex;

    struct EchoExtractor;

    #[async_trait]
    impl TextExtractor for EchoExtractor {
        async fn extract_leads(&self, _page: &FetchedPage) -> Result<LeadExtraction, FailureKind> {
            Ok(LeadExtraction::default())
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
            lead: &LeadRow,
            template: &EmailTemplate,
        ) -> Result<DraftContent, FailureKind> {
            Ok(DraftContent {
                subject: template.subject.replace("{business_name}", &lead.org_name),
                body_html: format!("<p>{}</p>", template.pitch),
            })
        }
    }

    #[derive(Default)]
    struct RecordingEmailService {
        drafts: Mutex<Vec<EmailDraft>>,
        fail_with: Option<FailureKind>,
    }

    #[async_trait]
    impl EmailService for RecordingEmailService {
        async fn create_draft(&self, draft: &EmailDraft) -> Result<String, FailureKind> {
            if let Some(kind) = &self.fail_with {
                return Err(kind.clone());
            }
            self.drafts.lock().unwrap().push(draft.clone());
            Ok(format!("draft-{}", self.drafts.lock().unwrap().len()))
        }
    }

    fn lead(email: &str) -> SheetRow {
        SheetRow::Lead(LeadRow {
            org_name: "Hilltop Coworking".to_string(),
            link: "https://hilltop.example".to_string(),
            phone: String::new(),
            email: email.to_string(),
            notes: "shared office desks and meeting rooms".to_string(),
            checked: true,
            emailed: false,
        })
    }

    #[tokio::test]
    async fn confirmed_draft_marks_lead_emailed() {
        let service = Arc::new(RecordingEmailService::default());
        let drafter = EmailDrafter::new(
            Arc::new(EchoExtractor),
            service.clone(),
            "outreach@example.com".to_string(),
        );

        let yielded = drafter
            .process(&lead("owner@hilltop.example"))
            .await
            .expect("draft created");

        let FieldPatch::Lead(patch) = yielded.patch else {
            panic!("wrong patch shape")
        };
        assert_eq!(patch.emailed, Some(true));

        let drafts = service.drafts.lock().unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].to, "owner@hilltop.example");
        assert_eq!(drafts[0].subject, "Digital Third Place for Hilltop Coworking");
        assert_eq!(drafts[0].from_address, "outreach@example.com");
    }

    #[tokio::test]
    async fn invalid_address_fails_without_collaborator_calls() {
        let service = Arc::new(RecordingEmailService::default());
        let drafter = EmailDrafter::new(
            Arc::new(EchoExtractor),
            service.clone(),
            "outreach@example.com".to_string(),
        );

        let error = drafter.process(&lead("not-an-email")).await.expect_err("invalid");
        assert!(matches!(error.kind, FailureKind::InvalidInput { .. }));
        assert!(service.drafts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_draft_creation_never_marks_emailed() {
        let service = Arc::new(RecordingEmailService {
            drafts: Mutex::new(Vec::new()),
            fail_with: Some(FailureKind::QuotaExceeded {
                detail: "daily draft cap".to_string(),
            }),
        });
        let drafter = EmailDrafter::new(
            Arc::new(EchoExtractor),
            service,
            "outreach@example.com".to_string(),
        );

        let error = drafter
            .process(&lead("owner@hilltop.example"))
            .await
            .expect_err("quota failure propagates");
        assert!(matches!(error.kind, FailureKind::QuotaExceeded { .. }));
    }
}
