use std::cell::RefCell;

use crate::models::{MessageId, TranslateRequest, Translation};
use crate::popup::PopupKey;
use crate::render::ChatView;
use crate::transport::TranslationTransport;

/// Documents of one rendered reply in attachment order. `documents[i]` was
/// attached to the popup `slots[i]`; translations come back in the same
/// order and carry no other key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentPlan {
    pub message: MessageId,
    pub question: String,
    pub documents: Vec<String>,
    pub slots: Vec<PopupKey>,
}

impl EnrichmentPlan {
    pub fn new(message: MessageId, question: &str) -> Self {
        Self {
            message,
            question: question.to_string(),
            documents: Vec::new(),
            slots: Vec::new(),
        }
    }

    pub fn push(&mut self, document: String, slot: PopupKey) {
        self.documents.push(document);
        self.slots.push(slot);
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn request(&self) -> TranslateRequest {
        TranslateRequest {
            question: self.question.clone(),
            documents: self.documents.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichOutcome {
    Skipped,
    Patched(usize),
    Failed,
}

/// Writes translation `i` into the popup at `plan.slots[i]`. Positions whose
/// popup is gone are skipped, as are translations beyond the plan.
pub fn apply_translations(
    view: &mut ChatView,
    plan: &EnrichmentPlan,
    translations: &[Translation],
) -> usize {
    if translations.len() != plan.len() {
        tracing::warn!(
            message_id = %plan.message,
            expected = plan.len(),
            received = translations.len(),
            "translation count does not match documents"
        );
    }

    let mut patched = 0;
    for (translated, slot) in translations.iter().zip(&plan.slots) {
        if view.patch_popup_content(*slot, &translated.translation) {
            patched += 1;
        }
    }
    patched
}

pub struct Reconciler<T> {
    transport: T,
}

impl<T: TranslationTransport> Reconciler<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Requests translations for `plan` and patches the popups in `view`.
    /// Failures leave the original content in place and are only logged.
    pub async fn enrich(&self, view: &RefCell<ChatView>, plan: EnrichmentPlan) -> EnrichOutcome {
        if plan.is_empty() {
            return EnrichOutcome::Skipped;
        }

        let response = match self.transport.translate(plan.request()).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(message_id = %plan.message, "translation request failed: {err:#}");
                return EnrichOutcome::Failed;
            }
        };

        let Some(translations) = response.translations else {
            tracing::warn!(message_id = %plan.message, "translation response had no translations");
            return EnrichOutcome::Failed;
        };

        let patched = apply_translations(&mut view.borrow_mut(), &plan, &translations);
        tracing::debug!(message_id = %plan.message, patched, "popup content translated");
        EnrichOutcome::Patched(patched)
    }
}
