use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tokio::task::JoinHandle;

use crate::enrich::{EnrichOutcome, EnrichmentPlan, Reconciler};
use crate::input::InputBox;
use crate::models::{ChatReply, MessageId};
use crate::render::ChatView;
use crate::transport::{ChatTransport, TranslationTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Sending,
}

#[derive(Debug)]
pub enum SubmitOutcome {
    /// Blank input; nothing rendered, nothing sent.
    Rejected,
    Answered {
        message: MessageId,
        enrichment: Option<JoinHandle<EnrichOutcome>>,
    },
    Failed {
        message: MessageId,
    },
}

/// Runs one chat round trip per submission against a shared view.
///
/// Must be driven from inside a `tokio::task::LocalSet`: translations are
/// spawned as local tasks so they never hold up rendering or the next
/// submission.
pub struct ConversationController<C, T> {
    view: Rc<RefCell<ChatView>>,
    chat: C,
    reconciler: Rc<Reconciler<T>>,
    in_flight: Cell<usize>,
}

impl<C, T> ConversationController<C, T>
where
    C: ChatTransport,
    T: TranslationTransport + 'static,
{
    pub fn new(view: Rc<RefCell<ChatView>>, chat: C, translator: T) -> Self {
        Self {
            view,
            chat,
            reconciler: Rc::new(Reconciler::new(translator)),
            in_flight: Cell::new(0),
        }
    }

    pub fn view(&self) -> Rc<RefCell<ChatView>> {
        Rc::clone(&self.view)
    }

    pub fn chat(&self) -> &C {
        &self.chat
    }

    pub fn reconciler(&self) -> &Reconciler<T> {
        &self.reconciler
    }

    pub fn phase(&self) -> Phase {
        if self.in_flight.get() == 0 {
            Phase::Idle
        } else {
            Phase::Sending
        }
    }

    /// Submits the draft in `input`, clearing it once the message is accepted.
    pub async fn submit_input(&self, input: &mut InputBox) -> SubmitOutcome {
        if input.value().trim().is_empty() {
            return SubmitOutcome::Rejected;
        }
        let text = input.value().to_string();
        input.clear();
        self.submit(&text).await
    }

    pub async fn submit(&self, text: &str) -> SubmitOutcome {
        let question = text.trim();
        if question.is_empty() {
            tracing::debug!("ignoring blank submission");
            return SubmitOutcome::Rejected;
        }

        let pending = {
            let mut view = self.view.borrow_mut();
            view.render_user(question);
            view.show_pending()
        };

        self.in_flight.set(self.in_flight.get() + 1);
        let result = self.chat.send(question.to_string()).await;
        self.in_flight.set(self.in_flight.get() - 1);

        self.view.borrow_mut().clear_pending(pending);

        match result {
            Ok(ChatReply {
                success: true,
                response: Some(response),
                docs,
                ..
            }) => {
                let (message, plan) = self.view.borrow_mut().render_assistant(
                    &response,
                    &docs.unwrap_or_default(),
                    question,
                );
                tracing::info!(
                    message_id = %message,
                    sources = plan.len(),
                    "assistant reply rendered"
                );
                SubmitOutcome::Answered {
                    message,
                    enrichment: self.spawn_enrichment(plan),
                }
            }
            Ok(ChatReply { success: true, .. }) => {
                tracing::error!("chat reply reported success without a response");
                self.fail(question)
            }
            Ok(reply) => {
                tracing::error!(
                    error = reply.error.as_deref().unwrap_or("unknown error"),
                    "chat request failed"
                );
                self.fail(question)
            }
            Err(err) => {
                tracing::error!("chat transport error: {err:#}");
                self.fail(question)
            }
        }
    }

    fn fail(&self, question: &str) -> SubmitOutcome {
        let message = self.view.borrow_mut().render_failure(question);
        SubmitOutcome::Failed { message }
    }

    fn spawn_enrichment(&self, plan: EnrichmentPlan) -> Option<JoinHandle<EnrichOutcome>> {
        if plan.is_empty() {
            return None;
        }
        let view = Rc::clone(&self.view);
        let reconciler = Rc::clone(&self.reconciler);
        Some(tokio::task::spawn_local(async move {
            reconciler.enrich(&view, plan).await
        }))
    }
}
