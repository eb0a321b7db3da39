use tera::Context;
use tracing::info;

use mostrador_core::domain::review::{Rating, Review, Sentiment};

use crate::handlers::{HandlerOutcome, TurnContext};
use crate::phrases;
use crate::response::{history_context, PromptTemplate, Reply};

/// Flags the conversation for staff and files the message as a one-star review. The
/// order draft, if any, is left as it was.
#[derive(Clone, Debug, Default)]
pub struct ComplaintHandler;

impl ComplaintHandler {
    pub fn handle(&self, ctx: &TurnContext<'_>) -> HandlerOutcome {
        let mut metadata = ctx.conversation.metadata.clone();
        metadata.requires_attention = true;

        let review = Review::from_chat(
            ctx.tenant.id.clone(),
            ctx.conversation.id.clone(),
            Rating::clamped(1),
            ctx.utterance,
            Sentiment::Negative,
            true,
            ctx.now,
        );
        info!(
            event_name = "complaint.recorded",
            tenant_id = %ctx.tenant.id,
            conversation_id = %ctx.conversation.id,
            review_id = %review.id,
            "complaint flagged for attention"
        );

        let mut context = Context::new();
        context.insert("message", ctx.utterance);
        context.insert("history", &history_context(ctx.history));
        let reply = Reply::Synthesize {
            template: PromptTemplate::Complaint,
            context,
            fallback: phrases::complaint_apology(ctx.locale),
        };

        HandlerOutcome { review: Some(review), ..HandlerOutcome::reply_only(reply, metadata) }
    }
}
