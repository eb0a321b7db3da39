use tera::Context;

use crate::handlers::{HandlerOutcome, TurnContext};
use crate::phrases;
use crate::response::{history_context, PromptTemplate, Reply};

/// Greetings and small talk. The fallback lists what the assistant can do.
#[derive(Clone, Debug, Default)]
pub struct GeneralHandler;

impl GeneralHandler {
    pub fn handle(&self, ctx: &TurnContext<'_>) -> HandlerOutcome {
        let mut context = Context::new();
        context.insert("message", ctx.utterance);
        context.insert("history", &history_context(ctx.history));
        let reply = Reply::Synthesize {
            template: PromptTemplate::General,
            context,
            fallback: phrases::capabilities(&ctx.tenant.voice.display_name, ctx.locale),
        };
        HandlerOutcome::reply_only(reply, ctx.conversation.metadata.clone())
    }
}
