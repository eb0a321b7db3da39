use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use mostrador_core::domain::review::{Rating, Review, Sentiment};

use crate::handlers::{HandlerOutcome, TurnContext};
use crate::llm::{extract_json_object, CompletionRequest, LlmClient};
use crate::phrases;
use crate::response::{PromptLibrary, PromptTemplate, Reply};
use crate::text::{normalize, quantity_token, tokens};

const ANALYSIS_MAX_TOKENS: u32 = 60;
const DEFAULT_RATING: i64 = 3;

#[derive(Clone, Debug, Default, PartialEq)]
struct ReviewAnalysis {
    rating: Option<i64>,
    sentiment: Option<Sentiment>,
    is_complaint: bool,
}

/// Stores customer feedback. An explicit star count in the message wins; otherwise the
/// model scores it, and a neutral three stars is used when it cannot.
pub struct ReviewHandler {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLibrary>,
}

impl ReviewHandler {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<PromptLibrary>) -> Self {
        Self { llm, prompts }
    }

    pub async fn handle(&self, ctx: &TurnContext<'_>) -> HandlerOutcome {
        let analysis = match explicit_rating(&normalize(ctx.utterance)) {
            Some(stars) => ReviewAnalysis { rating: Some(i64::from(stars)), ..Default::default() },
            None => self.analyze(ctx).await,
        };

        let rating = Rating::clamped(analysis.rating.unwrap_or(DEFAULT_RATING));
        let sentiment = analysis.sentiment.unwrap_or_else(|| Sentiment::from_rating(rating));
        let review = Review::from_chat(
            ctx.tenant.id.clone(),
            ctx.conversation.id.clone(),
            rating,
            ctx.utterance,
            sentiment,
            analysis.is_complaint,
            ctx.now,
        );
        info!(
            event_name = "review.recorded",
            tenant_id = %ctx.tenant.id,
            conversation_id = %ctx.conversation.id,
            rating = rating.value(),
            sentiment = sentiment.as_str(),
            requires_attention = review.requires_attention,
            "review captured from chat"
        );

        let mut metadata = ctx.conversation.metadata.clone();
        if review.requires_attention {
            metadata.requires_attention = true;
        }
        let reply = Reply::Deterministic(phrases::review_thanks(rating, ctx.locale));
        HandlerOutcome { review: Some(review), ..HandlerOutcome::reply_only(reply, metadata) }
    }

    async fn analyze(&self, ctx: &TurnContext<'_>) -> ReviewAnalysis {
        let mut context = PromptLibrary::base_context(&ctx.tenant.voice, ctx.locale);
        context.insert("message", ctx.utterance);
        let prompt = match self.prompts.render(PromptTemplate::ReviewAnalysis, &context) {
            Ok(prompt) => prompt,
            Err(error) => {
                warn!(event_name = "review.template_failed", error = %error, "review prompt");
                return ReviewAnalysis::default();
            }
        };

        let request =
            CompletionRequest { prompt, max_tokens: ANALYSIS_MAX_TOKENS, temperature: 0.0 };
        match self.llm.complete(&request).await {
            Ok(reply) => {
                extract_json_object(&reply).map(|value| parse_analysis(&value)).unwrap_or_default()
            }
            Err(error) => {
                warn!(
                    event_name = "review.llm_degraded",
                    error = %error,
                    "review analysis failed, using neutral rating"
                );
                ReviewAnalysis::default()
            }
        }
    }
}

/// Star counts written out by the customer: `4/5`, `5 estrellas`, `una estrella`, `3 stars`.
fn explicit_rating(normalized: &str) -> Option<u8> {
    let words = tokens(normalized);
    words.iter().enumerate().find_map(|(index, token)| {
        if let Some(stars) = token.strip_suffix("/5") {
            return stars.parse::<u8>().ok().filter(|stars| (1..=5).contains(stars));
        }
        let next = words.get(index + 1)?;
        if !(next.starts_with("estrella") || next.starts_with("star")) {
            return None;
        }
        quantity_token(token)
            .and_then(|stars| u8::try_from(stars).ok())
            .filter(|stars| (1..=5).contains(stars))
    })
}

fn parse_analysis(value: &Value) -> ReviewAnalysis {
    ReviewAnalysis {
        rating: value.get("rating").and_then(|rating| {
            rating.as_i64().or_else(|| rating.as_f64().map(|stars| stars.round() as i64))
        }),
        sentiment: value.get("sentiment").and_then(Value::as_str).and_then(Sentiment::parse),
        is_complaint: value.get("is_complaint").and_then(Value::as_bool).unwrap_or(false),
    }
}
