//! Final reply rendering. Structured replies (order summaries, receipts, notices) are
//! deterministic text; free-form replies go through one completion call and fall back to
//! a fixed text when the model is unavailable.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use tera::{Context, Tera};
use thiserror::Error;
use tracing::warn;

use mostrador_core::domain::conversation::{Message, Sender};
use mostrador_core::domain::tenant::{Locale, TenantVoice};

use crate::llm::{CompletionRequest, LlmClient};
use crate::text::{normalize, tokens};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromptTemplate {
    Classify,
    Extract,
    ReviewAnalysis,
    FaqGrounded,
    FaqUngrounded,
    Complaint,
    General,
}

impl PromptTemplate {
    pub const ALL: [PromptTemplate; 7] = [
        PromptTemplate::Classify,
        PromptTemplate::Extract,
        PromptTemplate::ReviewAnalysis,
        PromptTemplate::FaqGrounded,
        PromptTemplate::FaqUngrounded,
        PromptTemplate::Complaint,
        PromptTemplate::General,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Classify => "classify.tera",
            Self::Extract => "extract.tera",
            Self::ReviewAnalysis => "review_analysis.tera",
            Self::FaqGrounded => "faq_grounded.tera",
            Self::FaqUngrounded => "faq_ungrounded.tera",
            Self::Complaint => "complaint.tera",
            Self::General => "general.tera",
        }
    }

    fn source(self) -> &'static str {
        match self {
            Self::Classify => include_str!("../../../templates/prompts/classify.tera"),
            Self::Extract => include_str!("../../../templates/prompts/extract.tera"),
            Self::ReviewAnalysis => include_str!("../../../templates/prompts/review_analysis.tera"),
            Self::FaqGrounded => include_str!("../../../templates/prompts/faq_grounded.tera"),
            Self::FaqUngrounded => include_str!("../../../templates/prompts/faq_ungrounded.tera"),
            Self::Complaint => include_str!("../../../templates/prompts/complaint.tera"),
            Self::General => include_str!("../../../templates/prompts/general.tera"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt template error: {0}")]
    Template(String),
}

/// Embedded prompt templates plus the `money` filter.
#[derive(Debug)]
pub struct PromptLibrary {
    tera: Tera,
}

impl PromptLibrary {
    pub fn embedded() -> Result<Self, PromptError> {
        let mut tera = Tera::default();
        tera.register_filter("money", tera_money_filter);
        for template in PromptTemplate::ALL {
            tera.add_raw_template(template.name(), template.source())
                .map_err(|error| PromptError::Template(error.to_string()))?;
        }
        Ok(Self { tera })
    }

    /// Context every template can rely on: tenant voice, reply language, locale.
    pub fn base_context(voice: &TenantVoice, locale: Locale) -> Context {
        let mut context = Context::new();
        context.insert("voice", voice);
        context.insert("locale", locale.as_str());
        context.insert("language", language_name(locale));
        context
    }

    pub fn render(
        &self,
        template: PromptTemplate,
        context: &Context,
    ) -> Result<String, PromptError> {
        self.tera
            .render(template.name(), context)
            .map_err(|error| PromptError::Template(error.to_string()))
    }
}

fn language_name(locale: Locale) -> &'static str {
    match locale {
        Locale::Es => "Spanish",
        Locale::En => "English",
    }
}

fn tera_money_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let amount = match value {
        Value::String(text) => Decimal::from_str(text)
            .map_err(|error| tera::Error::msg(format!("money filter: {error}")))?,
        Value::Number(number) => number
            .as_f64()
            .and_then(Decimal::from_f64)
            .ok_or_else(|| tera::Error::msg("money filter expects a finite number"))?,
        _ => return Err(tera::Error::msg("money filter expects a number or decimal string")),
    };
    let locale = args.get("locale").and_then(Value::as_str).map(Locale::parse).unwrap_or_default();
    Ok(Value::String(format_money(amount, locale)))
}

/// `$12.000` for Spanish, `$12,000` for English. Cents only appear when non-zero.
pub fn format_money(amount: Decimal, locale: Locale) -> String {
    let (thousands, decimal_mark) = match locale {
        Locale::Es => ('.', ','),
        Locale::En => (',', '.'),
    };

    let rounded = amount.round_dp(2);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    let text = rounded.abs().normalize().to_string();
    let (integer, fraction) = match text.split_once('.') {
        Some((integer, fraction)) => (integer.to_owned(), Some(format!("{fraction:0<2}"))),
        None => (text, None),
    };

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (index, digit) in integer.chars().enumerate() {
        if index > 0 && (integer.len() - index) % 3 == 0 {
            grouped.push(thousands);
        }
        grouped.push(digit);
    }

    match fraction {
        Some(fraction) => format!("{sign}${grouped}{decimal_mark}{fraction}"),
        None => format!("{sign}${grouped}"),
    }
}

const ENGLISH_MARKERS: &[&str] = &[
    "hello", "hi", "hey", "please", "thanks", "thank", "what", "how", "when", "where", "do",
    "you", "the", "is", "are", "can", "i", "i'd", "i'm", "my", "want", "would", "like", "yes",
    "add", "stars", "that's", "nothing", "else", "your", "have", "open",
];

const SPANISH_MARKERS: &[&str] = &[
    "hola", "quiero", "quisiera", "que", "por", "favor", "gracias", "el", "la", "los", "las",
    "de", "una", "un", "tienen", "cuanto", "donde", "si", "y", "con", "para", "es", "mi", "me",
    "dame", "estrellas", "nada", "buenas", "buenos", "agrega", "agregame",
];

/// Picks the reply language for one utterance; ties keep the tenant's locale.
pub fn detect_locale(utterance: &str, tenant_locale: Locale) -> Locale {
    let normalized = normalize(utterance);
    let words = tokens(&normalized);
    let english = words.iter().filter(|word| ENGLISH_MARKERS.contains(word)).count();
    let spanish = words.iter().filter(|word| SPANISH_MARKERS.contains(word)).count();

    if english > spanish {
        Locale::En
    } else if spanish > english {
        Locale::Es
    } else {
        tenant_locale
    }
}

/// History rows as template input.
pub fn history_context(history: &[Message]) -> Vec<HashMap<&'static str, String>> {
    history
        .iter()
        .map(|message| {
            let sender = match message.sender {
                Sender::User => "customer",
                Sender::Agent => "assistant",
            };
            HashMap::from([("sender", sender.to_owned()), ("text", message.text.clone())])
        })
        .collect()
}

/// What a handler wants said.
#[derive(Clone, Debug, PartialEq)]
pub enum Reply {
    /// Sent verbatim. Used for anything carrying numbers the user relies on.
    Deterministic(String),
    /// Rendered through a prompt template and one completion call; `fallback` is sent
    /// when the call fails.
    Synthesize { template: PromptTemplate, context: Context, fallback: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedReply {
    pub text: String,
    pub synthesized: bool,
}

pub struct ResponseGenerator {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLibrary>,
    max_tokens: u32,
    temperature: f32,
}

impl ResponseGenerator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        prompts: Arc<PromptLibrary>,
        max_tokens: u32,
        temperature: f32,
    ) -> Self {
        Self { llm, prompts, max_tokens, temperature }
    }

    pub async fn render(&self, reply: Reply, voice: &TenantVoice, locale: Locale) -> RenderedReply {
        let (template, mut context, fallback) = match reply {
            Reply::Deterministic(text) => return RenderedReply { text, synthesized: false },
            Reply::Synthesize { template, context, fallback } => (template, context, fallback),
        };

        context.extend(PromptLibrary::base_context(voice, locale));
        let prompt = match self.prompts.render(template, &context) {
            Ok(prompt) => prompt,
            Err(error) => {
                warn!(
                    event_name = "response.template_failed",
                    template = template.name(),
                    error = %error,
                    "prompt rendering failed, sending fallback reply"
                );
                return RenderedReply { text: fallback, synthesized: false };
            }
        };

        let request = CompletionRequest {
            prompt,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };
        match self.llm.complete(&request).await {
            Ok(text) => RenderedReply { text, synthesized: true },
            Err(error) => {
                warn!(
                    event_name = "response.llm_degraded",
                    template = template.name(),
                    error = %error,
                    "completion failed, sending fallback reply"
                );
                RenderedReply { text: fallback, synthesized: false }
            }
        }
    }
}
