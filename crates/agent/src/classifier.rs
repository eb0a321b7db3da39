//! Intent classification: an ordered keyword pass that settles the common cases without a
//! model call, then a single completion for everything else.

use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, warn};

use mostrador_core::domain::conversation::Message;
use mostrador_core::domain::intent::Intent;
use mostrador_core::domain::product::Product;
use mostrador_core::domain::tenant::{Locale, TenantVoice};

use crate::extraction::{mentions_catalog, ADD_VERBS, ORDER_VERBS, REMOVE_VERBS};
use crate::llm::{CompletionRequest, LlmClient};
use crate::response::{history_context, PromptLibrary, PromptTemplate};
use crate::text::{contains_any, has_quantity, normalize, tokens};

const CLASSIFY_MAX_TOKENS: u32 = 10;
const SHORT_REPLY_TOKENS: usize = 6;

pub const CONFIRM_WORDS: &[&str] = &[
    "si", "yes", "confirmar", "confirmo", "confirm", "ok", "okay", "dale", "perfecto", "perfect",
    "correcto", "listo confirmo",
];

pub const REJECT_WORDS: &[&str] =
    &["no", "cambiar", "change", "modificar", "modify", "espera", "wait"];

pub const CANCEL_WORDS: &[&str] = &["cancelar", "cancela", "cancel", "anular", "anula"];

pub const CLOSURE_PHRASES: &[&str] = &[
    "eso es todo", "es todo", "nada mas", "that's all", "that is all", "nothing else", "listo",
    "terminar pedido", "eso seria todo", "eso seria", "seria todo", "done",
];

const COMPLAINT_VOCABULARY: &[&str] = &[
    "queja", "quejarme", "reclamo", "reclamar", "horrible", "terrible", "pesimo", "pesima",
    "mal servicio", "muy malo", "muy mala", "nunca llego", "no llego", "llego frio",
    "llego fria", "llego tarde", "llego mal", "asqueroso", "asquerosa", "decepcionado",
    "decepcionada", "pedido equivocado", "se equivocaron", "me cobraron de mas", "grosero",
    "complaint", "complain", "awful", "arrived cold", "never arrived", "arrived late",
    "disgusting", "wrong order", "disappointed", "rude", "worst",
];

const REVIEW_VOCABULARY: &[&str] = &[
    "estrella", "estrellas", "stars", "star", "resena", "review", "calificacion", "califico",
    "calificar", "delicioso", "deliciosa", "recomendado", "recomendable", "excelente",
    "excellent", "me encanto", "loved", "buenisimo", "buenisima", "exquisito", "exquisita",
    "muy rico", "muy rica", "great food", "amazing",
];

const FAQ_VOCABULARY: &[&str] = &[
    "horario", "horarios", "hora", "abren", "abre", "cierran", "cierra", "abierto", "abiertos",
    "ubicacion", "direccion", "donde estan", "donde quedan", "donde queda", "pago", "pagar",
    "metodos de pago", "tarjeta", "efectivo", "transferencia", "delivery", "despacho", "envio",
    "reparto", "alergenos", "alergeno", "gluten", "vegetariano", "vegetariana", "vegano",
    "vegana", "menu", "carta", "precio", "precios", "cuanto cuesta", "cuanto vale",
    "que tienen", "que venden", "productos", "recomiendas", "recomienda", "estacionamiento",
    "reserva", "reservar", "hours", "open", "close", "location", "address", "where are",
    "payment", "pay", "card", "cash", "allergens", "vegetarian", "vegan", "price", "prices",
    "how much", "what do you have", "recommend", "parking", "reservation",
];

const GREETINGS: &[&str] = &[
    "hola", "buenas", "buenos dias", "buenas tardes", "buenas noches", "hello", "hi", "hey",
    "gracias", "muchas gracias", "thanks", "thank you", "chao", "adios", "bye",
];

const MENU_WORDS: &[&str] = &["menu", "carta", "productos", "opciones", "options"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClassificationSource {
    Rules,
    Model,
    Fallback,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Classification {
    pub intent: Intent,
    pub source: ClassificationSource,
}

pub struct ClassifyInput<'a> {
    pub utterance: &'a str,
    pub history: &'a [Message],
    pub has_open_draft: bool,
    pub catalog: &'a [Product],
    pub voice: &'a TenantVoice,
    pub locale: Locale,
}

/// Word-level signals for a draft the customer is already building.
pub fn is_confirmation(normalized: &str) -> bool {
    tokens(normalized).len() <= SHORT_REPLY_TOKENS && contains_any(normalized, CONFIRM_WORDS)
}

pub fn is_rejection(normalized: &str) -> bool {
    tokens(normalized).len() <= SHORT_REPLY_TOKENS && contains_any(normalized, REJECT_WORDS)
}

pub fn is_cancellation(normalized: &str) -> bool {
    contains_any(normalized, CANCEL_WORDS)
}

pub fn is_closure(normalized: &str) -> bool {
    contains_any(normalized, CLOSURE_PHRASES)
}

fn has_explicit_rating(normalized: &str) -> bool {
    tokens(normalized)
        .iter()
        .any(|token| matches!(*token, "1/5" | "2/5" | "3/5" | "4/5" | "5/5"))
}

/// Keyword pass. `None` means the rules could not decide and the model should.
pub fn rule_pass(utterance: &str, has_open_draft: bool, catalog: &[Product]) -> Option<Intent> {
    let text = normalize(utterance);
    if text.is_empty() {
        return Some(Intent::Other);
    }

    if contains_any(&text, COMPLAINT_VOCABULARY) {
        return Some(Intent::Complaint);
    }

    if has_open_draft
        && (is_cancellation(&text)
            || is_closure(&text)
            || is_confirmation(&text)
            || is_rejection(&text))
    {
        return Some(Intent::OrderUpdate);
    }

    if contains_any(&text, REVIEW_VOCABULARY) || has_explicit_rating(&text) {
        return Some(Intent::Review);
    }

    let mentions_products = mentions_catalog(&text, catalog);
    let change_verbs = contains_any(&text, ADD_VERBS) || contains_any(&text, REMOVE_VERBS);

    if has_open_draft && (change_verbs || mentions_products || has_quantity(&text)) {
        return Some(Intent::OrderUpdate);
    }

    if contains_any(&text, ORDER_VERBS) && (mentions_products || has_quantity(&text)) {
        return Some(if has_open_draft { Intent::OrderUpdate } else { Intent::OrderCreate });
    }

    if contains_any(&text, FAQ_VOCABULARY) {
        return Some(Intent::Faq);
    }

    if contains_any(&text, GREETINGS) {
        return Some(Intent::Other);
    }

    None
}

/// Reads the model's answer; anything that is not one intent name becomes `other`.
pub fn parse_intent_reply(reply: &str) -> Option<Intent> {
    let first_line = reply.lines().map(str::trim).find(|line| !line.is_empty())?;
    let lowered = first_line.to_ascii_lowercase();
    let stripped = lowered.strip_prefix("intent:").unwrap_or(&lowered);
    let cleaned = stripped.trim().trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '_');

    if let Ok(intent) = Intent::from_str(cleaned) {
        return Some(intent);
    }

    let named: Vec<Intent> = Intent::ALL
        .into_iter()
        .filter(|intent| {
            cleaned
                .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
                .any(|word| word == intent.as_str())
        })
        .collect();
    match named.as_slice() {
        [intent] => Some(*intent),
        _ => None,
    }
}

/// An open draft changes what ambiguous messages mean: new-order requests and menu talk
/// become updates of the draft in progress.
pub fn apply_draft_context(
    intent: Intent,
    utterance: &str,
    has_open_draft: bool,
    catalog: &[Product],
) -> Intent {
    if !has_open_draft {
        return intent;
    }
    match intent {
        Intent::OrderCreate => Intent::OrderUpdate,
        Intent::Faq | Intent::Other => {
            let text = normalize(utterance);
            if contains_any(&text, MENU_WORDS) || mentions_catalog(&text, catalog) {
                Intent::OrderUpdate
            } else {
                intent
            }
        }
        other => other,
    }
}

pub struct IntentClassifier {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLibrary>,
}

impl IntentClassifier {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<PromptLibrary>) -> Self {
        Self { llm, prompts }
    }

    pub async fn classify(&self, input: &ClassifyInput<'_>) -> Classification {
        if let Some(intent) = rule_pass(input.utterance, input.has_open_draft, input.catalog) {
            debug!(event_name = "classifier.rules_matched", intent = %intent, "intent from rules");
            return Classification { intent, source: ClassificationSource::Rules };
        }

        let (intent, source) = match self.ask_model(input).await {
            Some(intent) => (intent, ClassificationSource::Model),
            None => (Intent::Other, ClassificationSource::Fallback),
        };
        let intent =
            apply_draft_context(intent, input.utterance, input.has_open_draft, input.catalog);
        debug!(event_name = "classifier.model_decided", intent = %intent, "intent from model");
        Classification { intent, source }
    }

    async fn ask_model(&self, input: &ClassifyInput<'_>) -> Option<Intent> {
        let mut context = PromptLibrary::base_context(input.voice, input.locale);
        context.insert("message", input.utterance);
        context.insert("history", &history_context(input.history));
        context.insert("has_open_draft", &input.has_open_draft);

        let prompt = match self.prompts.render(PromptTemplate::Classify, &context) {
            Ok(prompt) => prompt,
            Err(error) => {
                warn!(event_name = "classifier.template_failed", error = %error, "classify prompt");
                return None;
            }
        };

        let request =
            CompletionRequest { prompt, max_tokens: CLASSIFY_MAX_TOKENS, temperature: 0.0 };
        match self.llm.complete(&request).await {
            Ok(reply) => {
                let parsed = parse_intent_reply(&reply);
                if parsed.is_none() {
                    warn!(
                        event_name = "classifier.unparseable_reply",
                        reply_chars = reply.chars().count(),
                        "classifier reply named no intent, using other"
                    );
                }
                parsed
            }
            Err(error) => {
                warn!(
                    event_name = "classifier.llm_degraded",
                    error = %error,
                    "intent model call failed, using other"
                );
                None
            }
        }
    }
}
