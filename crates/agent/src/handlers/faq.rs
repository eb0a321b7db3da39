use serde::Serialize;
use tera::Context;
use tracing::{debug, error, warn};

use mostrador_core::domain::retrieval::{Collection, RetrievalMatch};
use mostrador_core::domain::tenant::{Locale, Tenant};
use mostrador_core::errors::ApplicationError;

use crate::handlers::{HandlerOutcome, TurnContext};
use crate::phrases;
use crate::response::{history_context, PromptTemplate, Reply};
use crate::retrieval::{RetrievalError, RetrievalService};
use crate::text::{contains_any, normalize};

const LOCATION_WORDS: &[&str] =
    &["direccion", "donde", "ubicacion", "ubicados", "address", "where", "location"];
const PAYMENT_WORDS: &[&str] = &[
    "pago", "pagar", "tarjeta", "efectivo", "transferencia", "payment", "pay", "card", "cash",
];
const HOURS_WORDS: &[&str] =
    &["horario", "hora", "abren", "cierran", "abierto", "hours", "open", "close"];

const WEEK: [(&str, &str); 7] = [
    ("monday", "lunes"),
    ("tuesday", "martes"),
    ("wednesday", "miércoles"),
    ("thursday", "jueves"),
    ("friday", "viernes"),
    ("saturday", "sábado"),
    ("sunday", "domingo"),
];

#[derive(Clone, Debug, PartialEq, Serialize)]
struct Fact {
    text: String,
    source: &'static str,
}

/// Answers questions from retrieved FAQ and product passages plus the tenant's own
/// profile. With nothing relevant on file the reply says so instead of guessing.
pub struct FaqHandler {
    retrieval: RetrievalService,
}

impl FaqHandler {
    pub fn new(retrieval: RetrievalService) -> Self {
        Self { retrieval }
    }

    pub async fn handle(&self, ctx: &TurnContext<'_>) -> Result<HandlerOutcome, ApplicationError> {
        let matches = match self.retrieval.retrieve(&ctx.tenant.id, ctx.utterance).await {
            Ok(matches) => matches,
            Err(RetrievalError::Embedding(error)) => {
                warn!(
                    event_name = "faq.retrieval_degraded",
                    tenant_id = %ctx.tenant.id,
                    error = %error,
                    "embedding failed, answering without reference facts"
                );
                Vec::new()
            }
            Err(RetrievalError::Store(error)) => {
                error!(
                    event_name = "faq.retrieval_failed",
                    tenant_id = %ctx.tenant.id,
                    error = %error,
                    "vector store read failed"
                );
                return Err(ApplicationError::Persistence(error.to_string()));
            }
        };

        let mut facts = profile_facts(ctx.tenant, &normalize(ctx.utterance), ctx.locale);
        facts.extend(
            matches.iter().map(|found| Fact { text: found.text.clone(), source: "retrieval" }),
        );
        debug!(
            event_name = "faq.facts_collected",
            tenant_id = %ctx.tenant.id,
            retrieved = matches.len(),
            facts = facts.len(),
            "faq grounding collected"
        );

        let mut context = Context::new();
        context.insert("message", ctx.utterance);
        context.insert("history", &history_context(ctx.history));

        let metadata = ctx.conversation.metadata.clone();
        if facts.is_empty() {
            let reply = Reply::Synthesize {
                template: PromptTemplate::FaqUngrounded,
                context,
                fallback: phrases::no_information(ctx.locale),
            };
            return Ok(HandlerOutcome {
                grounded: Some(false),
                ..HandlerOutcome::reply_only(reply, metadata)
            });
        }

        let fallback = fallback_answer(&facts, &matches);
        context.insert("facts", &facts);
        let reply = Reply::Synthesize { template: PromptTemplate::FaqGrounded, context, fallback };
        Ok(HandlerOutcome { grounded: Some(true), ..HandlerOutcome::reply_only(reply, metadata) })
    }
}

/// Address, payment methods and opening hours, included only when the question asks
/// about them and the tenant has them configured.
fn profile_facts(tenant: &Tenant, normalized: &str, locale: Locale) -> Vec<Fact> {
    let mut facts = Vec::new();

    let asks_location = contains_any(normalized, LOCATION_WORDS);
    if let Some(address) = tenant.address.as_deref().filter(|_| asks_location) {
        let label = match locale {
            Locale::Es => "Dirección",
            Locale::En => "Address",
        };
        facts.push(Fact { text: format!("{label}: {address}"), source: "tenant" });
    }

    if !tenant.payment_methods.is_empty() && contains_any(normalized, PAYMENT_WORDS) {
        let label = match locale {
            Locale::Es => "Medios de pago",
            Locale::En => "Payment methods",
        };
        facts.push(Fact {
            text: format!("{label}: {}", tenant.payment_methods.join(", ")),
            source: "tenant",
        });
    }

    if tenant.business_hours.is_configured() && contains_any(normalized, HOURS_WORDS) {
        facts.push(Fact { text: hours_fact(tenant, locale), source: "tenant" });
    }

    facts
}

fn hours_fact(tenant: &Tenant, locale: Locale) -> String {
    let days: Vec<String> = WEEK
        .iter()
        .filter_map(|(key, spanish)| {
            let spec = tenant.business_hours.for_day(key)?;
            Some(match locale {
                Locale::Es if spec.trim().eq_ignore_ascii_case("closed") => {
                    format!("{spanish} cerrado")
                }
                Locale::Es => format!("{spanish} {spec}"),
                Locale::En => format!("{key} {spec}"),
            })
        })
        .collect();
    match locale {
        Locale::Es => format!("Horario de atención: {}", days.join("; ")),
        Locale::En => format!("Opening hours: {}", days.join("; ")),
    }
}

/// Plain answer used when the completion call fails: a profile fact if one applied,
/// otherwise the best FAQ answer, otherwise the best product passage.
fn fallback_answer(facts: &[Fact], matches: &[RetrievalMatch]) -> String {
    if let Some(fact) = facts.iter().find(|fact| fact.source == "tenant") {
        return fact.text.clone();
    }
    match matches.first() {
        Some(found) if found.collection == Collection::Faq => found
            .text
            .split_once('\n')
            .map_or_else(|| found.text.clone(), |(_, answer)| answer.trim().to_owned()),
        Some(found) => found.text.lines().collect::<Vec<_>>().join(" · "),
        None => String::new(),
    }
}
