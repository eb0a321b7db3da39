//! Deterministic stand-ins for the model capabilities, shared by unit and integration tests
//! and by `mostrador chat --offline`.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::embedding::{l2_normalize, Embedder};
use crate::llm::{CompletionRequest, LlmClient, LlmError};
use crate::text::{normalize, tokens};

#[derive(Clone, Debug)]
struct Rule {
    fragment: String,
    reply: Result<String, LlmError>,
}

/// Replies keyed by prompt fragment: the first rule whose fragment appears in the prompt
/// answers. Prompts that match nothing get the default reply, or `Unavailable` if none.
#[derive(Clone, Debug, Default)]
pub struct ScriptedLlm {
    rules: Vec<Rule>,
    default_reply: Option<String>,
    calls: Arc<AtomicUsize>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails as if the provider were down.
    pub fn unavailable() -> Self {
        Self::new()
    }

    pub fn on(mut self, fragment: impl Into<String>, reply: impl Into<String>) -> Self {
        self.rules.push(Rule { fragment: fragment.into(), reply: Ok(reply.into()) });
        self
    }

    pub fn fail_on(mut self, fragment: impl Into<String>, error: LlmError) -> Self {
        self.rules.push(Rule { fragment: fragment.into(), reply: Err(error) });
        self
    }

    pub fn with_default(mut self, reply: impl Into<String>) -> Self {
        self.default_reply = Some(reply.into());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap_or_else(PoisonError::into_inner).push(request.prompt.clone());

        if let Some(rule) = self.rules.iter().find(|rule| request.prompt.contains(&rule.fragment))
        {
            return rule.reply.clone();
        }

        self.default_reply
            .clone()
            .ok_or_else(|| LlmError::Unavailable("no scripted reply for prompt".to_owned()))
    }
}

/// Keyword groups, one vector dimension each. Tokens count toward a group when they start
/// with one of its stems.
const KEYWORD_GROUPS: &[&[&str]] = &[
    &["horario", "hora", "abre", "abrimos", "abierto", "cierra", "hours", "open", "close"],
    &["delivery", "despacho", "envio", "reparto"],
    &["pago", "pagar", "tarjeta", "efectivo", "transferencia", "payment", "card", "cash"],
    &["direccion", "ubicacion", "ubicados", "donde", "address", "location"],
    &["gluten", "alergen", "vegetarian", "vegano", "vegan", "celiac"],
    &["pizza"],
    &["pasta", "lasagna", "ravioli", "fettuccine"],
    &["bebida", "agua", "jugo", "gaseosa", "coca", "drink", "limonada", "cafe", "espresso"],
    &["postre", "tiramisu", "helado", "dessert", "torta", "kuchen"],
    &["sushi", "roll", "sashimi", "nigiri", "maki"],
    &["carne", "asado", "lomo", "parrilla", "bife", "chorizo", "empanada"],
    &["pan", "marraqueta", "hallulla", "croissant", "bread"],
    &["leche", "arroz", "aceite", "azucar", "huevo"],
    &["reserva", "mesa", "booking"],
    &["menu", "carta", "precio", "cuesta", "price"],
];

pub const KEYWORD_DIMENSIONS: usize = KEYWORD_GROUPS.len();

/// Bag-of-keywords embedder: texts sharing vocabulary land close together, texts with
/// no known keyword embed to the zero vector and match nothing.
#[derive(Debug, Default)]
pub struct KeywordEmbedder {
    failing: AtomicBool,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn vectorize(text: &str) -> Vec<f32> {
        let normalized = normalize(text);
        let mut vector = vec![0.0_f32; KEYWORD_DIMENSIONS];
        for token in tokens(&normalized) {
            for (dimension, stems) in KEYWORD_GROUPS.iter().enumerate() {
                if stems.iter().any(|stem| token.starts_with(stem)) {
                    vector[dimension] += 1.0;
                }
            }
        }
        l2_normalize(vector)
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model(&self) -> &str {
        "keyword-test"
    }

    fn dimensions(&self) -> usize {
        KEYWORD_DIMENSIONS
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LlmError::Timeout("keyword embedder set to fail".to_owned()));
        }
        Ok(Self::vectorize(text))
    }
}

#[cfg(test)]
mod tests {
    use super::{KeywordEmbedder, ScriptedLlm};
    use crate::embedding::Embedder;
    use crate::llm::{CompletionRequest, LlmClient, LlmError};

    fn request(prompt: &str) -> CompletionRequest {
        CompletionRequest { prompt: prompt.to_owned(), max_tokens: 10, temperature: 0.0 }
    }

    #[tokio::test]
    async fn first_matching_fragment_wins_and_calls_are_counted() {
        let llm = ScriptedLlm::new()
            .on("classify", "faq")
            .fail_on("extract", LlmError::Timeout("slow".to_owned()))
            .with_default("hola");

        assert_eq!(llm.complete(&request("please classify this")).await, Ok("faq".to_owned()));
        assert!(llm.complete(&request("extract lines")).await.is_err());
        assert_eq!(llm.complete(&request("anything")).await, Ok("hola".to_owned()));
        assert_eq!(llm.calls(), 3);
        assert_eq!(llm.prompts().len(), 3);
    }

    #[tokio::test]
    async fn unavailable_llm_always_fails() {
        let llm = ScriptedLlm::unavailable();
        let error = llm.complete(&request("hola")).await.expect_err("no replies");
        assert!(error.is_transient());
    }

    #[tokio::test]
    async fn keyword_vectors_share_vocabulary() {
        let embedder = KeywordEmbedder::new();
        let hours = embedder.embed("¿A qué hora abren?").await.expect("embed");
        let unknown = embedder.embed("estacionamiento").await.expect("embed");
        assert!(hours[0] > 0.99);
        assert!(unknown.iter().all(|value| *value == 0.0));

        embedder.set_failing(true);
        assert!(embedder.embed("horario").await.is_err());
    }
}
