//! Turns an order utterance into catalog-constrained line changes.
//!
//! The model is asked first for structured JSON. When it fails, replies with something
//! unusable, or names nothing that exists in the catalog, a deterministic matcher runs
//! over the normalized text. Either way only product ids from the tenant's catalog
//! survive.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use mostrador_core::domain::order::OrderDraft;
use mostrador_core::domain::product::{Product, ProductId};
use mostrador_core::domain::tenant::{Locale, TenantVoice};

use crate::llm::{extract_json_object, CompletionRequest, LlmClient};
use crate::response::{PromptLibrary, PromptTemplate};
use crate::text::{contains_any, contains_phrase, normalize, quantity_token, same_word, tokens};

const EXTRACTION_MAX_TOKENS: u32 = 300;

pub const REMOVE_VERBS: &[&str] = &[
    "quita", "quitar", "quitame", "saca", "sacar", "sacame", "elimina", "eliminar", "borra",
    "remove", "take out", "drop",
];

pub const ADD_VERBS: &[&str] = &[
    "agrega", "agregar", "agregame", "anade", "anadir", "anademe", "suma", "sumale", "tambien",
    "ademas", "add", "also", "plus",
];

pub const SET_VERBS: &[&str] = &["mejor", "cambia", "cambiar", "deja", "dejalo", "make it"];

pub const ORDER_VERBS: &[&str] = &[
    "quiero", "quisiera", "pedir", "pido", "dame", "deme", "ordenar", "comprar", "llevo",
    "me das", "me da", "order", "i want", "i'd like", "i would like", "give me", "get me",
];

/// Category words customers use that do not spell the catalog's category name.
const CATEGORY_SYNONYMS: &[(&str, &str)] = &[
    ("bebida", "bebidas"),
    ("algo de tomar", "bebidas"),
    ("para tomar", "bebidas"),
    ("drink", "bebidas"),
    ("postre", "postres"),
    ("algo dulce", "postres"),
    ("dessert", "postres"),
];

const NAME_STOPWORDS: &[&str] = &["con", "del", "los", "las", "por", "para", "casa", "the"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineAction {
    Add,
    Remove,
    Set,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineRequest {
    pub product_id: ProductId,
    /// `None` only for removals, meaning the whole line.
    pub quantity: Option<u32>,
    pub action: LineAction,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtractionSource {
    Model,
    Rules,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Extraction {
    pub requests: Vec<LineRequest>,
    pub source: ExtractionSource,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

pub struct OrderExtractor {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLibrary>,
}

impl OrderExtractor {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<PromptLibrary>) -> Self {
        Self { llm, prompts }
    }

    pub async fn extract(
        &self,
        utterance: &str,
        catalog: &[Product],
        draft: Option<&OrderDraft>,
        voice: &TenantVoice,
        locale: Locale,
    ) -> Extraction {
        if catalog.is_empty() {
            return Extraction { requests: Vec::new(), source: ExtractionSource::Rules };
        }

        if let Some(requests) = self.ask_model(utterance, catalog, draft, voice, locale).await {
            if !requests.is_empty() {
                return Extraction { requests, source: ExtractionSource::Model };
            }
        }

        let requests = match_catalog(utterance, catalog);
        debug!(
            event_name = "extraction.rules_applied",
            lines = requests.len(),
            "deterministic order extraction"
        );
        Extraction { requests, source: ExtractionSource::Rules }
    }

    async fn ask_model(
        &self,
        utterance: &str,
        catalog: &[Product],
        draft: Option<&OrderDraft>,
        voice: &TenantVoice,
        locale: Locale,
    ) -> Option<Vec<LineRequest>> {
        let mut context = PromptLibrary::base_context(voice, locale);
        context.insert("message", utterance);
        context.insert("catalog", catalog);
        context.insert("draft_lines", draft.map(OrderDraft::lines).unwrap_or(&[]));

        let prompt = match self.prompts.render(PromptTemplate::Extract, &context) {
            Ok(prompt) => prompt,
            Err(error) => {
                warn!(event_name = "extraction.template_failed", error = %error, "extract prompt");
                return None;
            }
        };

        let request =
            CompletionRequest { prompt, max_tokens: EXTRACTION_MAX_TOKENS, temperature: 0.0 };
        let reply = match self.llm.complete(&request).await {
            Ok(reply) => reply,
            Err(error) => {
                warn!(
                    event_name = "extraction.llm_degraded",
                    error = %error,
                    "order extraction model call failed, using rules"
                );
                return None;
            }
        };

        let parsed =
            extract_json_object(&reply).and_then(|value| parse_model_items(&value, catalog));
        if parsed.is_none() {
            warn!(
                event_name = "extraction.malformed_reply",
                reply_chars = reply.chars().count(),
                "order extraction reply was not usable JSON, using rules"
            );
        }
        parsed
    }
}

/// Reads `{"items":[{"product_id","quantity","action"}]}`. Unknown products and
/// non-positive add/set quantities are dropped; a missing `items` array is malformed.
pub fn parse_model_items(value: &Value, catalog: &[Product]) -> Option<Vec<LineRequest>> {
    let items = value.get("items")?.as_array()?;
    let mut requests = Vec::new();

    for item in items {
        let Some(product_id) = item.get("product_id").and_then(Value::as_str) else {
            continue;
        };
        let Some(product) = catalog.iter().find(|product| product.id.0 == product_id) else {
            debug!(event_name = "extraction.unknown_product", product_id, "dropping entry");
            continue;
        };

        let action = match item.get("action").and_then(Value::as_str).map(str::to_ascii_lowercase)
        {
            Some(action) if action == "remove" => LineAction::Remove,
            Some(action) if action == "set" => LineAction::Set,
            _ => LineAction::Add,
        };
        let quantity = item.get("quantity").and_then(read_quantity);

        let quantity = match (action, quantity) {
            (LineAction::Remove, Some(0)) | (LineAction::Remove, None) => None,
            (LineAction::Remove, Some(units)) => Some(units),
            (LineAction::Add, None) => Some(1),
            (_, Some(units)) if units >= 1 => Some(units),
            _ => continue,
        };

        let product_id = product.id.clone();
        push_merged(&mut requests, LineRequest { product_id, quantity, action });
    }

    Some(requests)
}

fn read_quantity(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => {
            let units = number.as_i64().or_else(|| number.as_f64().map(|units| units as i64))?;
            u32::try_from(units.max(0)).ok()
        }
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn push_merged(requests: &mut Vec<LineRequest>, request: LineRequest) {
    let existing = requests
        .iter_mut()
        .find(|line| line.product_id == request.product_id && line.action == request.action);
    match existing {
        Some(line) => {
            line.quantity = match (line.action, line.quantity, request.quantity) {
                (LineAction::Set, _, latest) => latest,
                (_, Some(left), Some(right)) => Some(left.saturating_add(right)),
                _ => None,
            };
        }
        None => requests.push(request),
    }
}

/// Deterministic matcher over accent-folded text.
pub fn match_catalog(utterance: &str, catalog: &[Product]) -> Vec<LineRequest> {
    let whole = normalize(utterance);
    let has_order_verb = contains_any(&whole, ORDER_VERBS) || contains_any(&whole, ADD_VERBS);
    let mut requests = Vec::new();
    let mut action = LineAction::Add;

    for segment in segments(utterance) {
        if contains_any(&segment, REMOVE_VERBS) || segment.starts_with("sin ") {
            action = LineAction::Remove;
        } else if contains_any(&segment, ADD_VERBS) || contains_any(&segment, ORDER_VERBS) {
            action = LineAction::Add;
        } else if contains_any(&segment, SET_VERBS) && action != LineAction::Remove {
            action = LineAction::Set;
        }

        let (product, rest) = match best_product(&segment, catalog) {
            Some((product, rest)) => (product, rest),
            None => {
                let explicit_quantity = segment_quantity(&segment).is_some();
                let wants_category = explicit_quantity || has_order_verb;
                match mentioned_category(&segment, catalog) {
                    Some(category) if wants_category => {
                        match cheapest_in_category(catalog, &category) {
                            Some(product) => (product, segment.clone()),
                            None => continue,
                        }
                    }
                    _ => continue,
                }
            }
        };

        let quantity = match (action, segment_quantity(&rest)) {
            (LineAction::Remove, quantity) => quantity.filter(|units| *units > 0),
            (_, Some(units)) if units > 0 => Some(units),
            (LineAction::Set, _) => continue,
            (_, _) => Some(1),
        };
        let product_id = product.id.clone();
        push_merged(&mut requests, LineRequest { product_id, quantity, action });
    }

    requests
}

fn segments(utterance: &str) -> Vec<String> {
    utterance
        .split([',', ';', '\n', '+'])
        .flat_map(|piece| {
            let normalized = normalize(piece);
            let padded = format!(" {normalized} ");
            padded
                .split(" y ")
                .flat_map(|part| part.split(" and "))
                .flat_map(|part| part.split(" e "))
                .map(|part| part.trim().to_owned())
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
        })
        .collect()
}

fn segment_quantity(segment: &str) -> Option<u32> {
    tokens(segment).into_iter().find_map(quantity_token)
}

fn name_tokens(name: &str) -> Vec<String> {
    let normalized = normalize(name);
    tokens(&normalized)
        .into_iter()
        .filter(|token| token.len() >= 3 && !NAME_STOPWORDS.contains(token))
        .filter(|token| quantity_token(token).is_none())
        .map(str::to_owned)
        .collect()
}

/// Highest scoring product for one segment, with the segment minus the matched name so
/// digits inside names (`1.5L`) are not read as quantities. Ties keep catalog order.
fn best_product<'a>(segment: &str, catalog: &'a [Product]) -> Option<(&'a Product, String)> {
    let segment_tokens = tokens(segment);
    let mut best: Option<(usize, &Product, String)> = None;

    for product in catalog {
        let name = normalize(&product.name);
        let (score, rest) = if contains_phrase(segment, &name) {
            let rest = format!(" {segment} ").replacen(&format!(" {name} "), " ", 1);
            (10 + tokens(&name).len(), rest.trim().to_owned())
        } else {
            let matched = name_tokens(&product.name)
                .iter()
                .filter(|name_token| {
                    segment_tokens.iter().any(|token| same_word(token, name_token))
                })
                .count();
            (matched, segment.to_owned())
        };

        if score == 0 {
            continue;
        }
        if best.as_ref().map_or(true, |(best_score, _, _)| score > *best_score) {
            best = Some((score, product, rest));
        }
    }

    best.map(|(_, product, rest)| (product, rest))
}

/// True when the text names a catalog product or category.
pub fn mentions_catalog(normalized: &str, catalog: &[Product]) -> bool {
    best_product(normalized, catalog).is_some() || mentioned_category(normalized, catalog).is_some()
}

/// Catalog category named in the text, directly or through a common synonym.
pub fn mentioned_category(normalized: &str, catalog: &[Product]) -> Option<String> {
    let text_tokens = tokens(normalized);
    let direct = catalog.iter().map(|product| product.category.as_str()).find(|category| {
        let category = normalize(category);
        tokens(&category).iter().any(|category_token| {
            category_token.len() >= 3
                && text_tokens.iter().any(|token| same_word(token, category_token))
        })
    });
    if let Some(category) = direct {
        return Some(category.to_owned());
    }

    CATEGORY_SYNONYMS
        .iter()
        .filter(|(phrase, _)| {
            contains_phrase(normalized, phrase)
                || text_tokens.iter().any(|token| same_word(token, phrase))
        })
        .find_map(|(_, category)| {
            catalog
                .iter()
                .find(|product| normalize(&product.category) == *category)
                .map(|product| product.category.clone())
        })
}

pub fn products_in_category<'a>(catalog: &'a [Product], category: &str) -> Vec<&'a Product> {
    catalog.iter().filter(|product| product.category == category).collect()
}

fn cheapest_in_category<'a>(catalog: &'a [Product], category: &str) -> Option<&'a Product> {
    products_in_category(catalog, category).into_iter().min_by(|a, b| a.price.cmp(&b.price))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;
    use serde_json::json;

    use mostrador_core::domain::product::{Product, ProductId};
    use mostrador_core::domain::tenant::{Locale, TenantId, TenantVoice};

    use super::{
        match_catalog, mentioned_category, parse_model_items, ExtractionSource, LineAction,
        LineRequest, OrderExtractor,
    };
    use crate::llm::LlmError;
    use crate::response::PromptLibrary;
    use crate::scripted::ScriptedLlm;
    use crate::text::normalize;

    fn product(id: &str, name: &str, category: &str, price: i64) -> Product {
        Product {
            id: ProductId(id.to_owned()),
            tenant_id: TenantId("trattoria".to_owned()),
            name: name.to_owned(),
            description: String::new(),
            category: category.to_owned(),
            price: Decimal::new(price, 0),
            active: true,
        }
    }

    fn catalog() -> Vec<Product> {
        vec![
            product("p01", "Pizza Margherita", "pizzas", 12_000),
            product("p02", "Pizza Pepperoni", "pizzas", 13_500),
            product("p08", "Tiramisu", "postres", 5_500),
            product("p09", "Panna Cotta", "postres", 4_800),
            product("p10", "Vino Tinto Casa", "bebidas", 6_000),
            product("p11", "Agua Mineral", "bebidas", 2_000),
            product("p12", "Gaseosa 1.5L", "bebidas", 2_500),
        ]
    }

    fn add(id: &str, quantity: u32) -> LineRequest {
        LineRequest {
            product_id: ProductId(id.to_owned()),
            quantity: Some(quantity),
            action: LineAction::Add,
        }
    }

    #[test]
    fn quantities_and_products_from_plain_spanish() {
        let requests = match_catalog("Quiero 2 pizzas margherita y un tiramisú", &catalog());
        assert_eq!(requests, vec![add("p01", 2), add("p08", 1)]);
    }

    #[test]
    fn distinctive_token_beats_shared_token() {
        let requests = match_catalog("dame una pepperoni", &catalog());
        assert_eq!(requests, vec![add("p02", 1)]);
    }

    #[test]
    fn category_words_pick_the_cheapest_item() {
        let requests = match_catalog("agrégame una bebida", &catalog());
        assert_eq!(requests, vec![add("p11", 1)]);

        let desserts = match_catalog("y también un postre", &catalog());
        assert_eq!(desserts, vec![add("p09", 1)]);
    }

    #[test]
    fn category_question_without_quantity_adds_nothing() {
        assert!(match_catalog("¿qué bebidas tienen?", &catalog()).is_empty());
    }

    #[test]
    fn remove_verbs_switch_action() {
        let requests = match_catalog("quita el tiramisu", &catalog());
        assert_eq!(
            requests,
            vec![LineRequest {
                product_id: ProductId("p08".to_owned()),
                quantity: None,
                action: LineAction::Remove,
            }]
        );
    }

    #[test]
    fn digits_inside_product_names_are_not_quantities() {
        let requests = match_catalog("quiero una gaseosa 1.5L", &catalog());
        assert_eq!(requests, vec![add("p12", 1)]);
    }

    #[test]
    fn duplicates_merge() {
        let requests = match_catalog("un agua mineral, otra agua mineral", &catalog());
        assert_eq!(requests, vec![add("p11", 2)]);
    }

    #[test]
    fn model_items_are_catalog_constrained() {
        let value = json!({"items": [
            {"product_id": "p01", "quantity": 2, "action": "add"},
            {"product_id": "invented", "quantity": 1},
            {"product_id": "p08", "quantity": 0, "action": "add"},
            {"product_id": "p11", "action": "remove"}
        ]});
        let requests = parse_model_items(&value, &catalog()).expect("well formed");
        assert_eq!(
            requests,
            vec![
                add("p01", 2),
                LineRequest {
                    product_id: ProductId("p11".to_owned()),
                    quantity: None,
                    action: LineAction::Remove,
                },
            ]
        );
        assert!(parse_model_items(&json!({"lines": []}), &catalog()).is_none());
    }

    #[test]
    fn synonyms_resolve_to_catalog_categories() {
        assert_eq!(
            mentioned_category(&normalize("algo de tomar"), &catalog()),
            Some("bebidas".to_owned())
        );
        assert_eq!(
            mentioned_category(&normalize("a dessert"), &catalog()),
            Some("postres".to_owned())
        );
        assert_eq!(mentioned_category(&normalize("horario"), &catalog()), None);
    }

    fn prompts() -> Arc<PromptLibrary> {
        Arc::new(PromptLibrary::embedded().expect("prompts"))
    }

    fn voice() -> TenantVoice {
        TenantVoice {
            display_name: "Trattoria".to_owned(),
            tone: "cálido".to_owned(),
            locale: Locale::Es,
        }
    }

    #[tokio::test]
    async fn model_reply_is_used_when_valid() {
        let reply = "```json\n{\"items\":[{\"product_id\":\"p02\",\"quantity\":3}]}\n```";
        let llm = ScriptedLlm::new().on("order extraction", reply);
        let extractor = OrderExtractor::new(Arc::new(llm), prompts());
        let extraction =
            extractor.extract("tres de las picantes", &catalog(), None, &voice(), Locale::Es).await;
        assert_eq!(extraction.source, ExtractionSource::Model);
        assert_eq!(extraction.requests, vec![add("p02", 3)]);
    }

    #[tokio::test]
    async fn model_failure_falls_back_to_rules() {
        let llm = ScriptedLlm::new()
            .fail_on("order extraction", LlmError::Timeout("slow".to_owned()));
        let extractor = OrderExtractor::new(Arc::new(llm), prompts());
        let extraction =
            extractor.extract("quiero 2 tiramisu", &catalog(), None, &voice(), Locale::Es).await;
        assert_eq!(extraction.source, ExtractionSource::Rules);
        assert_eq!(extraction.requests, vec![add("p08", 2)]);
    }

    #[tokio::test]
    async fn malformed_model_reply_falls_back_to_rules() {
        let llm = ScriptedLlm::new().on("order extraction", "Claro, te anoto eso.");
        let extractor = OrderExtractor::new(Arc::new(llm), prompts());
        let extraction =
            extractor.extract("un agua mineral", &catalog(), None, &voice(), Locale::Es).await;
        assert_eq!(extraction.source, ExtractionSource::Rules);
        assert_eq!(extraction.requests, vec![add("p11", 1)]);
    }
}
