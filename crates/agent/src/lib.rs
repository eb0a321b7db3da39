//! Conversational storefront agent: intent classification, retrieval-grounded answers,
//! order drafting, and the turn runtime that ties them together.
//!
//! The model is used to phrase answers and to read free text into structure. Prices,
//! totals, stock and order state are always decided by deterministic code, and every
//! model call has a fallback so a provider outage degrades a reply instead of failing
//! the turn.

pub mod classifier;
pub mod embedding;
pub mod extraction;
pub mod guardrails;
pub mod handlers;
pub mod llm;
pub mod phrases;
pub mod response;
pub mod retrieval;
pub mod runtime;
pub mod scripted;
pub mod text;

pub use classifier::{Classification, ClassificationSource, IntentClassifier};
pub use embedding::{Embedder, HttpEmbedder};
pub use llm::{CompletionRequest, HttpLlmClient, LlmClient, LlmError};
pub use response::{PromptLibrary, Reply, ResponseGenerator};
pub use retrieval::{IndexReport, RetrievalError, RetrievalService};
pub use runtime::{AgentRuntime, AgentServices, AgentSettings, TurnRequest, TurnResponse};
pub use scripted::{KeywordEmbedder, ScriptedLlm};
