//! SQLite persistence for the storefront agent: connection setup, reversible migrations,
//! repositories, and the demo seed dataset.

pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_from_config, connect_with_settings, DbPool};
pub use fixtures::{DemoSeedDataset, SeedResult, TenantSeedInfo, VerificationResult};
pub use repositories::{
    CatalogRepository, CommittedTurn, ConversationRepository, EmbeddingRecord,
    EmbeddingRepository, InMemoryStore, OrderRepository, RepositoryError, ReviewRepository,
    TenantRepository, TurnCommit,
};
