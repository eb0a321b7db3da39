use std::env;
use std::sync::{Mutex, OnceLock};

use mostrador_cli::commands::{chat, doctor, embed, migrate, seed};
use mostrador_cli::ChatArgs;
use serde_json::Value;
use tempfile::TempDir;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("MOSTRADOR_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_invalid_floor() {
    with_env(
        &[
            ("MOSTRADOR_DATABASE_URL", "sqlite::memory:"),
            ("MOSTRADOR_RETRIEVAL_SIMILARITY_FLOOR", "3.0"),
        ],
        || {
            let result = migrate::run();
            assert_eq!(result.exit_code, 2, "expected config validation failure code");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["status"], "error");
            assert_eq!(payload["error_class"], "config_validation");
        },
    );
}

#[test]
fn seed_lists_the_demo_storefronts() {
    with_env(&[("MOSTRADOR_DATABASE_URL", "sqlite::memory:")], || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "expected seed success");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.contains("  - trattoria: 12 products, 10 faqs"));
        assert!(message.contains("  - minimarket-express: 15 products, 10 faqs"));
        assert_eq!(payload["data"].as_array().map(Vec::len), Some(5));
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    let dir = TempDir::new().expect("temp dir");
    let url = database_url(&dir);
    with_env(&[("MOSTRADOR_DATABASE_URL", url.as_str())], || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");
        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");

        assert_eq!(
            parse_payload(&first.output)["message"],
            parse_payload(&second.output)["message"]
        );
    });
}

#[test]
fn embed_offline_indexes_every_seeded_tenant() {
    let dir = TempDir::new().expect("temp dir");
    let url = database_url(&dir);
    with_env(&[("MOSTRADOR_DATABASE_URL", url.as_str())], || {
        assert_eq!(seed::run().exit_code, 0);

        let result = embed::run(None, true);
        assert_eq!(result.exit_code, 0, "expected embed success: {}", result.output);

        let payload = parse_payload(&result.output);
        let reports = payload["data"].as_array().cloned().unwrap_or_default();
        assert_eq!(reports.len(), 5);
        let trattoria = reports
            .iter()
            .find(|report| report["tenant_id"] == "trattoria")
            .expect("trattoria report");
        assert_eq!(trattoria["faqs"], 10);
        assert_eq!(trattoria["products"], 12);
    });
}

#[test]
fn embed_unknown_tenant_is_an_input_error() {
    with_env(&[("MOSTRADOR_DATABASE_URL", "sqlite::memory:")], || {
        let result = embed::run(Some("nadie"), true);
        assert_eq!(result.exit_code, 1);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "unknown_tenant");
    });
}

#[test]
fn doctor_reports_pending_migrations_on_fresh_database() {
    with_env(&[("MOSTRADOR_DATABASE_URL", "sqlite::memory:")], || {
        let result = doctor::run();
        assert_eq!(result.exit_code, 4);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "migrations");
        let checks = payload["data"].as_array().cloned().unwrap_or_default();
        assert_eq!(checks[0]["status"], "pass");
        assert_eq!(checks[1]["status"], "pass");
        assert_eq!(checks[2]["status"], "fail");
        assert_eq!(checks[3]["status"], "skipped");
    });
}

#[test]
fn doctor_flags_sources_without_vectors_for_the_configured_model() {
    let dir = TempDir::new().expect("temp dir");
    let url = database_url(&dir);
    with_env(&[("MOSTRADOR_DATABASE_URL", url.as_str())], || {
        assert_eq!(seed::run().exit_code, 0);

        let result = doctor::run();
        assert_eq!(result.exit_code, 1);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "embedding_coverage");
        assert!(payload["message"].as_str().unwrap_or("").contains("trattoria (22/22 missing)"));
    });
}

#[test]
fn chat_offline_answers_from_the_seeded_tenant() {
    let dir = TempDir::new().expect("temp dir");
    let url = database_url(&dir);
    with_env(&[("MOSTRADOR_DATABASE_URL", url.as_str())], || {
        assert_eq!(seed::run().exit_code, 0);
        assert_eq!(embed::run(Some("trattoria"), true).exit_code, 0);

        let result = chat::run(&ChatArgs {
            tenant: "trattoria".to_string(),
            conversation: None,
            offline: true,
            message: "¿Dónde están ubicados?".to_string(),
        });
        assert_eq!(result.exit_code, 0, "expected chat success: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["data"]["intent"], "faq");
        assert_eq!(payload["data"]["grounded"], true);
        assert!(payload["message"].as_str().unwrap_or("").contains("Providencia"));

        let conversation = payload["data"]["conversation_id"].as_str().unwrap_or("").to_string();
        assert!(!conversation.is_empty());

        let follow_up = chat::run(&ChatArgs {
            tenant: "sushi-zen".to_string(),
            conversation: Some(conversation),
            offline: true,
            message: "hola".to_string(),
        });
        assert_eq!(follow_up.exit_code, 1, "conversation belongs to another tenant");
        assert_eq!(parse_payload(&follow_up.output)["error_class"], "invalid_request");
    });
}

#[test]
fn chat_unknown_tenant_exits_with_input_error() {
    with_env(&[("MOSTRADOR_DATABASE_URL", "sqlite::memory:")], || {
        let result = chat::run(&ChatArgs {
            tenant: "nadie".to_string(),
            conversation: None,
            offline: true,
            message: "hola".to_string(),
        });
        assert_eq!(result.exit_code, 1);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "chat");
        assert_eq!(payload["error_class"], "invalid_request");
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn database_url(dir: &TempDir) -> String {
    format!("sqlite://{}", dir.path().join("mostrador.db").display())
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "MOSTRADOR_DATABASE_URL",
        "MOSTRADOR_DATABASE_MAX_CONNECTIONS",
        "MOSTRADOR_DATABASE_TIMEOUT_SECS",
        "MOSTRADOR_LLM_PROVIDER",
        "MOSTRADOR_LLM_API_KEY",
        "MOSTRADOR_LLM_BASE_URL",
        "MOSTRADOR_LLM_MODEL",
        "MOSTRADOR_EMBEDDING_PROVIDER",
        "MOSTRADOR_EMBEDDING_API_KEY",
        "MOSTRADOR_EMBEDDING_MODEL",
        "MOSTRADOR_EMBEDDING_DIMENSIONS",
        "MOSTRADOR_RETRIEVAL_SIMILARITY_FLOOR",
        "MOSTRADOR_RETRIEVAL_TOP_K",
        "MOSTRADOR_AGENT_MAX_MESSAGE_CHARS",
        "MOSTRADOR_LOGGING_LEVEL",
        "MOSTRADOR_LOGGING_FORMAT",
        "MOSTRADOR_LOG_LEVEL",
        "MOSTRADOR_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
