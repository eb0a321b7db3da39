use crate::commands::{async_runtime, load_config, open_database, CommandResult, EXIT_DATABASE};
use mostrador_db::migrations;

pub fn run() -> CommandResult {
    let result = load_config().and_then(|config| {
        let runtime = async_runtime()?;
        runtime.block_on(async {
            let pool = open_database(&config).await?;
            let applied = migrations::applied_versions(&pool)
                .await
                .map_err(|error| ("migration", error.to_string(), EXIT_DATABASE));
            pool.close().await;
            applied
        })
    });

    match result {
        Ok(applied) => CommandResult::success(
            "migrate",
            format!("applied pending migrations; schema at {} migration(s)", applied.len()),
        ),
        Err(failure) => CommandResult::from_failure("migrate", failure),
    }
}
