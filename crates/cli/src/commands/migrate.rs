use crate::commands::{load_config, open_database, runtime, CommandResult};

pub fn run() -> CommandResult {
    let config = match load_config("migrate") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("migrate") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    runtime.block_on(async {
        match open_database("migrate", &config).await {
            Ok(pool) => {
                pool.close().await;
                tracing::info!(
                    event_name = "rfq.cli.migrated",
                    database_url = %config.database.url,
                    "applied pending migrations"
                );
                CommandResult::success("migrate", "applied pending migrations")
            }
            Err(failure) => failure,
        }
    })
}
