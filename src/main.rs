//! db-resilience - Main entry point.
//!
//! Waits for a database to become reachable, runs the given SQL statements
//! (optionally inside one transaction) and prints the results as JSON.

use clap::Parser;
use db_resilience::config::Config;
use db_resilience::models::{QueryParam, QueryResult};
use db_resilience::{DatabaseClient, DbConnection, DbError, DbResult};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging. Logs go to stderr so stdout
/// carries only results.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Statements whose results are rows rather than an affected-row count.
fn returns_rows(sql: &str) -> bool {
    let lower = sql.trim_start().to_ascii_lowercase();
    ["select", "with", "show", "pragma", "explain", "values", "describe"]
        .iter()
        .any(|kw| lower.starts_with(kw))
        || lower.contains(" returning ")
}

async fn run_statement(
    conn: &mut DbConnection,
    sql: &str,
    params: &[QueryParam],
) -> DbResult<QueryResult> {
    if returns_rows(sql) {
        conn.query(sql, params).await
    } else {
        conn.execute(sql, params).await
    }
}

async fn run(
    client: &DatabaseClient,
    config: &Config,
    params: Vec<QueryParam>,
) -> DbResult<Vec<QueryResult>> {
    if config.transaction {
        let statements = config.statements.clone();
        return client
            .run_transaction(move |conn| {
                Box::pin(async move {
                    let mut results = Vec::with_capacity(statements.len());
                    for sql in &statements {
                        results.push(run_statement(conn, sql, &params).await?);
                    }
                    Ok::<_, DbError>(results)
                })
            })
            .await;
    }

    let mut results = Vec::with_capacity(config.statements.len());
    for sql in &config.statements {
        let result = if returns_rows(sql) {
            client.execute_query(sql, &params).await?
        } else {
            client.execute(sql, &params).await?
        };
        results.push(result);
    }
    Ok(results)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse();

    // Initialize logging
    init_tracing(&config);

    info!("Starting db-resilience v{}", env!("CARGO_PKG_VERSION"));

    let db_config = config.database_config()?;
    let params: Vec<QueryParam> = match &config.params {
        Some(json) => serde_json::from_str(json)
            .map_err(|e| format!("--params must be a JSON array: {}", e))?,
        None => Vec::new(),
    };

    let client =
        DatabaseClient::new(&db_config)?.with_query_timeout(config.query_timeout_duration());

    if config.retries > 0 {
        client
            .wait_for_connection_with(&config.retry_policy())
            .await?;
    }

    if config.statements.is_empty() {
        info!("No statements given, database is reachable");
        client.close().await;
        return Ok(());
    }

    let outcome = run(&client, &config, params).await;
    client.close().await;

    match outcome {
        Ok(results) => {
            println!("{}", serde_json::to_string_pretty(&results)?);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, suggestion = ?e.suggestion(), "Execution failed");
            Err(e.into())
        }
    }
}
