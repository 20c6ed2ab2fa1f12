//! `stockroom` operator binary.
//!
//! ```text
//! stockroom [--config <path>] token
//! stockroom [--config <path>] check <sku>...
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use futures_util::future::join_all;
use stockroom_commerce::{CommerceLayerClient, InventoryApi};
use stockroom_coordinator::{init_tracing, AppConfig, CoordinatorRegistry, StoreConfig, StoreFactory};
use stockroom_core::{StockroomError, StockroomResult};
use stockroom_storage::{DurableStore, LmdbDurableStore};

const USAGE: &str = "usage: stockroom [--config <path>] (token | check <sku>...)";

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Stockroom(#[from] StockroomError),
    #[error("{failed} of {total} stock checks failed")]
    ChecksFailed { failed: usize, total: usize },
}

impl From<stockroom_core::ConfigError> for CliError {
    fn from(e: stockroom_core::ConfigError) -> Self {
        Self::Stockroom(e.into())
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Token,
    Check(Vec<String>),
}

#[derive(Debug, PartialEq, Eq)]
struct Invocation {
    config_path: Option<PathBuf>,
    command: Command,
}

impl Invocation {
    fn parse<I>(args: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config_path = None;
        let mut positional = Vec::new();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            if arg == "--config" {
                let path = args
                    .next()
                    .ok_or_else(|| CliError::Usage("--config needs a path".to_string()))?;
                config_path = Some(PathBuf::from(path));
            } else {
                positional.push(arg);
            }
        }

        let mut positional = positional.into_iter();
        let command = match positional.next().as_deref() {
            Some("token") => Command::Token,
            Some("check") => {
                let skus: Vec<String> = positional.by_ref().collect();
                if skus.is_empty() {
                    return Err(CliError::Usage("check needs at least one SKU".to_string()));
                }
                Command::Check(skus)
            }
            Some(other) => return Err(CliError::Usage(format!("unknown command '{}'", other))),
            None => return Err(CliError::Usage("missing command".to_string())),
        };

        if let Some(extra) = positional.next() {
            return Err(CliError::Usage(format!("unexpected argument '{}'", extra)));
        }

        Ok(Self {
            config_path,
            command,
        })
    }
}

fn lmdb_store_factory(store: StoreConfig) -> StoreFactory {
    Box::new(move |name: &str| -> StockroomResult<Arc<dyn DurableStore>> {
        let lmdb = LmdbDurableStore::new(store.path_for(name), store.max_size_mb)?;
        Ok(Arc::new(lmdb))
    })
}

async fn run() -> Result<(), CliError> {
    let invocation = Invocation::parse(std::env::args().skip(1))?;
    let config = AppConfig::load(invocation.config_path)?;
    init_tracing(&config.telemetry)?;

    let api: Arc<dyn InventoryApi> = Arc::new(CommerceLayerClient::new(config.commerce.clone())?);
    let registry = CoordinatorRegistry::new(
        api,
        lmdb_store_factory(config.store.clone()),
        config.coordinator.clone(),
    )?;
    let coordinator = registry.default_instance()?;

    match invocation.command {
        Command::Token => {
            let credential = coordinator.token_manager().get_token().await?;
            let remaining = credential.remaining_at(chrono::Utc::now());
            println!(
                "{}",
                serde_json::json!({
                    "coordinator": coordinator.name(),
                    "expiresAt": credential.expires_at.to_rfc3339(),
                    "remainingSecs": remaining.as_secs(),
                })
            );
            Ok(())
        }
        Command::Check(skus) => {
            let results = join_all(skus.iter().map(|sku| coordinator.check_stock(sku))).await;

            let mut failed = 0;
            for (sku, result) in skus.iter().zip(results) {
                match result {
                    Ok(entry) => println!("{}", serde_json::json!(entry)),
                    Err(e) => {
                        failed += 1;
                        eprintln!("{}: {}", sku, e);
                    }
                }
            }

            tracing::debug!(stats = ?coordinator.cache_stats(), "Stock checks complete");
            if failed > 0 {
                return Err(CliError::ChecksFailed {
                    failed,
                    total: skus.len(),
                });
            }
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            if matches!(e, CliError::Usage(_)) {
                eprintln!("{}", USAGE);
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Invocation, CliError> {
        Invocation::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_token() {
        let invocation = parse(&["token"]).unwrap();
        assert_eq!(invocation.command, Command::Token);
        assert_eq!(invocation.config_path, None);
    }

    #[test]
    fn test_parse_check_with_config_anywhere() {
        let invocation = parse(&["check", "A", "--config", "/etc/stockroom.toml", "B"]).unwrap();
        assert_eq!(
            invocation.command,
            Command::Check(vec!["A".to_string(), "B".to_string()])
        );
        assert_eq!(
            invocation.config_path,
            Some(PathBuf::from("/etc/stockroom.toml"))
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse(&[]), Err(CliError::Usage(_))));
        assert!(matches!(parse(&["check"]), Err(CliError::Usage(_))));
        assert!(matches!(parse(&["token", "extra"]), Err(CliError::Usage(_))));
        assert!(matches!(parse(&["restock"]), Err(CliError::Usage(_))));
        assert!(matches!(parse(&["token", "--config"]), Err(CliError::Usage(_))));
    }
}
