use acc_server_manager::config::AppConfig;
use acc_server_manager::server::ServerBuilder;
use tracing_subscriber::EnvFilter;

/// Names the YAML config file to load
const CONFIG_ENV: &str = "ACC_MANAGER_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "acc-manager.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = AppConfig::from_yaml_file(&path)?.apply_env_overrides();
    config.validate()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!(config = %path, "starting acc-server-manager");
    ServerBuilder::new(config).serve().await
}
