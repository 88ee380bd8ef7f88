use clap::Parser;
use std::net::SocketAddr;

/// Command-line and environment settings for the category service.
#[derive(Debug, Clone, Parser)]
#[command(name = "category-service", about = "Serves product categories over HTTP")]
pub struct Settings {
    /// Address to listen on
    #[arg(long, env = "CATEGORY_SERVICE_BIND", default_value = "127.0.0.1:8081")]
    pub bind: SocketAddr,

    /// Category names created at startup, in id order
    #[arg(long = "seed", env = "CATEGORY_SERVICE_SEED", value_delimiter = ',')]
    pub seed: Vec<String>,
}
