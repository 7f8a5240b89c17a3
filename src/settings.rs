use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
};

use clap::Parser;
use config::{builder::DefaultState, ConfigBuilder, ConfigError, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

const DEFAULT_ADDR: &str = "127.0.0.1:8000";
const DEFAULT_DB_DIR: &str = "sales-dashboard-db";

#[derive(Parser, Debug)]
#[command(version)]
pub struct Args {
    /// Path to the local configuration TOML file.
    #[arg(short, value_name = "CONFIG_PATH")]
    pub config: Option<PathBuf>,

    /// Fill an empty database with sample sales and properties.
    #[arg(long)]
    pub seed: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Web {
    #[serde(deserialize_with = "deserialize_socket_addr")]
    pub address: SocketAddr,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSettings {
    pub path: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LlmSettings {
    pub host: String,
    pub port: u16,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QuerySettings {
    /// Rows returned when a query names no limit.
    pub default_limit: usize,
    pub max_limit: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogSettings {
    pub level: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Settings {
    pub web: Web,
    pub database: DatabaseSettings,
    pub llm: LlmSettings,
    pub query: QuerySettings,
    pub log: LogSettings,
}

impl Settings {
    /// Load settings from the given TOML file, with sane defaults.
    /// Without a file, the defaults alone are used.
    pub fn from_file(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::<DefaultState>::default()
            .set_default("web.address", DEFAULT_ADDR)?
            .set_default("database.path", default_db_path())?
            .set_default("llm.host", "http://localhost")?
            .set_default("llm.port", 11434)?
            .set_default("llm.model", "llama3")?
            .set_default("llm.timeout_secs", 30)?
            .set_default("query.default_limit", 100)?
            .set_default("query.max_limit", 1000)?
            .set_default("log.level", "info")?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        builder.build()?.try_deserialize()
    }
}

fn default_db_path() -> String {
    ProjectDirs::from("com", "sales-dashboard", "sales-dashboard-server").map_or_else(
        || DEFAULT_DB_DIR.to_string(),
        |dirs| dirs.data_dir().join("db").to_string_lossy().into_owned(),
    )
}

fn deserialize_socket_addr<'de, D>(deserializer: D) -> Result<SocketAddr, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}
