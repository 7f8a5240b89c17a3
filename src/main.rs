mod analytics;
mod api;
mod database;
mod intent;
mod llm;
mod nl_query;
mod schema;
mod seed;
mod sentiment;
mod settings;
mod utils;
mod web;

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};

use crate::database::{feedback::Feedback, property::Property, sale::Sale, Database};
use crate::llm::OllamaTranslator;
use crate::nl_query::{Limits, QueryCompiler, QueryExecutor, QueryService};
use crate::settings::{Args, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = Settings::from_file(args.config.as_deref())
        .context("failed to load configuration")?;

    let level: Level = settings
        .log
        .level
        .parse()
        .with_context(|| format!("invalid log level `{}`", settings.log.level))?;
    tracing_subscriber::fmt().with_max_level(level).init();

    let registry = schema::init();
    let database = Database::connect(&settings.database.path).with_context(|| {
        format!(
            "failed to open database at {}",
            settings.database.path.display()
        )
    })?;
    if args.seed {
        seed::seed(&database, chrono::Utc::now())?;
    }
    info!(
        "Database at {} holds {} sales, {} properties and {} feedback entries",
        settings.database.path.display(),
        database.count::<Sale>(),
        database.count::<Property>(),
        database.count::<Feedback>()
    );

    let translator = OllamaTranslator::new(&settings.llm.host, settings.llm.port, &settings.llm.model)?;
    let compiler = QueryCompiler::new(
        Arc::new(translator),
        registry,
        Duration::from_secs(settings.llm.timeout_secs),
    )?;
    let limits = Limits::new(settings.query.default_limit, settings.query.max_limit)?;
    let executor = QueryExecutor::new(database.clone(), registry, limits);
    let service = Arc::new(QueryService::new(compiler, executor));

    let schema = api::schema(database, service.clone());
    web::serve(schema, service, settings.web.address).await;
    Ok(())
}
