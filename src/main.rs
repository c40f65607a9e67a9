use std::sync::{Arc, RwLock};

use clap::Parser;

mod app;
mod cli;
mod config;
mod decision;
mod memories;
mod retrieval;
mod storage;
#[cfg(test)]
mod tests;
mod web;

use app::{App, Paths};
use config::Config;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = cli::Args::parse();

    let paths = Paths::resolve()?;
    let config = Arc::new(RwLock::new(Config::load_with(&paths.base_path)?));
    let mut app = App::new(config.clone(), &paths)?;

    match args.command {
        cli::Command::Daemon {} => {
            web::start_daemon(app, paths.images_path);
            Ok(())
        }

        cli::Command::Query { query } => {
            let response = app.respond_to_query(&query)?;
            println!("{}", serde_json::to_string_pretty(&response).unwrap());
            Ok(())
        }

        cli::Command::Search { query, k } => {
            let k = k.unwrap_or_else(|| app.retrieval_config().search_k);
            let hits = app.search(&query, k)?;
            println!("{}", serde_json::to_string_pretty(&hits).unwrap());
            Ok(())
        }

        cli::Command::BuildIndex {} => {
            let count = app.rebuild_index()?;
            println!("{count} memories indexed");
            Ok(())
        }

        cli::Command::Stats {} => {
            let stats = app.stats();
            println!("{}", serde_json::to_string_pretty(&stats).unwrap());
            Ok(())
        }

        cli::Command::Location { location } => {
            let found = app.memories_by_location(&location);
            println!("{}", serde_json::to_string_pretty(&found).unwrap());
            Ok(())
        }

        cli::Command::Analyze { query } => {
            let analysis = app.analyze_query(&query);
            println!("{}", serde_json::to_string_pretty(&analysis).unwrap());
            Ok(())
        }
    }
}
