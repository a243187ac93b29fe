//! `ragd ask`, `ragd history`, `ragd clear`: the query side of the CLI.

use anyhow::Result;

use crate::app;
use crate::config::Config;
use crate::models::QueryRequest;

pub async fn run_ask(config: &Config, query: &str, session: &str, top_k: Option<usize>) -> Result<()> {
    let pipeline = app::build_pipeline(config).await?;
    let top_k = top_k.unwrap_or(pipeline.settings().top_k);

    let answer = pipeline
        .query(&QueryRequest::new(session, query, top_k))
        .await?;

    println!("{}", answer.answer);
    println!();
    if answer.sources.is_empty() {
        println!("No sources.");
    } else {
        println!("sources:");
        for (i, id) in answer.sources.iter().enumerate() {
            println!("  {}. {}", i + 1, id);
        }
    }
    Ok(())
}

pub async fn run_history(config: &Config, session: &str) -> Result<()> {
    let pipeline = app::build_pipeline(config).await?;
    let turns = pipeline.history(session).await?;

    if turns.is_empty() {
        println!("No history.");
        return Ok(());
    }
    for turn in &turns {
        println!(
            "[{}] {}: {}",
            turn.timestamp.format("%Y-%m-%dT%H:%M:%SZ"),
            turn.role.as_str(),
            turn.content
        );
    }
    Ok(())
}

pub async fn run_clear(config: &Config, session: &str) -> Result<()> {
    let pipeline = app::build_pipeline(config).await?;
    pipeline.clear_history(session).await?;
    println!("cleared {}", session);
    Ok(())
}
