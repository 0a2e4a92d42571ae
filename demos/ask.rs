//! Ask one question and print the produced messages

use multigenie::prelude::*;
use multigenie::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(false)?;

    let question = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Find accessible airbnb apartments and vegan restaurants in San Francisco".to_string());

    let config = SupervisorConfig::from_env()?;
    println!("✓ Configuration loaded ({} workers)", config.workers.len());

    let agent = ChatAgent::from_config(config)?;
    println!("{}\n", agent.graph().to_mermaid());

    let response = agent.predict(vec![Message::user(question)]).await?;

    for message in &response.messages {
        let speaker = message.name.as_deref().unwrap_or(message.role.as_str());
        println!("--- {} ---\n{}\n", speaker, message.content);
    }

    println!("Path: {}", response.trace.path().join(" -> "));
    Ok(())
}
