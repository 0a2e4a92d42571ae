//! Stream the messages of one run as nodes complete

use futures::StreamExt;
use multigenie::prelude::*;
use multigenie::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(std::env::var("LOG_JSON").is_ok())?;

    let question = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "What are the best hotels near Union Square?".to_string());

    let agent = ChatAgent::from_config(SupervisorConfig::from_env()?)?;
    let mut chunks = agent.predict_stream(vec![Message::user(question)]);

    while let Some(chunk) = chunks.next().await {
        let delta = chunk?.delta;
        let speaker = delta.name.as_deref().unwrap_or(delta.role.as_str());
        println!("[{}] {}\n", speaker, delta.content);
    }
    Ok(())
}
