//! Streaming call to the Converse API, printing events as they arrive.
//!
//! Usage:
//!   AWS_BEARER_TOKEN_BEDROCK=... AWS_REGION=us-east-1 cargo run --example streaming
//!   cargo run --example streaming -- --prompt "Name 3 rivers."

use std::io::{self, Write};

use bedrock_converse::{
    converse, text_message, BedrockConfig, BedrockRuntimeClient, ConverseOptions, Role,
    StreamEvent,
};
use clap::Parser;

#[derive(Parser)]
#[command(name = "streaming", about = "Stream a Bedrock model's reply to stdout")]
struct Cli {
    /// Model or inference profile id
    #[arg(long, default_value = "anthropic.claude-3-sonnet-20240229-v1:0")]
    model: String,

    /// User message
    #[arg(long, default_value = "Create a list of 3 pop songs.")]
    prompt: String,

    /// Endpoint override (defaults to the regional endpoint)
    #[arg(long)]
    endpoint_url: Option<String>,
}

fn fail(e: impl std::fmt::Display) -> ! {
    eprintln!("\nerror: {e}");
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mut config = BedrockConfig::from_env();
    if let Some(url) = cli.endpoint_url {
        config = config.with_endpoint_url(url);
    }
    let client = BedrockRuntimeClient::from_config(&config).unwrap_or_else(|e| fail(e));

    let reply = converse(
        &client,
        &cli.model,
        vec![text_message(Role::User, cli.prompt)],
        ConverseOptions::default(),
    )
    .await
    .unwrap_or_else(|e| fail(e));

    let Some(mut stream) = reply.into_stream() else {
        fail("streaming call returned a complete response");
    };

    while let Some(event) = stream.next_event().await {
        match event.unwrap_or_else(|e| fail(e)) {
            StreamEvent::MessageStart(start) => println!("\nRole: {}", start.role.as_str()),
            StreamEvent::ContentBlockDelta(delta) => {
                if let Some(text) = delta.delta.text {
                    print!("{text}");
                    io::stdout().flush().ok();
                }
            }
            StreamEvent::MessageStop(stop) => println!("\nStop reason: {}", stop.stop_reason),
            StreamEvent::Metadata(meta) => {
                if let Some(usage) = meta.usage {
                    println!("\nToken usage");
                    println!("Input tokens: {}", usage.input_tokens);
                    println!("Output tokens: {}", usage.output_tokens);
                    println!("Total tokens: {}", usage.total_tokens);
                }
                if let Some(metrics) = meta.metrics {
                    println!("Latency: {} milliseconds", metrics.latency_ms);
                }
            }
            StreamEvent::ContentBlockStart(_) | StreamEvent::ContentBlockStop(_) => {}
        }
    }
}
