//! Single-shot call to the Converse API.
//!
//! Usage:
//!   AWS_BEARER_TOKEN_BEDROCK=... AWS_REGION=us-east-1 cargo run --example converse
//!   cargo run --example converse -- --model amazon.nova-lite-v1:0 --prompt "Tell me a joke"

use bedrock_converse::{
    converse, text_message, BedrockConfig, BedrockRuntimeClient, ConverseOptions, Role,
};
use clap::Parser;

#[derive(Parser)]
#[command(name = "converse", about = "Send one prompt to a Bedrock model and print the reply")]
struct Cli {
    /// Model or inference profile id
    #[arg(long, default_value = "anthropic.claude-3-sonnet-20240229-v1:0")]
    model: String,

    /// User message
    #[arg(long, default_value = "Hello, how are you?")]
    prompt: String,

    /// Endpoint override (defaults to the regional endpoint)
    #[arg(long)]
    endpoint_url: Option<String>,
}

fn fail(e: impl std::fmt::Display) -> ! {
    eprintln!("error: {e}");
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
        ConverseOptions::new().with_streaming(false),
    )
    .await
    .unwrap_or_else(|e| fail(e));

    let Some(response) = reply.into_response() else {
        fail("non-streaming call returned a stream");
    };
    println!("{}", response.first_text().unwrap_or_default());
}
