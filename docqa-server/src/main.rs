use clap::Parser as _;
use docqa_server::{Args, build_state, run_server, telemetry::init_telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; real environment variables still apply.
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    init_telemetry(args.log_format)?;

    let state = build_state(&args).await?;
    run_server(args.server_config(), state).await
}
