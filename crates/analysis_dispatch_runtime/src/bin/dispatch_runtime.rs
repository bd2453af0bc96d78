use analysis_dispatch_runtime::config::DispatchArgs;
use analysis_dispatch_runtime::handlers::dispatch::run_with_args;
use analysis_dispatch_runtime::logging::init_logging;
use clap::Parser;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let args = DispatchArgs::parse();
    info!(?args, "Starting analysis dispatch");

    let s3_client = if args.needs_s3() {
        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Some(aws_sdk_s3::Client::new(&aws_config))
    } else {
        None
    };

    let summary = tokio::task::block_in_place(|| run_with_args(&args, s3_client))?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
