use anyhow::Result;
use clap::Parser;
use cmm_submit::cli;
use tracing::error;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();

    // 单个条目失败不影响退出码
    if let Err(err) = cli::dispatch(args).await {
        error!("{:#}", err);
        eprintln!("{:#}", err);
        std::process::exit(1);
    }

    Ok(())
}
