use anyhow::Result;
use clap::Parser;
use dotenvy::dotenv;
use std::path::PathBuf;

use storyqa::config::Config;
use storyqa::server;

#[derive(Parser)]
#[command(name = "storyqa", about = "Story-to-UI test generation and execution")]
struct Args {
    /// Port for the web UI. Falls forward to the next free port when taken.
    #[arg(long, default_value_t = 3000)]
    port: u16,

    /// Directory where failure screenshots are written.
    #[arg(long, default_value = "screenshots")]
    screenshots_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    eprintln!("[StoryQA] Starting...");
    let config = Config::from_env(args.screenshots_dir);
    if config.gemini_api_key.is_none() {
        eprintln!("[StoryQA] No GEMINI_API_KEY found; story analysis will use the rule engine.");
    }

    server::serve(config, args.port).await
}
