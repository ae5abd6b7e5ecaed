mod align;
mod cache;
mod cli;
mod clock;
mod commands;
mod ocr;
mod playback;
mod table;
mod tools;
mod video;
mod web;

use anyhow::Result;
use cli::{Args, Command};
use web::server::run_server;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    let args = Args::parse_args();

    match args.command.clone().unwrap_or_default() {
        Command::Serve {
            host,
            port,
            max_upload_mb,
        } => run_server(&args, host, port, max_upload_mb).await?,
        Command::Probe { video } => commands::probe(&args, &video)?,
        Command::Seek {
            video,
            csv,
            column,
            value,
            jump,
            no_transcode,
        } => commands::seek(
            &args,
            &commands::SeekRequest {
                video,
                csv,
                column,
                value,
                jump,
                no_transcode,
            },
        )?,
    }

    Ok(())
}
