use clap::Parser;

use matchlock::app::Config;
use matchlock::cli::{dispatch, output, Cli};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            output::error(&format!("failed to load config: {e}"));
            std::process::exit(1);
        }
    };
    config.init_logging(cli.log_level.as_deref());

    match dispatch(cli, &config).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            output::error(&e.to_string());
            std::process::exit(1);
        }
    }
}
