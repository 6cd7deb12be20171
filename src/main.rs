use anyhow::Context;

use loftview::{AppConfig, LoggingConfig, init_logging, run};

fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::default());

    let mut config = AppConfig::new().title("loftview");
    if let Some(path) = std::env::args_os().nth(1) {
        config = config.model(path);
    }
    log::info!("loading {}", config.model_path.display());

    run(config).context("viewer exited with an error")
}
