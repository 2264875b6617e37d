use color_eyre::Result;

mod cli;
mod commands;
mod errors;
mod logging;

#[tokio::main]
async fn main() -> Result<()> {
    errors::install_hooks()?;

    let args = cli::Args::parse_args();

    let data_dir = args
        .data_dir
        .clone()
        .unwrap_or_else(bera_wallet::config::get_data_dir);
    logging::init(&data_dir)?;

    commands::run(&args).await
}
