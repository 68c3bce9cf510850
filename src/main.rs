use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

use cellar::cli::{Cli, Command};
use cellar::commands;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    cellar::logging::init().context("init logging")?;

    let cli = Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    let data_dir = cli.data_dir;
    let catalog = || -> anyhow::Result<cellar::catalog::Catalog> {
        let config = cellar::config::AppConfig::from_env().context("load config")?;
        commands::open_catalog(&data_dir, &config)
    };

    match cli.command {
        Command::Scrape(args) => commands::scrape(args).await.context("scrape")?,
        Command::List(args) => commands::list(&catalog()?, args).await.context("list")?,
        Command::Add(args) => commands::add(&catalog()?, args).await.context("add")?,
        Command::SetQuantity(args) => commands::set_quantity(&catalog()?, args)
            .await
            .context("set-quantity")?,
        Command::Delete(args) => commands::delete(&catalog()?, &args.id)
            .await
            .context("delete")?,
        Command::Refresh => commands::refresh(&catalog()?).await.context("refresh")?,
        Command::Tags(args) => commands::tags(&catalog()?, args).await.context("tags")?,
    }

    Ok(())
}
