use assessment_runtime::cli::{self, Cli, Command};
use assessment_runtime::RuntimeConfig;
use clap::Parser;
use std::path::Path;
use tracing::{error, info};

async fn read_document(path: &Path) -> anyhow::Result<String> {
    let document = tokio::fs::read_to_string(path).await?;
    info!("Loaded {} ({} bytes)", path.display(), document.len());
    Ok(document)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Cli::parse();
    let config = RuntimeConfig::from_env()?;
    let fence_tag = args.fence_tag.unwrap_or(config.fence_tag);

    match args.command {
        Command::Inspect { file } => {
            let definitions = cli::extract(&read_document(&file).await?, &fence_tag);
            for line in cli::inspect(&definitions) {
                println!("{}", line);
            }
        }
        Command::Check { file } => {
            let definitions = cli::extract(&read_document(&file).await?, &fence_tag);
            let findings = cli::check(&definitions);
            for finding in &findings {
                println!("{}", finding);
            }
            if !findings.is_empty() {
                error!("{} problems in {}", findings.len(), file.display());
                anyhow::bail!("{} problems found", findings.len());
            }
            println!("{} blocks OK", definitions.len());
        }
        Command::Grade { file, id, select } => {
            let definitions = cli::extract(&read_document(&file).await?, &fence_tag);
            println!("{}", cli::grade(&definitions, &id, &select)?);
        }
    }

    Ok(())
}
