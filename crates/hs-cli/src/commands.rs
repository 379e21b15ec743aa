use std::io::Write;
use std::net::SocketAddr;

use anyhow::{bail, Context};
use colored::Colorize;
use futures::TryStreamExt;

use hs_sdk::{
    Block, ContentId, HashStreamConfig, HashStreamNode, IndexScheme, PackingMode, Representation,
    SchedulerKind, DEFAULT_STORE_PATH,
};
use hs_server::{HashStreamServer, ServerConfig};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    match cli.command {
        Command::Serve(args) => cmd_serve(config, args).await,
        Command::Sync(_) => cmd_sync(config, cli.format).await,
        Command::Get(args) => cmd_get(config, args).await,
        Command::Config => cmd_config(config),
    }
}

/// Start from the config file, if any, then apply flags.
fn load_config(cli: &Cli) -> anyhow::Result<ServerConfig> {
    let mut config = match &cli.config {
        Some(path) => ServerConfig::from_toml_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => {
            let Some(raw) = &cli.node.raw_content_path else {
                bail!("--raw-content-store-path=... is required without --config");
            };
            ServerConfig::new(HashStreamConfig::new(DEFAULT_STORE_PATH, raw.clone()))
        }
    };

    let node = &mut config.node;
    if let Some(path) = &cli.node.store_path {
        node.store_path = path.clone();
    }
    if let Some(path) = &cli.node.raw_content_path {
        node.raw_content_path = path.clone();
    }
    if let Some(packing) = cli.node.packing {
        node.packing = match packing {
            PackingArg::Eager => PackingMode::Eager,
            PackingArg::Lazy => PackingMode::Lazy,
        };
    }
    if let Some(scheduler) = cli.node.scheduler {
        node.scheduler = match scheduler {
            SchedulerArg::Memory => SchedulerKind::Memory,
            SchedulerArg::Durable => SchedulerKind::Durable,
        };
    }
    if !cli.node.index_writers.is_empty() {
        node.index_writers = cli
            .node
            .index_writers
            .iter()
            .map(|w| match w {
                WriterArg::SingleLevel => IndexScheme::SingleLevel,
                WriterArg::MultipleLevel => IndexScheme::MultipleLevel,
            })
            .collect();
    }
    Ok(config)
}

async fn cmd_serve(mut config: ServerConfig, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    } else if let Some(port) = args.port {
        config.bind_addr = SocketAddr::from(([0, 0, 0, 0], port));
    }
    println!("Listening on {}", format!("http://{}", config.bind_addr).bold());
    println!("Hash Stream Stores Path: {}", config.node.store_path.display());
    println!("Raw content Store Path: {}", config.node.raw_content_path.display());
    HashStreamServer::new(config).serve().await?;
    Ok(())
}

async fn cmd_sync(config: ServerConfig, format: OutputFormat) -> anyhow::Result<()> {
    let node = HashStreamNode::open(config.node).await?;
    let report = node.sync_all().await;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            if report.indexed.is_empty() && report.failed.is_empty() {
                println!("Nothing new to index.");
            }
            for file in &report.indexed {
                println!("{} {} {}", "✓".green(), file.path.bold(), file.cid.to_string().cyan());
            }
            for failure in &report.failed {
                let path = failure.path.as_deref().unwrap_or("<scan>");
                println!("{} {} {}", "✗".red(), path.bold(), failure.error.red());
            }
        }
    }
    if !report.is_clean() {
        bail!("{} file(s) failed to index", report.failed.len());
    }
    Ok(())
}

async fn cmd_get(config: ServerConfig, args: GetArgs) -> anyhow::Result<()> {
    let cid = args
        .cid
        .parse::<ContentId>()
        .with_context(|| format!("invalid CID: {}", args.cid))?;
    let node = HashStreamNode::open(config.node).await?;

    let bytes = if args.raw {
        let retrieval = node.get(&cid, Representation::Block).await?;
        if !retrieval.found {
            bail!("not found: {cid}");
        }
        let blocks: Vec<Block> = retrieval.blocks.try_collect().await?;
        match blocks.into_iter().next() {
            Some(block) => block.into_bytes().to_vec(),
            None => bail!("not found: {cid}"),
        }
    } else {
        match node.cat(&cid).await? {
            Some(bytes) => bytes,
            None => bail!("not found: {cid}"),
        }
    };

    match &args.output {
        Some(path) => {
            std::fs::write(path, &bytes)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!(
                "{} Wrote {} bytes to {}",
                "✓".green().bold(),
                bytes.len(),
                path.display()
            );
        }
        None => std::io::stdout().write_all(&bytes)?,
    }
    Ok(())
}

fn cmd_config(config: ServerConfig) -> anyhow::Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}
