use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "hash-stream",
    about = "Hash Stream: trustless content-addressed retrieval over your own files",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Server configuration file (TOML). Flags override its values.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub node: NodeArgs,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum PackingArg {
    Eager,
    Lazy,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum SchedulerArg {
    Memory,
    Durable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum WriterArg {
    SingleLevel,
    MultipleLevel,
}

/// Node settings shared by every subcommand.
#[derive(Args, Debug, Default)]
pub struct NodeArgs {
    /// Directory holding the index and pack stores.
    #[arg(long, global = true)]
    pub store_path: Option<PathBuf>,

    /// Directory of files to index and serve.
    #[arg(long = "raw-content-store-path", global = true)]
    pub raw_content_path: Option<PathBuf>,

    #[arg(long, global = true)]
    pub packing: Option<PackingArg>,

    #[arg(long, global = true)]
    pub scheduler: Option<SchedulerArg>,

    /// Index writer to run when indexing; repeat for more than one.
    #[arg(long = "index-writer", global = true)]
    pub index_writers: Vec<WriterArg>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server
    Serve(ServeArgs),
    /// Index every new file in the raw content store
    Sync(SyncArgs),
    /// Fetch content by CID from the local stores
    Get(GetArgs),
    /// Print the effective configuration
    Config,
}

#[derive(Args)]
pub struct ServeArgs {
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    /// Listen on 0.0.0.0 with this port.
    #[arg(long, conflicts_with = "bind")]
    pub port: Option<u16>,
}

#[derive(Args)]
pub struct SyncArgs {}

#[derive(Args)]
pub struct GetArgs {
    pub cid: String,
    /// Write to this file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Fetch the single block for the CID instead of the file content.
    #[arg(long)]
    pub raw: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_serve_port() {
        let cli = Cli::try_parse_from([
            "hash-stream",
            "serve",
            "--port",
            "8080",
            "--raw-content-store-path",
            "/srv/files",
        ])
        .unwrap();
        if let Command::Serve(args) = cli.command {
            assert_eq!(args.port, Some(8080));
            assert!(args.bind.is_none());
        } else {
            panic!("wrong command");
        }
        assert_eq!(cli.node.raw_content_path, Some(PathBuf::from("/srv/files")));
    }

    #[test]
    fn bind_and_port_conflict() {
        assert!(Cli::try_parse_from([
            "hash-stream",
            "serve",
            "--bind",
            "127.0.0.1:1",
            "--port",
            "2"
        ])
        .is_err());
    }

    #[test]
    fn parse_sync_with_node_flags() {
        let cli = Cli::try_parse_from([
            "hash-stream",
            "sync",
            "--store-path",
            "/var/hs",
            "--packing",
            "lazy",
            "--scheduler",
            "durable",
            "--index-writer",
            "single-level",
            "--index-writer",
            "multiple-level",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Sync(_)));
        assert_eq!(cli.node.store_path, Some(PathBuf::from("/var/hs")));
        assert_eq!(cli.node.packing, Some(PackingArg::Lazy));
        assert_eq!(cli.node.scheduler, Some(SchedulerArg::Durable));
        assert_eq!(
            cli.node.index_writers,
            vec![WriterArg::SingleLevel, WriterArg::MultipleLevel]
        );
    }

    #[test]
    fn parse_get() {
        let cli = Cli::try_parse_from(["hash-stream", "get", "bafkqaaa", "-o", "out.bin", "--raw"])
            .unwrap();
        if let Command::Get(args) = cli.command {
            assert_eq!(args.cid, "bafkqaaa");
            assert_eq!(args.output, Some(PathBuf::from("out.bin")));
            assert!(args.raw);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_json_format() {
        let cli = Cli::try_parse_from(["hash-stream", "--format", "json", "sync"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
    }
}
