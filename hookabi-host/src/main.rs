// hookabi-host: load a guest, list its entry points, call them from the command line.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use hookabi_host::{config, ExportedGuest, Guest, HostError, InProcessGuest, PluginHost};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hookabi-host", version, about = "Drive a hookabi guest from the command line")]
struct Cli {
    /// Hook rule file (default: $HOOKABI_CONFIG, ~/.config/hookabi/hooks.toml, /etc/hookabi/hooks.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Go through the guest's C symbols instead of the in-process registry. Built-in rules only.
    #[arg(long, global = true)]
    exported: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print exported entry point names
    List,
    /// Print the guest's metadata record
    Metadata,
    /// Invoke an entry point; input comes from --input, --input-file, or stdin
    Call {
        entry_point: String,
        #[arg(long, conflicts_with = "input_file")]
        input: Option<String>,
        #[arg(long)]
        input_file: Option<PathBuf>,
        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    if cli.exported {
        if cli.config.is_some() {
            tracing::warn!("--config is ignored with --exported");
        }
        run(PluginHost::new(ExportedGuest::open()?), cli.command)
    } else {
        let guest_config = config::load(cli.config.as_deref()).context("loading hook rules")?;
        let guest = InProcessGuest::new(&guest_config).context("building guest registry")?;
        run(PluginHost::new(guest), cli.command)
    }
}

fn run<G: Guest>(host: PluginHost<G>, command: Command) -> anyhow::Result<ExitCode> {
    match command {
        Command::List => {
            for name in host.guest().entry_points() {
                println!("{name}");
            }
        }
        Command::Metadata => match host.metadata()? {
            Some(m) => println!("{}", serde_json::to_string_pretty(&m)?),
            None => {
                eprintln!("guest exports no metadata");
                return Ok(ExitCode::FAILURE);
            }
        },
        Command::Call {
            entry_point,
            input,
            input_file,
            pretty,
        } => {
            let payload = match (input, input_file) {
                (Some(s), _) => s.into_bytes(),
                (None, Some(p)) => std::fs::read(&p)
                    .with_context(|| format!("reading input from {}", p.display()))?,
                (None, None) => {
                    let mut buf = Vec::new();
                    std::io::stdin().read_to_end(&mut buf).context("reading input from stdin")?;
                    buf
                }
            };
            match host.call_raw(&entry_point, payload) {
                Ok(out) => print_output(&out, pretty)?,
                Err(e @ (HostError::Failed { .. } | HostError::UnknownEntryPoint(_))) => {
                    eprintln!("{}", e.user_message());
                    return Ok(ExitCode::FAILURE);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn print_output(out: &[u8], pretty: bool) -> anyhow::Result<()> {
    if pretty {
        let v: serde_json::Value = serde_json::from_slice(out).context("guest output is not JSON")?;
        println!("{}", serde_json::to_string_pretty(&v)?);
    } else {
        println!("{}", String::from_utf8_lossy(out));
    }
    Ok(())
}
