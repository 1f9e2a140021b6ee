//! # rpcengine CLI Entry Point
//!
//! ## Usage
//!
//! ```bash
//! # Walk through calls and subscriptions between two in-memory engines
//! rpcengine demo
//! rpcengine --object-mode demo --codec
//!
//! # Serve the demo service over newline-delimited JSON
//! echo '{"jsonrpc":"2.0","id":1,"method":"add","params":[1,1336]}' | rpcengine stdio
//! ```
//!
//! Logs go to stderr so stdout stays clean for `stdio`. `RUST_LOG` overrides
//! the default `info` level.

use anyhow::Result;
use argh::FromArgs;
use rpcengine_cli::EngineFlags;

#[derive(FromArgs)]
/// rpcengine - bidirectional JSON-RPC engine
struct Cli {
    /// default call timeout in milliseconds (0 disables it)
    #[argh(option)]
    timeout_ms: Option<u64>,

    /// send a single structured params object instead of a positional array
    #[argh(switch)]
    object_mode: bool,

    /// separator between mount path and method name (default ".")
    #[argh(option)]
    delimiter: Option<String>,

    /// answer uncoded handler errors with a generic "internal error"
    #[argh(switch)]
    redact_internal_errors: bool,

    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Demo(DemoArgs),
    Stdio(StdioArgs),
}

#[derive(FromArgs)]
#[argh(subcommand, name = "demo")]
/// run the in-memory walkthrough
struct DemoArgs {
    /// exchange encoded JSON text instead of structured values
    #[argh(switch)]
    codec: bool,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "stdio")]
/// serve the demo service on stdin/stdout
struct StdioArgs {}

impl Cli {
    fn flags(&self) -> EngineFlags {
        EngineFlags {
            timeout_ms: self.timeout_ms,
            object_mode: self.object_mode,
            delimiter: self.delimiter.clone(),
            redact_internal_errors: self.redact_internal_errors,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.flags().resolve()?;
    tracing::debug!("Engine config: {:?}", config);

    match cli.command {
        Commands::Demo(args) => {
            rpcengine_cli::demo::run(config, args.codec).await?;
        }
        Commands::Stdio(_) => {
            let stats = rpcengine_cli::stdio::run(config).await?;
            tracing::info!(
                "Handled {} request(s) and {} notification(s)",
                stats.requests_handled,
                stats.notifications_handled
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::from_args(&["rpcengine"], args).unwrap()
    }

    #[test]
    fn test_cli_parse_demo() {
        let cli = parse(&["demo", "--codec"]);
        match cli.command {
            Commands::Demo(DemoArgs { codec }) => assert!(codec),
            _ => panic!("Expected Demo command"),
        }
        assert_eq!(cli.flags(), EngineFlags::default());
    }

    #[test]
    fn test_cli_parse_engine_flags() {
        let cli = parse(&[
            "--timeout-ms",
            "500",
            "--object-mode",
            "--delimiter",
            "/",
            "--redact-internal-errors",
            "stdio",
        ]);
        assert!(matches!(cli.command, Commands::Stdio(_)));
        assert_eq!(
            cli.flags(),
            EngineFlags {
                timeout_ms: Some(500),
                object_mode: true,
                delimiter: Some("/".into()),
                redact_internal_errors: true,
            }
        );
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::from_args(&["rpcengine"], &[]).is_err());
    }
}
