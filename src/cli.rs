use std::path::PathBuf;

use clap::Parser;

/// `deadcheck`: a dead-man's-switch service that alerts when an expected
/// periodic check-in does not arrive on schedule.
///
/// `--version` is handled by `clap` ahead of argument validation, so it
/// prints and exits even though `--config` is otherwise required
/// (`spec.md` §6: "checked before config is loaded").
#[derive(Parser)]
#[command(name = "deadcheck", version, about = "Dead-man's-switch service")]
pub struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long)]
    pub config: PathBuf,

    /// HTTP listen address. Defaults to `:8080` when neither this flag nor
    /// `server.bindAddress` in the config file is set; this flag wins over
    /// the config file when both are set.
    #[arg(long = "http.addr", value_name = "HOST:PORT")]
    pub http_addr: Option<String>,
}
