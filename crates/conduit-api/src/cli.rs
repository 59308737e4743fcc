// CLI flags (§6): `--db-path`, `--port`, `--config`, `--log-file`,
// `--log-level`. Each flag also accepts its matching env var, matching how
// the rest of the workspace already leans on `clap`'s `env` feature.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "conduit-api", version, about = "Agent orchestration core HTTP server")]
pub struct Cli {
    /// Postgres connection string (despite the flag name, this build has no
    /// sqlite backend — `--db-path` is kept for historical compatibility and
    /// passed straight through to `sqlx::PgPoolOptions`; see DESIGN.md).
    #[arg(long, env = "DATABASE_URL")]
    pub db_path: String,

    #[arg(long, env = "CONDUIT_PORT", default_value_t = 9000)]
    pub port: u16,

    /// Path to the provider-config TOML document (§6 ConfigModel).
    #[arg(long, env = "CONDUIT_CONFIG_PATH", default_value = "config.toml")]
    pub config: PathBuf,

    /// When unset, logs go to stderr only.
    #[arg(long, env = "CONDUIT_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    #[arg(long, env = "CONDUIT_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Root directory for per-session workspace folders (§4.4 workspace tools).
    #[arg(long, env = "CONDUIT_WORKSPACE_ROOT", default_value = "./workspaces")]
    pub workspace_root: PathBuf,

    /// Root directory for the on-disk discovery cache mirror (§4.3).
    #[arg(long, env = "CONDUIT_CACHE_DIR", default_value = "./cache")]
    pub cache_dir: PathBuf,
}
