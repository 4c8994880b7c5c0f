use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the folio binary.
#[derive(Debug, Parser)]
#[command(name = "folio", version, about = "Static portfolio and blog generator")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "FOLIO_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Render the site into the output directory.
    Build(BuildArgs),
    /// Build the site, then serve the output directory for preview.
    Serve(Box<ServeArgs>),
    /// Load and validate content without writing any output.
    Check(BuildArgs),
    /// Print the caching strategy the service worker applies to each output file.
    Routes(BuildArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct BuildArgs {
    #[command(flatten)]
    pub overrides: BuildOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct BuildOverrides {
    /// Override the content directory (posts and experience data).
    #[arg(long = "content-dir", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub content_dir: Option<PathBuf>,

    /// Override the directory of static assets copied verbatim.
    #[arg(long = "public-dir", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub public_dir: Option<PathBuf>,

    /// Override the output directory.
    #[arg(long = "output-dir", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub output_dir: Option<PathBuf>,

    /// Override the public site URL used for canonical links and feeds.
    #[arg(long = "site-url", value_name = "URL")]
    pub site_url: Option<String>,

    /// Include posts marked as drafts.
    #[arg(long = "drafts", action = clap::ArgAction::SetTrue)]
    pub drafts: bool,

    /// Pin the build date (YYYY-MM-DD) used for durations and relative dates.
    #[arg(long = "build-date", value_name = "DATE")]
    pub build_date: Option<String>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,

    /// Serve the existing output directory without rebuilding first.
    #[arg(long = "no-build", action = clap::ArgAction::SetTrue)]
    pub no_build: bool,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub build: BuildOverrides,

    /// Override the preview listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the preview listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the rate limit window size.
    #[arg(long = "rate-limit-window-seconds", value_name = "SECONDS")]
    pub rate_limit_window_seconds: Option<u64>,

    /// Override the rate limit request ceiling.
    #[arg(long = "rate-limit-max-requests", value_name = "COUNT")]
    pub rate_limit_max_requests: Option<u64>,
}
