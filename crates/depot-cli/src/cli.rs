use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser)]
#[command(
    author,
    version,
    about,
    help_template = "{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}",
    arg_required_else_help = true
)]
pub struct Args {
    /// Set output verbosity
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress outputs
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output as json
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Disable colors in output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Disable progress bars
    #[arg(long, global = true)]
    pub no_progress: bool,

    /// Provide custom config file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set proxy
    #[arg(required = false, long, short = 'P', global = true)]
    pub proxy: Option<String>,

    /// Set user agent
    #[arg(required = false, long, short = 'A', global = true)]
    pub user_agent: Option<String>,

    /// Number of concurrent workers
    #[arg(required = false, long, short = 'w', global = true)]
    pub workers: Option<usize>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Refresh the index, record new versions and download missing archives
    #[clap(name = "sync", visible_alias = "S")]
    Sync {
        /// Use the index checkout as it is
        #[arg(required = false, long)]
        no_update: bool,

        /// Only record new versions, do not download archives
        #[arg(required = false, long)]
        skip_download: bool,

        /// Only download archives of versions already in the catalog
        #[arg(required = false, long)]
        skip_reconcile: bool,

        /// Skip yanked versions when downloading
        #[arg(required = false, long)]
        no_yanked: bool,
    },

    /// Show catalog counts and the last index sync
    Status,

    /// View env
    Env,

    /// Print the effective configuration to stdout
    Config {
        /// Open the configuration file in editor
        /// Optional value can be passed to set as editor (default is $EDITOR)
        #[arg(required = false, short, long)]
        edit: Option<Option<String>>,
    },

    /// Generate default config
    #[clap(name = "defconfig")]
    DefConfig,
}
