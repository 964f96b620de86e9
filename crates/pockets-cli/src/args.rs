use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "pockets-cli", version, about = "Operate a Pockets deployment")]
pub struct Cli {
    /// Base URL of the Pockets site, e.g. https://pockets.msar.me
    #[arg(long, env = "POCKETS_SITE_URL", global = true)]
    pub site: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Inspect or refresh the link cache.
    #[command(subcommand)]
    Cache(CacheCommand),
    /// Drop rendered pages for a path.
    Revalidate(RevalidateArgs),
    /// Read or add links.
    #[command(subcommand)]
    Links(LinksCommand),
    /// Fetch the title and description of a web page.
    Metadata(MetadataArgs),
}

#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    Status,
    Refresh(RefreshArgs),
}

#[derive(Debug, Args)]
pub struct RefreshArgs {
    #[arg(long)]
    pub page: Option<u32>,
    #[arg(long = "per-page")]
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Scope {
    Page,
    Layout,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Page => "page",
            Scope::Layout => "layout",
        }
    }
}

#[derive(Debug, Args)]
pub struct RevalidateArgs {
    /// Absolute path to drop, e.g. `/` or `/some-link`.
    #[arg(long)]
    pub path: String,
    #[arg(long = "type", value_enum, default_value = "page")]
    pub scope: Scope,
    #[arg(long)]
    pub tag: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum LinksCommand {
    List(ListArgs),
    Create(CreateArgs),
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[arg(long)]
    pub page: Option<u32>,
    #[arg(long = "per-page")]
    pub per_page: Option<u32>,
    #[arg(long)]
    pub search: Option<String>,
}

#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Admin PIN of the deployment.
    #[arg(long, env = "POCKETS_ADMIN_PIN", hide_env_values = true)]
    pub pin: String,
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub slug: String,
    #[arg(long)]
    pub value: String,
    /// One of text, url or link.
    #[arg(long = "type", default_value = "url")]
    pub kind: String,
}

#[derive(Debug, Args)]
pub struct MetadataArgs {
    #[arg(long)]
    pub url: String,
}
