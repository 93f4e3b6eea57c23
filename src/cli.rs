use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// More log output (`-v` debug, `-vv` trace). `RUST_LOG` wins when set.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Crawl a video, article, course or bootcamp and download its items.
    Download(DownloadArgs),
    /// Crawl and print the content tree without downloading anything.
    Inspect(InspectArgs),
}

#[derive(Debug, Args)]
pub struct DownloadArgs {
    /// Content URL (article, video, course or bootcamp).
    #[arg(long)]
    pub url: String,

    /// best, worst, 1080p, 720p, 480p or 360p. Anything else means best.
    #[arg(long, default_value = "best")]
    pub quality: String,

    /// Downloads directory.
    #[arg(long, default_value = "downloads")]
    pub out: String,

    /// Netscape cookie file holding the logged-in session.
    #[arg(long, default_value = ".cookies.txt")]
    pub cookies: String,

    /// Items downloaded at the same time.
    #[arg(long, default_value_t = 1)]
    pub concurrency: usize,

    /// Class pages read at the same time while walking a bootcamp.
    #[arg(long, default_value_t = 4)]
    pub class_concurrency: usize,

    /// Attempts per item before it is reported as failed.
    #[arg(long, default_value_t = 5)]
    pub retries: u32,

    /// Delay between attempts of the same item.
    #[arg(long, default_value_t = 1000)]
    pub retry_delay_ms: u64,

    /// Page load timeout.
    #[arg(long, default_value_t = 30)]
    pub nav_timeout_secs: u64,

    /// Also write the failure report as JSON Lines to this path.
    #[arg(long)]
    pub report: Option<String>,
}

#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Content URL (article, video, course or bootcamp).
    #[arg(long)]
    pub url: String,

    /// Netscape cookie file holding the logged-in session.
    #[arg(long, default_value = ".cookies.txt")]
    pub cookies: String,

    /// Class pages read at the same time while walking a bootcamp.
    #[arg(long, default_value_t = 4)]
    pub class_concurrency: usize,

    /// Page load timeout.
    #[arg(long, default_value_t = 30)]
    pub nav_timeout_secs: u64,
}
