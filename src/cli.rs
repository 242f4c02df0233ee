use clap::Parser;

use crate::config::ArchiveOptions;
use crate::zim::Namespace;

#[derive(Parser, Debug)]
#[command(name = "rzim")]
#[command(version)]
#[command(about = "A Rust ZIM reader with split archive and HTTP URL support", long_about = None)]
#[command(after_help = "Examples:\n  \
  rzim -i wiki.zim                    show header and metadata\n  \
  rzim -s \"ray ch\" -k 5 wiki.zimaa     search titles across split parts\n  \
  rzim -p A/Ray_Charles.html wiki.zim  print an article\n  \
  rzim -m Language https://example.com/wiki.zim   read metadata remotely")]
pub struct Cli {
    /// Archive parts in order: file paths or HTTP URLs
    #[arg(value_name = "PARTS", required = true)]
    pub parts: Vec<String>,

    /// Show header information and common metadata
    #[arg(short = 'i')]
    pub info: bool,

    /// List entries of the namespace
    #[arg(short = 'l')]
    pub list: bool,

    /// Search titles starting with PREFIX
    #[arg(short = 's', value_name = "PREFIX")]
    pub search: Option<String>,

    /// Maximum number of search results
    #[arg(short = 'k', value_name = "N", default_value_t = 10)]
    pub max_results: usize,

    /// Namespace to search, list or draw from (default: article namespace)
    #[arg(short = 'N', value_name = "NS")]
    pub namespace: Option<String>,

    /// Print metadata value KEY
    #[arg(short = 'm', value_name = "KEY")]
    pub metadata: Option<String>,

    /// Print content of entry PATH (namespace/url), following redirects
    #[arg(short = 'p', value_name = "PATH")]
    pub print: Option<String>,

    /// Show a random entry
    #[arg(short = 'r')]
    pub random: bool,

    /// Show the main page entry
    #[arg(long = "main")]
    pub main_page: bool,

    /// Decompressed clusters to keep cached
    #[arg(long, value_name = "N", default_value_t = 16)]
    pub cluster_cache: usize,

    /// Verbose logging (-vv => trace)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn is_http_url(part: &str) -> bool {
        part.starts_with("http://") || part.starts_with("https://")
    }

    /// The namespace given with `-N`, if it is a single ASCII character.
    pub fn namespace(&self) -> Option<Namespace> {
        let ns = self.namespace.as_deref()?;
        let mut chars = ns.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Namespace::try_from(c).ok(),
            _ => None,
        }
    }

    pub fn archive_options(&self) -> ArchiveOptions {
        ArchiveOptions::default().cluster_cache_capacity(self.cluster_cache)
    }

    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    }
}
