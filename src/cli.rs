//! Command-Line Interface (CLI) argument parsing.
//!
//! Arguments are parsed with `clap` and merged last into the `figment`
//! configuration, so they override the TOML file and the environment.

use clap::Parser;
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Notifies webhook subscribers when artifacts are stored in a repository.
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Path to the webhooks.properties subscriptions file.
    #[arg(short, long, value_name = "FILE")]
    pub subscriptions: Option<PathBuf>,

    /// Address of the admin server.
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<SocketAddr>,

    /// Number of concurrent webhook deliveries.
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Reload the subscriptions file when it changes.
    #[arg(long)]
    pub watch: bool,

    /// Logging level (e.g. info, debug).
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();
        let mut webhooks = Dict::new();
        let mut server = Dict::new();
        let mut dispatcher = Dict::new();

        if let Some(path) = &self.subscriptions {
            webhooks.insert(
                "subscriptions_path".into(),
                Value::from(path.display().to_string()),
            );
        }
        // Only an explicit flag overrides the file.
        if self.watch {
            webhooks.insert("watch".into(), Value::from(true));
        }
        if let Some(addr) = self.listen {
            server.insert("listen_address".into(), Value::from(addr.to_string()));
        }
        if let Some(concurrency) = self.concurrency {
            dispatcher.insert("concurrency".into(), Value::from(concurrency));
        }
        if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        for (name, section) in [("webhooks", webhooks), ("server", server), ("dispatcher", dispatcher)] {
            if !section.is_empty() {
                dict.insert(name.into(), Value::from(section));
            }
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
