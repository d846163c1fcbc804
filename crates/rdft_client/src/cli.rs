use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// RDFT client: upload, download, list, and delete files on an RDFT server.
#[derive(Debug, Parser)]
#[command(name = "rdft-client", version, about)]
pub struct Cli {
    /// Server address to send requests to.
    #[arg(long, global = true, default_value = "127.0.0.1")]
    pub host: String,

    /// Server port.
    #[arg(long, global = true, default_value_t = 9696)]
    pub port: u16,

    /// Local address to bind this client's socket to.
    #[arg(long = "client-host", global = true, default_value = "0.0.0.0")]
    pub client_host: String,

    /// Local port to bind this client's socket to. `0` picks an ephemeral port.
    #[arg(long = "client-port", global = true, default_value_t = 0)]
    pub client_port: u16,

    /// User name to authenticate as. Omit to act anonymously.
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Password for `--user`. Only meaningful alongside it.
    #[arg(long, global = true, requires = "user")]
    pub password: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Upload a local file or directory.
    Upload {
        /// Local path to read.
        src: PathBuf,
        /// Destination path on the server. Defaults to the source's file name.
        #[arg(long)]
        dest: Option<String>,
    },
    /// Download a remote file or directory.
    Download {
        /// Path on the server.
        src: String,
        /// Local path to write.
        dest: PathBuf,
    },
    /// List a remote directory.
    List {
        /// Path on the server. Defaults to the storage root.
        #[arg(default_value = "")]
        path: String,
        /// Recurse into subdirectories.
        #[arg(long)]
        recursive: bool,
    },
    /// Delete a remote file or directory.
    Delete {
        /// Path on the server.
        path: String,
    },
}
