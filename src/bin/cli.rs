//! pathtrack CLI Client
//!
//! Records the current directory (`--put`) or prints tracked directories,
//! most recent first (`--get`).

use std::path::PathBuf;

use clap::{ArgGroup, Parser};
use pathtrack::config::DEFAULT_SOCKET_PATH;
use pathtrack::Client;

/// pathtrack client
#[derive(Parser, Debug)]
#[command(name = "pathtrack")]
#[command(about = "Path tracker client")]
#[command(after_help = "Either --put or --get must be specified")]
#[command(group(ArgGroup::new("command").required(true).args(["put", "get"])))]
struct Args {
    /// Unix socket path
    #[arg(short, long, env = "PATHTRACK_SOCKET", default_value = DEFAULT_SOCKET_PATH)]
    socket: PathBuf,

    /// Put current path in database
    #[arg(long)]
    put: bool,

    /// Get paths from database, most recent first
    #[arg(long)]
    get: bool,
}

fn main() {
    let args = Args::parse();

    let result = Client::connect(&args.socket).and_then(|client| {
        if args.get {
            for path in client.get()? {
                println!("{}", path);
            }
            Ok(())
        } else {
            client.put_current_dir().map(|_| ())
        }
    });

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
