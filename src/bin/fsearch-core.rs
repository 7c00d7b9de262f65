//! Thin CLI driver over the `fsearch_core` library (§10.4).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use fsearch_core::{CancellationToken, Database, IncludePath};
use log::error;

#[derive(Debug, Parser)]
#[command(name = "fsearch-core", version, about = "Filesystem indexing and search core")]
struct Args {
    /// Scan the given roots and write their index to disk, then exit.
    #[arg(long, num_args = 1.., value_name = "PATH")]
    updatedb: Vec<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    if args.updatedb.is_empty() {
        eprintln!("nothing to do: pass --updatedb <PATH>...");
        return ExitCode::FAILURE;
    }

    let includes = args.updatedb.into_iter().map(IncludePath::new).collect();
    let database = Database::new(includes, vec![], vec![], false);
    let cancel = CancellationToken::noop();

    match database.scan(&cancel, |path| log::info!("scanning {path}")) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            error!("scan cancelled");
            ExitCode::FAILURE
        }
        Err(err) => {
            error!("scan failed: {err}");
            ExitCode::FAILURE
        }
    }
}
