//! Commands for managing the search index.

use structopt::StructOpt;

use crate::{
    Config,
    Result,
    db,
    search::Backend,
};
use super::util::{Cancelled, confirm};

#[derive(StructOpt)]
pub struct Opts {
    #[structopt(subcommand)]
    command: Command,
}

#[derive(StructOpt)]
pub enum Command {
    /// Remove all documents from the search index
    #[structopt(name = "clear")]
    Clear(ClearOpts),
    /// Clear the search index and index all public pages again
    #[structopt(name = "rebuild")]
    Rebuild,
}

pub fn main(cfg: &Config, opts: Opts) -> Result<()> {
    match opts.command {
        Command::Clear(opts) => clear(cfg, opts),
        Command::Rebuild => rebuild(cfg),
    }
}

#[derive(StructOpt)]
pub struct ClearOpts {
    /// Don't ask for confirmation
    #[structopt(long = "noinput")]
    noinput: bool,
}

fn clear(cfg: &Config, opts: ClearOpts) -> Result<()> {
    let backend = Backend::from_config(&cfg.search);

    if !opts.noinput {
        println!("WARNING: This will irreparably remove EVERYTHING from your \
            search index in {}.", backend.describe());
        println!("Your choices after this are to restore from backups or \
            rebuild via the `rebuild` command.");

        if !confirm("Are you sure you wish to continue?")? {
            println!("No action taken.");
            return Err(Cancelled.into());
        }
    }

    println!("Removing all documents from your index because you said so.");

    let db = db::connect(cfg)?;
    backend.clear(&db)?;

    println!("All documents removed.");

    Ok(())
}

fn rebuild(cfg: &Config) -> Result<()> {
    let backend = Backend::from_config(&cfg.search);
    let db = db::connect(cfg)?;
    let indexed = backend.rebuild(&db)?;

    println!("Indexed {} pages.", indexed);

    Ok(())
}
