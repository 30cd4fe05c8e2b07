use structopt::StructOpt;

use crate::{Result, config::Logging};

mod group;
mod moderator;
mod page;
mod permission;
mod search;
mod user;
mod util;

#[derive(StructOpt)]
#[structopt(name = "folio")]
struct Opts {
    #[structopt(subcommand)]
    command: Command,
}

#[derive(StructOpt)]
enum Command {
    /// Manage users
    #[structopt(name = "user")]
    User(user::Opts),
    /// Manage groups
    #[structopt(name = "group")]
    Group(group::Opts),
    /// Edit and moderate pages
    #[structopt(name = "page")]
    Page(page::Opts),
    /// Manage page moderators
    #[structopt(name = "moderator")]
    Moderator(moderator::Opts),
    /// Grant page permissions
    #[structopt(name = "permission")]
    Permission(permission::Opts),
    /// Manage the search index
    #[structopt(name = "search")]
    Search(search::Opts),
}

pub fn main() -> Result<()> {
    let opts = Opts::from_args();
    let config = crate::config::load()?;

    setup_logging(&config.logging)?;

    // Validate after logging is set up so that problems get logged.
    config.validate()?;

    match opts.command {
        Command::User(opts) => user::main(config, opts),
        Command::Group(opts) => group::main(config, opts),
        Command::Page(opts) => page::main(config, opts),
        Command::Moderator(opts) => moderator::main(config, opts),
        Command::Permission(opts) => permission::main(config, opts),
        Command::Search(opts) => search::main(config, opts),
    }
}

fn setup_logging(config: &Logging) -> Result<()> {
    let mut builder = env_logger::Builder::from_default_env();
    builder.filter_level(config.level);

    for (module, level) in &config.filters {
        builder.filter_module(module, *level);
    }

    builder.try_init()?;
    Ok(())
}
