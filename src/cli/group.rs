//! Commands for managing groups.

use structopt::StructOpt;

use crate::{
    Config,
    Result,
    db,
    models::{Group, User},
    permissions,
};
use super::util::{acting_user, print_table};

#[derive(StructOpt)]
pub struct Opts {
    #[structopt(subcommand)]
    command: Command,
}

#[derive(StructOpt)]
pub enum Command {
    /// Add a new group
    #[structopt(name = "add")]
    Add(AddOpts),
    /// Add a user to a group
    #[structopt(name = "join")]
    Join(JoinOpts),
    /// List groups
    #[structopt(name = "list")]
    List(ListOpts),
}

pub fn main(cfg: &Config, opts: Opts) -> Result<()> {
    match opts.command {
        Command::Add(opts) => add_group(cfg, opts),
        Command::Join(opts) => join(cfg, opts),
        Command::List(opts) => list(cfg, opts),
    }
}

#[derive(StructOpt)]
pub struct AddOpts {
    /// Group's name
    name: String,
    /// Email address of the user creating this group
    #[structopt(long = "as")]
    actor: Option<String>,
}

fn add_group(cfg: &Config, opts: AddOpts) -> Result<()> {
    let db = db::connect(cfg)?;
    let actor = acting_user(&db, opts.actor.as_ref().map(String::as_str))?;
    let group = Group::create(&db, &opts.name, actor.as_ref())?;

    println!("Created group {}", group.id);

    Ok(())
}

#[derive(StructOpt)]
pub struct JoinOpts {
    /// Group's name
    group: String,
    /// Email address of the user to add
    email: String,
}

fn join(cfg: &Config, opts: JoinOpts) -> Result<()> {
    let db = db::connect(cfg)?;
    let group = Group::by_name(&db, &opts.group)?;
    let user = User::by_email(&db, &opts.email)?;

    group.add_member(&db, &user)?;

    println!("Added {} to {}", user.email, group.name);

    Ok(())
}

#[derive(StructOpt)]
pub struct ListOpts {
    /// Only list groups subordinate to this user
    #[structopt(long = "as")]
    actor: Option<String>,
}

fn list(cfg: &Config, opts: ListOpts) -> Result<()> {
    let db = db::connect(cfg)?;

    let groups = match acting_user(&db, opts.actor.as_ref().map(String::as_str))? {
        Some(actor) => permissions::subordinate_groups(&db, &cfg.moderation, &actor)?,
        None => Group::all(&db)?,
    };

    let mut rows = Vec::with_capacity(groups.len());

    for group in &groups {
        let members = group.members(&db)?
            .iter()
            .map(|user| user.email.clone())
            .collect::<Vec<_>>()
            .join(", ");
        rows.push((group.id.to_string(), group.name.clone(), members));
    }

    print_table(("ID", "Name", "Members"), &rows);

    Ok(())
}
