//! Commands for managing users.

use structopt::StructOpt;

use crate::{
    Config,
    Result,
    db,
    mail::Mailer,
    models::User,
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
    /// Add a new user
    #[structopt(name = "add")]
    Add(AddOpts),
    /// List users
    #[structopt(name = "list")]
    List(ListOpts),
}

pub fn main(cfg: &Config, opts: Opts) -> Result<()> {
    match opts.command {
        Command::Add(opts) => add_user(cfg, opts),
        Command::List(opts) => list(cfg, opts),
    }
}

#[derive(StructOpt)]
pub struct AddOpts {
    /// User's email address
    email: String,
    /// User's name
    #[structopt(long = "name", short = "n")]
    name: String,
    /// This user is a superuser
    #[structopt(long = "superuser")]
    is_super: bool,
    /// This user is a staff member
    #[structopt(long = "staff")]
    is_staff: bool,
    /// Email address of the creating user. The new user is notified by email
    #[structopt(long = "as")]
    actor: Option<String>,
}

fn add_user(cfg: &Config, opts: AddOpts) -> Result<()> {
    let db = db::connect(cfg)?;
    let actor = acting_user(&db, opts.actor.as_ref().map(String::as_str))?;
    let user = User::create(
        &db, &opts.email, &opts.name, opts.is_super, opts.is_staff, actor.as_ref())?;

    println!("Created user {}", user.id);

    if let Some(ref actor) = actor {
        let mailer = Mailer::from_config(&cfg.mail);
        user.notify_created(&mailer, &cfg.server.domain, actor);
    }

    Ok(())
}

#[derive(StructOpt)]
pub struct ListOpts {
    /// Only list users subordinate to this user
    #[structopt(long = "as")]
    actor: Option<String>,
}

fn list(cfg: &Config, opts: ListOpts) -> Result<()> {
    let db = db::connect(cfg)?;

    let users = match acting_user(&db, opts.actor.as_ref().map(String::as_str))? {
        Some(actor) => permissions::subordinate_users(&db, &cfg.moderation, &actor)?,
        None => User::all(&db)?,
    };

    let rows = users.iter()
        .map(|user| (
            user.id.to_string(),
            user.email.as_str(),
            user.name.as_str(),
            flags(user),
        ))
        .collect::<Vec<_>>();

    print_table(("ID", "Email", "Name", "Flags"), &rows);

    Ok(())
}

fn flags(user: &User) -> &'static str {
    match (user.is_super, user.is_staff) {
        (true, _) => "superuser",
        (false, true) => "staff",
        (false, false) => "",
    }
}
