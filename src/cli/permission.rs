//! Commands for granting page permissions.

use failure::Fail;
use structopt::StructOpt;

use crate::{
    Config,
    Result,
    db::{self, Connection, types::GrantOn},
    models::{GlobalPagePermission, Group, Holder, Page, PagePermission, User},
    permissions::{self, PermissionBits},
};
use super::util::acting_user;

#[derive(StructOpt)]
pub struct Opts {
    #[structopt(subcommand)]
    command: Command,
}

#[derive(StructOpt)]
pub enum Command {
    /// Grant permissions on all pages
    #[structopt(name = "global")]
    Global(GlobalOpts),
    /// Grant permissions on a part of the page tree
    #[structopt(name = "page")]
    Page(PageOpts),
    /// Show a user's level in the permission hierarchy
    #[structopt(name = "level")]
    Level(LevelOpts),
}

pub fn main(cfg: &Config, opts: Opts) -> Result<()> {
    match opts.command {
        Command::Global(opts) => global(cfg, opts),
        Command::Page(opts) => page(cfg, opts),
        Command::Level(opts) => level(cfg, opts),
    }
}

#[derive(StructOpt)]
pub struct HolderOpts {
    /// Email address of the user receiving permissions
    #[structopt(long = "user", raw(required_unless = r#""group""#))]
    user: Option<String>,
    /// Name of the group receiving permissions
    #[structopt(long = "group", raw(conflicts_with = r#""user""#))]
    group: Option<String>,
}

impl HolderOpts {
    fn resolve(&self, db: &Connection) -> Result<Holder> {
        match (&self.user, &self.group) {
            (Some(email), _) => Ok(Holder::from(&User::by_email(db, email)?)),
            (None, Some(name)) => Ok(Holder::from(&Group::by_name(db, name)?)),
            (None, None) => Err(failure::err_msg("either --user or --group is required")),
        }
    }
}

#[derive(StructOpt)]
pub struct GlobalOpts {
    /// Comma-separated list of permissions, or `all`
    permissions: PermissionBits,
    #[structopt(flatten)]
    holder: HolderOpts,
    /// Email address of the granting user
    #[structopt(long = "as")]
    actor: Option<String>,
}

fn global(cfg: &Config, opts: GlobalOpts) -> Result<()> {
    let db = db::connect(cfg)?;

    if let Some(actor) = acting_user(&db, opts.actor.as_ref().map(String::as_str))? {
        if !permissions::has_global_change_permissions_permission(&db, &actor)? {
            return Err(PermissionDenied.into());
        }
    }

    let holder = opts.holder.resolve(&db)?;
    let permission = GlobalPagePermission::create(&db, holder, opts.permissions)?;

    println!("Created global permission {}", permission.id);

    Ok(())
}

#[derive(StructOpt)]
pub struct PageOpts {
    /// Page's ID
    page: i32,
    /// Comma-separated list of permissions, or `all`
    permissions: PermissionBits,
    #[structopt(flatten)]
    holder: HolderOpts,
    /// Which part of the tree permissions are granted on: page, children,
    /// descendants, page-and-children, or page-and-descendants
    #[structopt(long = "grant-on", default_value = "page-and-descendants")]
    grant_on: GrantOn,
    /// Email address of the granting user
    #[structopt(long = "as")]
    actor: Option<String>,
}

fn page(cfg: &Config, opts: PageOpts) -> Result<()> {
    let db = db::connect(cfg)?;
    let page = Page::by_id(&db, opts.page)?;

    if let Some(actor) = acting_user(&db, opts.actor.as_ref().map(String::as_str))? {
        if !permissions::has_generic_permission(
            &db, &cfg.moderation, page.id, &actor, PermissionBits::CHANGE_PERMISSIONS)?
        {
            return Err(PermissionDenied.into());
        }
    }

    let holder = opts.holder.resolve(&db)?;
    let permission = PagePermission::create(
        &db, &page, holder, opts.permissions, opts.grant_on)?;

    println!("Created page permission {}", permission.id);

    Ok(())
}

#[derive(StructOpt)]
pub struct LevelOpts {
    /// User's email address
    email: String,
}

fn level(cfg: &Config, opts: LevelOpts) -> Result<()> {
    let db = db::connect(cfg)?;
    let user = User::by_email(&db, &opts.email)?;

    println!("{}", permissions::user_permission_level(&db, &user)?);

    Ok(())
}

#[derive(Debug, Fail)]
#[fail(display = "Insufficient permissions")]
struct PermissionDenied;
