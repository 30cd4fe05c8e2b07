//! Commands for managing page moderators.

use structopt::StructOpt;

use crate::{
    Config,
    Result,
    db,
    models::{Page, PageModerator, User, moderator::Scope},
};
use super::util::print_table;

#[derive(StructOpt)]
pub struct Opts {
    #[structopt(subcommand)]
    command: Command,
}

#[derive(StructOpt)]
pub enum Command {
    /// Make a user moderator of a page
    #[structopt(name = "add")]
    Add(AddOpts),
    /// List moderators of a page
    #[structopt(name = "list")]
    List(ListOpts),
}

pub fn main(cfg: &Config, opts: Opts) -> Result<()> {
    match opts.command {
        Command::Add(opts) => add(cfg, opts),
        Command::List(opts) => list(cfg, opts),
    }
}

#[derive(StructOpt)]
pub struct AddOpts {
    /// Page's ID
    page: i32,
    /// Moderator's email address
    email: String,
    /// Moderate the page itself
    #[structopt(long = "page")]
    moderate_page: bool,
    /// Moderate the page's children
    #[structopt(long = "children")]
    moderate_children: bool,
    /// Moderate all the page's descendants
    #[structopt(long = "descendants")]
    moderate_descendants: bool,
}

fn add(cfg: &Config, opts: AddOpts) -> Result<()> {
    let db = db::connect(cfg)?;
    let page = Page::by_id(&db, opts.page)?;
    let user = User::by_email(&db, &opts.email)?;

    let mut scope = Scope {
        page: opts.moderate_page,
        children: opts.moderate_children,
        descendants: opts.moderate_descendants,
    };

    if !(scope.page || scope.children || scope.descendants) {
        scope.page = true;
    }

    let moderator = PageModerator::create(&db, &page, &user, scope)?;

    println!("Created moderator {}", moderator.id);

    Ok(())
}

#[derive(StructOpt)]
pub struct ListOpts {
    /// Page's ID
    page: i32,
    /// Also list moderators of ancestors whose grants apply to this page
    #[structopt(long = "all")]
    all: bool,
}

fn list(cfg: &Config, opts: ListOpts) -> Result<()> {
    let db = db::connect(cfg)?;
    let page = Page::by_id(&db, opts.page)?;

    let rows = if opts.all {
        PageModerator::governing(&db, &page)?
            .into_iter()
            .map(|g| (
                g.user.email,
                g.grant.page.to_string(),
                g.level.to_string(),
                scope_name(&g.grant),
            ))
            .collect::<Vec<_>>()
    } else {
        let mut rows = Vec::new();
        for moderator in PageModerator::of_page(&db, &page)? {
            rows.push((
                User::by_id(&db, moderator.user)?.email.clone(),
                moderator.page.to_string(),
                page.level.to_string(),
                scope_name(&moderator),
            ));
        }
        rows
    };

    print_table(("User", "Granted on", "Level", "Scope"), &rows);

    Ok(())
}

fn scope_name(grant: &crate::db::models::PageModerator) -> String {
    let parts = [
        (grant.moderate_page, "page"),
        (grant.moderate_children, "children"),
        (grant.moderate_descendants, "descendants"),
    ];

    parts.iter()
        .filter(|(enabled, _)| *enabled)
        .map(|(_, name)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}
