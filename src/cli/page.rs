//! Commands for editing, moderating, and reading pages.

use structopt::StructOpt;

use crate::{
    Config,
    Result,
    db,
    models::{Page, Publication, User},
    moderation::{self, Approval, Deletion, Edit},
    permissions::Position,
    publisher::{self, PageContent, PluginContent, Request},
};
use super::util::{acting_user, print_table, with_context};

#[derive(StructOpt)]
pub struct Opts {
    #[structopt(subcommand)]
    command: Command,
}

#[derive(StructOpt)]
pub enum Command {
    /// List pages
    #[structopt(name = "list")]
    List(ListOpts),
    /// Add a new page
    #[structopt(name = "add")]
    Add(AddOpts),
    /// Change a page
    #[structopt(name = "edit")]
    Edit(EditOpts),
    /// Mark a page as published
    #[structopt(name = "publish")]
    Publish(PublishOpts),
    /// Mark a page as not published
    #[structopt(name = "unpublish")]
    Unpublish(PageOpts),
    /// Describe the latest change to a page
    #[structopt(name = "message")]
    Message(MessageOpts),
    /// Delete a page, or request its deletion
    #[structopt(name = "delete")]
    Delete(PageOpts),
    /// Approve changes to a page
    #[structopt(name = "approve")]
    Approve(PageOpts),
    /// Show moderation log of a page
    #[structopt(name = "log")]
    Log(LogOpts),
    /// Show content of a page
    #[structopt(name = "show")]
    Show(ShowOpts),
}

pub fn main(cfg: &Config, opts: Opts) -> Result<()> {
    match opts.command {
        Command::List(opts) => list(cfg, opts),
        Command::Add(opts) => add(cfg, opts),
        Command::Edit(opts) => edit(cfg, opts),
        Command::Publish(opts) => publish(cfg, opts),
        Command::Unpublish(opts) => unpublish(cfg, opts),
        Command::Message(opts) => message(cfg, opts),
        Command::Delete(opts) => delete(cfg, opts),
        Command::Approve(opts) => approve(cfg, opts),
        Command::Log(opts) => log(cfg, opts),
        Command::Show(opts) => show(cfg, opts),
    }
}

/// Options common to commands acting on a single page.
#[derive(StructOpt)]
pub struct PageOpts {
    /// Page's ID
    page: i32,
    /// Email address of the acting user
    #[structopt(long = "as")]
    actor: Option<String>,
}

#[derive(StructOpt)]
pub struct ListOpts {
    /// Show moderation state as seen by this user
    #[structopt(long = "as")]
    actor: Option<String>,
}

fn list(cfg: &Config, opts: ListOpts) -> Result<()> {
    let db = db::connect(cfg)?;
    let actor = acting_user(&db, opts.actor.as_ref().map(String::as_str))?;
    let pages = Page::all(&db)?;

    let rows = with_context(cfg, actor.as_ref(), |ctx| {
        let mut rows = Vec::with_capacity(pages.len());

        for page in &pages {
            let state = moderation::page_moderator_state(&db, ctx, page)?;
            rows.push((
                page.id.to_string(),
                page.parent.map(|p| p.to_string()).unwrap_or_default(),
                format!("{}{}", "  ".repeat(page.level as usize), page.slug),
                page.title.clone(),
                if page.published { "yes" } else { "no" },
                state.label,
            ));
        }

        Ok(rows)
    })?;

    print_table(("ID", "Parent", "Slug", "Title", "Published", "State"), &rows);

    Ok(())
}

#[derive(StructOpt)]
pub struct AddOpts {
    /// Page's title
    title: String,
    /// Page's slug
    #[structopt(long = "slug")]
    slug: String,
    /// ID of the parent page
    #[structopt(long = "parent")]
    parent: Option<i32>,
    /// Text content of the page
    #[structopt(long = "text")]
    text: Option<String>,
    /// Describe this change
    #[structopt(long = "message", short = "m")]
    message: Option<String>,
    /// Email address of the acting user
    #[structopt(long = "as")]
    actor: Option<String>,
}

fn add(cfg: &Config, opts: AddOpts) -> Result<()> {
    let db = db::connect(cfg)?;
    let actor = acting_user(&db, opts.actor.as_ref().map(String::as_str))?;
    let parent = match opts.parent {
        Some(id) => Some(Page::by_id(&db, id)?),
        None => None,
    };

    if let Some(ref parent) = parent {
        if moderation::will_require_moderation(
            &db, &cfg.moderation, parent, Position::FirstChild)?
        {
            info!("Pages under {} are moderated", parent.id);
        }
    }

    let page = with_context(cfg, actor.as_ref(), |ctx| {
        let page = moderation::create_page(
            &db, ctx, parent.as_ref(), &opts.title, &opts.slug)?;

        if let Some(ref text) = opts.text {
            page.add_plugin(&db, "text", text)?;
        }

        if let Some(ref message) = opts.message {
            moderation::update_moderation_message(&db, ctx, &page, message)?;
        }

        Ok(page)
    })?;

    println!("Created page {} ({})", page.id, page.moderator_state);

    Ok(())
}

#[derive(StructOpt)]
pub struct EditOpts {
    /// Page's ID
    page: i32,
    /// New title
    #[structopt(long = "title")]
    title: Option<String>,
    /// New slug
    #[structopt(long = "slug")]
    slug: Option<String>,
    /// Append a text plugin to the page
    #[structopt(long = "text")]
    text: Option<String>,
    /// Describe this change
    #[structopt(long = "message", short = "m")]
    message: Option<String>,
    /// Email address of the acting user
    #[structopt(long = "as")]
    actor: Option<String>,
}

fn edit(cfg: &Config, opts: EditOpts) -> Result<()> {
    let EditOpts { page, title, slug, text, message, actor } = opts;

    let db = db::connect(cfg)?;
    let actor = acting_user(&db, actor.as_ref().map(String::as_str))?;
    let mut page = Page::by_id(&db, page)?;

    with_context(cfg, actor.as_ref(), |ctx| {
        if let Some(ref text) = text {
            page.add_plugin(&db, "text", text)?;
        }

        moderation::edit_page(&db, ctx, &mut page, Edit {
            title,
            slug,
            published: None,
            message,
        })?;

        Ok(())
    })?;

    println!("Page {} is now {}", page.id, page.moderator_state);

    Ok(())
}

#[derive(StructOpt)]
pub struct PublishOpts {
    /// Page's ID
    page: i32,
    /// Also make the draft public immediately, without waiting for approval
    #[structopt(long = "now")]
    now: bool,
    /// Email address of the acting user
    #[structopt(long = "as")]
    actor: Option<String>,
}

fn publish(cfg: &Config, opts: PublishOpts) -> Result<()> {
    let db = db::connect(cfg)?;
    let actor = acting_user(&db, opts.actor.as_ref().map(String::as_str))?;
    let mut page = Page::by_id(&db, opts.page)?;

    with_context(cfg, actor.as_ref(), |ctx| {
        moderation::edit_page(&db, ctx, &mut page, Edit {
            published: Some(true),
            ..Edit::default()
        })?;

        if opts.now
        && moderation::publish_page(&db, ctx, &mut page)?
            == Publication::WaitingForParents
        {
            println!("Page {} will be published with its parent", page.id);
        }

        Ok(())
    })?;

    println!("Page {} is now {}", page.id, page.moderator_state);

    Ok(())
}

fn unpublish(cfg: &Config, opts: PageOpts) -> Result<()> {
    let db = db::connect(cfg)?;
    let actor = acting_user(&db, opts.actor.as_ref().map(String::as_str))?;
    let mut page = Page::by_id(&db, opts.page)?;

    with_context(cfg, actor.as_ref(), |ctx| {
        moderation::edit_page(&db, ctx, &mut page, Edit {
            published: Some(false),
            ..Edit::default()
        })?;
        Ok(())
    })?;

    println!("Page {} is now {}", page.id, page.moderator_state);

    Ok(())
}

#[derive(StructOpt)]
pub struct MessageOpts {
    /// Page's ID
    page: i32,
    /// Message describing the change
    message: String,
    /// Email address of the acting user
    #[structopt(long = "as")]
    actor: Option<String>,
}

fn message(cfg: &Config, opts: MessageOpts) -> Result<()> {
    let db = db::connect(cfg)?;
    let actor = acting_user(&db, opts.actor.as_ref().map(String::as_str))?;
    let page = Page::by_id(&db, opts.page)?;

    let state = with_context(cfg, actor.as_ref(), |ctx| {
        Ok(moderation::update_moderation_message(&db, ctx, &page, &opts.message)?)
    })?;

    println!("Updated log entry {} ({})", state.id, state.action);

    Ok(())
}

fn delete(cfg: &Config, opts: PageOpts) -> Result<()> {
    let db = db::connect(cfg)?;
    let actor = acting_user(&db, opts.actor.as_ref().map(String::as_str))?;
    let page = Page::by_id(&db, opts.page)?;

    let deletion = with_context(cfg, actor.as_ref(), |ctx| {
        Ok(moderation::delete_page(&db, ctx, page)?)
    })?;

    match deletion {
        Deletion::Requested => println!("Requested deletion of page {}", opts.page),
        Deletion::Deleted => println!("Deleted page {}", opts.page),
    }

    Ok(())
}

fn approve(cfg: &Config, opts: PageOpts) -> Result<()> {
    let db = db::connect(cfg)?;
    let actor = acting_user(&db, opts.actor.as_ref().map(String::as_str))?;
    let page = Page::by_id(&db, opts.page)?;

    let approval = with_context(cfg, actor.as_ref(), |ctx| {
        Ok(moderation::approve_page(&db, ctx, page)?)
    })?;

    match approval {
        Approval::Ignored => println!("Nothing to approve"),
        Approval::Approved => println!("Approved page {}", opts.page),
        Approval::Published => println!("Approved and published page {}", opts.page),
        Approval::WaitingForParents => println!(
            "Approved page {}, it will be published with its parent", opts.page),
        Approval::Deleted => println!("Approved deletion of page {}", opts.page),
    }

    Ok(())
}

#[derive(StructOpt)]
pub struct LogOpts {
    /// Page's ID
    page: i32,
}

fn log(cfg: &Config, opts: LogOpts) -> Result<()> {
    let db = db::connect(cfg)?;
    let page = Page::by_id(&db, opts.page)?;

    let mut rows = Vec::new();

    for state in page.states(&db)? {
        let user = match state.user {
            Some(id) => User::by_id(&db, id)?.email.clone(),
            None => String::new(),
        };

        rows.push((
            state.created.format("%Y-%m-%d %H:%M:%S").to_string(),
            state.action.to_string(),
            user,
            state.message,
        ));
    }

    print_table(("Date", "Action", "User", "Message"), &rows);

    Ok(())
}

#[derive(StructOpt)]
pub struct ShowOpts {
    /// Page's ID
    page: i32,
    /// Query string of the request, e.g. `preview&draft`
    #[structopt(long = "query", default_value = "")]
    query: String,
    /// Email address of the reading user
    #[structopt(long = "as")]
    actor: Option<String>,
}

fn show(cfg: &Config, opts: ShowOpts) -> Result<()> {
    let db = db::connect(cfg)?;
    let reader = acting_user(&db, opts.actor.as_ref().map(String::as_str))?;

    let representation = publisher::select(Some(&Request {
        query: &opts.query,
        user: reader.as_ref(),
    }));

    let content = match PageContent::load(&db, representation, opts.page)? {
        Some(content) => content,
        None => {
            println!("Page {} has no {} version", opts.page, representation);
            return Ok(());
        }
    };

    println!("{} ({})", content.title, content.representation);
    println!("/{}", content.slug);

    for plugin in PluginContent::for_page(&db, representation, opts.page)? {
        println!("\n[{}]\n{}", plugin.kind, plugin.body);
    }

    Ok(())
}
