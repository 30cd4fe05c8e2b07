//! Moderation workflow against a real database.
//!
//! These tests need a PostgreSQL server, see `common/db.rs` for how to point
//! them at one.

use folio::{
    db::{Connection, types::{ModeratorAction, ModeratorState}},
    models::{Page, PageModerator, Publication, User, moderator::Scope},
    moderation::{self, Approval, Context, Deletion, Edit},
    permissions::{MAX_MODERATION_LEVEL, moderation_level},
    publisher::{PageContent, Representation},
};
use lazy_static::lazy_static;

mod common;

use self::common::{Database, Outbox, setup_db};

lazy_static! {
    static ref DATABASE: Database = setup_db()
        .expect("Cannot create test database");
}

struct Site {
    chief: User,
    lead: User,
    editor: User,
    root: Page,
    page: Page,
}

/// Create a published root page with a single child, moderated by `chief`
/// (a superuser, moderating the root's children) and `lead` (moderating the
/// child only).
fn site(db: &Connection, outbox: &Outbox) -> Result<Site, failure::Error> {
    let config = common::config();
    let mailer = outbox.mailer();

    let chief = User::create(db, "chief@folio.test", "Chief", true, true, None)?;
    let lead = User::create(db, "lead@folio.test", "Lead", false, true, None)?;
    let editor = User::create(db, "editor@folio.test", "Editor", false, true, None)?;

    let ctx = Context { config: &config, user: Some(&chief), mailer: &mailer };
    let mut root = moderation::create_page(db, &ctx, None, "Home", "home")?;
    moderation::publish_page(db, &ctx, &mut root)?;
    let page = moderation::create_page(db, &ctx, Some(&root), "About", "about")?;

    PageModerator::create(db, &root, &chief, Scope {
        children: true,
        ..Scope::default()
    })?;
    PageModerator::create(db, &page, &lead, Scope {
        page: true,
        ..Scope::default()
    })?;

    Ok(Site { chief, lead, editor, root, page })
}

fn actions(db: &Connection, page: &Page) -> Vec<ModeratorAction> {
    page.states(db).unwrap().into_iter().map(|s| s.action).collect()
}

#[test]
fn unmoderated_pages_need_no_approval() {
    DATABASE.lock(|db| {
        let config = common::config();
        let outbox = Outbox::default();
        let mailer = outbox.mailer();
        let editor = User::create(db, "editor@folio.test", "Editor", false, true, None)?;
        let ctx = Context { config: &config, user: Some(&editor), mailer: &mailer };

        let page = moderation::create_page(db, &ctx, None, "Home", "home")?;

        let level = moderation_level(db, &config.moderation, &page, None, true)?;
        assert_eq!(level.level, MAX_MODERATION_LEVEL);
        assert!(!level.requires_approval);

        assert_eq!(page.moderator_state, ModeratorState::Changed);
        assert_eq!(actions(db, &page), vec![ModeratorAction::Add]);
        assert!(outbox.recipients().is_empty());

        Ok(())
    }).unwrap();
}

#[test]
fn publishing_flag_is_logged_once() {
    DATABASE.lock(|db| {
        let config = common::config();
        let outbox = Outbox::default();
        let mailer = outbox.mailer();
        let Site { chief, mut page, .. } = site(db, &outbox)?;
        let ctx = Context { config: &config, user: Some(&chief), mailer: &mailer };

        let before = actions(db, &page).len();

        moderation::edit_page(db, &ctx, &mut page, Edit {
            published: Some(true),
            ..Edit::default()
        })?;
        moderation::edit_page(db, &ctx, &mut page, Edit {
            title: Some("About us".into()),
            ..Edit::default()
        })?;
        moderation::edit_page(db, &ctx, &mut page, Edit {
            published: Some(false),
            ..Edit::default()
        })?;

        assert_eq!(&actions(db, &page)[before..], &[
            ModeratorAction::Publish,
            ModeratorAction::Unpublish,
        ]);

        Ok(())
    }).unwrap();
}

#[test]
fn message_amends_recent_entry() {
    DATABASE.lock(|db| {
        let config = common::config();
        let outbox = Outbox::default();
        let mailer = outbox.mailer();
        let editor = User::create(db, "editor@folio.test", "Editor", false, true, None)?;
        let ctx = Context { config: &config, user: Some(&editor), mailer: &mailer };

        let page = moderation::create_page(db, &ctx, None, "Home", "home")?;
        let amended = moderation::update_moderation_message(
            db, &ctx, &page, "Initial version")?;

        let states = page.states(db)?;
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].id, amended.id);
        assert_eq!(states[0].action, ModeratorAction::Add);
        assert_eq!(states[0].message, "Initial version");

        // The entry now has a message, so another one is appended.
        moderation::update_moderation_message(db, &ctx, &page, "Typo")?;

        let states = page.states(db)?;
        assert_eq!(states.len(), 2);
        assert_eq!(states[1].action, ModeratorAction::Changed);
        assert_eq!(states[1].message, "Typo");

        Ok(())
    }).unwrap();
}

#[test]
fn changes_are_approved_bottom_up() {
    DATABASE.lock(|db| {
        let config = common::config();
        let outbox = Outbox::default();
        let mailer = outbox.mailer();
        let Site { chief, lead, editor, mut page, .. } = site(db, &outbox)?;
        let id = page.id;

        let as_editor = Context { config: &config, user: Some(&editor), mailer: &mailer };
        moderation::edit_page(db, &as_editor, &mut page, Edit {
            title: Some("About us".into()),
            message: Some("Better title".into()),
            ..Edit::default()
        })?;

        assert_eq!(page.moderator_state, ModeratorState::NeedApproval);
        assert_eq!(outbox.recipients(), vec![vec![
            "chief@folio.test".to_string(),
            "lead@folio.test".to_string(),
        ]]);

        // Editors can't approve their own changes.
        let page = Page::by_id(db, id)?;
        assert_eq!(moderation::approve_page(db, &as_editor, page)?, Approval::Ignored);

        let as_lead = Context { config: &config, user: Some(&lead), mailer: &mailer };
        let page = Page::by_id(db, id)?;
        let before = actions(db, &page).len();
        assert_eq!(moderation::approve_page(db, &as_lead, page)?, Approval::Approved);

        let page = Page::by_id(db, id)?;
        let after = actions(db, &page);
        assert_eq!(&after[before..], &[ModeratorAction::Approve]);
        assert_eq!(PageContent::load(db, Representation::Public, page.id)?.map(|c| c.title), None);

        // Approving twice does nothing.
        assert_eq!(moderation::approve_page(db, &as_lead, page)?, Approval::Ignored);

        let as_chief = Context { config: &config, user: Some(&chief), mailer: &mailer };
        let page = Page::by_id(db, id)?;
        assert_eq!(moderation::approve_page(db, &as_chief, page)?, Approval::Published);

        let page = Page::by_id(db, id)?;
        assert_eq!(page.moderator_state, ModeratorState::Approved);
        assert!(actions(db, &page).is_empty());

        let public = PageContent::load(db, Representation::Public, page.id)?
            .expect("page to be public");
        assert_eq!(public.title, "About us");

        Ok(())
    }).unwrap();
}

#[test]
fn approved_deletion_removes_page() {
    DATABASE.lock(|db| {
        let config = common::config();
        let outbox = Outbox::default();
        let mailer = outbox.mailer();
        let Site { chief, editor, root, page, .. } = site(db, &outbox)?;
        let id = page.id;

        let as_editor = Context { config: &config, user: Some(&editor), mailer: &mailer };
        assert_eq!(moderation::delete_page(db, &as_editor, page)?, Deletion::Requested);

        let page = Page::by_id(db, id)?;
        assert_eq!(page.moderator_state, ModeratorState::NeedDeleteApproval);
        assert_eq!(actions(db, &page).last(), Some(&ModeratorAction::Delete));

        let as_chief = Context { config: &config, user: Some(&chief), mailer: &mailer };
        assert_eq!(moderation::approve_page(db, &as_chief, page)?, Approval::Deleted);

        assert!(Page::by_id(db, id).is_err());
        assert!(Page::by_id(db, root.id).is_ok());

        Ok(())
    }).unwrap();
}

#[test]
fn approval_waits_for_unpublished_parent() {
    DATABASE.lock(|db| {
        let config = common::config();
        let outbox = Outbox::default();
        let mailer = outbox.mailer();

        let chief = User::create(db, "chief@folio.test", "Chief", true, true, None)?;
        let editor = User::create(db, "editor@folio.test", "Editor", false, true, None)?;
        let as_chief = Context { config: &config, user: Some(&chief), mailer: &mailer };
        let as_editor = Context { config: &config, user: Some(&editor), mailer: &mailer };

        let mut root = moderation::create_page(db, &as_chief, None, "Home", "home")?;
        let mut page = moderation::create_page(
            db, &as_chief, Some(&root), "About", "about")?;
        let id = page.id;

        PageModerator::create(db, &root, &chief, Scope {
            children: true,
            ..Scope::default()
        })?;

        moderation::edit_page(db, &as_editor, &mut page, Edit {
            title: Some("About us".into()),
            ..Edit::default()
        })?;
        assert_eq!(page.moderator_state, ModeratorState::NeedApproval);

        let page = Page::by_id(db, id)?;
        assert_eq!(
            moderation::approve_page(db, &as_chief, page)?,
            Approval::WaitingForParents,
        );

        let page = Page::by_id(db, id)?;
        assert_eq!(page.moderator_state, ModeratorState::ApprovedWaitingForParents);
        assert!(PageContent::load(db, Representation::Public, id)?.is_none());

        assert_eq!(
            moderation::publish_page(db, &as_chief, &mut root)?,
            Publication::Published,
        );

        let page = Page::by_id(db, id)?;
        assert_eq!(page.moderator_state, ModeratorState::Approved);
        let public = PageContent::load(db, Representation::Public, id)?
            .expect("page to be public");
        assert_eq!(public.title, "About us");

        Ok(())
    }).unwrap();
}
