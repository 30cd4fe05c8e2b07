//! Moderation workflow.
//!
//! Every change to a page is recorded in its moderation log. Changes made by
//! users low in the moderation hierarchy mark the page as needing approval,
//! and moderators above them are notified. Once the most authoritative
//! moderator approves, the draft is published (or deleted, if deletion was
//! requested).
//!
//! Approvals given by lower moderators are not withdrawn when the page is
//! changed again or when a more authoritative moderator is added above
//! them.

use chrono::{Duration, NaiveDateTime, Utc};
use diesel::result::Error as DbError;
use failure::Fail;
use serde::Serialize;
use url::Url;

use crate::{
    Config,
    config::Moderation as Settings,
    db::{
        Connection,
        models as db,
        types::{ModeratorAction, ModeratorState},
    },
    mail::Mailer,
    models::{
        Page,
        PageModerator,
        PageModeratorState,
        User,
        moderator::Governing,
        page::{PublicData as PageData, Publication},
    },
    permissions::{
        ModerationLevel,
        PermissionBits,
        Position,
        has_generic_permission,
        has_page_add_permission,
        moderation_level,
    },
};

/// Time during which a message-less log entry can still have its message
/// filled in, in seconds.
pub const UPDATE_TOLERANCE: i64 = 30;

/// Value of [`DisplayState::code()`] for pages the current user should
/// approve.
pub const I_APPROVE: i32 = 100;

/// Who is acting and in what environment.
///
/// This is passed explicitly to every operation which needs to know the
/// acting user.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub config: &'a Config,
    /// User on whose behalf the operation is carried out, `None` for the
    /// system.
    pub user: Option<&'a User>,
    pub mailer: &'a Mailer,
}

impl<'a> Context<'a> {
    pub fn settings(&self) -> &'a Settings {
        &self.config.moderation
    }

    fn user_id(&self) -> Option<i32> {
        self.user.map(|u| u.id)
    }
}

/// Part of a page's state relevant to moderation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Snapshot {
    pub published: bool,
    pub moderator_state: ModeratorState,
}

/// Effects of a page change on its moderation log.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Transition {
    /// Actions to append to the log, in order.
    pub log: Vec<ModeratorAction>,
    /// Should moderators be asked to approve the page?
    pub request_approval: bool,
}

/// Decide how a page change is recorded.
///
/// `old` is the state of the page before the change, `None` if the page was
/// just created. A forced action is recorded on its own and suppresses all
/// other effects.
pub fn transition(
    page: Snapshot,
    old: Option<Snapshot>,
    forced: Option<ModeratorAction>,
) -> Transition {
    if let Some(action) = forced {
        return Transition {
            log: vec![action],
            request_approval: false,
        };
    }

    let mut log = Vec::new();

    if old.is_none() {
        log.push(ModeratorAction::Add);
    }

    let published_changed = match old {
        Some(old) => old.published != page.published,
        None => page.published,
    };

    if published_changed {
        log.push(if page.published {
            ModeratorAction::Publish
        } else {
            ModeratorAction::Unpublish
        });
    }

    let state_changed = old.map_or(true, |old| old.moderator_state != page.moderator_state);

    Transition {
        log,
        request_approval: state_changed
            && page.moderator_state == ModeratorState::NeedApproval,
    }
}

/// Record a change of a page in its moderation log.
///
/// This must be called after every save of a page's draft. `old` is the state
/// of the page before it was saved, `None` if it was just created.
///
/// If the change made the page require approval, its moderators are notified.
/// Failure to notify them is logged and otherwise ignored.
pub fn page_changed(
    dbconn: &Connection,
    ctx: &Context,
    page: &Page,
    old: Option<Snapshot>,
    forced: Option<ModeratorAction>,
) -> Result<(), DbError> {
    let transition = transition(page.snapshot(), old, forced);

    for action in transition.log {
        PageModeratorState::create(dbconn, page, ctx.user, action, "")?;
    }

    if transition.request_approval {
        // The message for this change may only be set after this call, in
        // which case recipients won't see it.
        mail_approval_request(dbconn, ctx, page)?;
    }

    Ok(())
}

/// Can a log entry still have its message filled in?
pub fn is_amendable(
    state: &db::PageModeratorState,
    user: Option<i32>,
    now: NaiveDateTime,
) -> bool {
    state.user == user
        && state.created > now - Duration::seconds(UPDATE_TOLERANCE)
        && state.message.is_empty()
}

/// Attach a message to the latest change of a page made by the acting user.
///
/// Page changes are logged when the page is saved, while the message
/// describing them arrives separately. If the acting user made a log entry
/// without a message in the last [`UPDATE_TOLERANCE`] seconds, the message is
/// attached to it; otherwise a new [`ModeratorAction::Changed`] entry is
/// created.
///
/// Concurrent changes made by the same user within this window may cause the
/// message to be attached to the wrong entry.
pub fn update_moderation_message(
    dbconn: &Connection,
    ctx: &Context,
    page: &Page,
    message: &str,
) -> Result<PageModeratorState, DbError> {
    let now = Utc::now().naive_utc();
    let since = now - Duration::seconds(UPDATE_TOLERANCE);

    let latest = PageModeratorState::latest(dbconn, page, ctx.user, since)?
        .filter(|state| is_amendable(state, ctx.user_id(), now));

    match latest {
        Some(mut state) => {
            state.set_message(dbconn, message)?;
            Ok(state)
        }
        None => PageModeratorState::create(
            dbconn, page, ctx.user, ModeratorAction::Changed, message),
    }
}

/// Moderation state of a page as presented to a particular user.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DisplayState {
    State(ModeratorState),
    /// Current user should approve this page.
    Approve,
}

impl DisplayState {
    /// Numeric code of this state.
    pub fn code(self) -> i32 {
        match self {
            DisplayState::State(ModeratorState::Changed) => 0,
            DisplayState::State(ModeratorState::NeedApproval) => 1,
            DisplayState::State(ModeratorState::NeedDeleteApproval) => 2,
            DisplayState::State(ModeratorState::Approved) => 10,
            DisplayState::State(ModeratorState::ApprovedWaitingForParents) => 11,
            DisplayState::Approve => I_APPROVE,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct StateLabel {
    pub state: DisplayState,
    /// Human-readable label, empty for approved pages.
    pub label: String,
}

/// Decide how a page's moderation state is presented.
///
/// `should_approve` tells whether the viewing user is a moderator of the page
/// who can, and has not yet, approved it.
pub fn display_state(
    moderation_enabled: bool,
    state: ModeratorState,
    should_approve: bool,
) -> StateLabel {
    let approved = state == ModeratorState::Approved;

    let state = if moderation_enabled {
        if should_approve && awaits_approval(state) {
            return StateLabel {
                state: DisplayState::Approve,
                label: "approve".to_string(),
            };
        }
        DisplayState::State(state)
    } else if !approved {
        // Without moderation there are only two states: changed and approved.
        DisplayState::State(ModeratorState::NeedApproval)
    } else {
        DisplayState::State(state)
    };

    let label = match state {
        _ if approved => String::new(),
        DisplayState::State(state) => state.name().to_string(),
        DisplayState::Approve => "approve".to_string(),
    };

    StateLabel { state, label }
}

fn awaits_approval(state: ModeratorState) -> bool {
    match state {
        ModeratorState::NeedApproval | ModeratorState::NeedDeleteApproval => true,
        _ => false,
    }
}

/// Get moderation state of a page as presented to the acting user.
pub fn page_moderator_state(dbconn: &Connection, ctx: &Context, page: &Page)
-> Result<StateLabel, DbError> {
    let settings = ctx.settings();

    let should_approve = match ctx.user {
        Some(user) if settings.moderator && awaits_approval(page.moderator_state) =>
            has_generic_permission(
                dbconn, settings, page.id, user, PermissionBits::MODERATE)?
            && PageModerator::governing(dbconn, page)?
                .iter()
                .any(|g| g.user.id == user.id)
            && !page.is_approved_by(dbconn, user.id)?,
        _ => false,
    };

    Ok(display_state(settings.moderator, page.moderator_state, should_approve))
}

/// Should the acting user approve a page?
pub fn moderator_should_approve(dbconn: &Connection, ctx: &Context, page: &Page)
-> Result<bool, DbError> {
    page_moderator_state(dbconn, ctx, page)
        .map(|state| state.state == DisplayState::Approve)
}

/// Is anyone moderating a page?
pub fn requires_moderation(dbconn: &Connection, page: &Page) -> Result<bool, DbError> {
    PageModerator::governing(dbconn, page).map(|governing| !governing.is_empty())
}

/// Will a page added at `position` relative to `target` require moderation?
pub fn will_require_moderation(
    dbconn: &Connection,
    settings: &Settings,
    target: &Page,
    position: Position,
) -> Result<bool, DbError> {
    if !settings.moderator {
        return Ok(false);
    }

    match position {
        Position::FirstChild => requires_moderation(dbconn, target),
        Position::Left | Position::Right => match target.parent(dbconn)? {
            Some(parent) => requires_moderation(dbconn, &parent),
            None => Ok(false),
        },
    }
}

/// Outcome of [`approve_page()`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Approval {
    /// Acting user is not expected to approve this page.
    Ignored,
    /// Approval was recorded, but a more authoritative moderator must still
    /// approve the page.
    Approved,
    /// Page was published.
    Published,
    /// Page was approved, but will only be published together with its
    /// parent.
    WaitingForParents,
    /// Deletion was approved and the page was deleted.
    Deleted,
}

impl_names! { for Approval ;
    Ignored => "ignored",
    Approved => "approved",
    Published => "published",
    WaitingForParents => "waiting for parents",
    Deleted => "deleted",
}

/// Decide what approving a page does.
pub fn decide_approval(
    should_approve: bool,
    level: ModerationLevel,
    delete_requested: bool,
) -> Approval {
    if !should_approve {
        Approval::Ignored
    } else if level.requires_approval {
        Approval::Approved
    } else if delete_requested {
        Approval::Deleted
    } else {
        Approval::Published
    }
}

/// Approve a page as the acting user.
///
/// A moderator in the middle of the moderation hierarchy only records their
/// approval. The most authoritative moderator publishes the page, or deletes
/// it together with its public version if deletion was requested.
pub fn approve_page(dbconn: &Connection, ctx: &Context, mut page: Page)
-> Result<Approval, DbError> {
    let user = match ctx.user {
        Some(user) => user,
        None => return Ok(Approval::Ignored),
    };

    let level = moderation_level(dbconn, ctx.settings(), &page, Some(user), false)?;
    let should_approve = moderator_should_approve(dbconn, ctx, &page)?;
    let delete_requested = should_approve && !level.requires_approval
        && page.has_delete_request(dbconn)?;

    let page_id = page.id;

    let approval = match decide_approval(should_approve, level, delete_requested) {
        Approval::Approved => {
            PageModeratorState::create(
                dbconn, &page, Some(user), ModeratorAction::Approve, "")?;
            Approval::Approved
        }
        Approval::Published => match page.publish(dbconn)? {
            Publication::Published => Approval::Published,
            Publication::WaitingForParents => Approval::WaitingForParents,
        },
        Approval::Deleted => {
            page.delete_with_public(dbconn)?;
            Approval::Deleted
        }
        other => other,
    };

    info!("Approval of page {} by user {}: {}", page_id, user.id, approval);

    Ok(approval)
}

/// Requested change to a page.
#[derive(Clone, Debug, Default)]
pub struct Edit {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub published: Option<bool>,
    /// Message describing this change.
    pub message: Option<String>,
}

/// State a page's draft takes after being changed.
pub fn edited_state(
    moderation_enabled: bool,
    current: ModeratorState,
    level: ModerationLevel,
) -> ModeratorState {
    if current == ModeratorState::NeedDeleteApproval {
        current
    } else if moderation_enabled && level.requires_approval {
        ModeratorState::NeedApproval
    } else {
        ModeratorState::Changed
    }
}

/// Create a new page as the acting user.
pub fn create_page(
    dbconn: &Connection,
    ctx: &Context,
    parent: Option<&Page>,
    title: &str,
    slug: &str,
) -> Result<Page, ModerationError> {
    let settings = ctx.settings();

    if settings.permission {
        let user = ctx.user.ok_or(ModerationError::PermissionDenied)?;
        let target = parent.map(|p| (p, Position::FirstChild));
        if !has_page_add_permission(dbconn, settings, user, target)? {
            return Err(ModerationError::PermissionDenied);
        }
    }

    let mut page = Page::create(dbconn, parent, title, slug)?;
    let level = moderation_level(dbconn, settings, &page, ctx.user, true)?;
    page.set_moderator_state(
        edited_state(settings.moderator, page.moderator_state, level));
    page.save(dbconn)?;

    page_changed(dbconn, ctx, &page, None, None)?;

    Ok(page)
}

/// Change a page as the acting user.
pub fn edit_page(dbconn: &Connection, ctx: &Context, page: &mut Page, edit: Edit)
-> Result<(), ModerationError> {
    let settings = ctx.settings();
    require_permission(dbconn, ctx, page, PermissionBits::CHANGE)?;

    let old = page.snapshot();

    if let Some(ref title) = edit.title {
        page.set_title(title);
    }
    if let Some(ref slug) = edit.slug {
        page.set_slug(slug);
    }
    if let Some(published) = edit.published {
        page.set_published(published);
    }

    let level = moderation_level(dbconn, settings, page, ctx.user, true)?;
    page.set_moderator_state(
        edited_state(settings.moderator, page.moderator_state, level));
    page.save(dbconn)?;

    page_changed(dbconn, ctx, page, Some(old), None)?;

    if let Some(ref message) = edit.message {
        update_moderation_message(dbconn, ctx, page, message)?;
    }

    Ok(())
}

/// Outcome of [`delete_page()`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Deletion {
    /// Deletion must be approved first.
    Requested,
    /// Page was deleted.
    Deleted,
}

/// Delete a page as the acting user.
///
/// If changes made by the acting user require approval, deletion is only
/// requested, and carried out once the page is approved.
pub fn delete_page(dbconn: &Connection, ctx: &Context, mut page: Page)
-> Result<Deletion, ModerationError> {
    let settings = ctx.settings();
    require_permission(dbconn, ctx, &page, PermissionBits::DELETE)?;

    let level = moderation_level(dbconn, settings, &page, ctx.user, true)?;

    if settings.moderator && level.requires_approval {
        let old = page.snapshot();
        page.set_moderator_state(ModeratorState::NeedDeleteApproval);
        page.save(dbconn)?;
        page_changed(dbconn, ctx, &page, Some(old), Some(ModeratorAction::Delete))?;
        Ok(Deletion::Requested)
    } else {
        page.delete_with_public(dbconn)?;
        Ok(Deletion::Deleted)
    }
}

/// Publish a page's draft as the acting user, bypassing approval.
///
/// This is only allowed when changes made by the acting user need no further
/// approval.
pub fn publish_page(dbconn: &Connection, ctx: &Context, page: &mut Page)
-> Result<Publication, ModerationError> {
    let settings = ctx.settings();
    require_permission(dbconn, ctx, page, PermissionBits::PUBLISH)?;

    if settings.moderator {
        let level = moderation_level(dbconn, settings, page, ctx.user, false)?;
        if level.requires_approval {
            return Err(ModerationError::RequiresApproval);
        }
    }

    Ok(page.publish(dbconn)?)
}

fn require_permission(
    dbconn: &Connection,
    ctx: &Context,
    page: &Page,
    required: PermissionBits,
) -> Result<(), ModerationError> {
    let settings = ctx.settings();

    if !settings.permission {
        return Ok(());
    }

    match ctx.user {
        Some(user) if has_generic_permission(
            dbconn, settings, page.id, user, required)? => Ok(()),
        _ => Err(ModerationError::PermissionDenied),
    }
}

#[derive(Debug, Fail)]
pub enum ModerationError {
    #[fail(display = "Database error: {}", _0)]
    Database(#[cause] DbError),
    /// Acting user lacks permissions required for this operation.
    #[fail(display = "Insufficient permissions")]
    PermissionDenied,
    /// Changes must be approved by a more authoritative moderator first.
    #[fail(display = "Changes to this page require approval")]
    RequiresApproval,
}

impl_from! { for ModerationError ;
    DbError => |e| ModerationError::Database(e),
}

/// Data passed to the approval request email template.
#[derive(Debug, Serialize)]
struct ApprovalRequest {
    page: PageData,
    admin_url: String,
}

/// Ask moderators of a page to approve it.
///
/// Nothing is sent unless moderation is enabled and the page needs approval.
/// The acting user is never notified.
pub fn mail_approval_request(dbconn: &Connection, ctx: &Context, page: &Page)
-> Result<(), DbError> {
    if !ctx.settings().moderator
    || page.moderator_state != ModeratorState::NeedApproval {
        return Ok(());
    }

    let governing = PageModerator::governing(dbconn, page)?;
    let recipients = approval_recipients(
        &governing, ctx.user.map(|u| u.email.as_str()));

    if recipients.is_empty() {
        return Ok(());
    }

    let admin_url = match admin_url(&ctx.config.server.domain, page.id) {
        Ok(url) => url.into_string(),
        Err(err) => {
            error!("Cannot construct admin URL for page {}: {}", page.id, err);
            return Ok(());
        }
    };

    let subject = format!("CMS - Page {} requires approval.", page.title);
    let context = ApprovalRequest {
        page: page.get_public(),
        admin_url,
    };

    if let Err(err) = ctx.mailer.send(
        "approval-required", &recipients, &subject, &context)
    {
        error!("Could not send approval request for page {}: {}", page.id, err);
    }

    Ok(())
}

/// Collect email addresses of moderators who should be asked for approval.
///
/// Addresses are deduplicated, empty ones are skipped, and the acting user's
/// address is removed.
pub fn approval_recipients(governing: &[Governing], actor: Option<&str>)
-> Vec<String> {
    let mut recipients: Vec<String> = Vec::new();

    for moderator in governing {
        let email = &moderator.user.email;
        if !email.is_empty() && !recipients.contains(email) {
            recipients.push(email.clone());
        }
    }

    if let Some(actor) = actor {
        recipients.retain(|email| email != actor);
    }

    recipients
}

/// Construct URL of a page in the administration.
pub fn admin_url(domain: &str, page: i32) -> Result<Url, url::ParseError> {
    Url::parse(&format!("http://{}/", domain))?
        .join(&format!("admin/cms/page/{}/", page))
}
