//! Page permissions and the moderation hierarchy.
//!
//! Both permissions and moderation grants are attached to nodes of the page
//! tree. The closer to the root a grant is, the more authority its holder
//! has: level 0 is the top of the hierarchy.

use diesel::{prelude::*, result::Error as DbError};
use failure::Fail;
use std::{collections::{HashMap, HashSet}, str::FromStr};

use crate::{
    config::Moderation as Settings,
    db::{
        Connection,
        models as db,
        schema::group_members,
        types::GrantOn,
    },
    models::{
        GlobalPagePermission,
        Group,
        Page,
        PageModerator,
        PagePermission,
        User,
        moderator::Governing,
    },
    utils::ParseNameError,
};

bitflags! {
    /// Permissions allow for a fine-grained control over what actions a given
    /// user can take on pages.
    pub struct PermissionBits: i32 {
        /// Permission holder can add new pages.
        const ADD = 0x0000_0001;
        /// Permission holder can change pages.
        const CHANGE = 0x0000_0002;
        /// Permission holder can delete pages.
        const DELETE = 0x0000_0004;
        /// Permission holder can publish pages.
        const PUBLISH = 0x0000_0008;
        /// Permission holder can move pages within the tree.
        const MOVE = 0x0000_0010;
        /// Permission holder can approve changes to pages.
        const MODERATE = 0x0000_0020;
        /// Permission holder can grant and revoke permissions of other users.
        const CHANGE_PERMISSIONS = 0x0000_0040;
    }
}

const PERMISSION_NAMES: &[(&str, PermissionBits)] = &[
    ("add", PermissionBits::ADD),
    ("change", PermissionBits::CHANGE),
    ("delete", PermissionBits::DELETE),
    ("publish", PermissionBits::PUBLISH),
    ("move", PermissionBits::MOVE),
    ("moderate", PermissionBits::MODERATE),
    ("change-permissions", PermissionBits::CHANGE_PERMISSIONS),
];

impl FromStr for PermissionBits {
    type Err = ParseNameError;

    /// Parse a comma-separated list of permission names. `all` stands for all
    /// permissions.
    fn from_str(v: &str) -> Result<PermissionBits, ParseNameError> {
        v.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| if name == "all" {
                Ok(PermissionBits::all())
            } else {
                PERMISSION_NAMES.iter()
                    .find(|(n, _)| *n == name)
                    .map(|&(_, bits)| bits)
                    .ok_or_else(|| ParseNameError(name.to_string()))
            })
            .collect()
    }
}

/// Moderation level used when no moderator governs a page.
pub const MAX_MODERATION_LEVEL: i32 = i32::MAX;

/// Result of moderation level resolution.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ModerationLevel {
    /// Level in the moderation hierarchy. Lower is more authoritative.
    pub level: i32,
    /// Must somebody higher in the hierarchy approve changes?
    pub requires_approval: bool,
}

impl ModerationLevel {
    fn new(level: i32, requires_approval: bool) -> Self {
        ModerationLevel { level, requires_approval }
    }

    /// Is nobody moderating the page?
    pub fn is_unmoderated(&self) -> bool {
        self.level == MAX_MODERATION_LEVEL
    }
}

/// Position of a new page relative to a target page.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Position {
    /// New page becomes the first child of the target.
    FirstChild,
    /// New page becomes a sibling of the target, before it.
    Left,
    /// New page becomes a sibling of the target, after it.
    Right,
}

impl_names! { for Position ;
    FirstChild => "first-child",
    Left => "left",
    Right => "right",
}

/// Find the minimal moderation level of a page, and whether changes to it
/// made by `user` must be approved by someone higher.
///
/// When `include_user` is set a superuser (or anyone, if moderation is
/// disabled) who is also a page moderator of the page is reported as
/// requiring approval.
pub fn moderation_level(
    dbconn: &Connection,
    settings: &Settings,
    page: &Page,
    user: Option<&User>,
    include_user: bool,
) -> Result<ModerationLevel, DbError> {
    let governing = PageModerator::governing(dbconn, page)?;
    Ok(resolve_moderation_level(
        settings.moderator, user.map(|u| &**u), include_user, &governing))
}

/// Resolve moderation level given the list of moderators governing a page,
/// ordered most authoritative first.
pub fn resolve_moderation_level(
    moderation_enabled: bool,
    user: Option<&db::User>,
    include_user: bool,
    governing: &[Governing],
) -> ModerationLevel {
    let is_user = |g: &&Governing| user.map_or(false, |u| g.user.id == u.id);

    if !moderation_enabled || user.map_or(false, |u| u.is_super) {
        let moderates = include_user
            && governing.iter().filter(is_user).any(|g| g.grant.moderate_page);
        return ModerationLevel::new(0, moderates);
    }

    if governing.iter().any(|g| g.user.is_super) {
        return ModerationLevel::new(0, true);
    }

    if user.is_some() {
        if governing.iter().filter(is_user).any(|g| g.is_global) {
            return ModerationLevel::new(0, false);
        }

        if let Some(grant) = governing.iter().find(is_user) {
            return ModerationLevel::new(grant.level, false);
        }
    } else if governing.iter().any(|g| g.is_global) {
        return ModerationLevel::new(0, true);
    }

    match governing.first() {
        Some(grant) => ModerationLevel::new(grant.level, true),
        None => ModerationLevel::new(MAX_MODERATION_LEVEL, false),
    }
}

/// Find the highest level in the permission hierarchy on which a user can
/// change permissions, considering also user's groups.
///
/// ```text
///                           A,W                    level 0
///                         /    \
///                       user    B,GroupE           level 1
///                     /     \
///                   C,X     D,Y,W                  level 2
/// ```
///
/// Users A and W have level 0. GroupE and all its members have level 1. If D
/// is a member of GroupE their level is 1, otherwise it is 2.
pub fn user_permission_level(dbconn: &Connection, user: &User)
-> Result<i32, PermissionLevelError> {
    if user.is_super || GlobalPagePermission::bits_for_user(dbconn, user)?
        .contains(PermissionBits::CHANGE_PERMISSIONS)
    {
        return Ok(0);
    }

    let permissions = PagePermission::for_user(dbconn, user)?;

    nearest_level(
        permissions.iter().map(|p| (p.permissions(), p.level())),
        PermissionBits::CHANGE_PERMISSIONS,
    ).ok_or(PermissionLevelError::NoPermissions)
}

/// Find the lowest level among grants containing `required` permissions.
pub fn nearest_level<I>(grants: I, required: PermissionBits) -> Option<i32>
where
    I: IntoIterator<Item = (PermissionBits, i32)>,
{
    grants.into_iter()
        .filter(|(bits, _)| bits.contains(required))
        .map(|(_, level)| level)
        .min()
}

#[derive(Debug, Fail)]
pub enum PermissionLevelError {
    #[fail(display = "Database error: {}", _0)]
    Database(#[cause] DbError),
    /// User isn't assigned to any page.
    #[fail(display = "User has no permissions in the page hierarchy")]
    NoPermissions,
}

impl_from! { for PermissionLevelError ;
    DbError => |e| PermissionLevelError::Database(e),
}

/// Set of pages on which a user holds a permission.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Granted {
    /// Permission is held on every page.
    All,
    /// Permission is held on these pages only.
    Pages(HashSet<i32>),
}

impl Granted {
    pub fn contains(&self, page: i32) -> bool {
        match *self {
            Granted::All => true,
            Granted::Pages(ref pages) => pages.contains(&page),
        }
    }
}

/// Find all pages on which a user holds `required` permissions.
pub fn granted_pages(
    dbconn: &Connection,
    settings: &Settings,
    user: &User,
    required: PermissionBits,
) -> Result<Granted, DbError> {
    if !settings.permission || user.is_super {
        return Ok(Granted::All);
    }

    if GlobalPagePermission::bits_for_user(dbconn, user)?.contains(required) {
        return Ok(Granted::All);
    }

    let permissions = PagePermission::for_user(dbconn, user)?;
    let tree = Page::tree(dbconn)?;

    Ok(Granted::Pages(expand_grants(
        &tree,
        permissions.iter()
            .filter(|p| p.permissions().contains(required))
            .map(|p| (p.page, p.grant_on)),
    )))
}

/// Expand grants into the set of pages they cover.
///
/// `tree` is a list of `(page, parent)` pairs describing the whole tree.
pub fn expand_grants<I>(tree: &[(i32, Option<i32>)], grants: I) -> HashSet<i32>
where
    I: IntoIterator<Item = (i32, GrantOn)>,
{
    let mut children: HashMap<i32, Vec<i32>> = HashMap::new();
    for &(page, parent) in tree {
        if let Some(parent) = parent {
            children.entry(parent).or_default().push(page);
        }
    }

    let mut pages = HashSet::new();

    for (page, grant_on) in grants {
        if grant_on.includes_page() {
            pages.insert(page);
        }

        let mut frontier = vec![page];
        let mut depth = 0;

        while !frontier.is_empty() && grant_on.depth().map_or(true, |max| depth < max) {
            frontier = frontier.iter()
                .filter_map(|page| children.get(page))
                .flatten()
                .cloned()
                .collect();
            pages.extend(frontier.iter().cloned());
            depth += 1;
        }
    }

    pages
}

/// Check whether a user holds `required` permissions on a single page.
pub fn has_generic_permission(
    dbconn: &Connection,
    settings: &Settings,
    page: i32,
    user: &User,
    required: PermissionBits,
) -> Result<bool, DbError> {
    granted_pages(dbconn, settings, user, required)
        .map(|granted| granted.contains(page))
}

/// Check whether a user can add a new page.
///
/// Without a target only superusers and staff users with a global add
/// permission can add pages. With a target the check is made against the
/// page which would become the new page's parent.
pub fn has_page_add_permission(
    dbconn: &Connection,
    settings: &Settings,
    user: &User,
    target: Option<(&Page, Position)>,
) -> Result<bool, DbError> {
    if user.is_super || (user.is_staff && GlobalPagePermission::bits_for_user(
        dbconn, user)?.contains(PermissionBits::ADD))
    {
        return Ok(true);
    }

    match target {
        Some((page, Position::FirstChild)) => has_generic_permission(
            dbconn, settings, page.id, user, PermissionBits::ADD),
        Some((page, Position::Left)) | Some((page, Position::Right)) =>
            has_add_page_on_same_level_permission(dbconn, settings, user, page),
        None => Ok(false),
    }
}

/// Check whether a user can add a page next to `page`, that is under its
/// parent.
pub fn has_add_page_on_same_level_permission(
    dbconn: &Connection,
    settings: &Settings,
    user: &User,
    page: &Page,
) -> Result<bool, DbError> {
    if !settings.permission || user.is_super
        || GlobalPagePermission::bits_for_user(dbconn, user)?
            .contains(PermissionBits::ADD)
    {
        return Ok(true);
    }

    match page.parent {
        Some(parent) => has_generic_permission(
            dbconn, settings, parent, user, PermissionBits::ADD),
        None => Ok(false),
    }
}

/// Check whether a user can change global page permissions.
pub fn has_global_change_permissions_permission(dbconn: &Connection, user: &User)
-> Result<bool, DbError> {
    if user.is_super {
        return Ok(true);
    }

    Ok(user.is_staff && GlobalPagePermission::bits_for_user(dbconn, user)?
        .contains(PermissionBits::CHANGE))
}

/// Find all users subordinate to `user`.
///
/// These are staff users holding a permission on a page on which `user` can
/// change permissions, at `user`'s level or below, and users created by
/// `user` who aren't assigned to any page. Users sharing a group with `user`
/// are excluded.
///
/// Superusers and users who can change permissions globally see everyone.
pub fn subordinate_users(dbconn: &Connection, settings: &Settings, user: &User)
-> Result<Vec<User>, PermissionLevelError> {
    if user.is_super || GlobalPagePermission::bits_for_user(dbconn, user)?
        .contains(PermissionBits::CHANGE_PERMISSIONS)
    {
        return Ok(User::all(dbconn)?);
    }

    let allowed = granted_pages(
        dbconn, settings, user, PermissionBits::CHANGE_PERMISSIONS)?;
    let level = user_permission_level(dbconn, user)?;

    let grants = PagePermission::all(dbconn)?
        .iter()
        .filter_map(|p| p.user.map(|holder| (holder, p.page, p.level())))
        .collect::<Vec<_>>();

    let groups = user.groups(dbconn)?;
    let peers = group_members::table
        .filter(group_members::group.eq_any(groups))
        .select(group_members::user)
        .get_results::<i32>(dbconn)?
        .into_iter()
        .collect::<HashSet<_>>();

    Ok(User::all(dbconn)?
        .into_iter()
        .filter(|candidate| is_subordinate(
            user, candidate, candidate.is_staff, &grants, &allowed, level)
            && !peers.contains(&candidate.id))
        .collect())
}

/// Find all groups subordinate to `user`, see [`subordinate_users()`].
pub fn subordinate_groups(dbconn: &Connection, settings: &Settings, user: &User)
-> Result<Vec<Group>, PermissionLevelError> {
    if user.is_super || GlobalPagePermission::bits_for_user(dbconn, user)?
        .contains(PermissionBits::CHANGE_PERMISSIONS)
    {
        return Ok(Group::all(dbconn)?);
    }

    let allowed = granted_pages(
        dbconn, settings, user, PermissionBits::CHANGE_PERMISSIONS)?;
    let level = user_permission_level(dbconn, user)?;

    let grants = PagePermission::all(dbconn)?
        .iter()
        .filter_map(|p| p.group.map(|holder| (holder, p.page, p.level())))
        .collect::<Vec<_>>();

    Ok(Group::all(dbconn)?
        .into_iter()
        .filter(|group| {
            let assigned = grants.iter().any(|&(holder, _, _)| holder == group.id);
            let visible = grants.iter().any(|&(holder, page, page_level)| {
                holder == group.id && allowed.contains(page) && page_level >= level
            });
            visible || (!assigned && group.created_by == Some(user.id))
        })
        .collect())
}

/// Decide whether `candidate` is subordinate to `user`.
///
/// `grants` lists `(holder, page, level)` of all page permissions held
/// directly by users.
pub fn is_subordinate(
    user: &db::User,
    candidate: &db::User,
    is_staff: bool,
    grants: &[(i32, i32, i32)],
    allowed: &Granted,
    level: i32,
) -> bool {
    if candidate.id == user.id {
        return false;
    }

    let assigned = grants.iter().any(|&(holder, _, _)| holder == candidate.id);
    let visible = is_staff && grants.iter().any(|&(holder, page, page_level)| {
        holder == candidate.id && allowed.contains(page) && page_level >= level
    });

    visible || (!assigned && candidate.created_by == Some(user.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i32, is_super: bool) -> db::User {
        db::User {
            id,
            email: format!("user{}@folio.test", id),
            name: format!("User {}", id),
            is_super,
            is_staff: true,
            created_by: None,
        }
    }

    fn moderator(user: db::User, level: i32, is_global: bool) -> Governing {
        Governing {
            grant: db::PageModerator {
                id: user.id,
                page: level + 1,
                user: user.id,
                moderate_page: true,
                moderate_children: true,
                moderate_descendants: true,
            },
            user,
            level,
            is_global,
        }
    }

    #[test]
    fn no_moderators() {
        let level = resolve_moderation_level(true, None, true, &[]);
        assert_eq!(level, ModerationLevel::new(MAX_MODERATION_LEVEL, false));
        assert!(level.is_unmoderated());

        let editor = user(1, false);
        let level = resolve_moderation_level(true, Some(&editor), true, &[]);
        assert!(level.is_unmoderated());
        assert!(!level.requires_approval);
    }

    #[test]
    fn superuser_is_always_at_the_top() {
        let admin = user(1, true);
        let governing = vec![
            moderator(user(2, false), 1, false),
            moderator(user(3, false), 2, false),
        ];

        let cases: [&[Governing]; 3] = [&governing, &governing[1..], &[]];

        for governing in cases.iter() {
            let level = resolve_moderation_level(true, Some(&admin), true, governing);
            assert_eq!(level, ModerationLevel::new(0, false));
        }
    }

    #[test]
    fn superuser_moderating_page_requires_approval_when_included() {
        let admin = user(1, true);
        let governing = vec![moderator(admin.clone(), 1, false)];

        assert_eq!(
            resolve_moderation_level(true, Some(&admin), true, &governing),
            ModerationLevel::new(0, true),
        );
        assert_eq!(
            resolve_moderation_level(true, Some(&admin), false, &governing),
            ModerationLevel::new(0, false),
        );
    }

    #[test]
    fn moderation_disabled() {
        let editor = user(1, false);
        let governing = vec![moderator(user(2, true), 0, false)];

        assert_eq!(
            resolve_moderation_level(false, Some(&editor), true, &governing),
            ModerationLevel::new(0, false),
        );
        assert_eq!(
            resolve_moderation_level(false, None, true, &governing),
            ModerationLevel::new(0, false),
        );
    }

    #[test]
    fn superuser_moderator_requires_approval_from_everyone() {
        let editor = user(1, false);
        let governing = vec![
            moderator(user(2, true), 0, false),
            moderator(editor.clone(), 1, true),
        ];

        assert_eq!(
            resolve_moderation_level(true, Some(&editor), true, &governing),
            ModerationLevel::new(0, true),
        );
    }

    #[test]
    fn global_moderator_needs_no_approval() {
        let editor = user(1, false);
        let governing = vec![
            moderator(user(2, false), 0, false),
            moderator(editor.clone(), 2, true),
        ];

        assert_eq!(
            resolve_moderation_level(true, Some(&editor), true, &governing),
            ModerationLevel::new(0, false),
        );
    }

    #[test]
    fn moderator_gets_level_of_their_grant() {
        let editor = user(1, false);
        let governing = vec![
            moderator(user(2, false), 0, false),
            moderator(editor.clone(), 2, false),
        ];

        assert_eq!(
            resolve_moderation_level(true, Some(&editor), true, &governing),
            ModerationLevel::new(2, false),
        );
    }

    #[test]
    fn anonymous_change_with_global_moderator() {
        let governing = vec![
            moderator(user(2, false), 1, false),
            moderator(user(3, false), 2, true),
        ];

        assert_eq!(
            resolve_moderation_level(true, None, true, &governing),
            ModerationLevel::new(0, true),
        );
    }

    #[test]
    fn non_moderator_needs_approval_from_nearest_grant() {
        let editor = user(1, false);
        let governing = vec![
            moderator(user(2, false), 1, false),
            moderator(user(3, false), 2, false),
        ];

        assert_eq!(
            resolve_moderation_level(true, Some(&editor), true, &governing),
            ModerationLevel::new(1, true),
        );
        assert_eq!(
            resolve_moderation_level(true, None, true, &governing),
            ModerationLevel::new(1, true),
        );
    }

    #[test]
    fn parse_permissions() {
        assert_eq!(
            "add, change".parse::<PermissionBits>().unwrap(),
            PermissionBits::ADD | PermissionBits::CHANGE,
        );
        assert_eq!("all".parse::<PermissionBits>().unwrap(), PermissionBits::all());
        assert_eq!("".parse::<PermissionBits>().unwrap(), PermissionBits::empty());
        assert!("add,fly".parse::<PermissionBits>().is_err());
    }

    #[test]
    fn nearest_level_picks_highest_matching_grant() {
        let grants = vec![
            (PermissionBits::CHANGE, 0),
            (PermissionBits::CHANGE_PERMISSIONS | PermissionBits::ADD, 2),
            (PermissionBits::CHANGE_PERMISSIONS, 1),
        ];

        assert_eq!(
            nearest_level(grants.clone(), PermissionBits::CHANGE_PERMISSIONS),
            Some(1),
        );
        assert_eq!(nearest_level(grants, PermissionBits::MODERATE), None);
    }

    //          1
    //        /   \
    //       2     3
    //      / \
    //     4   5
    //     |
    //     6
    const TREE: &[(i32, Option<i32>)] = &[
        (1, None), (2, Some(1)), (3, Some(1)), (4, Some(2)), (5, Some(2)),
        (6, Some(4)),
    ];

    fn expand(page: i32, grant_on: GrantOn) -> Vec<i32> {
        let mut pages = expand_grants(TREE, vec![(page, grant_on)])
            .into_iter()
            .collect::<Vec<_>>();
        pages.sort();
        pages
    }

    #[test]
    fn grant_expansion() {
        assert_eq!(expand(2, GrantOn::Page), vec![2]);
        assert_eq!(expand(2, GrantOn::Children), vec![4, 5]);
        assert_eq!(expand(2, GrantOn::PageAndChildren), vec![2, 4, 5]);
        assert_eq!(expand(2, GrantOn::Descendants), vec![4, 5, 6]);
        assert_eq!(expand(1, GrantOn::PageAndDescendants), vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(expand(6, GrantOn::Descendants), Vec::<i32>::new());
    }

    #[test]
    fn granted_contains() {
        assert!(Granted::All.contains(42));

        let granted = Granted::Pages(vec![1, 2].into_iter().collect());
        assert!(granted.contains(2));
        assert!(!granted.contains(3));
    }

    #[test]
    fn subordinates() {
        let boss = user(1, false);
        let allowed = Granted::Pages(vec![2, 4, 5].into_iter().collect());
        // (holder, page, level)
        let grants = vec![(1, 2, 1), (3, 4, 2), (4, 1, 0), (6, 9, 3)];

        let mut below = user(3, false);
        assert!(is_subordinate(&boss, &below, true, &grants, &allowed, 1));
        // Only staff users are visible through page grants.
        assert!(!is_subordinate(&boss, &below, false, &grants, &allowed, 1));

        // Assigned above.
        let above = user(4, false);
        assert!(!is_subordinate(&boss, &above, true, &grants, &allowed, 1));

        // Created by boss and not assigned anywhere.
        let mut created = user(5, false);
        created.created_by = Some(1);
        assert!(is_subordinate(&boss, &created, false, &grants, &allowed, 1));

        // Created by boss, but assigned outside of boss' pages.
        let mut elsewhere = user(6, false);
        elsewhere.created_by = Some(1);
        assert!(!is_subordinate(&boss, &elsewhere, true, &grants, &allowed, 1));

        // Never subordinate to oneself.
        assert!(!is_subordinate(&boss, &boss, true, &grants, &allowed, 1));

        // Users assigned to a page are only visible through their grants.
        below.created_by = Some(1);
        assert!(!is_subordinate(&boss, &below, false, &grants, &allowed, 1));
    }
}
