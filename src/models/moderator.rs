use diesel::{prelude::*, result::{DatabaseErrorKind, Error as DbError}};
use failure::Fail;
use std::collections::{HashMap, HashSet};

use crate::db::{
    Connection,
    models as db,
    schema::{global_page_permissions, page_moderators, users},
};
use super::{Page, User};

/// Grant allowing a user to moderate a page, its children, or its
/// descendants.
#[derive(Debug)]
pub struct PageModerator {
    data: db::PageModerator,
}

/// Which parts of the tree a [`PageModerator`] moderates.
#[derive(Clone, Copy, Debug, Default)]
pub struct Scope {
    pub page: bool,
    pub children: bool,
    pub descendants: bool,
}

/// A moderator whose grant applies to a specific page.
#[derive(Clone, Debug)]
pub struct Governing {
    pub user: db::User,
    pub grant: db::PageModerator,
    /// Level of the page on which the grant was given.
    pub level: i32,
    /// Does this moderator hold a global page permission?
    pub is_global: bool,
}

impl PageModerator {
    /// Grant a user moderation over (part of) a page's subtree.
    pub fn create(dbconn: &Connection, page: &Page, user: &User, scope: Scope)
    -> Result<PageModerator, CreatePageModeratorError> {
        diesel::insert_into(page_moderators::table)
            .values(db::NewPageModerator {
                page: page.id,
                user: user.id,
                moderate_page: scope.page,
                moderate_children: scope.children,
                moderate_descendants: scope.descendants,
            })
            .get_result::<db::PageModerator>(dbconn)
            .map(|data| PageModerator { data })
            .map_err(Into::into)
    }

    /// Get all moderators of a page.
    pub fn of_page(dbconn: &Connection, page: &Page)
    -> Result<Vec<PageModerator>, DbError> {
        page_moderators::table
            .filter(page_moderators::page.eq(page.id))
            .get_results::<db::PageModerator>(dbconn)
            .map(|v| v.into_iter().map(|data| PageModerator { data }).collect())
    }

    /// Get all moderators whose grants apply to a page, ordered by level of
    /// the page on which they were granted (most authoritative first).
    pub fn governing(dbconn: &Connection, page: &Page)
    -> Result<Vec<Governing>, DbError> {
        let ancestors = page.ancestors(dbconn)?;
        let levels = ancestors.iter()
            .map(|p| (p.id, p.level))
            .chain(std::iter::once((page.id, page.level)))
            .collect::<HashMap<_, _>>();
        let ancestors = ancestors.iter().map(|p| p.id).collect::<Vec<_>>();

        let candidates = page_moderators::table
            .filter(page_moderators::page.eq_any(levels.keys().cloned().collect::<Vec<_>>()))
            .inner_join(users::table)
            .order(page_moderators::id.asc())
            .get_results::<(db::PageModerator, db::User)>(dbconn)?;

        let candidates = candidates.into_iter()
            .filter(|(grant, _)| governs(grant, page.id, page.parent, &ancestors))
            .collect::<Vec<_>>();

        let ids = candidates.iter()
            .map(|(_, user)| user.id)
            .collect::<Vec<_>>();
        let global = global_page_permissions::table
            .filter(global_page_permissions::user.eq_any(ids))
            .select(global_page_permissions::user)
            .get_results::<Option<i32>>(dbconn)?
            .into_iter()
            .flatten()
            .collect::<HashSet<_>>();

        let mut governing = candidates.into_iter()
            .map(|(grant, user)| Governing {
                level: levels[&grant.page],
                is_global: global.contains(&user.id),
                user,
                grant,
            })
            .collect::<Vec<_>>();
        governing.sort_by_key(|g| g.level);

        Ok(governing)
    }
}

impl std::ops::Deref for PageModerator {
    type Target = db::PageModerator;

    fn deref(&self) -> &db::PageModerator {
        &self.data
    }
}

/// Does a moderation grant apply to a page?
///
/// A grant applies if it was given on the page itself and moderates the page,
/// on its parent and moderates children, or on any of its ancestors and
/// moderates descendants.
pub fn governs(
    grant: &db::PageModerator,
    page: i32,
    parent: Option<i32>,
    ancestors: &[i32],
) -> bool {
    (grant.page == page && grant.moderate_page)
        || (Some(grant.page) == parent && grant.moderate_children)
        || (ancestors.contains(&grant.page) && grant.moderate_descendants)
}

#[derive(Debug, Fail)]
pub enum CreatePageModeratorError {
    #[fail(display = "Database error: {}", _0)]
    Database(#[cause] DbError),
    /// This user already is a moderator of this page.
    #[fail(display = "User already moderates this page")]
    Duplicate,
}

impl_from! { for CreatePageModeratorError ;
    DbError => |e| match e {
        DbError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)
            => CreatePageModeratorError::Duplicate,
        _ => CreatePageModeratorError::Database(e),
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(page: i32, scope: (bool, bool, bool)) -> db::PageModerator {
        db::PageModerator {
            id: 1,
            page,
            user: 1,
            moderate_page: scope.0,
            moderate_children: scope.1,
            moderate_descendants: scope.2,
        }
    }

    // Tree used below: 1 -> 2 -> 3, page under test is 3.
    const ANCESTORS: &[i32] = &[1, 2];

    #[test]
    fn grant_on_page_itself() {
        assert!(governs(&grant(3, (true, false, false)), 3, Some(2), ANCESTORS));
        assert!(!governs(&grant(3, (false, true, true)), 3, Some(2), ANCESTORS));
    }

    #[test]
    fn grant_on_parent() {
        assert!(governs(&grant(2, (false, true, false)), 3, Some(2), ANCESTORS));
        assert!(governs(&grant(2, (false, false, true)), 3, Some(2), ANCESTORS));
        assert!(!governs(&grant(2, (true, false, false)), 3, Some(2), ANCESTORS));
    }

    #[test]
    fn grant_on_grandparent() {
        assert!(governs(&grant(1, (false, false, true)), 3, Some(2), ANCESTORS));
        assert!(!governs(&grant(1, (true, true, false)), 3, Some(2), ANCESTORS));
    }

    #[test]
    fn grant_on_unrelated_page() {
        assert!(!governs(&grant(7, (true, true, true)), 3, Some(2), ANCESTORS));
    }
}
