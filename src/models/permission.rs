use diesel::{prelude::*, result::Error as DbError};

use crate::{
    db::{
        Connection,
        models as db,
        schema::{global_page_permissions, page_permissions, pages},
        types::GrantOn,
    },
    permissions::PermissionBits,
};
use super::{Group, Page, User};

/// Who holds a permission.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Holder {
    User(i32),
    Group(i32),
}

impl Holder {
    fn as_db(self) -> (Option<i32>, Option<i32>) {
        match self {
            Holder::User(id) => (Some(id), None),
            Holder::Group(id) => (None, Some(id)),
        }
    }
}

impl<'a> From<&'a User> for Holder {
    fn from(user: &'a User) -> Self {
        Holder::User(user.id)
    }
}

impl<'a> From<&'a Group> for Holder {
    fn from(group: &'a Group) -> Self {
        Holder::Group(group.id)
    }
}

/// Permissions granted to a user or a group on all pages.
#[derive(Debug)]
pub struct GlobalPagePermission {
    data: db::GlobalPagePermission,
}

impl GlobalPagePermission {
    pub fn create<H>(dbconn: &Connection, holder: H, permissions: PermissionBits)
    -> Result<GlobalPagePermission, DbError>
    where
        Holder: From<H>,
    {
        let (user, group) = Holder::from(holder).as_db();

        diesel::insert_into(global_page_permissions::table)
            .values(db::NewGlobalPagePermission {
                user,
                group,
                permissions: permissions.bits(),
            })
            .get_result::<db::GlobalPagePermission>(dbconn)
            .map(|data| GlobalPagePermission { data })
    }

    /// Get all global permissions applying to a user, either directly or
    /// through one of their groups.
    pub fn for_user(dbconn: &Connection, user: &User)
    -> Result<Vec<GlobalPagePermission>, DbError> {
        let groups = user.groups(dbconn)?;

        global_page_permissions::table
            .filter(global_page_permissions::user.eq(user.id)
                .or(global_page_permissions::group.eq_any(groups)))
            .get_results::<db::GlobalPagePermission>(dbconn)
            .map(|v| v.into_iter().map(|data| GlobalPagePermission { data }).collect())
    }

    /// Get union of all global permissions applying to a user.
    pub fn bits_for_user(dbconn: &Connection, user: &User)
    -> Result<PermissionBits, DbError> {
        Ok(GlobalPagePermission::for_user(dbconn, user)?
            .iter()
            .fold(PermissionBits::empty(), |acc, p| acc | p.permissions()))
    }

    pub fn permissions(&self) -> PermissionBits {
        PermissionBits::from_bits_truncate(self.data.permissions)
    }
}

impl std::ops::Deref for GlobalPagePermission {
    type Target = db::GlobalPagePermission;

    fn deref(&self) -> &db::GlobalPagePermission {
        &self.data
    }
}

/// Permissions granted to a user or a group on a part of the page tree.
#[derive(Debug)]
pub struct PagePermission {
    data: db::PagePermission,
    /// Level of the page this permission was granted on.
    level: i32,
}

impl PagePermission {
    pub fn create<H>(
        dbconn: &Connection,
        page: &Page,
        holder: H,
        permissions: PermissionBits,
        grant_on: GrantOn,
    ) -> Result<PagePermission, DbError>
    where
        Holder: From<H>,
    {
        let (user, group) = Holder::from(holder).as_db();

        diesel::insert_into(page_permissions::table)
            .values(db::NewPagePermission {
                page: page.id,
                user,
                group,
                permissions: permissions.bits(),
                grant_on,
            })
            .get_result::<db::PagePermission>(dbconn)
            .map(|data| PagePermission { data, level: page.level })
    }

    /// Get all page permissions, ordered by level of the page they were
    /// granted on.
    pub fn all(dbconn: &Connection) -> Result<Vec<PagePermission>, DbError> {
        page_permissions::table
            .inner_join(pages::table)
            .select((page_permissions::all_columns, pages::level))
            .order((pages::level.asc(), page_permissions::id.asc()))
            .get_results::<(db::PagePermission, i32)>(dbconn)
            .map(|v| v.into_iter()
                .map(|(data, level)| PagePermission { data, level })
                .collect())
    }

    /// Get all page permissions applying to a user, either directly or
    /// through one of their groups, ordered by level of the page they were
    /// granted on.
    pub fn for_user(dbconn: &Connection, user: &User)
    -> Result<Vec<PagePermission>, DbError> {
        let groups = user.groups(dbconn)?;

        page_permissions::table
            .filter(page_permissions::user.eq(user.id)
                .or(page_permissions::group.eq_any(groups)))
            .inner_join(pages::table)
            .select((page_permissions::all_columns, pages::level))
            .order((pages::level.asc(), page_permissions::id.asc()))
            .get_results::<(db::PagePermission, i32)>(dbconn)
            .map(|v| v.into_iter()
                .map(|(data, level)| PagePermission { data, level })
                .collect())
    }

    pub fn permissions(&self) -> PermissionBits {
        PermissionBits::from_bits_truncate(self.data.permissions)
    }

    /// Level of the page this permission was granted on.
    pub fn level(&self) -> i32 {
        self.level
    }
}

impl std::ops::Deref for PagePermission {
    type Target = db::PagePermission;

    fn deref(&self) -> &db::PagePermission {
        &self.data
    }
}
