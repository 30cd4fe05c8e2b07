use diesel::{prelude::*, result::{DatabaseErrorKind, Error as DbError}};
use failure::Fail;

use crate::db::{
    Connection,
    models as db,
    schema::{group_members, groups, users},
};
use super::User;

/// A named set of users. Permissions granted to a group apply to all of its
/// members.
#[derive(Debug)]
pub struct Group {
    data: db::Group,
}

impl Group {
    /// Get all groups.
    pub fn all(dbcon: &Connection) -> Result<Vec<Group>, DbError> {
        groups::table
            .order(groups::id.asc())
            .get_results::<db::Group>(dbcon)
            .map(|v| v.into_iter().map(|data| Group { data }).collect())
    }

    /// Find a group by name.
    pub fn by_name(dbcon: &Connection, name: &str) -> Result<Group, FindGroupError> {
        groups::table
            .filter(groups::name.eq(name))
            .get_result::<db::Group>(dbcon)
            .optional()?
            .ok_or(FindGroupError::NotFound)
            .map(|data| Group { data })
    }

    /// Create a new group.
    pub fn create(dbcon: &Connection, name: &str, created_by: Option<&User>)
    -> Result<Group, CreateGroupError> {
        diesel::insert_into(groups::table)
            .values(db::NewGroup {
                name,
                created_by: created_by.map(|user| user.id),
            })
            .get_result::<db::Group>(dbcon)
            .map(|data| Group { data })
            .map_err(Into::into)
    }

    /// Add a user to this group.
    ///
    /// Adding a user who already is a member is not an error.
    pub fn add_member(&self, dbcon: &Connection, user: &User) -> Result<(), DbError> {
        diesel::insert_into(group_members::table)
            .values(db::GroupMember {
                group: self.data.id,
                user: user.id,
            })
            .on_conflict_do_nothing()
            .execute(dbcon)?;
        Ok(())
    }

    /// Get all members of this group.
    pub fn members(&self, dbcon: &Connection) -> Result<Vec<User>, DbError> {
        group_members::table
            .filter(group_members::group.eq(self.data.id))
            .inner_join(users::table)
            .select(users::all_columns)
            .get_results::<db::User>(dbcon)
            .map(|v| v.into_iter().map(User::from_db).collect())
    }
}

impl std::ops::Deref for Group {
    type Target = db::Group;

    fn deref(&self) -> &db::Group {
        &self.data
    }
}

#[derive(Debug, Fail)]
pub enum FindGroupError {
    #[fail(display = "Database error: {}", _0)]
    Database(#[cause] DbError),
    #[fail(display = "No such group")]
    NotFound,
}

impl_from! { for FindGroupError ;
    DbError => |e| FindGroupError::Database(e),
}

#[derive(Debug, Fail)]
pub enum CreateGroupError {
    #[fail(display = "Database error: {}", _0)]
    Database(#[cause] DbError),
    #[fail(display = "Duplicate group")]
    Duplicate,
}

impl_from! { for CreateGroupError ;
    DbError => |e| match e {
        DbError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)
            => CreateGroupError::Duplicate,
        _ => CreateGroupError::Database(e),
    },
}
