use diesel::{prelude::*, result::{DatabaseErrorKind, Error as DbError}};
use failure::Fail;
use serde::Serialize;

use crate::{
    db::{
        Connection,
        models as db,
        schema::{group_members, users},
    },
    mail::Mailer,
};

/// A single user in the system.
#[derive(Clone, Debug)]
pub struct User {
    data: db::User,
}

impl User {
    /// Construct `User` from its database counterpart.
    pub fn from_db(data: db::User) -> User {
        User { data }
    }

    /// Get all users.
    pub fn all(dbcon: &Connection) -> Result<Vec<User>, DbError> {
        users::table
            .order(users::id.asc())
            .get_results::<db::User>(dbcon)
            .map(|v| v.into_iter().map(|data| User { data }).collect())
    }

    /// Find an user by ID.
    pub fn by_id(dbcon: &Connection, id: i32) -> Result<User, FindUserError> {
        users::table
            .filter(users::id.eq(id))
            .get_result::<db::User>(dbcon)
            .optional()?
            .ok_or(FindUserError::NotFound)
            .map(|data| User { data })
    }

    /// Find an user by email address.
    pub fn by_email(dbcon: &Connection, email: &str) -> Result<User, FindUserError> {
        if email.is_empty() {
            return Err(FindUserError::NotFound);
        }

        users::table
            .filter(users::email.eq(email))
            .get_result::<db::User>(dbcon)
            .optional()?
            .ok_or(FindUserError::NotFound)
            .map(|data| User { data })
    }

    /// Create a new user.
    pub fn create(
        dbcon: &Connection,
        email: &str,
        name: &str,
        is_super: bool,
        is_staff: bool,
        created_by: Option<&User>,
    ) -> Result<User, CreateUserError> {
        diesel::insert_into(users::table)
            .values(db::NewUser {
                email,
                name,
                is_super,
                is_staff,
                created_by: created_by.map(|user| user.id),
            })
            .get_result::<db::User>(dbcon)
            .map(|data| User { data })
            .map_err(Into::into)
    }

    /// Get IDs of all groups this user is a member of.
    pub fn groups(&self, dbcon: &Connection) -> Result<Vec<i32>, DbError> {
        group_members::table
            .filter(group_members::user.eq(self.data.id))
            .select(group_members::group)
            .get_results(dbcon)
    }

    /// Tell this user that `creator` created an account for them.
    ///
    /// Users without an email address are skipped. Failures to send are only
    /// logged.
    pub fn notify_created(&self, mailer: &Mailer, domain: &str, creator: &User) {
        if self.data.email.is_empty() {
            return;
        }

        let context = AccountCreated {
            name: &self.data.name,
            email: &self.data.email,
            creator: &creator.data.name,
            domain,
        };

        if let Err(err) = mailer.send(
            "user-created",
            &[self.data.email.clone()],
            "CMS - your user account was created.",
            &context,
        ) {
            error!("Could not notify user {} about their account: {}",
                self.data.id, err);
        }
    }
}

#[derive(Serialize)]
struct AccountCreated<'a> {
    name: &'a str,
    email: &'a str,
    creator: &'a str,
    domain: &'a str,
}

impl std::ops::Deref for User {
    type Target = db::User;

    fn deref(&self) -> &db::User {
        &self.data
    }
}

#[derive(Debug, Fail)]
pub enum FindUserError {
    /// Database error.
    #[fail(display = "Database error: {}", _0)]
    Database(#[cause] DbError),
    /// No user found.
    #[fail(display = "No such user")]
    NotFound,
}

impl_from! { for FindUserError ;
    DbError => |e| FindUserError::Database(e),
}

#[derive(Debug, Fail)]
pub enum CreateUserError {
    /// Creation failed due to a database error.
    #[fail(display = "Database error: {}", _0)]
    Internal(#[cause] DbError),
    /// Another user already uses this email address.
    #[fail(display = "Duplicate user")]
    Duplicate,
}

impl_from! { for CreateUserError ;
    DbError => |e| match e {
        DbError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)
            => CreateUserError::Duplicate,
        _ => CreateUserError::Internal(e),
    },
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use crate::mail::{Message, Transport};
    use super::*;

    struct Recorder(Rc<RefCell<Vec<Message>>>);

    impl Transport for Recorder {
        fn send(&mut self, message: Message) -> crate::Result<()> {
            self.0.borrow_mut().push(message);
            Ok(())
        }
    }

    fn user(id: i32, email: &str, name: &str) -> User {
        User::from_db(db::User {
            id,
            email: email.into(),
            name: name.into(),
            is_super: false,
            is_staff: true,
            created_by: None,
        })
    }

    #[test]
    fn new_user_is_notified() {
        let sent = Rc::new(RefCell::new(Vec::new()));
        let mailer = Mailer::with_transport(Box::new(Recorder(sent.clone())));
        let chief = user(1, "chief@folio.test", "Chief");

        user(2, "editor@folio.test", "Editor")
            .notify_created(&mailer, "cms.example.org", &chief);

        let sent = sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to[0].address, "editor@folio.test");
        assert_eq!(sent[0].subject, "CMS - your user account was created.");
        assert!(sent[0].text.contains("Chief"));
        assert!(sent[0].text.contains("cms.example.org"));
        assert!(sent[0].html.contains("<strong>editor@folio.test</strong>"));
    }

    #[test]
    fn user_without_email_is_not_notified() {
        let sent = Rc::new(RefCell::new(Vec::new()));
        let mailer = Mailer::with_transport(Box::new(Recorder(sent.clone())));
        let chief = user(1, "chief@folio.test", "Chief");

        user(2, "", "Editor").notify_created(&mailer, "cms.example.org", &chief);

        assert!(sent.borrow().is_empty());
    }
}
