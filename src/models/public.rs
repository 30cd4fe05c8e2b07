use diesel::{prelude::*, result::Error as DbError};

use crate::db::{
    Connection,
    models as db,
    schema::{pages, public_pages, public_plugins},
};

/// Public version of a page.
#[derive(Debug)]
pub struct PublicPage {
    data: db::PublicPage,
}

impl PublicPage {
    /// Get all public pages.
    pub fn all(dbconn: &Connection) -> Result<Vec<PublicPage>, DbError> {
        public_pages::table
            .order((public_pages::level.asc(), public_pages::id.asc()))
            .get_results::<db::PublicPage>(dbconn)
            .map(|v| v.into_iter().map(|data| PublicPage { data }).collect())
    }

    /// Find public version of a page given ID of its draft.
    pub fn of_draft(dbconn: &Connection, draft: i32)
    -> Result<Option<PublicPage>, DbError> {
        let id = pages::table
            .filter(pages::id.eq(draft))
            .select(pages::public_page)
            .get_result::<Option<i32>>(dbconn)
            .optional()?
            .and_then(|id| id);

        match id {
            Some(id) => public_pages::table
                .filter(public_pages::id.eq(id))
                .get_result::<db::PublicPage>(dbconn)
                .optional()
                .map(|v| v.map(|data| PublicPage { data })),
            None => Ok(None),
        }
    }

    /// Get all plugins of this page.
    pub fn plugins(&self, dbconn: &Connection)
    -> Result<Vec<db::PublicPlugin>, DbError> {
        public_plugins::table
            .filter(public_plugins::page.eq(self.data.id))
            .order(public_plugins::position.asc())
            .get_results(dbconn)
    }
}

impl std::ops::Deref for PublicPage {
    type Target = db::PublicPage;

    fn deref(&self) -> &db::PublicPage {
        &self.data
    }
}
