use chrono::{NaiveDateTime, Utc};
use diesel::{prelude::*, result::Error as DbError};

use crate::db::{
    Connection,
    models as db,
    schema::page_moderator_states,
    types::ModeratorAction,
};
use super::{Page, User};

/// Entry in a page's moderation log.
///
/// Entries are only ever appended, with one exception: the message of a
/// recent entry can be filled in after the fact, see
/// [`crate::moderation::update_moderation_message()`].
#[derive(Debug)]
pub struct PageModeratorState {
    data: db::PageModeratorState,
}

impl PageModeratorState {
    /// Append a new entry to a page's log.
    pub fn create(
        dbconn: &Connection,
        page: &Page,
        user: Option<&User>,
        action: ModeratorAction,
        message: &str,
    ) -> Result<PageModeratorState, DbError> {
        let data = diesel::insert_into(page_moderator_states::table)
            .values(db::NewPageModeratorState {
                page: page.id,
                user: user.map(|u| u.id),
                action,
                created: Utc::now().naive_utc(),
                message,
            })
            .get_result::<db::PageModeratorState>(dbconn)?;

        debug!("Page {}: {} by {:?}", page.id, action, data.user);

        Ok(PageModeratorState { data })
    }

    /// Find the latest entry made by a user on a page after a given time.
    pub fn latest(
        dbconn: &Connection,
        page: &Page,
        user: Option<&User>,
        since: NaiveDateTime,
    ) -> Result<Option<PageModeratorState>, DbError> {
        let query = page_moderator_states::table
            .filter(page_moderator_states::page.eq(page.id)
                .and(page_moderator_states::created.gt(since)))
            .order((page_moderator_states::created.desc(),
                page_moderator_states::id.desc()));

        let data = match user {
            Some(user) => query
                .filter(page_moderator_states::user.eq(user.id))
                .first::<db::PageModeratorState>(dbconn),
            None => query
                .filter(page_moderator_states::user.is_null())
                .first::<db::PageModeratorState>(dbconn),
        };

        data.optional().map(|v| v.map(|data| PageModeratorState { data }))
    }

    /// Message attached to this entry, if any.
    pub fn message(&self) -> Option<&str> {
        if self.data.message.is_empty() {
            None
        } else {
            Some(&self.data.message)
        }
    }

    /// Replace message of this entry.
    pub fn set_message(&mut self, dbconn: &Connection, message: &str)
    -> Result<(), DbError> {
        self.data = diesel::update(&self.data)
            .set(page_moderator_states::message.eq(message))
            .get_result(dbconn)?;
        Ok(())
    }
}

impl std::ops::Deref for PageModeratorState {
    type Target = db::PageModeratorState;

    fn deref(&self) -> &db::PageModeratorState {
        &self.data
    }
}
