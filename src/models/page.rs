use chrono::Utc;
use diesel::{
    Connection as _Connection,
    prelude::*,
    result::Error as DbError,
};
use failure::Fail;
use serde::Serialize;

use crate::{
    db::{
        Connection,
        models as db,
        schema::{pages, page_moderator_states, plugins, public_pages, public_plugins},
        types::{ModeratorAction, ModeratorState},
    },
    moderation::Snapshot,
};

/// Draft version of a page.
///
/// Drafts are what editors change. End users only ever see a page's public
/// version, which is created and updated by [`Page::publish()`].
#[derive(Clone, Debug)]
pub struct Page {
    data: db::Page,
}

/// A subset of page's data that can safely be publicly exposed.
#[derive(Debug, Serialize)]
pub struct PublicData {
    pub id: i32,
    pub parent: Option<i32>,
    pub level: i32,
    pub title: String,
    pub slug: String,
    pub published: bool,
    pub moderator_state: ModeratorState,
}

impl Page {
    /// Construct `Page` from its database counterpart.
    pub fn from_db(data: db::Page) -> Page {
        Page { data }
    }

    /// Get all pages, parents before children.
    pub fn all(dbconn: &Connection) -> Result<Vec<Page>, DbError> {
        pages::table
            .order((pages::level.asc(), pages::id.asc()))
            .get_results::<db::Page>(dbconn)
            .map(|v| v.into_iter().map(|data| Page { data }).collect())
    }

    /// Find a page by ID.
    pub fn by_id(dbconn: &Connection, id: i32) -> Result<Page, FindPageError> {
        pages::table
            .filter(pages::id.eq(id))
            .get_result::<db::Page>(dbconn)
            .optional()?
            .ok_or(FindPageError::NotFound)
            .map(|data| Page { data })
    }

    /// Get structure of the whole page tree as a list of `(page, parent)`
    /// pairs.
    pub fn tree(dbconn: &Connection) -> Result<Vec<(i32, Option<i32>)>, DbError> {
        pages::table
            .select((pages::id, pages::parent))
            .get_results(dbconn)
    }

    /// Create a new page.
    ///
    /// This only creates the draft. Recording the creation in the moderation
    /// log is the caller's responsibility, see
    /// [`crate::moderation::page_changed()`].
    pub fn create(
        dbconn: &Connection,
        parent: Option<&Page>,
        title: &str,
        slug: &str,
    ) -> Result<Page, DbError> {
        diesel::insert_into(pages::table)
            .values(db::NewPage {
                parent: parent.map(|p| p.id),
                level: parent.map_or(0, |p| p.level + 1),
                title,
                slug,
                published: false,
                moderator_state: ModeratorState::Changed,
                changed: Utc::now().naive_utc(),
            })
            .get_result::<db::Page>(dbconn)
            .map(|data| Page { data })
    }

    /// Get this page's parent.
    pub fn parent(&self, dbconn: &Connection) -> Result<Option<Page>, DbError> {
        match self.data.parent {
            Some(id) => pages::table
                .filter(pages::id.eq(id))
                .get_result::<db::Page>(dbconn)
                .map(|data| Some(Page { data })),
            None => Ok(None),
        }
    }

    /// Get all ancestors of this page, starting with the root.
    pub fn ancestors(&self, dbconn: &Connection) -> Result<Vec<db::Page>, DbError> {
        let mut ancestors = Vec::with_capacity(self.data.level as usize);
        let mut next = self.data.parent;

        while let Some(id) = next {
            let page = pages::table
                .filter(pages::id.eq(id))
                .get_result::<db::Page>(dbconn)?;
            next = page.parent;
            ancestors.push(page);
        }

        ancestors.reverse();
        Ok(ancestors)
    }

    /// Get this page's direct children.
    pub fn children(&self, dbconn: &Connection) -> Result<Vec<Page>, DbError> {
        pages::table
            .filter(pages::parent.eq(self.data.id))
            .order(pages::id.asc())
            .get_results::<db::Page>(dbconn)
            .map(|v| v.into_iter().map(|data| Page { data }).collect())
    }

    /// Get the part of this page's state relevant to moderation.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            published: self.data.published,
            moderator_state: self.data.moderator_state,
        }
    }

    pub fn set_title(&mut self, title: &str) {
        self.data.title = title.to_string();
    }

    pub fn set_slug(&mut self, slug: &str) {
        self.data.slug = slug.to_string();
    }

    pub fn set_published(&mut self, published: bool) {
        self.data.published = published;
    }

    pub fn set_moderator_state(&mut self, state: ModeratorState) {
        self.data.moderator_state = state;
    }

    /// Persist changes made to this draft.
    pub fn save(&mut self, dbconn: &Connection) -> Result<(), DbError> {
        self.data.changed = Utc::now().naive_utc();
        self.data = diesel::update(&self.data)
            .set(&self.data)
            .get_result::<db::Page>(dbconn)?;
        Ok(())
    }

    /// Get all plugins of this draft, in order.
    pub fn plugins(&self, dbconn: &Connection) -> Result<Vec<db::Plugin>, DbError> {
        plugins::table
            .filter(plugins::page.eq(self.data.id))
            .order(plugins::position.asc())
            .get_results(dbconn)
    }

    /// Append a new plugin to this draft.
    pub fn add_plugin(&self, dbconn: &Connection, kind: &str, body: &str)
    -> Result<db::Plugin, DbError> {
        let last = plugins::table
            .filter(plugins::page.eq(self.data.id))
            .select(diesel::dsl::max(plugins::position))
            .get_result::<Option<i32>>(dbconn)?;

        diesel::insert_into(plugins::table)
            .values(db::NewPlugin {
                page: self.data.id,
                position: last.map_or(0, |p| p + 1),
                kind,
                body,
            })
            .get_result(dbconn)
    }

    /// Get this page's moderation log, oldest entries first.
    pub fn states(&self, dbconn: &Connection)
    -> Result<Vec<db::PageModeratorState>, DbError> {
        page_moderator_states::table
            .filter(page_moderator_states::page.eq(self.data.id))
            .order((page_moderator_states::created.asc(),
                page_moderator_states::id.asc()))
            .get_results(dbconn)
    }

    /// Does this page's moderation log contain a pending deletion request?
    pub fn has_delete_request(&self, dbconn: &Connection) -> Result<bool, DbError> {
        page_moderator_states::table
            .filter(page_moderator_states::page.eq(self.data.id)
                .and(page_moderator_states::action.eq(ModeratorAction::Delete)))
            .count()
            .get_result::<i64>(dbconn)
            .map(|count| count > 0)
    }

    /// Has the given user already approved current changes to this page?
    pub fn is_approved_by(&self, dbconn: &Connection, user: i32)
    -> Result<bool, DbError> {
        page_moderator_states::table
            .filter(page_moderator_states::page.eq(self.data.id)
                .and(page_moderator_states::user.eq(user))
                .and(page_moderator_states::action.eq(ModeratorAction::Approve)))
            .count()
            .get_result::<i64>(dbconn)
            .map(|count| count > 0)
    }

    /// Copy this draft, together with its plugins, into its public version.
    ///
    /// The public version is created if it doesn't exist yet. After
    /// publication the moderation log of this page is cleared.
    ///
    /// A page whose parent was never published can't be made public yet. Such
    /// a page is marked as [`ModeratorState::ApprovedWaitingForParents`] and
    /// will be published together with its parent.
    pub fn publish(&mut self, dbconn: &Connection) -> Result<Publication, DbError> {
        dbconn.transaction(|| {
            let parent = match self.data.parent {
                Some(id) => Some(pages::table
                    .filter(pages::id.eq(id))
                    .select(pages::public_page)
                    .get_result::<Option<i32>>(dbconn)?),
                None => None,
            };

            if let Some(None) = parent {
                debug!("Page {} is waiting for its parent to be published",
                    self.data.id);
                self.data.moderator_state =
                    ModeratorState::ApprovedWaitingForParents;
                diesel::update(&self.data)
                    .set(pages::moderator_state.eq(self.data.moderator_state))
                    .execute(dbconn)?;
                return Ok(Publication::WaitingForParents);
            }

            let values = db::NewPublicPage {
                parent: parent.and_then(|p| p),
                level: self.data.level,
                title: &self.data.title,
                slug: &self.data.slug,
                published: self.data.published,
            };

            let public = match self.data.public_page {
                Some(id) => diesel::update(public_pages::table
                        .filter(public_pages::id.eq(id)))
                    .set(&values)
                    .returning(public_pages::id)
                    .get_result::<i32>(dbconn)
                    .optional()?,
                None => None,
            };
            let public = match public {
                Some(id) => id,
                None => diesel::insert_into(public_pages::table)
                    .values(&values)
                    .returning(public_pages::id)
                    .get_result::<i32>(dbconn)?,
            };

            diesel::delete(public_plugins::table
                    .filter(public_plugins::page.eq(public)))
                .execute(dbconn)?;

            let plugins = self.plugins(dbconn)?;
            let copies = plugins.iter()
                .map(|plugin| db::NewPublicPlugin {
                    page: public,
                    position: plugin.position,
                    kind: &plugin.kind,
                    body: &plugin.body,
                })
                .collect::<Vec<_>>();
            if !copies.is_empty() {
                diesel::insert_into(public_plugins::table)
                    .values(&copies)
                    .execute(dbconn)?;
            }

            diesel::delete(page_moderator_states::table
                    .filter(page_moderator_states::page.eq(self.data.id)))
                .execute(dbconn)?;

            self.data = diesel::update(&self.data)
                .set((
                    pages::public_page.eq(public),
                    pages::moderator_state.eq(ModeratorState::Approved),
                ))
                .get_result::<db::Page>(dbconn)?;

            info!("Published page {} as public page {}", self.data.id, public);

            // Children approved before this page was public can be published
            // now.
            let waiting = pages::table
                .filter(pages::parent.eq(self.data.id)
                    .and(pages::moderator_state
                        .eq(ModeratorState::ApprovedWaitingForParents)))
                .get_results::<db::Page>(dbconn)?;

            for data in waiting {
                Page { data }.publish(dbconn)?;
            }

            Ok(Publication::Published)
        })
    }

    /// Delete this page together with its public version.
    ///
    /// Descendants, plugins, and the moderation log are removed with it.
    pub fn delete_with_public(self, dbconn: &Connection) -> Result<(), DbError> {
        dbconn.transaction(|| {
            if let Some(public) = self.data.public_page {
                diesel::delete(public_pages::table
                        .filter(public_pages::id.eq(public)))
                    .execute(dbconn)?;
            }

            diesel::delete(&self.data).execute(dbconn)?;

            info!("Deleted page {} and its public version", self.data.id);

            Ok(())
        })
    }

    /// Get the public portion of this page's data.
    pub fn get_public(&self) -> PublicData {
        let db::Page {
            id, parent, level, ref title, ref slug, published, moderator_state,
            ..
        } = self.data;

        PublicData {
            id,
            parent,
            level,
            title: title.clone(),
            slug: slug.clone(),
            published,
            moderator_state,
        }
    }
}

/// Outcome of [`Page::publish()`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Publication {
    /// Draft was copied to the public version.
    Published,
    /// Parent has no public version yet.
    WaitingForParents,
}

impl std::ops::Deref for Page {
    type Target = db::Page;

    fn deref(&self) -> &db::Page {
        &self.data
    }
}

#[derive(Debug, Fail)]
pub enum FindPageError {
    /// Database error.
    #[fail(display = "Database error: {}", _0)]
    Database(#[cause] DbError),
    /// No page found matching given criteria.
    #[fail(display = "No such page")]
    NotFound,
}

impl_from! { for FindPageError ;
    DbError => |e| FindPageError::Database(e),
}
