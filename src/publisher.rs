//! Choosing between draft and public versions of pages.
//!
//! Every page exists in two representations: the draft, which editors
//! change, and the public version, which is what everybody else sees. Read
//! paths first [`select()`] a representation, and then load content from it.

use diesel::result::Error as DbError;
use serde::Serialize;
use url::form_urlencoded;

use crate::{
    db::{Connection, models as db},
    models::{Page, PublicPage, User, page::FindPageError},
};

/// Representation of a page.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Representation {
    Draft,
    Public,
}

impl_names! { for Representation ;
    Draft => "draft",
    Public => "public",
}

/// A request to read a page.
#[derive(Clone, Copy, Debug)]
pub struct Request<'a> {
    /// URL query string, without the leading `?`.
    pub query: &'a str,
    /// User making the request, if any.
    pub user: Option<&'a User>,
}

/// Select which representation of pages a request should see.
///
/// Only staff members can see drafts, and only when they explicitly ask for
/// it by passing both `preview` and `draft` parameters. In all other cases,
/// including when there is no request at all, public pages are used.
pub fn select(request: Option<&Request>) -> Representation {
    let request = match request {
        Some(request) => request,
        None => return Representation::Public,
    };

    let is_staff = request.user.map_or(false, |user| user.is_staff);
    if !is_staff {
        return Representation::Public;
    }

    let mut preview = false;
    let mut draft = false;

    for (key, _) in form_urlencoded::parse(request.query.as_bytes()) {
        match &*key {
            "preview" => preview = true,
            "draft" => draft = true,
            _ => (),
        }
    }

    if preview && draft {
        Representation::Draft
    } else {
        Representation::Public
    }
}

/// Content of a page, as seen through a particular representation.
#[derive(Clone, Debug, Serialize)]
pub struct PageContent {
    /// ID of the draft this content belongs to.
    pub page: i32,
    pub title: String,
    pub slug: String,
    pub published: bool,
    pub representation: Representation,
}

impl PageContent {
    /// Load content of a page, given ID of its draft.
    ///
    /// Returns `None` if the page doesn't exist, or if public representation
    /// was requested and the page was never published.
    pub fn load(dbconn: &Connection, representation: Representation, page: i32)
    -> Result<Option<PageContent>, DbError> {
        match representation {
            Representation::Draft => {
                let draft = match Page::by_id(dbconn, page) {
                    Ok(draft) => draft,
                    Err(FindPageError::NotFound) =>
                        return Ok(None),
                    Err(FindPageError::Database(err)) =>
                        return Err(err),
                };

                Ok(Some(PageContent {
                    page,
                    title: draft.title.clone(),
                    slug: draft.slug.clone(),
                    published: draft.published,
                    representation,
                }))
            }
            Representation::Public => Ok(PublicPage::of_draft(dbconn, page)?
                .map(|public| PageContent {
                    page,
                    title: public.title.clone(),
                    slug: public.slug.clone(),
                    published: public.published,
                    representation,
                })),
        }
    }
}

/// A plugin, as seen through a particular representation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct PluginContent {
    pub position: i32,
    pub kind: String,
    pub body: String,
}

impl From<db::Plugin> for PluginContent {
    fn from(plugin: db::Plugin) -> Self {
        PluginContent {
            position: plugin.position,
            kind: plugin.kind,
            body: plugin.body,
        }
    }
}

impl From<db::PublicPlugin> for PluginContent {
    fn from(plugin: db::PublicPlugin) -> Self {
        PluginContent {
            position: plugin.position,
            kind: plugin.kind,
            body: plugin.body,
        }
    }
}

impl PluginContent {
    /// Load plugins of a page, given ID of its draft.
    pub fn for_page(dbconn: &Connection, representation: Representation, page: i32)
    -> Result<Vec<PluginContent>, DbError> {
        match representation {
            Representation::Draft => match Page::by_id(dbconn, page) {
                Ok(draft) => Ok(draft.plugins(dbconn)?
                    .into_iter()
                    .map(From::from)
                    .collect()),
                Err(FindPageError::NotFound) => Ok(Vec::new()),
                Err(FindPageError::Database(err)) => Err(err),
            },
            Representation::Public => match PublicPage::of_draft(dbconn, page)? {
                Some(public) => Ok(public.plugins(dbconn)?
                    .into_iter()
                    .map(From::from)
                    .collect()),
                None => Ok(Vec::new()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(is_staff: bool) -> User {
        User::from_db(db::User {
            id: 1,
            email: "editor@folio.test".into(),
            name: "Editor".into(),
            is_super: false,
            is_staff,
            created_by: None,
        })
    }

    fn select_for(query: &str, user: Option<&User>) -> Representation {
        select(Some(&Request { query, user }))
    }

    #[test]
    fn no_request_is_public() {
        assert_eq!(select(None), Representation::Public);
    }

    #[test]
    fn staff_sees_drafts_on_request() {
        let staff = user(true);
        assert_eq!(select_for("preview&draft", Some(&staff)), Representation::Draft);
        assert_eq!(select_for("draft=1&x=2&preview=1", Some(&staff)), Representation::Draft);
    }

    #[test]
    fn both_parameters_are_needed() {
        let staff = user(true);
        assert_eq!(select_for("", Some(&staff)), Representation::Public);
        assert_eq!(select_for("preview", Some(&staff)), Representation::Public);
        assert_eq!(select_for("draft", Some(&staff)), Representation::Public);
        assert_eq!(select_for("previewdraft", Some(&staff)), Representation::Public);
    }

    #[test]
    fn others_never_see_drafts() {
        let editor = user(false);
        assert_eq!(select_for("preview&draft", Some(&editor)), Representation::Public);
        assert_eq!(select_for("preview&draft", None), Representation::Public);
    }
}
