use chrono::NaiveDateTime;

use super::{
    schema::*,
    types::{GrantOn, ModeratorAction, ModeratorState},
};

#[derive(Clone, Debug, Identifiable, Queryable)]
pub struct User {
    pub id: i32,
    /// User's email address. Approval requests are sent to it; it may be
    /// empty.
    pub email: String,
    /// User's display name.
    pub name: String,
    /// Is this user an administrator? Administrators bypass all permission
    /// checks and are always at the top of moderation hierarchy.
    pub is_super: bool,
    /// Can this user access the administration at all?
    pub is_staff: bool,
    /// User who created this user, if it was created by another user.
    pub created_by: Option<i32>,
}

#[derive(Clone, Copy, Debug, Insertable)]
#[table_name = "users"]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub name: &'a str,
    pub is_super: bool,
    pub is_staff: bool,
    pub created_by: Option<i32>,
}

#[derive(Clone, Debug, Identifiable, Queryable)]
pub struct Group {
    pub id: i32,
    pub name: String,
    /// User who created this group.
    pub created_by: Option<i32>,
}

#[derive(Clone, Copy, Debug, Insertable)]
#[table_name = "groups"]
pub struct NewGroup<'a> {
    pub name: &'a str,
    pub created_by: Option<i32>,
}

#[derive(Clone, Copy, Debug, Insertable, Queryable)]
#[table_name = "group_members"]
pub struct GroupMember {
    pub group: i32,
    pub user: i32,
}

/// Draft version of a page.
#[derive(AsChangeset, Clone, Debug, Identifiable, Queryable)]
#[changeset_options(treat_none_as_null = "true")]
pub struct Page {
    pub id: i32,
    /// Parent of this page, `None` for root pages.
    pub parent: Option<i32>,
    /// Depth of this page in the tree. Root pages have level 0.
    pub level: i32,
    pub title: String,
    pub slug: String,
    /// Should this page be visible to end users once published?
    pub published: bool,
    pub moderator_state: ModeratorState,
    /// Public version of this page, if it was ever published.
    pub public_page: Option<i32>,
    /// Date of the last change.
    pub changed: NaiveDateTime,
}

#[derive(Clone, Copy, Debug, Insertable)]
#[table_name = "pages"]
pub struct NewPage<'a> {
    pub parent: Option<i32>,
    pub level: i32,
    pub title: &'a str,
    pub slug: &'a str,
    pub published: bool,
    pub moderator_state: ModeratorState,
    pub changed: NaiveDateTime,
}

/// Public version of a page, as seen by end users.
#[derive(Clone, Debug, Identifiable, Queryable)]
pub struct PublicPage {
    pub id: i32,
    /// Public version of the parent page.
    pub parent: Option<i32>,
    pub level: i32,
    pub title: String,
    pub slug: String,
    pub published: bool,
}

#[derive(AsChangeset, Clone, Copy, Debug, Insertable)]
#[table_name = "public_pages"]
#[changeset_options(treat_none_as_null = "true")]
pub struct NewPublicPage<'a> {
    pub parent: Option<i32>,
    pub level: i32,
    pub title: &'a str,
    pub slug: &'a str,
    pub published: bool,
}

#[derive(Clone, Debug, Identifiable, Queryable)]
pub struct Plugin {
    pub id: i32,
    pub page: i32,
    /// Position of this plugin among plugins of the same page.
    pub position: i32,
    /// Kind of content this plugin holds, e.g. `text`.
    pub kind: String,
    pub body: String,
}

#[derive(Clone, Copy, Debug, Insertable)]
#[table_name = "plugins"]
pub struct NewPlugin<'a> {
    pub page: i32,
    pub position: i32,
    pub kind: &'a str,
    pub body: &'a str,
}

#[derive(Clone, Debug, Identifiable, Queryable)]
pub struct PublicPlugin {
    pub id: i32,
    pub page: i32,
    pub position: i32,
    pub kind: String,
    pub body: String,
}

#[derive(Clone, Copy, Debug, Insertable)]
#[table_name = "public_plugins"]
pub struct NewPublicPlugin<'a> {
    pub page: i32,
    pub position: i32,
    pub kind: &'a str,
    pub body: &'a str,
}

#[derive(Clone, Debug, Identifiable, Queryable)]
pub struct PageModeratorState {
    pub id: i32,
    pub page: i32,
    /// User who carried out the action, `None` for actions carried out by the
    /// system.
    pub user: Option<i32>,
    pub action: ModeratorAction,
    pub created: NaiveDateTime,
    /// Optional message. An empty string means no message.
    pub message: String,
}

#[derive(Clone, Copy, Debug, Insertable)]
#[table_name = "page_moderator_states"]
pub struct NewPageModeratorState<'a> {
    pub page: i32,
    pub user: Option<i32>,
    pub action: ModeratorAction,
    pub created: NaiveDateTime,
    pub message: &'a str,
}

#[derive(Clone, Copy, Debug, Identifiable, Queryable)]
pub struct PageModerator {
    pub id: i32,
    pub page: i32,
    pub user: i32,
    /// Moderate changes made to the page itself.
    pub moderate_page: bool,
    /// Moderate changes made to direct children of the page.
    pub moderate_children: bool,
    /// Moderate changes made to all descendants of the page.
    pub moderate_descendants: bool,
}

#[derive(Clone, Copy, Debug, Insertable)]
#[table_name = "page_moderators"]
pub struct NewPageModerator {
    pub page: i32,
    pub user: i32,
    pub moderate_page: bool,
    pub moderate_children: bool,
    pub moderate_descendants: bool,
}

#[derive(Clone, Copy, Debug, Identifiable, Queryable)]
pub struct GlobalPagePermission {
    pub id: i32,
    pub user: Option<i32>,
    pub group: Option<i32>,
    /// Permission bits, see [`crate::permissions::PermissionBits`].
    pub permissions: i32,
}

#[derive(Clone, Copy, Debug, Insertable)]
#[table_name = "global_page_permissions"]
pub struct NewGlobalPagePermission {
    pub user: Option<i32>,
    pub group: Option<i32>,
    pub permissions: i32,
}

#[derive(Clone, Copy, Debug, Identifiable, Queryable)]
pub struct PagePermission {
    pub id: i32,
    pub page: i32,
    pub user: Option<i32>,
    pub group: Option<i32>,
    /// Permission bits, see [`crate::permissions::PermissionBits`].
    pub permissions: i32,
    pub grant_on: GrantOn,
}

#[derive(Clone, Copy, Debug, Insertable)]
#[table_name = "page_permissions"]
pub struct NewPagePermission {
    pub page: i32,
    pub user: Option<i32>,
    pub group: Option<i32>,
    pub permissions: i32,
    pub grant_on: GrantOn,
}

#[derive(Clone, Debug, Insertable, Queryable, Serialize)]
#[table_name = "search_index"]
pub struct SearchDocument {
    /// ID of the indexed public page.
    pub page: i32,
    pub title: String,
    pub text: String,
}
