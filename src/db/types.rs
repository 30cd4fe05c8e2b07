use diesel_derive_enum::DbEnum;
use serde::{Deserialize, Serialize};

/// State of a page's draft with respect to moderation.
#[derive(Clone, Copy, DbEnum, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[DieselType = "Moderator_state"]
#[serde(rename_all = "kebab-case")]
pub enum ModeratorState {
    /// Draft was changed and not yet submitted for, or given, approval.
    Changed,
    /// Draft was changed by a user whose changes must be approved by someone
    /// higher in the moderation hierarchy.
    NeedApproval,
    /// Deletion of this page was requested and awaits approval.
    NeedDeleteApproval,
    /// Draft and its public version are identical.
    Approved,
    /// Draft was approved, but can't be published until its parent is.
    ApprovedWaitingForParents,
}

impl_names! { for ModeratorState ;
    Changed => "changed",
    NeedApproval => "req. app.",
    NeedDeleteApproval => "delete",
    Approved => "approved",
    ApprovedWaitingForParents => "app. par.",
}

/// Action recorded in a page's moderation log.
#[derive(Clone, Copy, DbEnum, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[DieselType = "Moderator_action"]
#[serde(rename_all = "kebab-case")]
pub enum ModeratorAction {
    /// Page was created.
    Add,
    /// Page was changed.
    Changed,
    /// Page was marked as published.
    Publish,
    /// Page was marked as not published.
    Unpublish,
    /// Page was moved within the tree.
    Move,
    /// Deletion of the page was requested.
    Delete,
    /// Changes were approved by a moderator.
    Approve,
}

impl_names! { for ModeratorAction ;
    Add => "add",
    Changed => "changed",
    Publish => "publish",
    Unpublish => "unpublish",
    Move => "move",
    Delete => "delete",
    Approve => "approve",
}

/// Part of the page tree a [`PagePermission`] is granted on.
///
/// [`PagePermission`]: crate::models::PagePermission
#[derive(Clone, Copy, DbEnum, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[DieselType = "Grant_on"]
#[serde(rename_all = "kebab-case")]
pub enum GrantOn {
    Page,
    Children,
    Descendants,
    PageAndChildren,
    PageAndDescendants,
}

impl_names! { for GrantOn ;
    Page => "page",
    Children => "children",
    Descendants => "descendants",
    PageAndChildren => "page-and-children",
    PageAndDescendants => "page-and-descendants",
}

impl GrantOn {
    /// Does this grant cover the page it was granted on?
    pub fn includes_page(self) -> bool {
        match self {
            GrantOn::Page | GrantOn::PageAndChildren |
            GrantOn::PageAndDescendants => true,
            GrantOn::Children | GrantOn::Descendants => false,
        }
    }

    /// How many levels below the page this grant reaches, `None` if it
    /// reaches all descendants.
    pub fn depth(self) -> Option<usize> {
        match self {
            GrantOn::Page => Some(0),
            GrantOn::Children | GrantOn::PageAndChildren => Some(1),
            GrantOn::Descendants | GrantOn::PageAndDescendants => None,
        }
    }
}
