//! Data and behaviours modelled as objects.

pub mod group;
pub mod moderator;
pub mod moderator_state;
pub mod page;
pub mod permission;
pub mod public;
pub mod user;

pub use self::{
    group::Group,
    moderator::PageModerator,
    moderator_state::PageModeratorState,
    page::{Page, Publication},
    permission::{GlobalPagePermission, Holder, PagePermission},
    public::PublicPage,
    user::User,
};
