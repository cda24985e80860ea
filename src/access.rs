//! Access control: which identities may perform which actions.
//!
//! Authentication (who is calling) is handled by the `AuthUser` extractor;
//! this module only answers whether that identity may do a given thing.

use crate::{error::ApiError, models::Role};

/// Every operation the API exposes that has an access rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    BrowseCatalog,
    ViewMaterial,
    DownloadMaterial,
    ViewStats,
    Register,
    Login,
    SubmitMaterial,
    LikeMaterial,
    Logout,
    ViewProfile,
}

impl Action {
    pub const ALL: [Action; 10] = [
        Action::BrowseCatalog,
        Action::ViewMaterial,
        Action::DownloadMaterial,
        Action::ViewStats,
        Action::Register,
        Action::Login,
        Action::SubmitMaterial,
        Action::LikeMaterial,
        Action::Logout,
        Action::ViewProfile,
    ];
}

/// Decides whether `identity` (`None` for an anonymous caller) may perform
/// `action`.
///
/// Anonymous callers asking for an authenticated action get `Unauthorized`;
/// authenticated callers with the wrong role get `Forbidden`.
pub fn authorize(identity: Option<Role>, action: Action) -> Result<(), ApiError> {
    match (action, identity) {
        (
            Action::BrowseCatalog
            | Action::ViewMaterial
            | Action::DownloadMaterial
            | Action::ViewStats
            | Action::Register
            | Action::Login,
            _,
        ) => Ok(()),

        (Action::LikeMaterial | Action::Logout | Action::ViewProfile, Some(_)) => Ok(()),

        (Action::SubmitMaterial, Some(Role::Educator)) => Ok(()),
        (Action::SubmitMaterial, Some(Role::Parent)) => Err(ApiError::Forbidden(
            "Only educators can submit materials".to_string(),
        )),

        (Action::SubmitMaterial | Action::LikeMaterial | Action::Logout | Action::ViewProfile, None) => {
            Err(ApiError::Unauthorized("Authentication required".to_string()))
        }
    }
}
