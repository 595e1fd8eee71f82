//! Principal (authenticated user) types.

use serde::{Deserialize, Serialize};

use super::PrincipalId;

/// Identity supplied by the external authentication provider.
///
/// The collaboration core trusts this as given; it never verifies
/// credentials itself. Principals are mirrored into storage so that
/// invitation conflict checks can resolve an email address to an
/// existing member.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub name: String,
    pub email: String,
}
