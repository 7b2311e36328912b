pub mod claims;
pub mod identity;
pub mod login;
pub mod membership;
pub mod organisation;
pub mod user;

pub use claims::{Claims, TokenPurpose};
pub use identity::{CredentialSource, IdentityResponse, ResolvedIdentity};
pub use login::{LoginOptions, LoginRequest, OrganisationToken, PasswordResetRequest};
pub use membership::{
    AdminStatusRequest, InviteRequest, InviteResponse, Membership, MembershipState,
    OrganisationMembership, OrganisationUser, ResendInviteRequest,
};
pub use organisation::{CreateOrganisationRequest, Organisation, UpdateOrganisationRequest};
pub use user::{
    PasswordChangeRequest, SuperAdminStatusRequest, UpdateUserRequest, User, UserResponse,
};
