pub mod auth_service;
pub mod auth_service_impl;
pub mod membership_service;
pub mod membership_service_impl;

pub use auth_service::{AuthError, AuthService};
pub use auth_service_impl::SeaOrmAuthService;
pub use membership_service::{Actor, MembershipError, MembershipService};
pub use membership_service_impl::SeaOrmMembershipService;
