//! `finken-auth` — pure authentication/authorization boundary.
//!
//! Decoupled from HTTP and storage: the API turns a verified token into a
//! [`Principal`], the ledger services only ever see principals and policies.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{ApprovalPolicy, AuthzError, PermissionPolicy, authorize};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtError, JwtValidator};
pub use permissions::Permission;
pub use principal::Principal;
pub use roles::Role;
