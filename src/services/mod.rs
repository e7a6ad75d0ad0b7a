// SPDX-License-Identifier: MIT

pub mod accounts;
pub mod facebook;
pub mod google;
pub mod identity;
pub mod oauth_state;
pub mod password;
pub mod publisher;
pub mod session;
pub mod youtube;

pub use accounts::{AccountService, SessionTokens};
pub use facebook::FacebookGraph;
pub use google::GoogleOAuth;
pub use identity::IdentityResolver;
pub use publisher::{Publisher, UploadOutcome};
pub use session::{SessionAuthority, SessionClaims, TokenKind};
pub use youtube::YouTubeClient;
