// SPDX-License-Identifier: MIT

//! Data models for the application.

pub mod user;
pub mod video;

pub use user::{
    FacebookCredential, FacebookPage, GoogleCredential, Platform, SocialCredential, User,
    VerifiedIdentity,
};
pub use video::{VideoStats, VideoUploadRequest};
