//! `geomajas-core`: value types shared by the command dispatch layer.
//!
//! This crate contains **pure values** (no IO, no async): the command and
//! response envelopes, exception descriptions, user details and feature
//! include levels.

pub mod command;
pub mod error;
pub mod feature;
pub mod id;
pub mod user;

pub use command::{
    Command, CommandResponse, ExceptionCode, ExceptionDto, SECURITY_EXCEPTION_CLASS,
};
pub use error::{CoreError, CoreResult};
pub use feature::FeatureInclude;
pub use id::{DeferredId, RequestId};
pub use user::UserDetail;
