//! Core types for the e-commerce backend.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod pagination;
pub mod slug;
pub mod status;
pub mod text_enum;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::CurrencyCode;
pub use pagination::{PageInfo, Pagination};
pub use slug::slugify;
pub use status::*;
pub use text_enum::ParseEnumError;
