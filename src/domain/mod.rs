//! Domain layer: records, relationship policies and validation rules.

pub mod entities;
pub mod relations;
pub mod slug;
pub mod validation;
