//! Domain layer: requests, font assets, line breaking and layout.

pub mod error;
pub mod fonts;
pub mod kinsoku;
pub mod layout;
pub mod request;
pub mod segment;
