//! Japanese vertical (tategaki) text rendered to transparent PNG images.
//!
//! [`domain`] holds the pure typesetting pipeline (segmentation, kinsoku,
//! layout), [`infra`] the render engines, their pool and process wiring, and
//! [`application`] the render service that ties them together.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub(crate) mod util;
