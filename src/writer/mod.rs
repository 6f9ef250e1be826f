//! Output stage: everything that turns a finished module into bytes.
pub mod bin;
pub mod json;
