pub mod advisories;
pub mod classify;
