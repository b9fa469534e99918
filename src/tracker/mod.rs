//! Client-side visit recording.
//!
//! A host application builds one [`context::TabContext`] per browser tab,
//! feeds view changes, clicks and unload into a [`recorder::Recorder`], and
//! the recorder appends one visit event per view left.

pub mod click;
pub mod context;
pub mod recorder;
