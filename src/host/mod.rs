//! Central side: transfer client, silence analysis, and stitching.

pub mod receiver;
pub mod session;
pub mod silence;
pub mod stitcher;
