//! Peripheral side: clocking, recording, storage, and upload.

pub mod clock;
pub mod recorder;
pub mod storage;
pub mod uploader;
