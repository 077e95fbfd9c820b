pub mod capture;
pub mod gallery_sync;
