pub mod admin_service;
pub mod blob_backend;
pub mod cache;
pub mod defaults;
pub mod local_backend;
pub mod metadata_service;
pub mod storage_service;

#[cfg(test)]
pub mod testing;
