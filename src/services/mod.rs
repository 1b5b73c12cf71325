pub mod memory_store;
pub mod object_store;
pub mod s3_store;
pub mod storage_service;
