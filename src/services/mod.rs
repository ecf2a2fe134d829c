pub mod operations;
pub mod storage;
pub mod upload;
