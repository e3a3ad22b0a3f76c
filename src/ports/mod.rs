pub mod spotify;
pub mod storage;
