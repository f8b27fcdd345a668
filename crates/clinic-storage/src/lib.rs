//! # Clinic Storage
//!
//! 负责医学影像文件的持久化存储。

pub mod storage;

pub use storage::*;
