//! Point-in-time persistence: the snapshot writer/loader.

pub mod rdb;
