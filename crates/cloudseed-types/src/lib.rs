pub mod dbid;
pub mod error;
