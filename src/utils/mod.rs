pub mod file;
pub mod hash;
pub mod paths;
