//! Command line and HTTP front ends for the htmlwave codec

pub mod audio;
pub mod server;
