pub mod artifact;
pub mod commands;
pub mod config;
pub mod manifest;
pub mod migration;
pub mod paths;

#[cfg(test)]
mod tests;
#[cfg(test)]
mod testutil;
