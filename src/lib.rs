pub mod buffers;
pub mod chars;
pub mod config;
pub mod engine;
pub mod fuzzy;
pub mod keywords;
pub mod matcher;
pub mod path;
pub mod protocol;
pub mod sources;

#[cfg(test)]
pub(crate) mod test_helpers;
