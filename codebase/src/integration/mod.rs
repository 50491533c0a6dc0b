pub mod compression;
pub mod serialization;
pub mod deserialization;
pub mod serde_utils;
