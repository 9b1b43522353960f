pub mod serde;
pub mod str;
