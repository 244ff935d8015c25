pub mod aggregate;
pub mod dump;
pub mod fields;
pub mod frame;
pub mod header;
pub mod pipeline;
