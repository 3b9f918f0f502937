pub mod crc;
pub mod encoder;

pub use encoder::{ColorType, encode_png};
