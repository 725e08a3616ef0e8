pub mod banner;
pub mod utf8_decoder;
