//! Extractors for the supported sites.

pub mod img;
pub mod mfw;
pub mod smth;
pub mod tc;

pub use img::ImgExtractor;
pub use mfw::MfwExtractor;
pub use smth::SmthExtractor;
pub use tc::TcExtractor;
