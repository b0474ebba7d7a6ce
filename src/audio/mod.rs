pub mod decode;
pub mod features;
pub mod index;
pub mod surface;
pub mod transport;
