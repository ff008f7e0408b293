mod activation;
mod dropout;
mod frame;
mod segment;

pub use activation::*;
pub use dropout::*;
pub use frame::*;
pub use segment::*;
