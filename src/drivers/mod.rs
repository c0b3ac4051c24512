// src/drivers/mod.rs
pub mod error;
pub mod frame;
pub mod pcsgu250;
pub mod source;
pub use error::DriverError;
pub use frame::SampleFrame;
pub use pcsgu250::Pcsgu250Source;
pub use source::{FrameSource, SimulatedSource};
#[cfg(test)]
pub use source::ManualSource;
