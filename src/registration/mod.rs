pub mod phase_correlation;
pub mod realign;

pub use phase_correlation::{estimate_shift, PixelShift, RegistrationParams};
pub use realign::{realign, RealShift};
