pub mod coords;
pub mod frame;
pub mod masks;

pub use coords::{FrameGeometry, PixelCoord, RealCoord, RelativeCoord};
pub use frame::{Frame, PixelSize};
