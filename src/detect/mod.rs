mod backend;
mod backends;
mod loader;
mod result;

pub use backend::{DeviceMode, ObjectDetector};
pub use backends::SyntheticDetector;
pub use loader::load_detector;
pub use result::{BoundingBox, Detection};

#[cfg(feature = "backend-tract")]
pub use backends::TractDetector;
