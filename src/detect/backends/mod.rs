pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use stub::SyntheticDetector;

#[cfg(feature = "backend-tract")]
pub use tract::TractDetector;
