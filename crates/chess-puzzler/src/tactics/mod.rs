/// Structural detectors used by the theme chain

pub mod attacks;
pub mod line_geometry;
pub mod pins;
