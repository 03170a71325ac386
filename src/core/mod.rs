//! Core correction building blocks: polygon capture, region statistics,
//! per-band correction, and centered clipping. These are the primitives the
//! high-level `api` module sequences per file.
pub mod capture;
pub mod clip;
pub mod correction;
pub mod mask;
pub mod params;
