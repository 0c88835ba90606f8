//! # btf
//!
//! Indexed retrieval of reflectance images from Bidirectional Texture
//! Function (BTF) datasets, keyed by the four illumination/view angles
//! `(theta_light, phi_light, theta_view, phi_view)` in degrees.
//!
//! Two archive layouts are supported, each with its own reader and its own
//! angle-matching contract:
//!
//! - [`PackedBtf`] reads a packed array archive (`.btf.npz`) holding an
//!   image stack and a parallel angle table; queries match stored tuples
//!   with a floating-point tolerance, since the table comes from numeric
//!   computation.
//! - [`ZippedBtf`] reads a ZIP container of individually named image files
//!   (`tl<deg> pl<deg> tv<deg> pv<deg>.<ext>`); angles are exact decimal
//!   text, quantized to the 0.001° stage resolution and matched exactly.
//!
//! Images come out as dense `(height, width, channels)` arrays in
//! blue-green-red channel order and are immutable once returned.
//!
//! ```no_run
//! use btf::{PackedBtf, ZippedBtf};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let packed = PackedBtf::load("material.btf.npz")?;
//! let view = packed.lookup(45.0, 255.0, 0.0, 0.0)?;
//! assert_eq!(view.shape(), packed.image_shape());
//!
//! let mut zipped = ZippedBtf::open("material.zip")?;
//! let image = zipped.lookup(45.0, 255.0, 0.0, 0.0)?;
//! println!("{:?}", image.shape());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod angle;
mod codec;
pub mod error;
pub mod packed;
pub mod texture;
pub mod zipped;

pub use angle::{angles_close, AngleCondition, Millidegrees, ParseAngleError};
pub use error::{ArchiveError, ArchiveErrorKind, DecodeError, LookupError, LookupErrorKind};
pub use packed::PackedBtf;
pub use texture::{Image, ImageView, SampleSlice, Samples};
pub use zipped::ZippedBtf;
