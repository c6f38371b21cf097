//! Cascadet is a CPU multiscale object detector for boosted cascades.
//!
//! Haar-like and LBP stump cascades are loaded from a JSON serialization,
//! evaluated over a geometric image pyramid on a pool of persistent worker
//! threads, and the raw hits are clustered into detections with a
//! disjoint-set grouping. Several cascades can be loaded at once; their
//! detections are told apart by a caller-supplied [`Tag`].
//!
//! ```no_run
//! use cascadet::{DetectConfig, Detector, ImageView, InitConfig, PixelFormat, Size, Tag};
//!
//! # fn main() -> Result<(), cascadet::DetectionError> {
//! let pixels = vec![0u8; 640 * 480];
//! let image = ImageView::from_slice(&pixels, 640, 480)?;
//!
//! let mut detector = Detector::new();
//! detector.load("face_lbp.json", Tag(0))?;
//! detector.init(image.size(), &InitConfig::default(), None)?;
//! for object in detector.detect(image, PixelFormat::Gray8, &DetectConfig::default())? {
//!     println!("{:?} x{}", object.rect, object.weight);
//! }
//! # Ok(())
//! # }
//! ```

pub mod candidate;
pub mod cascade;
mod detector;
pub mod geom;
pub mod image;
pub mod kernel;
pub mod lowlevel;
pub mod pool;
pub mod pyramid;
pub mod registry;
mod trace;
pub mod util;

pub use candidate::Object;
pub use cascade::{Cascade, CascadeInfo, FeatureKind};
pub use detector::{DetectConfig, Detector};
pub use geom::{Rect, Size};
pub use crate::image::{ImageView, OwnedImage, PixelFormat};
pub use pyramid::InitConfig;
pub use registry::{ClassifierModel, ModelRegistry, Tag};
pub use util::{DetectionError, DetectionResult};

#[cfg(feature = "image-io")]
pub use crate::image::io;
