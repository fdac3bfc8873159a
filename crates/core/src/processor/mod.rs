//! Processors: pluggable transformations selected by operation name.
//!
//! A [`Processor`] handles a family of operations and owns the exact-name
//! sub-dispatch within it. The [`ProcessorRegistry`] routes an operation to
//! a processor: an exact rule wins, otherwise the longest matching prefix.
//!
//! | Operation            | Processor   | Output                      |
//! |----------------------|-------------|-----------------------------|
//! | `img_to_bw`          | image       | `<base>_bw.png`             |
//! | `img_to_sepia`       | image       | `<base>_sepia.jpg`          |
//! | `video_to_mp4`       | video       | `<base>_converted.mp4`      |
//! | `generate_thumbnail` | video       | `thumb_<base>.jpg`          |
//! | `pdf_to_images`      | pdf         | `<base>_images.zip`         |
//! | `merge_pdfs`         | pdf         | `<base>_merged.pdf`         |
//! | `create_slideshow`   | slideshow   | `<base>_slideshow.mp4`      |
//!
//! # Example
//!
//! ```ignore
//! use transmute_core::processor::{OutputSink, ProcessorRegistry, ToolsConfig};
//!
//! let registry = ProcessorRegistry::with_defaults(&ToolsConfig::default());
//! let sink = OutputSink::new(store.clone());
//! let output = registry.handle(request, &sink).await?;
//! println!("Wrote {}", output.primary().unwrap().url);
//! ```

mod archive;
mod config;
mod error;
mod image;
mod pdf;
mod registry;
mod sink;
mod slideshow;
mod tools;
mod traits;
mod types;
mod video;

pub use self::image::{ImageProcessor, OP_TO_BW, OP_TO_SEPIA};
pub use config::ToolsConfig;
pub use error::ProcessorError;
pub use pdf::{pdf_page_count, PdfProcessor, OP_MERGE, OP_TO_IMAGES};
pub use registry::{ProcessorRegistry, RouteInfo};
pub use sink::OutputSink;
pub use slideshow::{parse_slide_duration, SlideshowProcessor, OP_CREATE_SLIDESHOW};
pub use traits::Processor;
pub use types::{MatchRule, OutputLocator, ProcessOutput, ProcessRequest};
pub use video::{VideoProcessor, OP_THUMBNAIL, OP_TO_MP4};
