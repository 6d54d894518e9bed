//! PDF Stamp Library
//!
//! A cross-platform library for stamping a styled text watermark onto every
//! page of a PDF. This library provides functionality to:
//! - Rasterize watermark text with a chosen size and color
//! - Place the watermark's visual center at an offset from the page center,
//!   correct under any rotation
//! - Composite the stamp onto all pages of a document and serialize it back
//!   to bytes
//! - Drive debounced live-preview sessions over an immutable source upload
//!
//! # Example
//!
//! ```no_run
//! use pdf_stamp::pdf::composite;
//! use pdf_stamp::watermark::{Color, WatermarkSpec};
//!
//! let source = std::fs::read("report.pdf").expect("Failed to read input");
//!
//! let spec = WatermarkSpec {
//!     text: "CONFIDENTIAL".to_string(),
//!     font_size_pt: 40.0,
//!     color: Color::parse("#ff0000").unwrap(),
//!     opacity: 0.5,
//!     rotation_deg: 45.0,
//!     offset_x: 0.0,
//!     offset_y: 0.0,
//! };
//!
//! let stamped = composite(&source, &spec).expect("Failed to stamp PDF");
//! std::fs::write("report-stamped.pdf", stamped).expect("Failed to write output");
//! ```

pub mod error;
pub mod pdf;
pub mod placement;
pub mod raster;
pub mod session;
pub mod watermark;

// Re-export commonly used items
pub use error::{Error, Result};
