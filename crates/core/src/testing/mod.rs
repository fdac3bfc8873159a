//! Testing utilities and mock implementations.
//!
//! This module provides in-memory implementations of the service traits,
//! so the orchestrator can be exercised without a filesystem, a database
//! or external tools. Compiled for this crate's own tests and, elsewhere,
//! only with the `test-utils` feature.
//!
//! # Example
//!
//! ```rust,ignore
//! use transmute_core::testing::{MockArtifactStore, MockJobLedger, MockProcessor};
//!
//! let store = Arc::new(MockArtifactStore::new());
//! let ledger = Arc::new(MockJobLedger::new());
//! let registry = ProcessorRegistry::new().with(Arc::new(MockProcessor::new("mock")));
//!
//! let orchestrator = JobOrchestrator::new(config, "jobs", store, ledger, Arc::new(registry));
//! ```

mod mock_artifact_store;
mod mock_job_ledger;
mod mock_processor;
mod mock_shortener;

pub use mock_artifact_store::MockArtifactStore;
pub use mock_job_ledger::MockJobLedger;
pub use mock_processor::MockProcessor;
pub use mock_shortener::MockShortener;

/// Test fixtures and helper functions.
pub mod fixtures {
    use image::{ImageFormat, Rgb, RgbImage};
    use lopdf::{dictionary, Document, Object, Stream};
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    /// A `width` x `height` PNG with a colour gradient.
    pub fn png_image(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([
                (x * 255 / width.max(1)) as u8,
                (y * 255 / height.max(1)) as u8,
                128,
            ])
        });

        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Png)
            .expect("encode PNG fixture");
        buffer.into_inner()
    }

    /// A zip archive holding `entries` as `(name, content)` pairs, in order.
    pub fn zip_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();

        for (name, content) in entries {
            writer.start_file(*name, options).expect("start zip entry");
            writer.write_all(content).expect("write zip entry");
        }

        writer.finish().expect("finish zip").into_inner()
    }

    /// A valid PDF with `pages` text pages.
    pub fn pdf_document(pages: u32) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut kids: Vec<Object> = Vec::new();
        for page in 1..=pages {
            let content = format!("BT /F1 24 Tf 72 720 Td (Page {}) Tj ET", page);
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => resources_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).expect("save PDF fixture");
        buffer
    }
}
