//! PDF assembly: ordered rasters → one multi-page PDF in memory.
//!
//! Each page is exactly the size of its image: `pixels × 72 / dpi` points on
//! each axis, with the JPEG-encoded raster drawn across the full MediaBox.
//! Pages therefore keep the photo's aspect ratio and never get margins.
//!
//! ```text
//! Catalog ── Pages ─┬─ Page 1 ── Contents: q W 0 0 H 0 0 cm /Im0 Do Q
//!                   │           └ Resources/XObject/Im0 ── Image (DCTDecode)
//!                   └─ Page 2 …
//! ```
//!
//! `lopdf` is pure Rust; building a document needs no native library.

use crate::error::{Img2PdfError, Result};
use crate::pipeline::encode::encode_page;
use image::RgbImage;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream};
use tracing::debug;

const PDF_VERSION: &str = "1.5";

/// Turns ordered page rasters into a PDF.
#[derive(Debug, Clone, Copy)]
pub struct DocumentBuilder {
    dpi: f32,
    jpeg_quality: u8,
}

impl DocumentBuilder {
    pub fn new(dpi: f32, jpeg_quality: u8) -> Self {
        Self { dpi, jpeg_quality }
    }

    /// Build the document on the blocking pool.
    pub async fn build(&self, pages: Vec<RgbImage>) -> Result<Vec<u8>> {
        let builder = *self;
        tokio::task::spawn_blocking(move || builder.build_blocking(&pages))
            .await
            .map_err(|e| Img2PdfError::Internal(format!("PDF task panicked: {}", e)))?
    }

    /// Blocking implementation of [`Self::build`].
    pub fn build_blocking(&self, pages: &[RgbImage]) -> Result<Vec<u8>> {
        if pages.is_empty() {
            return Err(Img2PdfError::Encode("no pages to write".into()));
        }

        let mut doc = Document::with_version(PDF_VERSION);
        let pages_id = doc.new_object_id();
        let mut kids = Vec::with_capacity(pages.len());

        for (idx, raster) in pages.iter().enumerate() {
            let jpeg = encode_page(raster, self.jpeg_quality).map_err(|e| {
                Img2PdfError::Encode(format!("JPEG encoding of page {} failed: {}", idx + 1, e))
            })?;
            let (width_pt, height_pt) = self.page_size(raster);

            let image_id = doc.add_object(Stream::new(
                Dictionary::from_iter([
                    ("Type", Object::Name(b"XObject".to_vec())),
                    ("Subtype", Object::Name(b"Image".to_vec())),
                    ("Width", Object::Integer(i64::from(raster.width()))),
                    ("Height", Object::Integer(i64::from(raster.height()))),
                    ("ColorSpace", Object::Name(b"DeviceRGB".to_vec())),
                    ("BitsPerComponent", Object::Integer(8)),
                    ("Filter", Object::Name(b"DCTDecode".to_vec())),
                ]),
                jpeg,
            ));

            let content = Content {
                operations: vec![
                    Operation::new("q", vec![]),
                    Operation::new(
                        "cm",
                        vec![
                            width_pt.into(),
                            0.into(),
                            0.into(),
                            height_pt.into(),
                            0.into(),
                            0.into(),
                        ],
                    ),
                    Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                    Operation::new("Q", vec![]),
                ],
            };
            let content_bytes = content.encode().map_err(|e| {
                Img2PdfError::Encode(format!("content stream of page {} failed: {}", idx + 1, e))
            })?;
            let content_id = doc.add_object(Stream::new(Dictionary::new(), content_bytes));

            let resources = Dictionary::from_iter([(
                "XObject",
                Object::Dictionary(Dictionary::from_iter([("Im0", Object::Reference(image_id))])),
            )]);

            let page_id = doc.add_object(Dictionary::from_iter([
                ("Type", Object::Name(b"Page".to_vec())),
                ("Parent", Object::Reference(pages_id)),
                ("Contents", Object::Reference(content_id)),
                ("Resources", Object::Dictionary(resources)),
                (
                    "MediaBox",
                    Object::Array(vec![0.into(), 0.into(), width_pt.into(), height_pt.into()]),
                ),
            ]));
            kids.push(Object::Reference(page_id));

            debug!(
                "Page {}: {}x{} px → {}x{} pt",
                idx + 1,
                raster.width(),
                raster.height(),
                width_pt,
                height_pt
            );
        }

        let page_count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(Dictionary::from_iter([
                ("Type", Object::Name(b"Pages".to_vec())),
                ("Kids", Object::Array(kids)),
                ("Count", Object::Integer(page_count)),
            ])),
        );

        let catalog_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]));
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut output = Vec::new();
        doc.save_to(&mut output)
            .map_err(|e| Img2PdfError::Encode(format!("PDF write failed: {}", e)))?;

        debug!("Built PDF: {} pages, {} bytes", page_count, output.len());
        Ok(output)
    }

    /// Page size in whole points, never below 1 pt.
    fn page_size(&self, raster: &RgbImage) -> (i64, i64) {
        let to_pt = |px: u32| ((px as f32 * 72.0 / self.dpi).round() as i64).max(1);
        (to_pt(raster.width()), to_pt(raster.height()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use image::Rgb;

    fn builder() -> DocumentBuilder {
        DocumentBuilder::new(100.0, 90)
    }

    fn media_box(doc: &Document, page_id: lopdf::ObjectId) -> Vec<i64> {
        let page = doc.get_dictionary(page_id).unwrap();
        page.get(b"MediaBox")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o.as_i64().unwrap())
            .collect()
    }

    #[test]
    fn empty_input_is_encode_error() {
        let err = builder().build_blocking(&[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encode);
    }

    #[test]
    fn one_page_per_raster() {
        let pages = vec![
            RgbImage::from_pixel(100, 50, Rgb([255, 0, 0])),
            RgbImage::from_pixel(50, 100, Rgb([0, 255, 0])),
            RgbImage::from_pixel(20, 20, Rgb([0, 0, 255])),
        ];
        let bytes = builder().build_blocking(&pages).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
    }

    #[test]
    fn page_geometry_follows_dpi_and_order() {
        let pages = vec![
            RgbImage::from_pixel(1000, 500, Rgb([1, 2, 3])),
            RgbImage::from_pixel(500, 1000, Rgb([1, 2, 3])),
        ];
        let bytes = builder().build_blocking(&pages).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        let ids: Vec<_> = doc.get_pages().into_values().collect();
        assert_eq!(media_box(&doc, ids[0]), vec![0, 0, 720, 360]);
        assert_eq!(media_box(&doc, ids[1]), vec![0, 0, 360, 720]);
    }

    #[test]
    fn tiny_image_still_has_a_page() {
        let bytes = builder()
            .build_blocking(&[RgbImage::from_pixel(1, 1, Rgb([0, 0, 0]))])
            .unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        let ids: Vec<_> = doc.get_pages().into_values().collect();
        assert_eq!(media_box(&doc, ids[0]), vec![0, 0, 1, 1]);
    }

    #[tokio::test]
    async fn async_build_matches_blocking() {
        let pages = vec![RgbImage::from_pixel(8, 8, Rgb([9, 9, 9]))];
        let bytes = builder().build(pages).await.unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }
}
