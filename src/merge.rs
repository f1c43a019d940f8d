//! Page image assembly into a single PDF.

use crate::error::GrabError;
use crate::types::ValidatedArtifact;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

/// Merges validated page images into one PDF, one page per image.
///
/// Pages are written in page-number order. Each page is sized to its image
/// (one pixel per point) and the pixels are embedded as a Flate-compressed
/// RGB image. Encoding runs in a blocking task.
///
/// # Arguments
///
/// * `artifacts` - Validated page images, in any order
/// * `output` - Output PDF path
///
/// # Returns
///
/// The number of pages written. A page that fails to decode is skipped with a
/// warning. `GrabError::NoPages` is returned if no page could be written.
pub async fn assemble_pdf(
    artifacts: &[ValidatedArtifact],
    output: &Path,
) -> Result<usize, GrabError> {
    if artifacts.is_empty() {
        warn!("No images to merge!");
        return Err(GrabError::NoPages);
    }

    let mut artifacts = artifacts.to_vec();
    artifacts.sort_by_key(|artifact| artifact.page);
    let output = output.to_path_buf();

    let count = tokio::task::spawn_blocking(move || write_pdf(&artifacts, &output)).await??;
    Ok(count)
}

fn write_pdf(artifacts: &[ValidatedArtifact], output: &Path) -> Result<usize, GrabError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(artifacts.len());

    for artifact in artifacts {
        let img = match load_rgb(artifact) {
            Ok(img) => img,
            Err(e) => {
                warn!("⚠️  Skipping page {}: {}", artifact.page, e);
                continue;
            }
        };
        let (width, height) = img.dimensions();
        let (width, height) = (i64::from(width), i64::from(height));

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(img.as_raw())?;
        let pixels = encoder.finish()?;

        let image_id = doc.add_object(
            Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => Object::Integer(width),
                    "Height" => Object::Integer(height),
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => Object::Integer(8),
                    "Filter" => "FlateDecode",
                },
                pixels,
            )
            .with_compression(false),
        );

        // Scale the unit square to the page and paint the image over it
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Integer(width),
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(height),
                        Object::Integer(0),
                        Object::Integer(0),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(width),
                Object::Integer(height),
            ],
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    "Im0" => image_id,
                },
            },
        });
        kids.push(page_id.into());
    }

    let count = kids.len();
    if count == 0 {
        return Err(GrabError::NoPages);
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(count as i64),
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();
    doc.save(output)?;

    info!("📑 Merged PDF saved as: {}", output.display());
    Ok(count)
}

fn load_rgb(artifact: &ValidatedArtifact) -> Result<image::RgbImage, GrabError> {
    let img = image::ImageReader::open(&artifact.path)?
        .with_guessed_format()?
        .decode()
        .map_err(|source| GrabError::Image {
            path: artifact.path.display().to_string(),
            source,
        })?;
    Ok(img.to_rgb8())
}
