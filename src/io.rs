//! File I/O: the `.pxfe` project format, PNG export, and image import.
//!
//! `.pxfe` is a bincode-serialized [`ProjectFileV1`]: a magic string,
//! canvas dimensions, the selected layer index, and each layer's
//! name/visibility plus its raw RGBA bytes (`None` for layers that were
//! never painted on). Raw bytes, not an interchange format — the flattened
//! composite goes out through [`export_png`] instead.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::canvas::{CanvasState, Layer, PixelBuffer};
use crate::log_info;

const PXFE_MAGIC_V1: &str = "PXFE.v1";

/// Error type for project-file operations.
#[derive(Debug)]
pub enum PxfeError {
    Io(std::io::Error),
    Serialize(String),
    InvalidFormat(String),
}

impl std::fmt::Display for PxfeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PxfeError::Io(e) => write!(f, "I/O error: {}", e),
            PxfeError::Serialize(e) => write!(f, "Serialization error: {}", e),
            PxfeError::InvalidFormat(e) => write!(f, "Invalid format: {}", e),
        }
    }
}

impl From<std::io::Error> for PxfeError {
    fn from(e: std::io::Error) -> Self {
        PxfeError::Io(e)
    }
}

impl From<Box<bincode::ErrorKind>> for PxfeError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        PxfeError::Serialize(e.to_string())
    }
}

/// Serialized form of one layer.
#[derive(Serialize, Deserialize)]
pub struct LayerDataV1 {
    pub name: String,
    pub visible: bool,
    /// Raw RGBA bytes (`width * height * 4`), or `None` for a never-painted
    /// layer.
    pub pixels: Option<Vec<u8>>,
}

/// On-disk project structure, version 1.
#[derive(Serialize, Deserialize)]
pub struct ProjectFileV1 {
    pub magic: String,
    pub width: u32,
    pub height: u32,
    pub selected_layer_index: usize,
    pub layers: Vec<LayerDataV1>,
}

/// Build the serializable project data from canvas state. This copies all
/// pixel data — safe to hand to a background thread for the actual write.
#[must_use]
pub fn build_pxfe_v1(state: &CanvasState) -> ProjectFileV1 {
    let layers = state
        .layers
        .iter()
        .map(|layer| LayerDataV1 {
            name: layer.name.clone(),
            visible: layer.visible,
            pixels: layer.pixels.raw_image().map(|img| img.as_raw().clone()),
        })
        .collect();

    ProjectFileV1 {
        magic: PXFE_MAGIC_V1.to_string(),
        width: state.width,
        height: state.height,
        selected_layer_index: state
            .layer_index(&state.selected_layer_id)
            .unwrap_or(0),
        layers,
    }
}

/// Save a canvas as a `.pxfe` project file.
pub fn save_pxfe(state: &CanvasState, path: &Path) -> Result<(), PxfeError> {
    let project = build_pxfe_v1(state);
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    bincode::serialize_into(&mut writer, &project)?;
    writer.flush()?;
    log_info!("Saved project to {}", path.display());
    Ok(())
}

/// Load a `.pxfe` project file back into a canvas.
pub fn load_pxfe(path: &Path) -> Result<CanvasState, PxfeError> {
    let raw = std::fs::read(path)?;
    let project: ProjectFileV1 = bincode::deserialize(&raw)?;

    if project.magic != PXFE_MAGIC_V1 {
        return Err(PxfeError::InvalidFormat(format!(
            "unknown magic {:?}",
            project.magic
        )));
    }
    if project.width == 0 || project.height == 0 || project.layers.is_empty() {
        return Err(PxfeError::InvalidFormat(
            "empty canvas or layer list".to_string(),
        ));
    }

    let expected_len = project.width as usize * project.height as usize * 4;
    let mut layers = Vec::with_capacity(project.layers.len());
    for (index, data) in project.layers.into_iter().enumerate() {
        let pixels = match data.pixels {
            None => PixelBuffer::new(project.width, project.height),
            Some(bytes) => {
                if bytes.len() != expected_len {
                    return Err(PxfeError::InvalidFormat(format!(
                        "layer {} pixel data is {} bytes, expected {}",
                        index,
                        bytes.len(),
                        expected_len
                    )));
                }
                let img = RgbaImage::from_raw(project.width, project.height, bytes)
                    .ok_or_else(|| {
                        PxfeError::InvalidFormat(format!("layer {} buffer rejected", index))
                    })?;
                PixelBuffer::from_image(img)
            }
        };
        let mut layer = Layer::new(
            format!("layer_{}", index),
            data.name,
            project.width,
            project.height,
        );
        layer.visible = data.visible;
        layer.pixels = pixels;
        layers.push(layer);
    }

    let selected_index = project.selected_layer_index.min(layers.len() - 1);
    let selected_id = layers[selected_index].id.clone();
    Ok(CanvasState::from_layers(layers, selected_id))
}

/// Export the flattened composite as a PNG.
pub fn export_png(state: &CanvasState, path: &Path) -> Result<(), String> {
    let flat = state.composite();
    write_png(&flat, path)
}

/// Write a single image as a PNG.
pub fn write_png(image: &RgbaImage, path: &Path) -> Result<(), String> {
    image
        .save_with_format(path, image::ImageFormat::Png)
        .map_err(|e| format!("Failed to write {}: {}", path.display(), e))
}

/// Load any supported image file as a single-layer document.
pub fn load_image(path: &Path) -> Result<CanvasState, String> {
    let img = decode_image(path)?;
    let mut state = CanvasState::new(img.width(), img.height());
    state.layers[0].pixels = PixelBuffer::from_image(img);
    log_info!(
        "Loaded {} ({}x{})",
        path.display(),
        state.width,
        state.height
    );
    Ok(state)
}

/// Decode an image file to RGBA.
pub fn decode_image(path: &Path) -> Result<RgbaImage, String> {
    let img = image::open(path).map_err(|e| format!("Failed to open {}: {}", path.display(), e))?;
    Ok(img.to_rgba8())
}
