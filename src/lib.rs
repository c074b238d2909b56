//! PixelFE core — the canvas editing engine behind the PixelFE pixel-art
//! editor.
//!
//! This crate owns the layered raster document model, the tool dispatch that
//! turns pointer input into pixel mutations, the pan/zoom viewport transform,
//! rectangular selections, and the snapshot-based undo/redo history. A host
//! UI feeds pointer/keyboard events into an [`editor::EditorSession`] and
//! renders the composite it gets back; the engine itself never touches a
//! window.
//!
//! The `PixelFE` binary exposes the downscale pipeline as a headless batch
//! pixelator (see [`cli`]).

#![allow(clippy::too_many_arguments)]

pub mod canvas;
pub mod cli;
pub mod components;
pub mod editor;
pub mod geometry;
pub mod io;
pub mod logger;
pub mod ops;
pub mod project;
pub mod viewport;
pub mod worker;
