//! Background worker for grid estimation and image downscaling.
//!
//! The heavy image-reduction work runs on a dedicated worker thread that
//! the editing core talks to over channels: a request message goes out, a
//! single `{success, result}`-shaped response comes back, correlated by
//! message type. One request is in flight per worker instance at a time —
//! the blocking pass-through API makes that structural. The worker shares
//! no memory with the editing core.

use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread::JoinHandle;

use image::RgbaImage;

use crate::log_warn;
use crate::ops::downscale::{downscale_to_grid, estimate_grid_size};

/// Requests understood by the worker.
pub enum WorkerRequest {
    EstimateGridSize { image: RgbaImage },
    DownscaleImage { image: RgbaImage, grid_size: u32 },
    Shutdown,
}

/// Successful worker results, one variant per request type.
#[derive(Debug)]
pub enum WorkerReply {
    GridSize(u32),
    Downscaled(RgbaImage),
}

/// Worker failures. Descriptive, not retried — the caller decides whether
/// to retry or surface the message.
#[derive(Debug)]
pub enum WorkerError {
    /// The worker thread is gone (panicked or already shut down).
    Disconnected,
    /// The request was processed and rejected.
    Task(String),
}

impl std::fmt::Display for WorkerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerError::Disconnected => write!(f, "worker disconnected"),
            WorkerError::Task(msg) => write!(f, "worker task failed: {}", msg),
        }
    }
}

/// Handle to the downscale/estimation worker thread.
///
/// Dropping the handle shuts the thread down.
pub struct PixelWorker {
    sender: Sender<WorkerRequest>,
    receiver: Receiver<Result<WorkerReply, String>>,
    handle: Option<JoinHandle<()>>,
}

impl PixelWorker {
    /// Spawn the worker thread.
    #[must_use]
    pub fn spawn() -> Self {
        let (request_tx, request_rx) = channel::<WorkerRequest>();
        let (reply_tx, reply_rx) = channel::<Result<WorkerReply, String>>();

        let handle = std::thread::spawn(move || {
            while let Ok(request) = request_rx.recv() {
                let reply = match request {
                    WorkerRequest::Shutdown => break,
                    WorkerRequest::EstimateGridSize { image } => handle_estimate(&image),
                    WorkerRequest::DownscaleImage { image, grid_size } => {
                        handle_downscale(&image, grid_size)
                    }
                };
                if reply_tx.send(reply).is_err() {
                    break;
                }
            }
        });

        Self {
            sender: request_tx,
            receiver: reply_rx,
            handle: Some(handle),
        }
    }

    /// Estimate a pixel-grid width for an image.
    pub fn estimate_grid_size(&self, image: RgbaImage) -> Result<u32, WorkerError> {
        match self.request(WorkerRequest::EstimateGridSize { image })? {
            WorkerReply::GridSize(size) => Ok(size),
            other => Err(WorkerError::Task(format!(
                "mismatched reply for estimate request: {:?}",
                other
            ))),
        }
    }

    /// Downscale an image to the given pixel grid width.
    pub fn downscale_image(&self, image: RgbaImage, grid_size: u32) -> Result<RgbaImage, WorkerError> {
        match self.request(WorkerRequest::DownscaleImage { image, grid_size })? {
            WorkerReply::Downscaled(result) => Ok(result),
            other => Err(WorkerError::Task(format!(
                "mismatched reply for downscale request: {:?}",
                other
            ))),
        }
    }

    fn request(&self, request: WorkerRequest) -> Result<WorkerReply, WorkerError> {
        self.sender
            .send(request)
            .map_err(|_| WorkerError::Disconnected)?;
        match self.receiver.recv() {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(message)) => Err(WorkerError::Task(message)),
            Err(_) => Err(WorkerError::Disconnected),
        }
    }
}

impl Drop for PixelWorker {
    fn drop(&mut self) {
        let _ = self.sender.send(WorkerRequest::Shutdown);
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            log_warn!("downscale worker thread panicked during shutdown");
        }
    }
}

fn handle_estimate(image: &RgbaImage) -> Result<WorkerReply, String> {
    if image.width() == 0 || image.height() == 0 {
        return Err("cannot estimate grid size for an empty image".to_string());
    }
    Ok(WorkerReply::GridSize(estimate_grid_size(image)))
}

fn handle_downscale(image: &RgbaImage, grid_size: u32) -> Result<WorkerReply, String> {
    if image.width() == 0 || image.height() == 0 {
        return Err("cannot downscale an empty image".to_string());
    }
    if grid_size == 0 {
        return Err("grid size must be at least 1".to_string());
    }
    Ok(WorkerReply::Downscaled(downscale_to_grid(image, grid_size)))
}
