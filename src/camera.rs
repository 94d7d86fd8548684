// Opens the kiosk camera and hands frames to the render loop as 0x00RRGGBB buffers.
// Visual: while the stream is up, each `next_frame()` is one fresh live image;
// when the camera is missing the loop just keeps showing the last surface.

use crate::error::Error;
use crate::types::{FrameBuffer, pack_rgb};

use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    utils::{
        CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
    },
};

/// Anything that yields live frames. The render loop only depends on this.
pub trait FrameSource {
    /// Latest frame, or `Ok(None)` when no new frame is ready yet.
    fn next_frame(&mut self) -> Result<Option<FrameBuffer>, Error>;

    /// Resolution the source is actually delivering.
    fn resolution(&self) -> (u32, u32);
}

pub struct CameraCapture {
    cam: Camera,
    width: u32,
    height: u32,
}

impl CameraCapture {
    /// Open camera `index`, asking for the closest mode to `width`x`height` at `fps`.
    /// The driver may pick something else; `resolution()` reports what we got.
    pub fn new(index: u32, width: u32, height: u32, fps: u32) -> Result<Self, Error> {
        let fmt = CameraFormat::new(Resolution::new(width, height), FrameFormat::MJPEG, fps);
        let req = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(fmt));

        let mut cam = Camera::new(CameraIndex::Index(index), req)
            .map_err(|e| Error::CameraInit(format!("Create camera: {e}")))?;

        cam.open_stream()
            .map_err(|e| Error::CameraInit(format!("Open stream: {e}")))?;

        let actual = cam.resolution();
        tracing::info!(
            index,
            requested = %format!("{width}x{height}"),
            actual = %format!("{}x{}", actual.width(), actual.height()),
            "camera stream opened"
        );

        Ok(Self { cam, width: actual.width(), height: actual.height() })
    }
}

impl FrameSource for CameraCapture {
    /// Blocks until the driver has a frame.
    fn next_frame(&mut self) -> Result<Option<FrameBuffer>, Error> {
        let frame = self
            .cam
            .frame()
            .map_err(|e| Error::CameraFrame(format!("Fetch frame: {e}")))?;

        let rgb = frame
            .decode_image::<RgbFormat>()
            .map_err(|e| Error::CameraFrame(format!("Decode RGB: {e}")))?;

        // Zero-sized frames happen while some drivers warm up.
        let (w, h) = rgb.dimensions();
        if w == 0 || h == 0 {
            return Ok(None);
        }

        // nokhwa hands back its own `image` version, so pack the raw RGB bytes here.
        let pixels = rgb
            .as_raw()
            .chunks_exact(3)
            .map(|p| pack_rgb(p[0], p[1], p[2]))
            .collect();
        Ok(Some(FrameBuffer { width: w as usize, height: h as usize, pixels }))
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl Drop for CameraCapture {
    // Release the device when the capture screen goes away.
    fn drop(&mut self) {
        match self.cam.stop_stream() {
            Ok(()) => tracing::debug!("camera stream stopped"),
            Err(e) => tracing::warn!(error = %e, "failed to stop camera stream"),
        }
    }
}

/// Replays a fixed list of frames; `None` entries simulate "no frame yet".
#[cfg(test)]
pub(crate) struct ScriptedSource {
    pub frames: std::collections::VecDeque<Option<FrameBuffer>>,
    pub size: (u32, u32),
}

#[cfg(test)]
impl FrameSource for ScriptedSource {
    fn next_frame(&mut self) -> Result<Option<FrameBuffer>, Error> {
        Ok(self.frames.pop_front().flatten())
    }

    fn resolution(&self) -> (u32, u32) {
        self.size
    }
}
