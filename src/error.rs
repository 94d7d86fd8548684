// Crate-wide error type. Every variant states *where* things went wrong.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Window init error: {0}")]
    WindowInit(String), // Creating the window failed

    #[error("Window update error: {0}")]
    WindowUpdate(String), // Updating the window buffer failed

    #[error("Camera init error: {0}")]
    CameraInit(String), // Opening/starting the camera failed

    #[error("Camera frame error: {0}")]
    CameraFrame(String), // Grabbing/decoding a frame failed

    #[error("Surface error: {0}")]
    Surface(String), // Buffers handed to the compositor disagree on size

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError), // Decoding a background / encoding a still

    #[error("HTTP error: {0}")]
    Http(String), // Any kiosk API call that did not return 2xx

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ureq::Error> for Error {
    fn from(e: ureq::Error) -> Self {
        match e {
            ureq::Error::Status(code, resp) => {
                Error::Http(format!("{} returned {code}", resp.get_url()))
            }
            ureq::Error::Transport(t) => Error::Http(t.to_string()),
        }
    }
}
