use std::fmt;

#[derive(Debug)]
pub enum MasterError {
    Io(std::io::Error),
    Scene(scene::SceneError),
    Image(image::ImageError),
    /// Framebuffer dimensions and pixel data disagree; should be
    /// unreachable for buffers assembled from validated tiles.
    Framebuffer,
    Aborted,
    AllWorkersLost,
}

impl fmt::Display for MasterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MasterError::Io(e) => write!(f, "I/O error: {}", e),
            MasterError::Scene(e) => write!(f, "scene error: {}", e),
            MasterError::Image(e) => write!(f, "image output error: {}", e),
            MasterError::Framebuffer => {
                write!(f, "framebuffer dimensions do not match its pixel data")
            }
            MasterError::Aborted => write!(f, "render aborted"),
            MasterError::AllWorkersLost => write!(
                f,
                "frame cannot complete: every worker connection is gone and no local fallback exists"
            ),
        }
    }
}

impl std::error::Error for MasterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MasterError::Io(e) => Some(e),
            MasterError::Scene(e) => Some(e),
            MasterError::Image(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MasterError {
    fn from(e: std::io::Error) -> Self {
        MasterError::Io(e)
    }
}

impl From<scene::SceneError> for MasterError {
    fn from(e: scene::SceneError) -> Self {
        MasterError::Scene(e)
    }
}

impl From<image::ImageError> for MasterError {
    fn from(e: image::ImageError) -> Self {
        MasterError::Image(e)
    }
}
