//! Error types for the reception backend.

/// Top-level error type for the virtual-receptionist system.
#[derive(Debug, thiserror::Error)]
pub enum ReceptionError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Shared session-state storage error.
    #[error("state error: {0}")]
    State(String),

    /// Flow state machine error.
    #[error("flow error: {0}")]
    Flow(String),

    /// Face gallery storage or decoding error.
    ///
    /// Distinct from "no match found" — callers must never conflate a
    /// broken gallery with an unrecognized face.
    #[error("gallery error: {0}")]
    Gallery(String),

    /// No face was detected in the submitted image.
    ///
    /// A caller-side input problem, not an identity-absence problem.
    #[error("no face detected in image")]
    NoFaceDetected,

    /// Face registration rejected (e.g. multiple faces in the capture).
    #[error("registration error: {0}")]
    Registration(String),

    /// OTP session error.
    #[error("OTP error: {0}")]
    Otp(String),

    /// Front-end signal channel error.
    #[error("signal error: {0}")]
    Signal(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ReceptionError>;
