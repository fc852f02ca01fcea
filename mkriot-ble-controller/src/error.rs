use mkriot_proto::{Channel, DecodeError, EncodeError, MelodyError, TimeError, ValidationError};
use uuid::Uuid;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Bluetooth LE is not available on this platform")]
    UnsupportedPlatform,
    #[error("no device was selected")]
    DeviceSelectionAborted,
    #[error("service {service} not found on the device ({})", describe_services(.available))]
    ServiceNotFound { service: Uuid, available: Vec<Uuid> },
    #[error("characteristic {channel} ({uuid}) is not available on the device")]
    CharacteristicUnavailable { channel: Channel, uuid: Uuid },
    #[error("not connected")]
    NotConnected,
    #[error("a connection attempt is already in progress")]
    Busy,
    #[error("channel {channel} is not part of the {profile} profile")]
    UnknownChannel { channel: Channel, profile: &'static str },
    #[error("channel {channel} does not support {operation}")]
    UnsupportedOperation {
        channel: Channel,
        operation: &'static str,
    },
    #[error("channel {channel} returned a {found} value")]
    UnexpectedValue {
        channel: Channel,
        found: &'static str,
    },
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{operation} failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: BoxError,
    },
}

impl Error {
    /// Wrap a platform error with the operation that produced it:
    /// `.map_err(Error::transport("reading characteristic"))`
    pub fn transport<E: Into<BoxError>>(operation: &'static str) -> impl FnOnce(E) -> Error {
        move |source| Error::Transport {
            operation,
            source: source.into(),
        }
    }
}

impl From<MelodyError> for Error {
    fn from(e: MelodyError) -> Self {
        Error::Validation(e.into())
    }
}

impl From<TimeError> for Error {
    fn from(e: TimeError) -> Self {
        Error::Validation(e.into())
    }
}

fn describe_services(available: &[Uuid]) -> String {
    if available.is_empty() {
        return "the device exposes no services".to_string();
    }
    let list: Vec<String> = available.iter().map(Uuid::to_string).collect();
    format!("available services: {}", list.join(", "))
}
