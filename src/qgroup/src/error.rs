use std::path::PathBuf;

use nix::errno::Errno;

use crate::id::QgroupId;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid qgroupid '{0}'")]
    MalformedId(String),
    #[error("invalid size argument '{0}'")]
    InvalidLimit(String),
    #[error("invalid sort spec '{0}'")]
    InvalidSortSpec(String),
    #[error("limiting uncompressed data is not supported")]
    CompressionRequired,

    #[error("bad relation requested '{}': {src} cannot be a child of {dst}", .path.display())]
    InvalidHierarchy {
        path: PathBuf,
        src: QgroupId,
        dst: QgroupId,
    },
    #[error("'{}' is not a subvolume", .0.display())]
    NotASubvolume(PathBuf),
    #[error("'{}' is not on a btrfs filesystem", .0.display())]
    NotBtrfs(PathBuf),

    #[error("error accessing '{}': {source}", .path.display())]
    Access {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unable to {op}: {errno}")]
    Engine { op: &'static str, errno: Errno },
}

/// Coarse classification used for reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    Precondition,
    Resource,
    Engine,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MalformedId(_)
            | Error::InvalidLimit(_)
            | Error::InvalidSortSpec(_)
            | Error::CompressionRequired => ErrorKind::Input,
            Error::InvalidHierarchy { .. } | Error::NotASubvolume(_) | Error::NotBtrfs(_) => {
                ErrorKind::Precondition
            }
            Error::Access { .. } => ErrorKind::Resource,
            Error::Engine { .. } => ErrorKind::Engine,
        }
    }

    pub(crate) fn access(path: impl Into<PathBuf>, source: impl Into<std::io::Error>) -> Self {
        Error::Access {
            path: path.into(),
            source: source.into(),
        }
    }

    pub(crate) fn engine(op: &'static str) -> impl FnOnce(Errno) -> Self {
        move |errno| Error::Engine { op, errno }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
