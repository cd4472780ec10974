use crate::backup::result_error::{AddDebugObjectAndFnName, AddFunctionName, AddMsg};
use itertools::Itertools;
use std::fmt::Debug;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use thiserror_ext::Construct;

#[derive(Error, Debug, Construct)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    LiblzmaStream(#[from] liblzma::stream::Error),
    #[error(transparent)]
    ValidationError(#[from] validator::ValidationErrors),
    #[error(transparent)]
    ThreadPoolBuildError(#[from] rayon::ThreadPoolBuildError),
    #[error(transparent)]
    SerdeYml(#[from] serde_yml::Error),
    #[error(transparent)]
    WalkDir(#[from] walkdir::Error),
    #[error(transparent)]
    Lettre(#[from] lettre::error::Error),
    #[error(transparent)]
    LettreSmtp(#[from] lettre::transport::smtp::Error),
    #[error(transparent)]
    AwsBuild(#[from] aws_sdk_sesv2::error::BuildError),
    #[error(transparent)]
    Ctrlc(#[from] ctrlc::Error),
    #[error("{0}")]
    Aws(String),
    #[error("smtp server rejected message: {0}")]
    SmtpSendError(String),
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("invalid cron {cron:?}: {reason}")]
    Cron { cron: String, reason: String },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("archiving {:?} failed:\n{}", source_path, indent::indent_all_with("  ", error.to_string()))]
    Archive {
        source_path: PathBuf,
        error: Box<Error>,
    },
    #[error("upload to s3://{}/{} failed:\n{}", bucket, key, indent::indent_all_with("  ", error.to_string()))]
    Upload {
        bucket: String,
        key: String,
        error: Box<Error>,
    },
    #[error("notification failed:\n{}", indent::indent_all_with("  ", error.to_string()))]
    Notify { error: Box<Error> },
    #[error("removing {:?} failed:\n{}", path, indent::indent_all_with("  ", error.to_string()))]
    Cleanup { path: PathBuf, error: Box<Error> },
    #[error("{}:\n{}", msg, indent::indent_all_with("  ", error.to_string()))]
    WithMsg { msg: String, error: Box<Error> },
    #[error("{} failed:\n{}", fn_name, indent::indent_all_with("  ", error.to_string()))]
    WithFnName { fn_name: String, error: Box<Error> },
    #[error("{:?} {} failed:\n{}", obj_debug, fn_name, indent::indent_all_with("  ", error.to_string()))]
    WithDebugObjAndFnName {
        error: Box<Error>,
        obj_debug: Box<dyn Debug + Send>,
        fn_name: String,
    },
    #[error("{}", itertools::join(.0, "\n\n"))]
    LotsOfError(Vec<Error>),
}

impl<S: Into<String>, O: Debug + Send + 'static> AddDebugObjectAndFnName<S, O> for Error {
    fn add_debug_object_and_fn_name(self, obj: O, fn_name: S) -> Self {
        Error::WithDebugObjAndFnName {
            error: Box::new(self),
            obj_debug: Box::new(obj),
            fn_name: fn_name.into(),
        }
    }
}

impl<S: Into<String>> AddMsg<S> for Error {
    fn add_msg(self, msg: S) -> Self {
        Self::WithMsg {
            msg: msg.into(),
            error: Box::new(self),
        }
    }
}

impl<S: Into<String>> AddFunctionName<S> for Error {
    fn add_fn_name(self, fn_name: S) -> Self {
        Self::WithFnName {
            fn_name: fn_name.into(),
            error: Box::new(self),
        }
    }
}

impl Error {
    pub fn into_iter(self) -> Box<dyn Iterator<Item = Error>> {
        match self {
            Error::LotsOfError(v) => Box::new(v.into_iter().flat_map(Error::into_iter)),
            e => Box::new(std::iter::once(e)),
        }
    }

    pub fn chain(self, other: Error) -> Error {
        Error::LotsOfError(self.into_iter().chain(other.into_iter()).collect_vec())
    }

    /// Whether this error, or anything it wraps, is a configuration error.
    pub fn is_config(&self) -> bool {
        match self {
            Error::Config(_) | Error::Cron { .. } | Error::ValidationError(_) => true,
            Error::WithMsg { error, .. }
            | Error::WithFnName { error, .. }
            | Error::WithDebugObjAndFnName { error, .. } => error.is_config(),
            Error::LotsOfError(errors) => errors.iter().any(Error::is_config),
            _ => false,
        }
    }

    /// Whether this error, or anything it wraps, aborted an archive step.
    pub fn is_archive(&self) -> bool {
        match self {
            Error::Archive { .. } => true,
            Error::WithMsg { error, .. }
            | Error::WithFnName { error, .. }
            | Error::WithDebugObjAndFnName { error, .. } => error.is_archive(),
            Error::LotsOfError(errors) => errors.iter().any(Error::is_archive),
            _ => false,
        }
    }
}
