pub mod archive;
pub mod backup_config;
pub mod cleanup;
pub mod compress;
pub mod destination;
pub mod file_ext;
pub mod finish;
pub mod notifications;
pub mod redacted;
pub mod result_error;
pub mod runner;
pub mod scheduler;
#[cfg(test)]
mod test_support;
pub mod upload;
pub mod validate;

macro_rules! function_path {
    () => {
        concat!(module_path!(), "::", function_name!(), " ", file!(), ":", line!())
    };
}

pub(crate) use function_path;
