//! This is the `ConfigFile` struct.
//!
//! This is for finding the right default location for the configuration file of `seawatch`.  The
//! loader is neutral regarding the actual content, it only knows where the file lives, that it is
//! HCL and that it carries a `version` field.  The content is then available with `.inner()`.
//!
use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use eyre::{eyre, Result};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

/// Config filename
const CONFIG: &str = "seawatch.hcl";

/// Main name for the directory base
const TAG: &str = "seawatch";

/// Anything loaded through `ConfigFile` has a version to check.
///
pub trait Versioned {
    /// Version this code understands
    const VERSION: usize;

    /// Version found in the file
    fn version(&self) -> usize;
}

/// Loaded configuration along with where it came from.
///
#[derive(Debug)]
pub struct ConfigFile<T: Debug + DeserializeOwned + Versioned> {
    /// Tag is the project name.
    tag: String,
    /// This is the base directory for all files.
    basedir: PathBuf,
    inner: T,
}

/// Base directory, `$HOME/.config/<tag>` on Unix, `%LOCALAPPDATA%\<tag>` on Windows.
///
fn base_directory(tag: &str) -> Result<PathBuf> {
    let base = BaseDirs::new().ok_or_else(|| eyre!("No home directory, can not continue"))?;

    #[cfg(unix)]
    let base = base.home_dir().join(".config");

    #[cfg(windows)]
    let base = base.data_local_dir().to_path_buf();

    debug!("base = {base:?}");
    Ok(base.join(tag))
}

impl<T> ConfigFile<T>
where
    T: Debug + DeserializeOwned + Versioned,
{
    /// Returns the path of the default config directory
    ///
    pub fn config_path(&self) -> PathBuf {
        self.basedir.clone()
    }

    /// Returns the path of the default config file
    ///
    pub fn default_file() -> Result<PathBuf> {
        let cfg = base_directory(TAG)?.join(CONFIG);
        debug!("default = {cfg:?}");
        Ok(cfg)
    }

    /// Load the file and return a struct T in the right format.
    ///
    /// Use the following search path:
    /// - file specified by the caller
    /// - default basedir (based on $HOME or $LOCALAPPDATA)
    ///
    #[tracing::instrument]
    pub fn load(fname: Option<&Path>) -> Result<ConfigFile<T>> {
        let basedir = base_directory(TAG)?;

        let fname = match fname {
            Some(fname) => fname.to_path_buf(),
            None => basedir.join(CONFIG),
        };

        // Use a full path
        //
        let fname = if fname.exists() {
            fname.canonicalize()?
        } else {
            return Err(eyre!("Unknown config file {:?}", fname));
        };

        trace!("Loading config file {fname:?}");
        let data = fs::read_to_string(&fname)?;

        let inner = Self::parse(&data)?;
        Ok(ConfigFile {
            tag: TAG.to_string(),
            basedir,
            inner,
        })
    }

    /// Decode HCL content and check its version.
    ///
    #[tracing::instrument(skip(data))]
    pub fn parse(data: &str) -> Result<T> {
        let inner: T = hcl::from_str(data)?;
        debug!("struct data = {inner:?}");

        if inner.version() != T::VERSION {
            return Err(eyre!(
                "Bad config file version v{}, need v{}",
                inner.version(),
                T::VERSION
            ));
        }
        Ok(inner)
    }

    /// Project tag
    ///
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Return the inner configuration
    ///
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Consume the wrapper
    ///
    pub fn into_inner(self) -> T {
        self.inner
    }
}
