//! Layered configuration loading
//!
//! Sources are merged in this order, later ones winning:
//!
//! 1. the serialized defaults of the target type
//! 2. an optional file (format picked from the extension: `.toml`, `.json`, `.yaml`)
//! 3. environment variables named `<PREFIX>__<SECTION>__<KEY>`
//!
//! List-valued keys can only be set from a file.

use crate::errors::context::{ErrorContext, ErrorExt, ResultExt};
use crate::errors::types::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Separator between the prefix, sections and keys of environment variables
pub const ENV_SEPARATOR: &str = "__";

/// Build a `T` from its defaults, an optional file and the environment
pub fn load_layered<T>(defaults: &T, path: Option<&Path>, env_prefix: &str) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    let defaults = config::Config::try_from(defaults)
        .map_err(Error::from)
        .with_context("config", "serialize defaults")?;
    let mut builder = config::Config::builder().add_source(defaults);

    if let Some(path) = path {
        if !path.exists() {
            return Err(Error::Config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }
        tracing::debug!("Loading configuration file {}", path.display());
        builder = builder.add_source(config::File::from(path).required(true));
    }

    builder = builder.add_source(
        config::Environment::with_prefix(env_prefix)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let merged = builder.build().map_err(|e| {
        let ctx = ErrorContext::new("config", "build").with_details(e.to_string());
        Error::Config("could not merge configuration sources".into()).context(ctx)
    })?;

    merged
        .try_deserialize::<T>()
        .map_err(Error::from)
        .with_context("config", "deserialize")
}
