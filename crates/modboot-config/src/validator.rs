//! Configuration validation

use crate::{Error, LoaderConfig, Result};

/// Validate configuration
pub fn validate_config(config: &LoaderConfig) -> Result<()> {
    validate_paths(config)?;
    validate_packages(config)?;
    validate_bootstrap(config)?;

    Ok(())
}

fn validate_paths(config: &LoaderConfig) -> Result<()> {
    for (field, path) in config.paths.all() {
        if !path.starts_with('/') {
            return Err(Error::invalid(format!(
                "paths.{field} must be absolute, got '{path}'"
            )));
        }
    }

    Ok(())
}

fn validate_packages(config: &LoaderConfig) -> Result<()> {
    let packages = &config.packages;

    if packages.host_id.is_empty() {
        return Err(Error::invalid("packages.host_id cannot be empty"));
    }

    if packages.loader_id.is_empty() {
        return Err(Error::invalid("packages.loader_id cannot be empty"));
    }

    if packages.host_id == packages.loader_id {
        return Err(Error::invalid(
            "packages.host_id and packages.loader_id must differ",
        ));
    }

    if let Err(e) = semver::Version::parse(&packages.loader_version) {
        return Err(Error::invalid(format!(
            "packages.loader_version '{}' is not a valid SemVer: {e}",
            packages.loader_version
        )));
    }

    if packages.max_resolve_passes == 0 {
        return Err(Error::invalid("packages.max_resolve_passes must be > 0"));
    }

    if let Some(priority) = &packages.priority_mod {
        if priority.is_empty() {
            return Err(Error::invalid("packages.priority_mod cannot be empty"));
        }
    }

    Ok(())
}

fn validate_bootstrap(config: &LoaderConfig) -> Result<()> {
    let bootstrap = &config.bootstrap;

    if bootstrap.game_mount_id.is_empty() {
        return Err(Error::invalid("bootstrap.game_mount_id cannot be empty"));
    }

    if bootstrap.poll_interval.is_zero() {
        return Err(Error::invalid("bootstrap.poll_interval must be > 0"));
    }

    if let Some(timeout) = bootstrap.readiness_timeout {
        if timeout.is_zero() {
            return Err(Error::invalid("bootstrap.readiness_timeout must be > 0"));
        }
        if timeout < bootstrap.poll_interval {
            tracing::warn!(
                timeout = ?timeout,
                poll_interval = ?bootstrap.poll_interval,
                "readiness_timeout is shorter than poll_interval"
            );
        }
    }

    Ok(())
}
