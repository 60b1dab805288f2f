//! Init command

use anyhow::{bail, Context, Result};
use hoist_core::SemanticVersion;
use hoist_update::{InstalledState, Installer};
use std::path::Path;

use crate::cli::{ConfigOverrides, InitArgs};
use crate::commands::load_config;
use crate::output;

pub fn run(args: InitArgs, overrides: &ConfigOverrides) -> Result<()> {
    let config = load_config(overrides)?;
    let root = config
        .install
        .root
        .clone()
        .context("install.root is not set; pass --install-root or set it in hoist.yaml")?;
    let version = SemanticVersion::parse(args.installed_version.trim_start_matches('v'))
        .with_context(|| format!("Invalid version '{}'", args.installed_version))?;

    let installer = Installer::new(root.clone(), config.install.strategy);
    let state = write_marker(&installer, version, args.force)?;

    output::success(&format!(
        "Recorded version {} for {}",
        state.version,
        root.display()
    ));
    Ok(())
}

fn write_marker(installer: &Installer, version: SemanticVersion, force: bool) -> Result<InstalledState> {
    let root: &Path = installer.layout().root();
    if !force {
        if let Some(existing) = installer
            .read_state()
            .context("Failed to read installation state")?
        {
            bail!(
                "{} already records version {}; use --force to overwrite",
                root.display(),
                existing.version
            );
        }
    }
    installer
        .initialize(version)
        .with_context(|| format!("Failed to write version marker in {}", root.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoist_core::types::CommitStrategyPreference;
    use tempfile::TempDir;

    #[test]
    fn test_marker_is_not_overwritten_without_force() {
        let dir = TempDir::new().unwrap();
        let installer = Installer::new(dir.path(), CommitStrategyPreference::Auto);
        let v1 = SemanticVersion::parse("1.0.0").unwrap();
        let v2 = SemanticVersion::parse("2.0.0").unwrap();

        write_marker(&installer, v1.clone(), false).unwrap();
        assert!(write_marker(&installer, v2.clone(), false).is_err());
        assert_eq!(installer.installed_version().unwrap(), Some(v1));

        write_marker(&installer, v2.clone(), true).unwrap();
        assert_eq!(installer.installed_version().unwrap(), Some(v2));
    }
}
