//! Provider data sources built from the run configuration.

use crate::config::{DataFormat, ProviderConfig, Verbosity};
use crate::constraints::Constraints;
use crate::error::{BgcError, Result};
use crate::io::{DateRangeGenerator, StorerSaver};
use crate::loaders::{
    ABFileLoader, CsvLoader, FileNamePattern, Loader, LoaderBase, NetCDFLoader,
    SelectiveABFileLoader,
};
use crate::providers;
use crate::storer::Storer;
use crate::variables::VariableEnsemble;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One provider's loader, chosen by its data format
#[derive(Debug)]
pub struct DataSource {
    name: String,
    format: DataFormat,
    loader: Box<dyn Loader>,
}

fn default_pattern(name: &str, format: DataFormat) -> String {
    match providers::definition(name) {
        Ok(definition) if definition.format == format => definition.files_pattern.to_string(),
        _ => match format {
            DataFormat::Csv => r".*\.csv".to_string(),
            DataFormat::Netcdf => r".*\.nc".to_string(),
            DataFormat::Abfiles => r".*\.a".to_string(),
        },
    }
}

fn loader_base(
    name: &str,
    config: &ProviderConfig,
    variables: VariableEnsemble,
    verbosity: Verbosity,
) -> Result<LoaderBase> {
    let pattern = config
        .files_pattern
        .clone()
        .unwrap_or_else(|| default_pattern(name, config.format));
    LoaderBase::new(
        name,
        &config.path,
        &config.category,
        config.exclude.clone(),
        FileNamePattern::new(pattern),
        variables,
        verbosity,
    )
}

fn abfile_loader(
    name: &str,
    config: &ProviderConfig,
    variables: VariableEnsemble,
    verbosity: Verbosity,
) -> Result<ABFileLoader> {
    let grid = config.grid_basename.as_deref().ok_or_else(|| {
        BgcError::configuration(format!("provider '{}' has no grid_basename", name))
    })?;
    let base = loader_base(name, config, variables, verbosity)?;
    Ok(ABFileLoader::new(base, grid))
}

impl DataSource {
    pub fn new(
        name: &str,
        config: &ProviderConfig,
        variables: VariableEnsemble,
        verbosity: Verbosity,
    ) -> Result<Self> {
        let loader: Box<dyn Loader> = match config.format {
            DataFormat::Csv => Box::new(CsvLoader::new(
                loader_base(name, config, variables, verbosity)?,
                config.separator,
                config.units_row,
            )?),
            DataFormat::Netcdf => Box::new(NetCDFLoader::new(loader_base(
                name, config, variables, verbosity,
            )?)),
            DataFormat::Abfiles => Box::new(abfile_loader(name, config, variables, verbosity)?),
        };
        debug!(
            "Data source {} reads {} files from {}",
            name,
            config.format.as_str(),
            config.path.display()
        );
        Ok(Self {
            name: name.to_string(),
            format: config.format,
            loader,
        })
    }

    /// Data source of a known provider, with its own ensemble
    pub fn for_provider(name: &str, config: &ProviderConfig, verbosity: Verbosity) -> Result<Self> {
        let variables = providers::definition(name)?.variables()?;
        Self::new(name, config, variables, verbosity)
    }

    /// Data source around an already built loader
    pub fn from_loader(format: DataFormat, loader: Box<dyn Loader>) -> Self {
        Self {
            name: loader.provider().to_string(),
            format,
            loader,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn format(&self) -> DataFormat {
        self.format
    }

    pub fn loader(&self) -> &dyn Loader {
        self.loader.as_ref()
    }

    pub fn variables(&self) -> &VariableEnsemble {
        self.loader.variables()
    }

    /// Every selected file summed into one storer, features included
    pub fn load_all(&self, constraints: &Constraints) -> Result<Storer> {
        self.loader.load_all(constraints)
    }

    /// Save the provider's files range by range without holding them all
    pub fn load_and_save(
        &self,
        saver: &StorerSaver,
        generator: &DateRangeGenerator,
        dir: &Path,
        constraints: &Constraints,
    ) -> Result<Vec<PathBuf>> {
        self.loader.load_and_save(saver, generator, dir, constraints)
    }
}

/// Mask-restricted archive loader of an ABFile provider
pub fn selective_loader(
    name: &str,
    config: &ProviderConfig,
    variables: VariableEnsemble,
    verbosity: Verbosity,
) -> Result<SelectiveABFileLoader> {
    if config.format != DataFormat::Abfiles {
        return Err(BgcError::configuration(format!(
            "provider '{}' reads {} files, selective loading needs abfiles",
            name,
            config.format.as_str()
        )));
    }
    Ok(SelectiveABFileLoader::new(abfile_loader(
        name, config, variables, verbosity,
    )?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(dir: &Path, format: DataFormat) -> ProviderConfig {
        ProviderConfig {
            path: dir.to_path_buf(),
            format,
            grid_basename: Some("regional.grid".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_loader_chosen_by_format() {
        let dir = TempDir::new().unwrap();
        for (name, format) in [
            ("GLODAPv2", DataFormat::Csv),
            ("ARGO", DataFormat::Netcdf),
            ("HYCOM", DataFormat::Abfiles),
        ] {
            let source =
                DataSource::for_provider(name, &config(dir.path(), format), Verbosity::Quiet)
                    .unwrap();
            assert_eq!(source.format(), format);
            assert_eq!(source.name(), name);
            assert_eq!(source.loader().provider(), name);
        }
    }

    #[test]
    fn test_no_files_gives_empty_storer() {
        let dir = TempDir::new().unwrap();
        let source = DataSource::for_provider(
            "GLODAPv2",
            &config(dir.path(), DataFormat::Csv),
            Verbosity::Quiet,
        )
        .unwrap();
        let storer = source.load_all(&Constraints::new()).unwrap();
        assert!(storer.is_empty());
        assert_eq!(storer.frame().width(), source.variables().len());
    }

    #[test]
    fn test_selective_loader_needs_abfiles() {
        let dir = TempDir::new().unwrap();
        let variables = providers::argo().unwrap();
        let err = selective_loader(
            "ARGO",
            &config(dir.path(), DataFormat::Netcdf),
            variables,
            Verbosity::Quiet,
        )
        .unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_default_patterns() {
        assert_eq!(
            default_pattern("HYCOM", DataFormat::Abfiles),
            r"archm\.{years}_[0-9]*_[0-9]*\.a"
        );
        assert_eq!(default_pattern("HYCOM", DataFormat::Csv), r".*\.csv");
        assert_eq!(default_pattern("WOD", DataFormat::Netcdf), r".*\.nc");
    }
}
