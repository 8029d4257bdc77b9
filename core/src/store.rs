//! Path conventions and file operations for experiment folders.
//!
//! ```text
//! {root}/{folder}/config_{suffix}.yml
//! {root}/{folder}/data/{version}_{artifact}.{ext}
//! {root}/{folder}/figures/{version}_{artifact}.{ext}
//! ```

use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

use crate::{
    config::Configuration,
    data::{Data, DataFormat, Table},
    error::{Result, StoreError},
    visualization::{write_figure, Figure, FigureFormat, FigureOptions},
};

/// Environment variable naming the root directory.
pub const DATA_PATH_VAR: &str = "DATA_PATH";
pub const DATA_DIR: &str = "data";
pub const FIGURES_DIR: &str = "figures";

// Progress messages are `info` when the caller asked for them, `debug` otherwise.
macro_rules! progress {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose > 0 {
            tracing::info!($($arg)+)
        } else {
            tracing::debug!($($arg)+)
        }
    };
}

/// What [`ConfigStore::initialise_experiment`] found on disk.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InitOutcome {
    Created,
    AlreadyExists,
}

/// Format-specific knobs for data artifacts.
#[derive(Clone, Debug)]
pub struct DataOptions {
    pub verbose: u8,
    pub csv_delimiter: u8,
    pub pretty_json: bool,
}

impl Default for DataOptions {
    fn default() -> Self {
        Self {
            verbose: 0,
            csv_delimiter: b',',
            pretty_json: false,
        }
    }
}

/// Configuration and artifact storage rooted at one directory.
#[derive(Clone, Debug)]
pub struct ConfigStore {
    root: PathBuf,
}

impl ConfigStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the root from `DATA_PATH`, consulting a `.env` file in the current
    /// directory or its ancestors when the process environment does not set it.
    pub fn from_env() -> Result<Self> {
        if let Some(root) = root_from_process_env() {
            return Ok(Self::new(root));
        }
        match dotenvy::dotenv_iter() {
            Ok(entries) => Self::from_dotenv_entries(entries),
            Err(err) if err.not_found() => Err(StoreError::MissingDataPath),
            Err(err) => Err(err.into()),
        }
    }

    /// Like [`ConfigStore::from_env`] but reads an explicit `.env` file.
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(root) = root_from_process_env() {
            return Ok(Self::new(root));
        }
        Self::from_dotenv_entries(dotenvy::from_path_iter(path.as_ref())?)
    }

    fn from_dotenv_entries<I>(entries: I) -> Result<Self>
    where
        I: Iterator<Item = dotenvy::Result<(String, String)>>,
    {
        for entry in entries {
            let (key, value) = entry?;
            if key == DATA_PATH_VAR && !value.is_empty() {
                return Ok(Self::new(value));
            }
        }
        Err(StoreError::MissingDataPath)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn experiment_dir(&self, folder_name: &str) -> PathBuf {
        self.root.join(folder_name)
    }

    pub fn config_path(&self, folder_name: &str, suffix: &str) -> PathBuf {
        self.experiment_dir(folder_name)
            .join(format!("config_{suffix}.yml"))
    }

    pub fn data_dir(&self, folder_name: &str) -> PathBuf {
        self.experiment_dir(folder_name).join(DATA_DIR)
    }

    pub fn figures_dir(&self, folder_name: &str) -> PathBuf {
        self.experiment_dir(folder_name).join(FIGURES_DIR)
    }

    /// `{root}/{name}/data/{version}_{artifact_name}.{format}` for `config`.
    pub fn data_path(
        &self,
        config: &Configuration,
        artifact_name: &str,
        format: &str,
    ) -> Result<PathBuf> {
        Ok(self
            .data_dir(&config.name()?)
            .join(artifact_file_name(&config.version()?, artifact_name, format)))
    }

    /// `{root}/{name}/figures/{version}_{artifact_name}.{format}` for `config`.
    pub fn figure_path(
        &self,
        config: &Configuration,
        artifact_name: &str,
        format: &str,
    ) -> Result<PathBuf> {
        Ok(self
            .figures_dir(&config.name()?)
            .join(artifact_file_name(&config.version()?, artifact_name, format)))
    }

    pub fn load_configuration(&self, folder_name: &str, suffix: &str) -> Result<Configuration> {
        let path = self.config_path(folder_name, suffix);
        let contents = fs::read_to_string(&path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => StoreError::ConfigNotFound { path: path.clone() },
            _ => StoreError::io(&path, err),
        })?;
        let config = Configuration::from_yaml_str(&contents, &path)?;
        tracing::debug!(path = %path.display(), keys = config.len(), "loaded configuration");
        Ok(config)
    }

    /// Write `config` as YAML, replacing any existing file. The experiment folder must
    /// already exist.
    pub fn save_configuration(
        &self,
        folder_name: &str,
        config: &Configuration,
        suffix: &str,
    ) -> Result<()> {
        let path = self.config_path(folder_name, suffix);
        if !self.experiment_dir(folder_name).is_dir() {
            return Err(StoreError::PathNotFound { path });
        }
        let serialized = config.to_yaml_string()?;
        fs::write(&path, serialized).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => StoreError::PathNotFound { path: path.clone() },
            _ => StoreError::io(&path, err),
        })?;
        tracing::debug!(path = %path.display(), "saved configuration");
        Ok(())
    }

    /// Load the configuration, or initialise the experiment folder and write the
    /// initializer's configuration when the file is missing.
    pub fn load_or_init_configuration<F>(
        &self,
        folder_name: &str,
        suffix: &str,
        initializer: F,
    ) -> Result<Configuration>
    where
        F: FnOnce() -> Result<Configuration>,
    {
        if self.config_path(folder_name, suffix).exists() {
            return self.load_configuration(folder_name, suffix);
        }
        self.initialise_experiment(folder_name, 0)?;
        let config = initializer()?;
        self.save_configuration(folder_name, &config, suffix)?;
        tracing::info!(folder = folder_name, suffix, "wrote initial configuration");
        Ok(config)
    }

    /// Ensure `data/` and `figures/` exist under the experiment folder.
    pub fn initialise_experiment(&self, folder_name: &str, verbose: u8) -> Result<InitOutcome> {
        let folder = self.experiment_dir(folder_name);
        let mut outcome = InitOutcome::AlreadyExists;
        for dir in [self.data_dir(folder_name), self.figures_dir(folder_name)] {
            if !dir.is_dir() {
                fs::create_dir_all(&dir).map_err(|err| StoreError::io(&dir, err))?;
                outcome = InitOutcome::Created;
            }
        }
        match outcome {
            InitOutcome::Created => {
                progress!(verbose, folder = %folder.display(), "created experiment folder structure")
            }
            InitOutcome::AlreadyExists => {
                progress!(verbose, folder = %folder.display(), "experiment folder already exists, no changes made")
            }
        }
        Ok(outcome)
    }

    /// Render `figure` into `figures/{version}_{artifact_name}.{format}`.
    pub fn save_figure<F: Figure + ?Sized>(
        &self,
        config: &Configuration,
        figure: &F,
        artifact_name: &str,
        format: &str,
        options: &FigureOptions,
    ) -> Result<PathBuf> {
        let figure_format: FigureFormat = format.parse()?;
        let path = self.figure_path(config, artifact_name, format)?;
        let dir = self.figures_dir(&config.name()?);
        fs::create_dir_all(&dir).map_err(|err| StoreError::io(&dir, err))?;

        write_figure(figure.render()?, &path, figure_format, options)?;
        progress!(options.verbose, path = %path.display(), "figure saved");
        Ok(path)
    }

    /// Write `data` into `data/{version}_{artifact_name}.{format}`.
    ///
    /// `"json"` accepts any [`Data`]; `"csv"` accepts only tables. Nothing is written
    /// when the format or value is rejected.
    pub fn save_data(
        &self,
        config: &Configuration,
        data: &Data,
        artifact_name: &str,
        format: &str,
        options: &DataOptions,
    ) -> Result<PathBuf> {
        let table = match (format.parse::<DataFormat>()?, data) {
            (DataFormat::Csv, Data::Table(table)) => Some(table),
            (DataFormat::Csv, other) => {
                return Err(StoreError::TypeMismatch {
                    format: format.to_string(),
                    actual: other.kind(),
                })
            }
            (DataFormat::Json, _) => None,
        };
        let path = self.data_path(config, artifact_name, format)?;
        let dir = self.data_dir(&config.name()?);
        fs::create_dir_all(&dir).map_err(|err| StoreError::io(&dir, err))?;

        match table {
            Some(table) => table.write_csv(&path, options.csv_delimiter)?,
            None => data.write_json(&path, options.pretty_json)?,
        }
        progress!(options.verbose, path = %path.display(), "data saved");
        Ok(path)
    }

    /// Read back an artifact written by [`ConfigStore::save_data`]. CSV files load as tables.
    pub fn load_data(
        &self,
        config: &Configuration,
        artifact_name: &str,
        format: &str,
        options: &DataOptions,
    ) -> Result<Data> {
        let data_format: DataFormat = format.parse()?;
        let path = self.data_path(config, artifact_name, format)?;
        if !path.is_file() {
            return Err(StoreError::ArtifactNotFound { path });
        }

        let data = match data_format {
            DataFormat::Json => Data::read_json(&path)?,
            DataFormat::Csv => Data::Table(Table::read_csv(&path, options.csv_delimiter)?),
        };
        progress!(options.verbose, path = %path.display(), "data loaded");
        Ok(data)
    }

    /// Delete every artifact of this configuration's version. Returns the number of
    /// files removed.
    pub fn clear_artifacts(
        &self,
        config: &Configuration,
        clear_data: bool,
        clear_figures: bool,
        verbose: u8,
    ) -> Result<usize> {
        if !clear_data && !clear_figures {
            progress!(verbose, "no action taken, both data and figure flags are false");
            return Ok(0);
        }

        let folder_name = config.name()?;
        let version = config.version()?;
        let prefix = format!("{version}_");
        let mut removed = 0;

        let targets = [
            (clear_data, self.data_dir(&folder_name), DATA_DIR),
            (clear_figures, self.figures_dir(&folder_name), FIGURES_DIR),
        ];
        for (selected, dir, kind) in targets {
            if !selected || !dir.is_dir() {
                continue;
            }
            let count = remove_prefixed_files(&dir, &prefix)?;
            progress!(
                verbose,
                dir = %dir.display(),
                version = %version,
                count,
                "cleared {kind} files"
            );
            removed += count;
        }
        Ok(removed)
    }
}

fn root_from_process_env() -> Option<PathBuf> {
    env::var_os(DATA_PATH_VAR)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn artifact_file_name(version: &str, artifact_name: &str, format: &str) -> String {
    format!("{version}_{artifact_name}.{format}")
}

fn remove_prefixed_files(dir: &Path, prefix: &str) -> Result<usize> {
    let mut removed = 0;
    let entries = fs::read_dir(dir).map_err(|err| StoreError::io(dir, err))?;
    for entry in entries {
        let entry = entry.map_err(|err| StoreError::io(dir, err))?;
        let path = entry.path();
        let is_file = entry
            .file_type()
            .map_err(|err| StoreError::io(&path, err))?
            .is_file();
        let matches = entry.file_name().to_string_lossy().starts_with(prefix);
        if is_file && matches {
            fs::remove_file(&path).map_err(|err| StoreError::io(&path, err))?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notebook(name: &str, version: Option<&str>) -> Configuration {
        let mut config = Configuration::new();
        config.insert("name", name);
        if let Some(version) = version {
            config.insert("version", version);
        }
        config
    }

    #[test]
    fn test_path_layout() {
        let store = ConfigStore::new("/data");
        assert_eq!(
            store.config_path("sim", "v2"),
            PathBuf::from("/data/sim/config_v2.yml")
        );
        assert_eq!(store.data_dir("sim"), PathBuf::from("/data/sim/data"));
        assert_eq!(store.figures_dir("sim"), PathBuf::from("/data/sim/figures"));
    }

    #[test]
    fn test_artifact_paths_use_version_prefix() {
        let store = ConfigStore::new("/data");
        let config = notebook("sim", Some("v3"));
        assert_eq!(
            store.data_path(&config, "results", "csv").unwrap(),
            PathBuf::from("/data/sim/data/v3_results.csv")
        );
        assert_eq!(
            store.figure_path(&notebook("sim", None), "plot", "png").unwrap(),
            PathBuf::from("/data/sim/figures/v1_plot.png")
        );
    }

    #[test]
    fn test_artifact_paths_require_name() {
        let store = ConfigStore::new("/data");
        assert!(matches!(
            store.data_path(&Configuration::new(), "x", "json"),
            Err(StoreError::MissingKey { .. })
        ));
    }

    #[test]
    fn test_dotenv_entries() {
        let entries = vec![
            Ok(("OTHER".to_string(), "x".to_string())),
            Ok((DATA_PATH_VAR.to_string(), "/srv/data".to_string())),
        ];
        let store = ConfigStore::from_dotenv_entries(entries.into_iter()).unwrap();
        assert_eq!(store.root(), Path::new("/srv/data"));

        let empty = vec![Ok((DATA_PATH_VAR.to_string(), String::new()))];
        assert!(matches!(
            ConfigStore::from_dotenv_entries(empty.into_iter()),
            Err(StoreError::MissingDataPath)
        ));
    }
}
