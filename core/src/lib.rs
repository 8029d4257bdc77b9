//! Versioned experiment configuration and artifact storage for research notebooks.
//!
//! A [`ConfigStore`] owns a root directory (usually `DATA_PATH`). Each experiment gets a
//! folder holding `config_{suffix}.yml` files plus `data/` and `figures/` subdirectories,
//! where every artifact is named `{version}_{artifact}.{ext}`.

pub mod config;
pub mod data;
pub mod error;
pub mod experiment;
pub mod rng;
pub mod store;
pub mod visualization;

pub use config::{print_configuration, render_configuration, Configuration, DEFAULT_VERSION};
pub use data::{Cell, Data, DataFormat, Table, DEFAULT_DATA_FORMAT};
pub use error::{Result, StoreError};
pub use experiment::{ArgsError, ExperimentArgs, ExperimentMode};
pub use rng::{normal_sample, seeded_rng};
pub use store::{ConfigStore, DataOptions, InitOutcome, DATA_PATH_VAR};
pub use visualization::{
    luma_image, rgb_image, Figure, FigureFormat, FigureOptions, LinePlot, DEFAULT_FIGURE_FORMAT,
};
