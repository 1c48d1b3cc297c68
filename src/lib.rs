//! # single-imodulon
//!
//! iModulon curation for independent component analysis (ICA) of gene expression, part of the
//! single-rust ecosystem.
//!
//! An ICA decomposition yields a gene weight matrix `M` and an activity matrix `A`. This crate
//! binds both to gene, sample and iModulon tables and a transcriptional regulatory network
//! (TRN), decides which genes belong to each iModulon, and tests iModulons for enrichment in
//! regulons and gene annotations.
//!
//! ## Core Features
//!
//! - **Thresholds**: D'Agostino-Pearson normality cutoffs or 1-D k-means per iModulon
//! - **Cutoff optimization**: grid search of the D'Agostino cutoff against known regulons
//! - **Enrichment**: Fisher's exact test with Benjamini-Hochberg correction, for single
//!   regulons, regulator combinations and arbitrary annotations
//! - **Persistence**: pandas-compatible JSON models, optionally gzip-compressed
//!
//! ## Quick Start
//!
//! ```rust
//! use ndarray::array;
//! use single_imodulon::data::{LabeledMatrix, ModuleName};
//! use single_imodulon::model::{IcaData, IcaDataOptions};
//!
//! let m = LabeledMatrix::new(
//!     vec!["b0001".to_string(), "b0002".to_string()],
//!     vec![ModuleName::Index(0)],
//!     array![[0.8], [0.02]],
//! )?;
//! let a = LabeledMatrix::new(
//!     vec![ModuleName::Index(0)],
//!     vec!["ctrl".to_string()],
//!     array![[1.5]],
//! )?;
//! let data = IcaData::new(m, a, IcaDataOptions::default().with_thresholds(vec![0.3]))?;
//! assert_eq!(data.imodulon_genes(&ModuleName::Index(0))?, vec!["b0001"]);
//! # Ok::<(), single_imodulon::error::ModulonError>(())
//! ```
//!
//! ## Module Organization
//!
//! - **[`data`]**: labeled matrices, annotation tables and their loaders
//! - **[`trn`]**: the regulatory network and regulon expressions
//! - **[`testing`]**: Fisher's exact test, normality test and multiple testing correction
//! - **[`threshold`]**: per-iModulon membership thresholds
//! - **[`enrichment`]**: regulon and annotation enrichment
//! - **[`model`]**: the [`IcaData`](model::IcaData) model
//! - **[`io`]**: JSON persistence

pub mod data;
pub mod enrichment;
pub mod error;
pub mod io;
pub mod model;
pub mod testing;
pub mod threshold;
pub mod trn;

pub use error::{ModulonError, Result};
pub use io::{load_json_model, save_to_json};
pub use model::{IcaData, IcaDataOptions};
