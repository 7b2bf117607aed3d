//! relik-prep - turn AnnoCTR entity-linking annotations into ReLiK documents.
//!
//! Each raw record carries a mention with its left and right context. The
//! converter stitches those into one document text, locates the mention in
//! codepoint offsets and attaches a resolved label. A checker verifies the
//! converted spans, and a small pipeline driver hands the converted splits to
//! the external ReLiK toolkit for windowing, candidate retrieval and reader
//! training.
//!
//! # Quick start
//!
//! ```no_run
//! use relik_prep::{DataDir, Split};
//! use relik_prep::{check, convert};
//!
//! let data_dir = DataDir::resolve(None, None, "annoctr/linking_mitre_only").unwrap();
//! for report in convert::convert_splits(&data_dir, &Split::ALL).unwrap() {
//!     println!("{}: {:?}", report.split, report.outcome);
//! }
//!
//! let result = check::check_split(&data_dir, Split::Train).unwrap();
//! println!("{:?}", result.outcome);
//! ```

pub mod catalog;
pub mod check;
pub mod cli;
pub mod config;
pub mod convert;
pub mod data_dir;
pub mod error;
pub mod inspect;
pub mod pipeline;
pub mod record;
pub mod span;
pub mod text_util;
pub mod toolkit;

pub use catalog::TechniqueCatalog;
pub use config::PipelineConfig;
pub use data_dir::{DataDir, Split};
pub use error::{Error, Result};
pub use pipeline::Pipeline;
pub use record::{DerivedRecord, SourceRecord};
pub use toolkit::{ProcessToolkit, Toolkit};
