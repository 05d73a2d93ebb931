//! Binary classifiers and their configuration.
//!
//! Every classifier implements [`Estimator`]. [`factory::build_classifier`]
//! turns a [`ClassifierKind`] label into either a fixed estimator or a
//! cross-validated [`GridSearch`].

pub mod estimator;
pub mod factory;
pub mod forest;
pub mod grid_search;
pub mod linear_svc;
pub mod logistic;
pub mod svc;

pub use estimator::{ClassWeight, Estimator, ParamGrid, ParamValue, Params};
pub use factory::{ClassifierConfig, ClassifierKind, GridBase, GridSearchOptions, build_classifier};
pub use forest::RandomForest;
pub use grid_search::{CandidateScore, GridSearch, GridSummary};
pub use linear_svc::LinearSvc;
pub use logistic::LogisticRegression;
pub use svc::KernelSvc;
