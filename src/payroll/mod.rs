//! Salary structures and the salary breakup engine.
//!
//! A structure is a list of earning and deduction components, each a fixed
//! amount or a percentage of CTC or of another component, with at most one
//! balancing component that takes up the remainder of the CTC. Breakups,
//! payslips and payroll runs are derived from structures and never edited.

pub mod calculator;
pub mod component;
pub mod defaults;
pub mod error;
pub mod payslip;
pub mod revision;
pub mod run;
pub mod structure;

pub use calculator::{BreakupLine, SalaryBreakup, SalaryBreakupCalculator, compute_breakup, monthly_ctc};
pub use component::{CalculationType, ComponentDefinition, ComponentKind, ComponentRule, SalaryComponent};
pub use error::SalaryStructureError;
pub use payslip::{Payslip, PayslipError};
pub use revision::{RevisionError, RevisionHistory, SalaryRevision, validate_for_storage};
pub use run::{PayrollFailure, PayrollRun, run_payroll};
pub use structure::SalaryStructure;
