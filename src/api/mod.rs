pub mod error;
pub mod payroll;
pub mod salary_structure;
