pub mod payroll;
pub mod role;
pub mod salary_structure;
