pub mod pricing;
pub mod scanner;
