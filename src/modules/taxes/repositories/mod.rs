pub mod tax_table_registry;

pub use tax_table_registry::TaxTableRegistry;
