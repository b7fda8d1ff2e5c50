pub mod properties;
pub mod tenants;
