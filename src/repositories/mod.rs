pub(crate) mod definitions;
pub(crate) mod health;
pub(crate) mod memory;
pub(crate) mod pg_store;
pub(crate) mod store;
pub(crate) mod submissions;
