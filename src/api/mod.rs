pub(crate) mod definitions;
pub(crate) mod errors;
pub(crate) mod guards;
pub(crate) mod handlers;
pub(crate) mod lessons;
pub(crate) mod pagination;
pub(crate) mod review;
pub(crate) mod router;
pub(crate) mod submissions;
