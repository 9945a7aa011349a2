pub mod platform;
pub mod record;
