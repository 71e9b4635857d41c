pub mod credential;
pub mod record;
pub mod zone;
