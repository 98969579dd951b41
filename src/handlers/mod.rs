// Route handlers, grouped by who may reach them
pub mod admin;
pub mod integrations;
pub mod messages;
pub mod public;
