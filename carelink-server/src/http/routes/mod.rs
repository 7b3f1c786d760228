//! Route handlers organized by resource

pub mod health;
pub mod auth;
pub mod patients;
pub mod tasks;
pub mod reminders;
pub mod conditions;
pub mod medications;
pub mod appointments;
pub mod recommendations;
pub mod resources;
pub mod display;
pub mod alerts;
pub mod chat;
pub mod ws;
