pub mod health;
pub mod slack;
pub mod webhook;
