pub mod dictionaries;
pub mod health;
pub mod offers;
pub mod users;
pub mod webhook;
