pub mod application;
pub mod offer;
pub mod payment;
pub mod reference;
pub mod user;
