pub mod offer_dto;
pub mod user_dto;
