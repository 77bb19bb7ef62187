pub mod chat;
pub mod doctor;
pub mod export;
pub mod import;
pub mod inspect;
pub mod reset;
