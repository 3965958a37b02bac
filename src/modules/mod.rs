pub mod about;
pub mod contact;
pub mod gallery;
pub mod hero;
pub mod services;
