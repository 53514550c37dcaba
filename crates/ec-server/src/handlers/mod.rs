pub mod admin;
pub mod auth;
pub mod id;
pub mod info;
pub mod mark;
