pub mod auth;
pub mod config;
pub mod consent;
pub mod cookies;
pub mod pkce;
pub mod redirect;
pub mod site_config;
pub mod storage;
