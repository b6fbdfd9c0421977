pub mod db;
pub mod migrations;
pub mod models;

pub use db::{CookieJar, Subscription};
pub use models::{ChangeCause, Cookie, CookieChange};
