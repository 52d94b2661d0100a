extern crate dotenv;

pub mod board;
pub mod bookmark;
pub mod cache;
pub mod calendar;
pub mod collection;
pub mod counters;
pub mod db;
pub mod fruit;
pub mod gallery;
pub mod gffft;
pub mod global;
pub mod hydrate;
pub mod identity;
pub mod link_set;
pub mod membership;
pub mod middleware;
pub mod notebook;
pub mod orm;
pub mod post;
pub mod refs;
pub mod role;
pub mod status;
pub mod thread;
pub mod user;
pub mod web;
pub mod webfinger;

pub use db::{get_db_pool, init_db};
