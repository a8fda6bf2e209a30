mod server;

pub use server::{ServerConfig, signup_link};
