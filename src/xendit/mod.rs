pub mod client;

pub use client::XenditClient;
