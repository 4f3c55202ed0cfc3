mod config;
mod error;
mod remote;
mod wire;

pub use config::HttpRemoteConfig;
pub use remote::HttpRemote;
