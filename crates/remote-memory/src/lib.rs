mod remote;
mod script;

pub use remote::{Call, MemoryRemote, MemoryRemoteConfig};
pub use script::{ScriptedError, TaskScript};
