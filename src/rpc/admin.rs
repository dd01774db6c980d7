use serde::Deserialize;
use serde::Serialize;

use crate::host_port::HostAndPort;

/// Reply to a freeze command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
pub struct FreezeResponse {
    pub info: Option<String>,
    pub warning: Option<String>,
}

/// Reply to a syncFrom command.
#[derive(Debug, Clone, Default, PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct SyncFromResponse {
    /// The sync source in use before the command took effect.
    pub prev_sync_target: Option<HostAndPort>,
    pub sync_from_requested: Option<HostAndPort>,
    pub warning: Option<String>,
}
