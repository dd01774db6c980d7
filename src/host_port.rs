use std::fmt::Display;
use std::fmt::Formatter;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::error::AddressParseError;

/// The network address of a replica set member.
///
/// The coordinator treats addresses as opaque identity; it never dials them.
#[derive(Debug, Clone, Default, PartialOrd, Ord, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize)]
pub struct HostAndPort {
    pub host: String,
    pub port: u16,
}

impl HostAndPort {
    pub fn new(host: impl ToString, port: u16) -> Self {
        HostAndPort {
            host: host.to_string(),
            port,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.host.is_empty()
    }
}

impl Display for HostAndPort {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for HostAndPort {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s.rsplit_once(':').ok_or_else(|| AddressParseError {
            input: s.to_string(),
            reason: "missing ':' separator".to_string(),
        })?;

        if host.is_empty() {
            return Err(AddressParseError {
                input: s.to_string(),
                reason: "empty host".to_string(),
            });
        }

        let port = port.parse::<u16>().map_err(|e| AddressParseError {
            input: s.to_string(),
            reason: e.to_string(),
        })?;

        Ok(HostAndPort {
            host: host.to_string(),
            port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        let hp: HostAndPort = "node-a.example:27017".parse().unwrap();
        assert_eq!(HostAndPort::new("node-a.example", 27017), hp);
        assert_eq!("node-a.example:27017", hp.to_string());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("no-port".parse::<HostAndPort>().is_err());
        assert!(":27017".parse::<HostAndPort>().is_err());
        assert!("host:not-a-port".parse::<HostAndPort>().is_err());
    }
}
