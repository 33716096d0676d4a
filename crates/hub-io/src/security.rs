//! Parsing of the `security_string` hub option.
//!
//! Format: `Policy,Mode[,certificate,private_key]`, for example
//! `Basic256Sha256,SignAndEncrypt,pki/own/cert.der,pki/private/key.pem`.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SecurityStringError {
    #[error("expected 'Policy,Mode[,certificate,private_key]', got {0} fields")]
    FieldCount(usize),

    #[error("unknown security policy '{0}'")]
    UnknownPolicy(String),

    #[error("unknown message security mode '{0}'")]
    UnknownMode(String),

    #[error("policy {policy} cannot be used with mode {mode}")]
    Mismatch { policy: SecurityPolicy, mode: SecurityMode },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityPolicy {
    None,
    Basic128Rsa15,
    Basic256,
    Basic256Sha256,
    Aes128Sha256RsaOaep,
    Aes256Sha256RsaPss,
}

impl SecurityPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Basic128Rsa15 => "Basic128Rsa15",
            Self::Basic256 => "Basic256",
            Self::Basic256Sha256 => "Basic256Sha256",
            Self::Aes128Sha256RsaOaep => "Aes128Sha256RsaOaep",
            Self::Aes256Sha256RsaPss => "Aes256Sha256RsaPss",
        }
    }
}

impl fmt::Display for SecurityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecurityPolicy {
    type Err = SecurityStringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "None" => Ok(Self::None),
            "Basic128Rsa15" => Ok(Self::Basic128Rsa15),
            "Basic256" => Ok(Self::Basic256),
            "Basic256Sha256" => Ok(Self::Basic256Sha256),
            "Aes128Sha256RsaOaep" => Ok(Self::Aes128Sha256RsaOaep),
            "Aes256Sha256RsaPss" => Ok(Self::Aes256Sha256RsaPss),
            other => Err(SecurityStringError::UnknownPolicy(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityMode {
    None,
    Sign,
    SignAndEncrypt,
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl FromStr for SecurityMode {
    type Err = SecurityStringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "None" => Ok(Self::None),
            "Sign" => Ok(Self::Sign),
            "SignAndEncrypt" => Ok(Self::SignAndEncrypt),
            other => Err(SecurityStringError::UnknownMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityString {
    pub policy: SecurityPolicy,
    pub mode: SecurityMode,
    /// Client certificate and private key, when the client should not use
    /// its generated keypair.
    pub keypair: Option<(PathBuf, PathBuf)>,
}

impl SecurityString {
    pub fn is_secure(&self) -> bool {
        self.mode != SecurityMode::None
    }
}

impl Default for SecurityString {
    fn default() -> Self {
        Self {
            policy: SecurityPolicy::None,
            mode: SecurityMode::None,
            keypair: None,
        }
    }
}

impl FromStr for SecurityString {
    type Err = SecurityStringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split(',').map(str::trim).collect();
        let (policy, mode, keypair) = match fields.as_slice() {
            [policy, mode] => (policy, mode, None),
            [policy, mode, cert, key] if !cert.is_empty() && !key.is_empty() => {
                (policy, mode, Some((PathBuf::from(cert), PathBuf::from(key))))
            }
            _ => return Err(SecurityStringError::FieldCount(fields.len())),
        };
        let policy: SecurityPolicy = policy.parse()?;
        let mode: SecurityMode = mode.parse()?;
        if (policy == SecurityPolicy::None) != (mode == SecurityMode::None) {
            return Err(SecurityStringError::Mismatch { policy, mode });
        }
        Ok(Self {
            policy,
            mode,
            keypair,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_policy_and_mode() {
        let parsed: SecurityString = "Basic256Sha256,SignAndEncrypt".parse().unwrap();
        assert_eq!(parsed.policy, SecurityPolicy::Basic256Sha256);
        assert_eq!(parsed.mode, SecurityMode::SignAndEncrypt);
        assert!(parsed.keypair.is_none());
        assert!(parsed.is_secure());
    }

    #[test]
    fn parses_keypair() {
        let parsed: SecurityString = "Aes256Sha256RsaPss, Sign, own/cert.der, private/key.pem"
            .parse()
            .unwrap();
        let (cert, key) = parsed.keypair.unwrap();
        assert_eq!(cert, PathBuf::from("own/cert.der"));
        assert_eq!(key, PathBuf::from("private/key.pem"));
    }

    #[test]
    fn rejects_malformed_strings() {
        assert_eq!(
            "Basic256Sha256".parse::<SecurityString>(),
            Err(SecurityStringError::FieldCount(1))
        );
        assert_eq!(
            "Basic256,Sign,cert.der".parse::<SecurityString>(),
            Err(SecurityStringError::FieldCount(3))
        );
        assert!(matches!(
            "Rot13,Sign".parse::<SecurityString>(),
            Err(SecurityStringError::UnknownPolicy(p)) if p == "Rot13"
        ));
        assert!(matches!(
            "Basic256,Encrypt".parse::<SecurityString>(),
            Err(SecurityStringError::UnknownMode(_))
        ));
        assert!(matches!(
            "None,SignAndEncrypt".parse::<SecurityString>(),
            Err(SecurityStringError::Mismatch { .. })
        ));
        assert!(matches!(
            "Basic256Sha256,None".parse::<SecurityString>(),
            Err(SecurityStringError::Mismatch { .. })
        ));
    }

    #[test]
    fn none_none_is_plain() {
        let parsed: SecurityString = "None,None".parse().unwrap();
        assert_eq!(parsed, SecurityString::default());
        assert!(!parsed.is_secure());
    }
}
