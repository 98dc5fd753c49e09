//! Número de versión `"<major>.<minor>"`.
//!
//! `Definition.version` guarda sólo el major; `DefinitionVersion.version`
//! guarda el par completo. El orden es numérico (`10.0 > 9.0`), nunca
//! lexicográfico.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::INITIAL_MINOR;
use crate::errors::LifecycleError;

/// Tipo de incremento aplicado sobre una versión existente.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bump {
    /// Incrementa major y reinicia minor a 0.
    Major,
    /// Incrementa minor.
    Minor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl Version {
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Versión `"<major>.0"` correspondiente al major de una cabecera.
    pub fn from_major(major: u32) -> Self {
        Self { major, minor: INITIAL_MINOR }
    }

    /// Falla con `InvalidVersion` si el componente incrementado desborda.
    pub fn next(self, bump: Bump) -> Result<Self, LifecycleError> {
        let overflow = || LifecycleError::InvalidVersion(format!("{self} has no successor"));
        match bump {
            Bump::Major => Ok(Self { major: self.major.checked_add(1).ok_or_else(overflow)?, minor: INITIAL_MINOR }),
            Bump::Minor => Ok(Self { major: self.major, minor: self.minor.checked_add(1).ok_or_else(overflow)? }),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for Version {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LifecycleError::InvalidVersion(s.to_string());
        let (major, minor) = s.split_once('.').ok_or_else(invalid)?;
        let major = major.parse::<u32>().map_err(|_| invalid())?;
        let minor = minor.parse::<u32>().map_err(|_| invalid())?;
        Ok(Self { major, minor })
    }
}

impl TryFrom<String> for Version {
    type Error = LifecycleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Version> for String {
    fn from(v: Version) -> Self {
        v.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_prints_dotted_form() {
        let v: Version = "3.4".parse().unwrap();
        assert_eq!(v, Version::new(3, 4));
        assert_eq!(v.to_string(), "3.4");
    }

    #[test]
    fn rejects_malformed_strings() {
        for bad in ["1", "a.b", "1.2.3", "", ".1", "-1.0"] {
            let err = bad.parse::<Version>().unwrap_err();
            assert!(matches!(err, LifecycleError::InvalidVersion(ref s) if s == bad), "{bad}");
        }
    }

    #[test]
    fn major_bump_resets_minor() {
        let v = Version::new(3, 4);
        assert_eq!(v.next(Bump::Major).unwrap().to_string(), "4.0");
        assert_eq!(v.next(Bump::Minor).unwrap().to_string(), "3.5");
    }

    #[test]
    fn bump_past_u32_max_is_invalid() {
        let err = Version::new(u32::MAX, 0).next(Bump::Major).unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidVersion(ref s) if s.starts_with("4294967295.0")));
        assert!(Version::new(1, u32::MAX).next(Bump::Minor).is_err());
        assert_eq!(Version::new(u32::MAX, 0).next(Bump::Minor).unwrap().to_string(), "4294967295.1");
    }

    #[test]
    fn ordering_is_numeric() {
        let nine: Version = "9.0".parse().unwrap();
        let ten: Version = "10.0".parse().unwrap();
        assert!(ten > nine);
        assert!(Version::new(2, 1) > Version::new(2, 0));
    }

    #[test]
    fn serde_uses_string_form() {
        let json = serde_json::to_string(&Version::new(2, 0)).unwrap();
        assert_eq!(json, "\"2.0\"");
        let back: Version = serde_json::from_str("\"7.3\"").unwrap();
        assert_eq!(back, Version::new(7, 3));
        assert!(serde_json::from_str::<Version>("\"7\"").is_err());
    }
}
