/// Version is the four-component version of one declared collection state:
/// `major.minor.patch.enumerators`. The first three components select the
/// schema document; the final component selects the enumerator set used
/// when expanding `enum` and `enum_array` nodes.
///
/// Ordering is tuple-lexicographic. `Version::ZERO` is the sentinel meaning
/// "never applied".
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub enumerators: u32,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid version string {value:?} (expected four dot-separated decimal integers)")]
pub struct BadVersion {
    pub value: String,
}

impl Version {
    pub const ZERO: Version = Version {
        major: 0,
        minor: 0,
        patch: 0,
        enumerators: 0,
    };

    // Components are bounded so they round-trip through signed database fields.
    const MAX_COMPONENT: u32 = i32::MAX as u32;

    pub fn new(major: u32, minor: u32, patch: u32, enumerators: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            enumerators,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// The `major.minor.patch` prefix, which names the schema document
    /// of this version within the dictionary tree.
    pub fn schema_suffix(&self) -> String {
        format!("{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl std::str::FromStr for Version {
    type Err = BadVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || BadVersion {
            value: s.to_string(),
        };

        let parts: Vec<&str> = s.split('.').collect();
        let &[major, minor, patch, enumerators] = parts.as_slice() else {
            return Err(bad());
        };

        let parse = |part: &str| -> Result<u32, BadVersion> {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(bad());
            }
            let n: u32 = part.parse().map_err(|_| bad())?;
            if n > Self::MAX_COMPONENT {
                return Err(bad());
            }
            Ok(n)
        };

        Ok(Version {
            major: parse(major)?,
            minor: parse(minor)?,
            patch: parse(patch)?,
            enumerators: parse(enumerators)?,
        })
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.patch, self.enumerators
        )
    }
}

impl std::fmt::Debug for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        <Self as std::fmt::Display>::fmt(self, f)
    }
}

impl serde::Serialize for Version {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        format!("{self}").serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for Version {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;
        let s = std::borrow::Cow::<'de, str>::deserialize(deserializer)?;
        s.parse().map_err(|err| D::Error::custom(format!("{err}")))
    }
}
