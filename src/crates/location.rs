use std::fmt;
use std::str::FromStr;

/// Block position of a placed crate. Equality and hashing are structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CrateLocation {
    pub world: String,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLocationError(pub String);

impl fmt::Display for ParseLocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed crate location '{}', expected world:x:y:z", self.0)
    }
}

impl std::error::Error for ParseLocationError {}

impl CrateLocation {
    pub fn new(world: impl Into<String>, x: i32, y: i32, z: i32) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
        }
    }

    /// Parse the persisted `world:x:y:z` form. Anything else is `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split(':');
        let world = parts.next()?;
        let x = parts.next()?.parse().ok()?;
        let y = parts.next()?.parse().ok()?;
        let z = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self::new(world, x, y, z))
    }

    pub fn matches(&self, world: &str, x: i32, y: i32, z: i32) -> bool {
        self.world == world && self.x == x && self.y == y && self.z == z
    }

    /// Same column, `dy` blocks up or down
    pub fn offset_y(&self, dy: i32) -> Option<Self> {
        Some(Self::new(self.world.clone(), self.x, self.y.checked_add(dy)?, self.z))
    }

    /// Human readable form, e.g. `world (10, 64, -3)`
    pub fn display_string(&self) -> String {
        format!("{} ({}, {}, {})", self.world, self.x, self.y, self.z)
    }
}

impl fmt::Display for CrateLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}:{}", self.world, self.x, self.y, self.z)
    }
}

impl FromStr for CrateLocation {
    type Err = ParseLocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ParseLocationError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashSet;

    #[test]
    fn test_string_roundtrip() {
        let alphabet: Vec<char> = "abcXYZ_-09 .éλ".chars().collect();
        let mut rng = StdRng::seed_from_u64(0xfeed_face_cafe_beef);
        for _ in 0..512 {
            let len = rng.random_range(0..12);
            let world: String = (0..len)
                .map(|_| alphabet[rng.random_range(0..alphabet.len())])
                .collect();
            let location = CrateLocation::new(world, rng.random(), rng.random(), rng.random());
            let parsed = CrateLocation::parse(&location.to_string()).expect("parse");
            assert_eq!(parsed, location);
        }

        let extremes = CrateLocation::new("world", i32::MIN, i32::MAX, 0);
        assert_eq!(extremes.to_string().parse::<CrateLocation>(), Ok(extremes));
    }

    #[test]
    fn test_malformed_strings_rejected() {
        for raw in ["", "world", "world:1:2", "world:1:2:3:4", "world:a:2:3", "world:1:2:3.5", "world: 1:2:3"] {
            assert!(CrateLocation::parse(raw).is_none(), "{raw}");
        }
        assert!("world:1:2".parse::<CrateLocation>().is_err());
    }

    #[test]
    fn test_structural_equality() {
        let mut set = HashSet::new();
        set.insert(CrateLocation::new("world", 1, 64, -3));
        assert!(set.contains(&CrateLocation::new("world", 1, 64, -3)));
        assert!(!set.contains(&CrateLocation::new("nether", 1, 64, -3)));
        assert!(CrateLocation::new("world", 1, 64, -3).matches("world", 1, 64, -3));
    }

    #[test]
    fn test_offset_and_display() {
        let location = CrateLocation::new("world", 10, 64, -3);
        assert_eq!(location.offset_y(1), Some(CrateLocation::new("world", 10, 65, -3)));
        assert_eq!(CrateLocation::new("w", 0, i32::MAX, 0).offset_y(1), None);
        assert_eq!(location.display_string(), "world (10, 64, -3)");
        assert_eq!(location.to_string(), "world:10:64:-3");
    }
}
