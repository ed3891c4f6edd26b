//! Arm addressing
//!
//! Commands name their target with a loose vocabulary ("left_hand",
//! "BOTH", "arm", ...). Parsing happens once at the dispatch boundary;
//! everything below works with [`Target`] and [`Arm`].

/// A single servo arm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Arm {
    Left,
    Right,
}

impl Arm {
    /// Both arms in left, right order
    pub const ALL: [Arm; 2] = [Arm::Left, Arm::Right];

    /// Stable index (left = 0, right = 1)
    pub const fn index(self) -> usize {
        match self {
            Arm::Left => 0,
            Arm::Right => 1,
        }
    }

    /// Lowercase name used in status reports
    pub const fn name(self) -> &'static str {
        match self {
            Arm::Left => "left",
            Arm::Right => "right",
        }
    }
}

/// Which arm(s) a command addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Target {
    Left,
    Right,
    Both,
}

impl Target {
    const BOTH: &'static [&'static str] = &["both", "both_arms", "arm", "hand", "both_hands"];
    const LEFT: &'static [&'static str] = &["left", "left_arm", "left_hand"];
    const RIGHT: &'static [&'static str] = &["right", "right_arm", "right_hand"];

    /// Parse a target name, ignoring ASCII case
    pub fn parse(name: &str) -> Option<Self> {
        let matches = |set: &[&str]| set.iter().any(|s| s.eq_ignore_ascii_case(name));
        if matches(Self::BOTH) {
            Some(Target::Both)
        } else if matches(Self::LEFT) {
            Some(Target::Left)
        } else if matches(Self::RIGHT) {
            Some(Target::Right)
        } else {
            None
        }
    }

    /// Arms addressed, in left, right order
    pub fn arms(self) -> &'static [Arm] {
        match self {
            Target::Left => &[Arm::Left],
            Target::Right => &[Arm::Right],
            Target::Both => &Arm::ALL,
        }
    }

    /// The single arm addressed, if only one is
    pub fn single(self) -> Option<Arm> {
        match self {
            Target::Left => Some(Arm::Left),
            Target::Right => Some(Arm::Right),
            Target::Both => None,
        }
    }
}

impl From<Arm> for Target {
    fn from(arm: Arm) -> Self {
        match arm {
            Arm::Left => Target::Left,
            Arm::Right => Target::Right,
        }
    }
}
