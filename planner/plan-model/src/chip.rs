use core::fmt;
use core::str::FromStr;
use std::collections::BTreeMap;

use plan_region::MemoryRegion;

use crate::ModelError;

/// Target family a chip belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PlatformKind {
    /// ARMv7-M with an MPU.
    A7M,
    /// ARMv7-A with short-descriptor page tables.
    A7A,
    /// x86-64 with 4-level paging.
    X64,
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::A7M => "A7M",
            Self::A7A => "A7A",
            Self::X64 => "X64",
        })
    }
}

impl FromStr for PlatformKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "A7M" | "ARMV7-M" => Ok(Self::A7M),
            "A7A" | "ARMV7-A" => Ok(Self::A7A),
            "X64" | "X86-64" | "X86_64" => Ok(Self::X64),
            _ => Err(ModelError::UnknownPlatform(s.to_owned())),
        }
    }
}

/// An interrupt source of the chip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChipVector {
    pub name: String,
    pub number: u32,
}

impl ChipVector {
    pub fn new(name: impl Into<String>, number: u32) -> Self {
        Self {
            name: name.into(),
            number,
        }
    }
}

/// Everything the planner needs to know about the target chip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chip {
    pub name: String,
    pub platform: PlatformKind,
    /// Declared memory, in declaration order. Auto placement scans in this
    /// order.
    pub regions: Vec<MemoryRegion>,
    pub vectors: Vec<ChipVector>,
    /// Raw platform options, parsed by the platform geometry.
    pub options: BTreeMap<String, String>,
}

impl Chip {
    pub fn new(name: impl Into<String>, platform: PlatformKind) -> Self {
        Self {
            name: name.into(),
            platform,
            regions: Vec::new(),
            vectors: Vec::new(),
            options: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_region(mut self, region: MemoryRegion) -> Self {
        self.regions.push(region);
        self
    }

    #[must_use]
    pub fn with_vector(mut self, vector: ChipVector) -> Self {
        self.vectors.push(vector);
        self
    }

    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn vector(&self, name: &str) -> Option<&ChipVector> {
        self.vectors.iter().find(|v| v.name == name)
    }
}
