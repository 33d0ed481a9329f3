use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use crate::PlatformError;

/// Raw chip options of one platform, with unknown keys already rejected.
pub(crate) struct Options<'a> {
    platform: &'static str,
    raw: &'a BTreeMap<String, String>,
}

impl<'a> Options<'a> {
    pub(crate) fn new(
        platform: &'static str,
        raw: &'a BTreeMap<String, String>,
        known: &[&str],
    ) -> Result<Self, PlatformError> {
        if let Some(key) = raw.keys().find(|k| !known.contains(&k.as_str())) {
            return Err(PlatformError::UnknownOption {
                platform,
                key: key.clone(),
            });
        }
        Ok(Self { platform, raw })
    }

    /// One of a fixed set of names, matched case-insensitively.
    pub(crate) fn choice<T: Copy>(
        &self,
        key: &str,
        choices: &[(&str, T)],
        default: T,
        expected: &'static str,
    ) -> Result<T, PlatformError> {
        let Some(value) = self.raw.get(key) else {
            return Ok(default);
        };
        choices
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(value))
            .map(|&(_, v)| v)
            .ok_or_else(|| self.invalid(key, value, expected))
    }

    /// A decimal or `0x` hexadecimal number inside `range`.
    pub(crate) fn int(
        &self,
        key: &str,
        range: RangeInclusive<u32>,
        default: u32,
        expected: &'static str,
    ) -> Result<u32, PlatformError> {
        let Some(value) = self.raw.get(key) else {
            return Ok(default);
        };
        let text = value.trim();
        let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            Some(hex) => u32::from_str_radix(hex, 16),
            None => text.parse(),
        };
        parsed
            .ok()
            .filter(|v| range.contains(v))
            .ok_or_else(|| self.invalid(key, value, expected))
    }

    fn invalid(&self, key: &str, value: &str, expected: &'static str) -> PlatformError {
        PlatformError::InvalidOption {
            platform: self.platform,
            key: key.to_owned(),
            value: value.to_owned(),
            expected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|&(k, v)| (k.to_owned(), v.to_owned())).collect()
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let map = raw(&[("FPU", "none"), ("Bogus", "1")]);
        assert!(matches!(
            Options::new("test", &map, &["FPU"]),
            Err(PlatformError::UnknownOption { key, .. }) if key == "Bogus"
        ));
    }

    #[test]
    fn values_and_defaults() {
        let map = raw(&[("FPU", "fpv4_sp"), ("Lines", "0x40")]);
        let opts = Options::new("test", &map, &["FPU", "Lines", "Other"]).unwrap();

        assert_eq!(opts.choice("FPU", &[("None", 0), ("FPV4_SP", 1)], 0, "x"), Ok(1));
        assert_eq!(opts.int("Lines", 32..=1020, 32, "x"), Ok(64));
        assert_eq!(opts.int("Other", 0..=7, 3, "x"), Ok(3));
        assert!(opts.int("Lines", 100..=200, 150, "x").is_err());
    }
}
