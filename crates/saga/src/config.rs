use std::env;

use saga_core::{DType, Error, Result};

// GraphConfig — Knobs for graph construction
//
//   init_seed     — base seed for parameters the graph creates. Unset means
//                   every run draws fresh values.
//   default_dtype — element type of automatically created parameters when
//                   no input tensor pins one down.
//
// Built either with the builder methods or from the environment:
//
//   SAGA_INIT_SEED=1234

/// Environment variable holding the parameter initialization seed.
pub const INIT_SEED_VAR: &str = "SAGA_INIT_SEED";

/// Configuration for building a [`Graph`](crate::Graph).
#[derive(Debug, Clone, PartialEq)]
pub struct GraphConfig {
    /// Base seed for generated parameters.
    pub init_seed: Option<u64>,
    /// Element type for created parameters (default: F32).
    pub default_dtype: DType,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            init_seed: None,
            default_dtype: DType::F32,
        }
    }
}

impl GraphConfig {
    /// Set the parameter initialization seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.init_seed = Some(seed);
        self
    }

    /// Set the default parameter dtype.
    pub fn with_dtype(mut self, dtype: DType) -> Self {
        self.default_dtype = dtype;
        self
    }

    /// Defaults overridden by `SAGA_INIT_SEED` when it is set and non-empty.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(value) = env::var(INIT_SEED_VAR) {
            config.init_seed = parse_seed(&value)?;
        }
        Ok(config)
    }
}

fn parse_seed(value: &str) -> Result<Option<u64>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|e| Error::msg(format!("{INIT_SEED_VAR}={value}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let c = GraphConfig::default().with_seed(7).with_dtype(DType::F16);
        assert_eq!(c.init_seed, Some(7));
        assert_eq!(c.default_dtype, DType::F16);
    }

    #[test]
    fn test_parse_seed() {
        assert_eq!(parse_seed(" 42 ").unwrap(), Some(42));
        assert_eq!(parse_seed("").unwrap(), None);
        assert!(parse_seed("abc").is_err());
    }

    // The only test touching the process environment, so the steps below
    // can't race with another test.
    #[test]
    fn test_from_env() {
        env::set_var(INIT_SEED_VAR, "1234");
        let c = GraphConfig::from_env().unwrap();
        assert_eq!(c.init_seed, Some(1234));
        assert_eq!(c.default_dtype, DType::F32);

        env::set_var(INIT_SEED_VAR, "  ");
        assert_eq!(GraphConfig::from_env().unwrap().init_seed, None);

        env::set_var(INIT_SEED_VAR, "-3");
        assert!(GraphConfig::from_env().is_err());

        env::remove_var(INIT_SEED_VAR);
        assert_eq!(GraphConfig::from_env().unwrap(), GraphConfig::default());
    }
}
