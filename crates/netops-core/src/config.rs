pub const DEFAULT_INTERFACE: &str = "eth0";
pub const DEFAULT_BACKEND: &str = "tc";

/// Settings the engine needs at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Network interface whose egress is shaped.
    pub interface: String,
    /// Shaping backend name, `tc` or `mock`.
    pub backend: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interface: DEFAULT_INTERFACE.to_owned(),
            backend: DEFAULT_BACKEND.to_owned(),
        }
    }
}

impl EngineConfig {
    /// Build a config from optional values, falling back to defaults for
    /// absent or empty ones.
    pub fn new(interface: Option<&str>, backend: Option<&str>) -> Self {
        let pick = |value: Option<&str>, default: &str| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
                .to_owned()
        };
        Self {
            interface: pick(interface, DEFAULT_INTERFACE),
            backend: pick(backend, DEFAULT_BACKEND),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.interface, "eth0");
        assert_eq!(config.backend, "tc");
    }

    #[test]
    fn empty_values_fall_back_to_defaults() {
        assert_eq!(EngineConfig::new(Some(""), Some("  ")), EngineConfig::default());
        assert_eq!(EngineConfig::new(None, None), EngineConfig::default());
    }

    #[test]
    fn explicit_values_win() {
        let config = EngineConfig::new(Some("ens5"), Some("mock"));
        assert_eq!(config.interface, "ens5");
        assert_eq!(config.backend, "mock");
    }
}
