//! Backend construction from configuration strings.
//!
//! A configuration is `name[:params]`. The built-in backends are
//! `interpreter`, `cpu` and `hybrid`. Hybrid params are comma-separated
//! sub-backend configurations, optionally followed by
//! `;policy=first-capable` or `;policy=round-robin`:
//!
//! ```text
//! hybrid:cpu,interpreter;policy=round-robin
//! ```
//!
//! A sub-backend configuration containing commas or semicolons is put in
//! brackets: `hybrid:cpu,[hybrid:interpreter,cpu;policy=round-robin]`.
use std::str::FromStr;

use crate::cpu::CpuBackend;
use crate::hybrid::HybridBackend;
use crate::internal::*;
use crate::interpreter::InterpreterBackend;
use crate::placement::{FirstCapable, RoundRobin};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version of the runtime, for loaders checking backend compatibility.
pub fn version() -> &'static str {
    VERSION
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackendConfig {
    pub name: String,
    pub params: Option<String>,
}

impl FromStr for BackendConfig {
    type Err = TesselError;

    fn from_str(s: &str) -> TesselResult<BackendConfig> {
        let (name, params) = match s.split_once(':') {
            Some((name, params)) => (name, Some(params.trim().to_string())),
            None => (s, None),
        };
        let name = name.trim();
        ensure!(!name.is_empty(), "Empty backend name in configuration \"{}\"", s);
        Ok(BackendConfig { name: name.to_string(), params: params.filter(|p| !p.is_empty()) })
    }
}

pub type BackendConstructor =
    Arc<dyn Fn(&BackendRegistry, Option<&str>) -> TesselResult<Box<dyn Backend>> + Send + Sync>;

/// Maps backend names to constructors.
#[derive(Clone)]
pub struct BackendRegistry {
    constructors: HashMap<String, BackendConstructor>,
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "BackendRegistry({})", self.names().join(", "))
    }
}

impl Default for BackendRegistry {
    fn default() -> BackendRegistry {
        let mut registry = BackendRegistry::empty();
        registry.register("interpreter", |_, params| {
            no_params("interpreter", params)?;
            Ok(Box::new(InterpreterBackend))
        });
        registry.register("cpu", |_, params| {
            no_params("cpu", params)?;
            Ok(Box::new(CpuBackend))
        });
        registry.register("hybrid", hybrid);
        registry
    }
}

impl BackendRegistry {
    pub fn empty() -> BackendRegistry {
        BackendRegistry { constructors: HashMap::new() }
    }

    /// Adds or replaces a backend constructor.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        constructor: impl Fn(&BackendRegistry, Option<&str>) -> TesselResult<Box<dyn Backend>>
        + Send
        + Sync
        + 'static,
    ) {
        self.constructors.insert(name.into(), Arc::new(constructor));
    }

    pub fn names(&self) -> Vec<String> {
        self.constructors.keys().cloned().sorted().collect()
    }

    pub fn create(&self, config: &str) -> TesselResult<Box<dyn Backend>> {
        let config: BackendConfig = config.parse()?;
        let Some(constructor) = self.constructors.get(&config.name) else {
            return Err(UnknownBackendError::new(config.name, self.names()).into());
        };
        let backend = constructor(self, config.params.as_deref())
            .with_context(|| format!("Constructing backend {}", config.name))?;
        info!("Constructed backend {}", backend.name());
        Ok(backend)
    }
}

fn no_params(name: &str, params: Option<&str>) -> TesselResult<()> {
    if let Some(params) = params {
        bail!("Backend {} takes no parameters, got \"{}\"", name, params);
    }
    Ok(())
}

fn hybrid(registry: &BackendRegistry, params: Option<&str>) -> TesselResult<Box<dyn Backend>> {
    let params = params.unwrap_or("");
    let mut sections = split_top_level(params, ';')?.into_iter();
    let subs = sections.next().unwrap_or("").trim();
    let subs = if subs.is_empty() { "cpu,interpreter" } else { subs };
    let backends = split_top_level(subs, ',')?
        .into_iter()
        .map(|sub| registry.create(unbracket(sub)))
        .collect::<TesselResult<Vec<_>>>()?;
    let mut backend = HybridBackend::new(backends)?;
    for option in sections.map(str::trim).filter(|o| !o.is_empty()) {
        backend = match option.split_once('=').map(|(k, v)| (k.trim(), v.trim())) {
            Some(("policy", "first-capable")) => backend.with_policy(FirstCapable),
            Some(("policy", "round-robin")) => backend.with_policy(RoundRobin),
            _ => bail!("Invalid hybrid option \"{}\"", option),
        };
    }
    Ok(Box::new(backend))
}

/// Splits on `separator`, except inside brackets.
fn split_top_level(s: &str, separator: char) -> TesselResult<Vec<&str>> {
    let mut parts = vec![];
    let mut depth = 0usize;
    let mut start = 0;
    for (ix, c) in s.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth = depth.checked_sub(1).with_context(|| format!("Unbalanced ']' in \"{s}\""))?
            }
            c if c == separator && depth == 0 => {
                parts.push(&s[start..ix]);
                start = ix + c.len_utf8();
            }
            _ => (),
        }
    }
    ensure!(depth == 0, "Unbalanced '[' in \"{}\"", s);
    parts.push(&s[start..]);
    Ok(parts)
}

fn unbracket(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix('[').and_then(|s| s.strip_suffix(']')).unwrap_or(s)
}

lazy_static::lazy_static! {
    static ref DEFAULT_REGISTRY: BackendRegistry = BackendRegistry::default();
}

/// The process-wide registry of built-in backends.
pub fn default_registry() -> &'static BackendRegistry {
    &DEFAULT_REGISTRY
}

/// Constructs a backend from a configuration string, using the default
/// registry. Ownership goes to the caller.
pub fn new_backend(config: &str) -> TesselResult<Box<dyn Backend>> {
    default_registry().create(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_config() {
        let c: BackendConfig = "hybrid: cpu,interpreter".parse().unwrap();
        assert_eq!(c.name, "hybrid");
        assert_eq!(c.params.as_deref(), Some("cpu,interpreter"));
        let c: BackendConfig = " cpu ".parse().unwrap();
        assert_eq!(c, BackendConfig { name: "cpu".into(), params: None });
        assert!("".parse::<BackendConfig>().is_err());
        assert!(":x".parse::<BackendConfig>().is_err());
    }

    #[test]
    fn builtins() -> TesselResult<()> {
        crate::setup_test_logger();
        assert_eq!(default_registry().names(), vec!["cpu", "hybrid", "interpreter"]);
        assert_eq!(new_backend("cpu")?.name(), "cpu");
        assert_eq!(new_backend("interpreter")?.name(), "interpreter");
        assert_eq!(new_backend("hybrid")?.name(), "hybrid:cpu,interpreter");
        assert_eq!(new_backend("hybrid:interpreter")?.name(), "hybrid:interpreter");
        assert_eq!(new_backend("hybrid:cpu,hybrid")?.name(), "hybrid:cpu,hybrid:cpu,interpreter");
        Ok(())
    }

    #[test]
    fn hybrid_options() {
        assert!(new_backend("hybrid:cpu,interpreter;policy=round-robin").is_ok());
        assert!(new_backend("hybrid:;policy=first-capable").is_ok());
        assert!(new_backend("hybrid:cpu;policy=random").is_err());
        assert!(new_backend("cpu:fast").is_err());
    }

    #[test]
    fn bracketed_sub_backends() -> TesselResult<()> {
        assert_eq!(
            new_backend("hybrid:cpu,[hybrid:interpreter,cpu]")?.name(),
            "hybrid:cpu,hybrid:interpreter,cpu"
        );
        assert_eq!(
            new_backend("hybrid:[hybrid:cpu;policy=round-robin],interpreter;policy=first-capable")?.name(),
            "hybrid:hybrid:cpu,interpreter"
        );
        assert!(new_backend("hybrid:cpu,[hybrid:interpreter").is_err());
        assert!(new_backend("hybrid:cpu],interpreter").is_err());
        Ok(())
    }

    #[test]
    fn unknown_backend() {
        let err = new_backend("gpu").unwrap_err();
        let err = err.downcast_ref::<UnknownBackendError>().unwrap();
        assert_eq!(err.name, "gpu");
        assert_eq!(err.known, vec!["cpu", "hybrid", "interpreter"]);
        let err = new_backend("hybrid:cpu,tpu").unwrap_err();
        assert_eq!(err.downcast_ref::<UnknownBackendError>().unwrap().name, "tpu");
    }

    #[test]
    fn custom_registry() -> TesselResult<()> {
        let mut registry = BackendRegistry::default();
        registry.register("fallback", |registry, _| registry.create("interpreter"));
        assert_eq!(registry.create("hybrid:cpu,fallback")?.name(), "hybrid:cpu,interpreter");
        assert!(BackendRegistry::empty().create("cpu").is_err());
        Ok(())
    }
}
