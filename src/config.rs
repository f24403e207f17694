// Mon Aug 03 2026 - Alex

use crate::backend::ModuleLocator;
use serde::{Deserialize, Serialize};

/// Which dispatch arrangement the engine runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TopologyKind {
    SharedQueue,
    Pipeline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub module: ModuleLocator,
    pub worker_count: usize,
    pub topology: TopologyKind,
    pub bootstrap_runtime: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            module: ModuleLocator::Builtin,
            worker_count: num_cpus::get(),
            topology: TopologyKind::SharedQueue,
            bootstrap_runtime: true,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, module: ModuleLocator) -> Self {
        self.module = module;
        self
    }

    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn with_topology(mut self, topology: TopologyKind) -> Self {
        self.topology = topology;
        self
    }

    pub fn with_bootstrap_runtime(mut self, bootstrap: bool) -> Self {
        self.bootstrap_runtime = bootstrap;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.worker_count >= 1);
        assert_eq!(config.topology, TopologyKind::SharedQueue);
        assert!(config.bootstrap_runtime);
        assert!(matches!(config.module, ModuleLocator::Builtin));
    }

    #[test]
    fn test_builders() {
        let config = EngineConfig::new()
            .with_worker_count(3)
            .with_topology(TopologyKind::Pipeline)
            .with_bootstrap_runtime(false)
            .with_module(ModuleLocator::Inline {
                name: "ops".to_string(),
                source: "upper".to_string(),
            });

        assert_eq!(config.worker_count, 3);
        assert_eq!(config.topology, TopologyKind::Pipeline);
        assert!(!config.bootstrap_runtime);
    }

    #[test]
    fn test_serde_round_trip() {
        let config = EngineConfig::new()
            .with_worker_count(2)
            .with_topology(TopologyKind::Pipeline);

        let json = serde_json::to_string(&config).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.worker_count, 2);
        assert_eq!(back.topology, TopologyKind::Pipeline);
    }
}
