use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub lookahead: LookaheadConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub generate: GenerateConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lookahead: LookaheadConfig::default(),
            input: InputConfig::default(),
            generate: GenerateConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LookaheadConfig {
    /// Target sample count handed to each tile type's sampler.
    #[serde(default = "default_samples_per_region")]
    pub samples_per_region: usize,
    #[serde(default = "default_max_explore_dist")]
    pub max_explore_dist: i32,
    #[serde(default = "default_max_explore_depth")]
    pub max_explore_depth: u32,
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub rebuild: bool,
    #[serde(default = "default_write_cache")]
    pub write_cache: bool,
    #[serde(default)]
    pub csv_dump: Option<String>,
}

impl Default for LookaheadConfig {
    fn default() -> Self {
        Self {
            samples_per_region: default_samples_per_region(),
            max_explore_dist: default_max_explore_dist(),
            max_explore_depth: default_max_explore_depth(),
            parallel: default_parallel(),
            seed: default_seed(),
            rebuild: false,
            write_cache: default_write_cache(),
            csv_dump: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct InputConfig {
    #[serde(default = "default_device_file")]
    pub device_file: String,
    #[serde(default = "default_lookahead_cache")]
    pub lookahead_cache: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            device_file: default_device_file(),
            lookahead_cache: default_lookahead_cache(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GenerateConfig {
    #[serde(default = "default_grid_dim")]
    pub width: i32,
    #[serde(default = "default_grid_dim")]
    pub height: i32,
    #[serde(default = "default_pip_delay")]
    pub pip_delay: u32,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            width: default_grid_dim(),
            height: default_grid_dim(),
            pip_delay: default_pip_delay(),
        }
    }
}

fn default_samples_per_region() -> usize {
    4
}

fn default_max_explore_dist() -> i32 {
    20
}

fn default_max_explore_depth() -> u32 {
    30
}

fn default_parallel() -> bool {
    true
}

fn default_seed() -> u64 {
    1
}

fn default_write_cache() -> bool {
    true
}

fn default_device_file() -> String {
    "inputs/device.bin".to_string()
}

fn default_lookahead_cache() -> String {
    "output/device.lookahead".to_string()
}

fn default_grid_dim() -> i32 {
    5
}

fn default_pip_delay() -> u32 {
    1
}
