//! Configuration de l'environnement d'exécution (`SPEC_FULL.md` §1.1, §5).

/// Réglages d'un `Env` : tailles des tas/pile, limite d'appels, gaz.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvConfig {
    /// Taille (en nombre d'objets) de chacun des deux demi-espaces du tas.
    pub heap_capacity: usize,
    /// Profondeur maximale de la pile d'opérandes.
    pub stack_slots: usize,
    /// Nombre maximal de cadres d'appel imbriqués.
    pub max_frames: usize,
    /// Limite de pas d'interprétation avant `ErrCode::OutOfGas`. `None` = illimité.
    pub gas_limit: Option<u64>,
    /// Trace chaque opcode exécuté via `tracing` (coûteux, réservé au débogage).
    pub trace_opcodes: bool,
}

impl Default for EnvConfig {
    fn default() -> Self {
        EnvConfig {
            heap_capacity: 4096,
            stack_slots: 2048,
            max_frames: 256,
            gas_limit: None,
            trace_opcodes: false,
        }
    }
}

impl EnvConfig {
    /// Construit une config en lisant `VITTE_VM_HEAP_BYTES`, `VITTE_VM_STACK_SLOTS`,
    /// `VITTE_VM_MAX_FRAMES`, `VITTE_VM_GAS_LIMIT`, `VITTE_VM_TRACE`. Les
    /// variables absentes ou invalides retombent silencieusement sur la
    /// valeur par défaut du champ correspondant.
    pub fn from_env() -> Self {
        let mut cfg = EnvConfig::default();
        if let Some(v) = env_usize("VITTE_VM_HEAP_BYTES") {
            cfg.heap_capacity = v;
        }
        if let Some(v) = env_usize("VITTE_VM_STACK_SLOTS") {
            cfg.stack_slots = v;
        }
        if let Some(v) = env_usize("VITTE_VM_MAX_FRAMES") {
            cfg.max_frames = v;
        }
        if let Ok(raw) = std::env::var("VITTE_VM_GAS_LIMIT") {
            cfg.gas_limit = raw.parse::<u64>().ok();
        }
        if let Ok(raw) = std::env::var("VITTE_VM_TRACE") {
            cfg.trace_opcodes = raw == "1";
        }
        cfg
    }

    pub fn with_heap_capacity(mut self, n: usize) -> Self {
        self.heap_capacity = n;
        self
    }

    pub fn with_stack_slots(mut self, n: usize) -> Self {
        self.stack_slots = n;
        self
    }

    pub fn with_gas_limit(mut self, n: u64) -> Self {
        self.gas_limit = Some(n);
        self
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
