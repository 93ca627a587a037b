//! vitte-vm — environnement d'exécution du moteur Vitte
//!
//! Contient le tas à deux demi-espaces avec collecteur à copie, la chaîne de
//! scopes générationnelle, le contexte d'exécution (`Env`) et la boucle
//! d'interprétation fetch-décode-dispatch sur `vitte_core::OpCode`. Dépend de
//! `vitte-core` pour la représentation des valeurs, le catalogue d'opcodes et
//! le format exécutable ; ne contient aucun analyseur ni compilateur (voir
//! `host::Compiler`).
//!
//! ## Modules
//! - `config` : `EnvConfig`, capacités du tas/pile/frames, limite de gaz.
//! - `objects` : objets boxés du tas (`StringObj`, `ArrayObj`, `DictObj`,
//!   `ScriptObj`) et `HeapObj`.
//! - `scope` : `ScopeArena`, scopes versionnés par génération.
//! - `heap` : `Heap`, collecteur à copie à deux demi-espaces.
//! - `env` : `Env`, contexte d'exécution complet.
//! - `interp` : boucle d'interprétation (`run`).
//! - `host` : API hôte (`execute_string`, `execute_image`,
//!   `execute_interactive`, `execute_call`) et le seam `Compiler`.
//!
//! ## Features
//! - **std** *(par défaut)* : active `std` sur `vitte-core`.
//! - **tracing** : journalise les collectes et les erreurs latchées.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms, unused_must_use)]

pub mod config;
pub mod env;
pub mod heap;
pub mod host;
pub mod interp;
pub mod objects;
pub mod scope;

pub use config::EnvConfig;
pub use env::{Env, NativeFn};
pub use heap::Heap;
pub use host::{execute_call, execute_image, execute_interactive, execute_string, Compiler, CompileUnit, EnvMode, Status};
pub use interp::run;
pub use objects::{ArrayObj, DictObj, HeapObj, ScriptObj, StringObj};
pub use scope::{Scope, ScopeArena};

pub use vitte_core::{ErrCode, Executable, Handle, OpCode, Val, VarRef};

/// Version du crate (lisible, via Cargo).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn version() -> String {
    format!("vitte-vm {VERSION}")
}

pub mod prelude {
    pub use crate::{
        config::EnvConfig,
        env::Env,
        host::{execute_call, execute_image, execute_interactive, execute_string, Compiler, EnvMode, Status},
        interp::run,
    };
    pub use vitte_core::{ErrCode, Executable, Handle, OpCode, Val, VarRef};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_contains_crate_name() {
        assert!(version().starts_with("vitte-vm"));
    }
}
