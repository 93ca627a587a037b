//! API hôte : les trois configurations de démarrage et les quatre points
//! d'entrée d'exécution (`SPEC_FULL.md` §6.3).
//!
//! Ce crate n'embarque aucun analyseur lexical/syntaxique/compilateur : le
//! trait `Compiler` est le point de greffe attendu par l'hôte qui en fournit
//! un. `execute_image` n'en a pas besoin puisque le bytecode est déjà chargé
//! dans `env.exec` au moment de la construction de l'`Env` (voir `image.rs`).

use vitte_core::{ErrCode, Val};

use crate::env::Env;
use crate::interp;

/// Une unité de compilation : bytecode prêt à être ajouté au segment de code
/// courant, plus l'éventuel décalage où reprendre l'exécution.
#[derive(Debug, Clone, Default)]
pub struct CompileUnit {
    pub code: Vec<u8>,
    /// `true` si la source s'arrête au milieu d'une construction (utile à
    /// `execute_interactive` pour savoir s'il faut demander une ligne de
    /// plus via `more_fn`).
    pub incomplete: bool,
}

/// Seam pour un analyseur/compilateur fourni par l'hôte ; ce crate n'en
/// fournit pas d'implémentation hors tests.
pub trait Compiler {
    /// Compile une unité logique (une instruction, en mode interactif).
    fn compile_one(&mut self, src: &str) -> Result<CompileUnit, ErrCode>;
    /// Compile la totalité de `src` (mode interprète batch).
    fn compile_all(&mut self, src: &str) -> Result<CompileUnit, ErrCode>;
}

/// Les trois façons de démarrer un `Env`, selon que le compilateur est
/// conservé après coup (REPL) ou jeté (batch), ou qu'il n'y en a pas du tout
/// (image déjà liée).
pub enum EnvMode {
    Interactive { compiler: Box<dyn Compiler> },
    Interpreter { compiler: Box<dyn Compiler> },
    Image,
}

/// Résultat d'un appel d'exécution côté hôte.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Status {
    /// Du bytecode a tourné jusqu'au bout sans laisser de valeur utile.
    Executed,
    /// Une valeur de résultat est disponible.
    Value,
    Error(ErrCode),
}

/// Compile puis exécute `src` en une fois (mode interprète batch). Le
/// compilateur de `mode` doit être `Interpreter` ou `Interactive` ; `Image`
/// est un `InvalidInput` ici (il n'y a pas de source à compiler).
pub fn execute_string(env: &mut Env, mode: &mut EnvMode, src: &str) -> (Val, Status) {
    let compiler = match mode {
        EnvMode::Interactive { compiler } | EnvMode::Interpreter { compiler } => compiler,
        EnvMode::Image => return (Val::Undefined, Status::Error(ErrCode::InvalidInput)),
    };
    let unit = match compiler.compile_all(src) {
        Ok(u) => u,
        Err(e) => return (Val::Undefined, Status::Error(e)),
    };
    run_unit(env, unit)
}

/// Exécute le bytecode déjà présent dans `env.exec` (chargé depuis une
/// image, `image::read_image`) à partir de l'entrée 0.
pub fn execute_image(env: &mut Env) -> (Val, Status) {
    if env.exec.code.is_empty() {
        return (Val::Undefined, Status::Error(ErrCode::InvalidInput));
    }
    match interp::run(env, 0) {
        Ok(v) => (v, Status::Value),
        Err(e) => (Val::Undefined, Status::Error(e)),
    }
}

/// Boucle REPL : compile `src` instruction par instruction ; si une unité
/// est incomplète, demande une ligne de plus via `more_fn` (`None` signifie
/// "plus d'entrée disponible", ce qui est alors une erreur `InvalidInput`).
pub fn execute_interactive(
    env: &mut Env,
    mode: &mut EnvMode,
    src: &str,
    mut more_fn: impl FnMut() -> Option<String>,
) -> (Val, Status) {
    let EnvMode::Interactive { compiler } = mode else {
        return (Val::Undefined, Status::Error(ErrCode::InvalidInput));
    };

    let mut buffer = src.to_string();
    loop {
        match compiler.compile_one(&buffer) {
            Ok(unit) if unit.incomplete => match more_fn() {
                Some(extra) => {
                    buffer.push('\n');
                    buffer.push_str(&extra);
                }
                None => return (Val::Undefined, Status::Error(ErrCode::InvalidInput)),
            },
            Ok(unit) => return run_unit(env, unit),
            Err(e) => return (Val::Undefined, Status::Error(e)),
        }
    }
}

/// Appelle une fonction déjà posée sur la pile avec ses `argc` arguments
/// (callee à `argc` de profondeur, arguments au-dessus) ; réentrant depuis
/// une fonction native (§9).
pub fn execute_call(env: &mut Env, argc: u8) -> Val {
    // `FuncCall` attend `argc` comme opérande u8 immédiatement après lui ;
    // on le synthétise dans un micro-segment de code jetable plutôt que de
    // dupliquer la logique de dispatch d'appel de `interp::run`.
    let call_site = env.exec.code.len();
    env.exec.code.push(vitte_core::OpCode::FuncCall as u8);
    env.exec.code.push(argc);
    env.exec.code.push(vitte_core::OpCode::Stop as u8);

    let result = interp::run(env, call_site);
    env.exec.code.truncate(call_site);
    result.unwrap_or(Val::Undefined)
}

fn run_unit(env: &mut Env, unit: CompileUnit) -> (Val, Status) {
    let entry = env.exec.code.len();
    env.exec.code.extend_from_slice(&unit.code);
    match interp::run(env, entry) {
        Ok(Val::Undefined) => (Val::Undefined, Status::Executed),
        Ok(v) => (v, Status::Value),
        Err(e) => (Val::Undefined, Status::Error(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvConfig;
    use vitte_core::{Executable, ExecBuilder, OpCode};

    /// Compilateur factice qui traite la source comme `"push <nombre>"` ou
    /// `"+"`, juste assez pour exercer `execute_string`/`execute_interactive`
    /// sans embarquer de vrai analyseur (hors périmètre, §6.3).
    struct StubCompiler;

    impl Compiler for StubCompiler {
        fn compile_one(&mut self, src: &str) -> Result<CompileUnit, ErrCode> {
            self.compile_all(src)
        }

        fn compile_all(&mut self, src: &str) -> Result<CompileUnit, ErrCode> {
            let src = src.trim();
            if src == "..." {
                return Ok(CompileUnit { code: Vec::new(), incomplete: true });
            }
            let mut b = ExecBuilder::new();
            if let Ok(n) = src.parse::<f64>() {
                let idx = b.intern_number(n);
                b.emit_u8(OpCode::PushNum as u8).emit_u16(idx);
                b.emit_u8(OpCode::Stop as u8);
                return Ok(CompileUnit { code: b.finish().code, incomplete: false });
            }
            Err(ErrCode::InvalidInput)
        }
    }

    fn env_with_mode() -> (Env, EnvMode) {
        let env = Env::new(Executable::default(), EnvConfig::default());
        let mode = EnvMode::Interpreter { compiler: Box::new(StubCompiler) };
        (env, mode)
    }

    #[test]
    fn execute_string_returns_value_status() {
        let (mut env, mut mode) = env_with_mode();
        let (v, status) = execute_string(&mut env, &mut mode, "42");
        assert_eq!(v, Val::Number(42.0));
        assert_eq!(status, Status::Value);
    }

    #[test]
    fn execute_image_rejects_empty_executable() {
        let mut env = Env::new(Executable::default(), EnvConfig::default());
        let (_, status) = execute_image(&mut env);
        assert_eq!(status, Status::Error(ErrCode::InvalidInput));
    }

    #[test]
    fn execute_interactive_requests_more_input() {
        let mut env = Env::new(Executable::default(), EnvConfig::default());
        let mut mode = EnvMode::Interactive { compiler: Box::new(StubCompiler) };
        let mut supplied = false;
        let (v, status) = execute_interactive(&mut env, &mut mode, "...", || {
            if supplied {
                None
            } else {
                supplied = true;
                Some("7".to_string())
            }
        });
        assert_eq!(status, Status::Value);
        assert_eq!(v, Val::Number(7.0));
    }

    #[test]
    fn execute_call_invokes_staged_script() {
        let mut b = ExecBuilder::new();
        // main: push script, push arg, call -- but we only need the function
        // body reachable; stage callee+arg directly on the stack instead.
        let func_entry = {
            b.emit_u8(OpCode::Stop as u8); // pc 0 unused, keeps offsets > 0
            let entry = b.offset();
            b.emit_u8(OpCode::PushVar as u8).emit_u8(0).emit_u8(0);
            b.emit_u8(OpCode::PushVar as u8).emit_u8(0).emit_u8(0);
            b.emit_u8(OpCode::Mul as u8);
            b.emit_u8(OpCode::Ret as u8);
            entry
        };
        let func_idx = b.add_function(func_entry);
        let exec = b.finish();
        let mut env = Env::new(exec, EnvConfig::default());

        let script = env
            .alloc_script(crate::objects::ScriptObj {
                entry_pc: func_entry,
                captured_scope: Some(env.current_scope()),
                arity: 1,
                nslots: 1,
            })
            .unwrap();
        let _ = func_idx;
        env.push(script);
        env.push(Val::Number(5.0));
        let result = execute_call(&mut env, 1);
        assert_eq!(result, Val::Number(25.0));
    }
}
