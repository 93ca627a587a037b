//! Contexte d'exécution : pile d'opérandes, cadres d'appel, scopes, tas,
//! exécutable et état d'erreur latché (`SPEC_FULL.md` §3.2, §4.2).

use vitte_core::{ErrCode, Executable, Handle, Val, VarRef};

use crate::config::EnvConfig;
use crate::heap::Heap;
use crate::objects::{ArrayObj, DictObj, HeapObj, ScriptObj, StringObj};
use crate::scope::ScopeArena;

/// Signature d'une fonction native enregistrée côté hôte. Reçoit l'`Env`,
/// le nombre d'arguments et l'indice de pile du premier argument ; renvoie
/// la valeur de résultat (écrite par l'appelant à la place de l'appelé).
pub type NativeFn = Box<dyn FnMut(&mut Env, u8, usize) -> Result<Val, ErrCode>>;

#[derive(Debug, Clone, Copy)]
struct CallFrame {
    return_pc: u32,
    caller_scope: u32,
    fp: usize,
}

pub struct Env {
    pub(crate) stack: Vec<Val>,
    frames: Vec<CallFrame>,
    pub(crate) scopes: ScopeArena,
    current_scope: u32,
    pub(crate) heap: Heap,
    pub exec: Executable,
    pub error: Option<ErrCode>,
    pub config: EnvConfig,
    fp: usize,
    natives: Vec<NativeFn>,
    steps: u64,
}

impl Env {
    pub fn new(exec: Executable, config: EnvConfig) -> Self {
        let mut scopes = ScopeArena::new();
        let (root_scope, _gen) = scopes.push_scope(None, 64);
        Env {
            stack: Vec::with_capacity(config.stack_slots),
            frames: Vec::with_capacity(config.max_frames),
            scopes,
            current_scope: root_scope,
            heap: Heap::with_capacity(config.heap_capacity),
            exec,
            error: None,
            config,
            fp: 0,
            natives: Vec::new(),
            steps: 0,
        }
    }

    pub fn register_native(&mut self, f: NativeFn) -> u16 {
        self.natives.push(f);
        (self.natives.len() - 1) as u16
    }

    // ---- pile d'opérandes ----

    pub fn push(&mut self, v: Val) {
        self.stack.push(v);
    }

    pub fn pop(&mut self) -> Val {
        self.stack.pop().expect("operand stack underflow")
    }

    /// Lit sans dépiler la cellule à `depth` du sommet (`0` = sommet).
    pub fn peek(&self, depth: usize) -> Val {
        self.stack[self.stack.len() - 1 - depth]
    }

    pub fn peek_mut(&mut self, depth: usize) -> &mut Val {
        let len = self.stack.len();
        &mut self.stack[len - 1 - depth]
    }

    /// Lit l'argument `i` d'un appel natif par indice de pile absolu.
    /// `argv_base` est la valeur reçue par la fermeture enregistrée via
    /// [`Env::register_native`] (troisième paramètre de [`NativeFn`]) ; elle
    /// reste valide même si le corps natif pousse ou dépile ses propres
    /// valeurs scratch entre-temps, contrairement à un `peek(depth)` relatif
    /// au sommet (§4.1.6).
    pub fn arg(&self, argv_base: usize, i: usize) -> Val {
        self.stack[argv_base + i]
    }

    /// Réduit la pile de `n` cellules sans toucher à la cellule qui devient
    /// le nouveau sommet (idiome "écrase le résultat par-dessus l'opérande
    /// consommé", §4.2).
    pub fn stack_release(&mut self, n: usize) {
        let new_len = self.stack.len() - n;
        self.stack.truncate(new_len);
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    // ---- erreurs ----

    /// Latche la première erreur seulement ; les suivantes sont ignorées.
    pub fn set_error(&mut self, code: ErrCode) {
        if self.error.is_none() {
            #[cfg(feature = "tracing")]
            tracing::warn!(target: "vitte_vm::env", ?code, "error latched");
            self.error = Some(code);
        }
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    // ---- variables ----

    pub fn get_var(&self, r: VarRef) -> Option<Val> {
        self.scopes
            .get_var(self.current_scope, r.depth, r.slot, r.generation)
    }

    pub fn set_var(&mut self, r: VarRef, v: Val) -> Option<()> {
        self.scopes
            .set_var(self.current_scope, r.depth, r.slot, r.generation, v)
    }

    pub fn current_scope(&self) -> u32 {
        self.current_scope
    }

    // ---- cadres d'appel ----

    /// Pousse un cadre et entre dans un nouveau scope pour un appel de
    /// script. `args` sont copiés dans les premiers slots de paramètres
    /// (les arguments manquants valent `Undefined`, les excédentaires sont
    /// ignorés, §4.1.5).
    pub fn frame_setup(
        &mut self,
        script: ScriptObj,
        args: &[Val],
        return_pc: u32,
    ) -> Result<u32, ErrCode> {
        if self.frames.len() >= self.config.max_frames {
            return Err(ErrCode::SysError);
        }
        let (new_scope, _gen) = self
            .scopes
            .push_scope(script.captured_scope, script.nslots as usize);
        {
            let scope = self.scopes.get_mut(new_scope);
            let n = (script.arity as usize).min(args.len()).min(scope.slots.len());
            scope.slots[..n].copy_from_slice(&args[..n]);
        }
        self.frames.push(CallFrame {
            return_pc,
            caller_scope: self.current_scope,
            fp: self.fp,
        });
        self.current_scope = new_scope;
        self.fp = self.stack.len();
        Ok(script.entry_pc)
    }

    /// Dépile le cadre courant, relâche son scope (bump de génération) et
    /// restaure l'appelant. Renvoie le `pc` de retour.
    pub fn frame_restore(&mut self) -> u32 {
        let abandoned = self.current_scope;
        let frame = self.frames.pop().expect("return with no active call frame");
        self.scopes.pop_scope(abandoned);
        self.current_scope = frame.caller_scope;
        self.fp = frame.fp;
        frame.return_pc
    }

    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    // ---- natives ----

    pub fn call_native(&mut self, idx: u16, argc: u8, argv_base: usize) -> Result<Val, ErrCode> {
        let mut f = std::mem::replace(
            self.natives
                .get_mut(idx as usize)
                .ok_or(ErrCode::InvalidCallor)?,
            Box::new(|_, _, _| Err(ErrCode::SysError)),
        );
        let result = f(self, argc, argv_base);
        if let Some(slot) = self.natives.get_mut(idx as usize) {
            *slot = f;
        } else {
            self.natives.push(f);
        }
        result
    }

    // ---- tas ----

    /// Force une collecte préventive si le tas n'a plus de place pour `n`
    /// objets. À appeler avant de recopier plusieurs valeurs de la pile dans
    /// un agrégat temporaire non raciné (littéraux tableau/dictionnaire,
    /// §5, §9) : une fois cet appel passé, l'allocation qui suivra est
    /// garantie de ne plus déclencher de collecte elle-même.
    pub fn ensure_heap_capacity(&mut self, n: usize) -> Result<(), ErrCode> {
        self.heap.ensure_capacity(n, &mut self.stack, &mut self.scopes)
    }

    pub fn alloc_string(&mut self, s: String) -> Result<Val, ErrCode> {
        let h = self
            .heap
            .alloc(HeapObj::Str(StringObj(s)), &mut self.stack, &mut self.scopes)?;
        Ok(Val::Str(h))
    }

    pub fn alloc_array(&mut self, items: Vec<Val>) -> Result<Val, ErrCode> {
        let h = self.heap.alloc(
            HeapObj::Array(ArrayObj(items)),
            &mut self.stack,
            &mut self.scopes,
        )?;
        Ok(Val::Array(h))
    }

    pub fn alloc_dict(&mut self, entries: Vec<(Handle, Val)>) -> Result<Val, ErrCode> {
        let h = self.heap.alloc(
            HeapObj::Dict(DictObj(entries)),
            &mut self.stack,
            &mut self.scopes,
        )?;
        Ok(Val::Dict(h))
    }

    pub fn alloc_script(&mut self, script: ScriptObj) -> Result<Val, ErrCode> {
        let h = self
            .heap
            .alloc(HeapObj::Script(script), &mut self.stack, &mut self.scopes)?;
        Ok(Val::Script(h))
    }

    pub fn string_contents(&self, h: Handle) -> &str {
        match self.heap.get(h) {
            HeapObj::Str(s) => &s.0,
            _ => "",
        }
    }

    pub fn heap_len(&self) -> usize {
        self.heap.len()
    }

    // ---- comparaisons dépendant du contenu (les chaînes vivent sur le tas) ----

    /// Égalité complète au sens `BC_TEQ` : délègue à `Val::eq` pour tout sauf
    /// les chaînes, comparées par contenu (§4.1.2).
    pub fn values_equal(&self, a: Val, b: Val) -> bool {
        match (a, b) {
            (Val::Str(ha), Val::Str(hb)) => self.string_contents(ha) == self.string_contents(hb),
            _ => a == b,
        }
    }

    pub fn truthy(&self, v: Val) -> bool {
        match v {
            Val::Str(h) => !self.string_contents(h).is_empty(),
            other => !other.is_falsy_scalar(),
        }
    }

    // ---- gaz ----

    /// Consomme un pas d'exécution ; latche `OutOfGas` si la limite est
    /// atteinte. Renvoie `true` si l'exécution peut continuer.
    pub fn tick(&mut self) -> bool {
        self.steps += 1;
        if let Some(limit) = self.config.gas_limit {
            if self.steps > limit {
                self.set_error(ErrCode::OutOfGas);
                return false;
            }
        }
        true
    }
}
