//! Tas à deux demi-espaces avec collecteur à copie (`SPEC_FULL.md` §4.3, §9).
//!
//! Le format source adresse un buffer d'octets brut avec des en-têtes
//! d'objet et des pointeurs de transfert écrits en place. `unsafe_code`
//! étant interdit dans ce workspace, chaque demi-espace est ici un
//! `Vec<HeapObj>` : "allocation à pointeur de bump" devient `Vec::push`,
//! "pointeur de transfert" devient `HeapObj::Forwarded(Handle)`. Le contrat
//! observable (racines exactes, contenu préservé après copie, adresses
//! stables seulement pour la durée d'une instruction) est inchangé — voir
//! `DESIGN.md`.

use vitte_core::{ErrCode, Handle, Val};

use crate::objects::HeapObj;
use crate::scope::ScopeArena;

#[derive(Debug)]
pub struct Heap {
    active: Vec<HeapObj>,
    shadow: Vec<HeapObj>,
    capacity: usize,
    pub collections: u64,
}

impl Heap {
    pub fn with_capacity(capacity: usize) -> Self {
        Heap {
            active: Vec::with_capacity(capacity),
            shadow: Vec::with_capacity(capacity),
            capacity,
            collections: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn get(&self, h: Handle) -> &HeapObj {
        &self.active[h.raw() as usize]
    }

    pub fn get_mut(&mut self, h: Handle) -> &mut HeapObj {
        &mut self.active[h.raw() as usize]
    }

    /// Alloue un objet ; déclenche une collection si le demi-espace actif
    /// est plein, puis réessaie une fois.
    pub fn alloc(
        &mut self,
        obj: HeapObj,
        stack: &mut [Val],
        scopes: &mut ScopeArena,
    ) -> Result<Handle, ErrCode> {
        self.ensure_capacity(1, stack, scopes)?;
        let idx = self.active.len() as u32;
        self.active.push(obj);
        Ok(Handle::from_raw(idx))
    }

    /// Garantit qu'au moins `n` objets peuvent encore être alloués,
    /// collectant si besoin. À appeler *avant* de relire le contenu de la
    /// pile d'opérandes pour construire un objet composite (tableau,
    /// dictionnaire) : si on lisait les opérandes avant de s'assurer qu'il
    /// n'y aura pas de collecte, une collecte déclenchée par l'allocation
    /// elle-même rendrait les handles déjà recopiés périmés (§5, §9).
    pub fn ensure_capacity(
        &mut self,
        n: usize,
        stack: &mut [Val],
        scopes: &mut ScopeArena,
    ) -> Result<(), ErrCode> {
        if self.active.len() + n > self.capacity {
            self.collect(stack, scopes);
            if self.active.len() + n > self.capacity {
                return Err(ErrCode::NotEnoughMemory);
            }
        }
        Ok(())
    }

    /// Collection complète à copie façon Cheney : bascule les demi-espaces,
    /// copie chaque racine puis balaie les objets copiés jusqu'à ce qu'il
    /// n'en reste plus à traiter (liste de travail implicite via l'indice
    /// `scan` progressant dans le nouvel espace actif).
    pub fn collect(&mut self, stack: &mut [Val], scopes: &mut ScopeArena) {
        let before = self.active.len();
        let mut source = std::mem::take(&mut self.active);
        let mut target: Vec<HeapObj> = Vec::with_capacity(self.capacity);

        for v in stack.iter_mut() {
            forward_val(&mut source, &mut target, v);
        }
        for v in scopes.roots_mut() {
            forward_val(&mut source, &mut target, v);
        }

        let mut scan = 0usize;
        while scan < target.len() {
            let mut obj = std::mem::replace(&mut target[scan], HeapObj::Forwarded(Handle::from_raw(0)));
            match &mut obj {
                HeapObj::Array(arr) => {
                    for v in arr.0.iter_mut() {
                        forward_val(&mut source, &mut target, v);
                    }
                }
                HeapObj::Dict(d) => {
                    for (_, v) in d.0.iter_mut() {
                        forward_val(&mut source, &mut target, v);
                    }
                }
                HeapObj::Str(_) | HeapObj::Script(_) | HeapObj::Forwarded(_) => {}
            }
            target[scan] = obj;
            scan += 1;
        }

        self.collections += 1;
        let after = target.len();
        source.clear();
        self.shadow = source;
        self.active = target;

        #[cfg(feature = "tracing")]
        tracing::info!(
            target: "vitte_vm::heap",
            before_objects = before,
            after_objects = after,
            collections = self.collections,
            "gc.collect"
        );
        #[cfg(not(feature = "tracing"))]
        let _ = (before, after);
    }
}

fn forward(source: &mut [HeapObj], target: &mut Vec<HeapObj>, h: Handle) -> Handle {
    let idx = h.raw() as usize;
    if let HeapObj::Forwarded(new_h) = &source[idx] {
        return *new_h;
    }
    let obj = std::mem::replace(&mut source[idx], HeapObj::Forwarded(Handle::from_raw(0)));
    let new_idx = target.len() as u32;
    target.push(obj);
    source[idx] = HeapObj::Forwarded(Handle::from_raw(new_idx));
    Handle::from_raw(new_idx)
}

fn forward_val(source: &mut [HeapObj], target: &mut Vec<HeapObj>, v: &mut Val) {
    let new_handle = match v {
        Val::Str(h) | Val::Array(h) | Val::Dict(h) | Val::Script(h) => Some(forward(source, target, *h)),
        _ => None,
    };
    if let Some(new_handle) = new_handle {
        match v {
            Val::Str(h) | Val::Array(h) | Val::Dict(h) | Val::Script(h) => *h = new_handle,
            _ => unreachable!(),
        }
    }
}
