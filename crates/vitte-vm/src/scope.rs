//! Chaîne de scopes et compteurs de génération (`SPEC_FULL.md` §3.2, §3.3).

use vitte_core::Val;

/// Une activation : un tableau plat de slots de variables, plus un lien vers
/// le scope parent et un numéro de génération bumpé à chaque libération.
#[derive(Debug, Clone)]
pub struct Scope {
    pub slots: Vec<Val>,
    pub parent: Option<u32>,
    pub generation: u8,
    /// `false` une fois le scope relâché ; le slot d'index est alors
    /// réutilisable par un futur scope avec une génération différente.
    pub live: bool,
}

impl Scope {
    fn new(parent: Option<u32>, nslots: usize) -> Self {
        Scope {
            slots: vec![Val::Undefined; nslots],
            parent,
            generation: 0,
            live: true,
        }
    }
}

/// Arène de scopes indexée par position. Les scopes libérés restent en
/// place (génération bumpée) jusqu'à réutilisation, afin que les
/// `Reference` pendants échouent proprement plutôt que de pointer dans le
/// vide.
#[derive(Debug, Default)]
pub struct ScopeArena {
    scopes: Vec<Scope>,
    free_list: Vec<u32>,
}

impl ScopeArena {
    pub fn new() -> Self {
        ScopeArena::default()
    }

    /// Crée un nouveau scope enfant de `parent`, retourne son index et la
    /// génération courante (à poser dans les `VarRef` émis par `PushRef`).
    pub fn push_scope(&mut self, parent: Option<u32>, nslots: usize) -> (u32, u8) {
        if let Some(idx) = self.free_list.pop() {
            let scope = &mut self.scopes[idx as usize];
            scope.slots = vec![Val::Undefined; nslots];
            scope.parent = parent;
            scope.live = true;
            return (idx, scope.generation);
        }
        let idx = self.scopes.len() as u32;
        self.scopes.push(Scope::new(parent, nslots));
        (idx, 0)
    }

    /// Relâche un scope : bump sa génération (invalide les références
    /// pendantes) et le renvoie au free-list.
    pub fn pop_scope(&mut self, idx: u32) {
        let scope = &mut self.scopes[idx as usize];
        scope.live = false;
        scope.generation = scope.generation.wrapping_add(1);
        scope.slots.clear();
        self.free_list.push(idx);
    }

    pub fn get(&self, idx: u32) -> &Scope {
        &self.scopes[idx as usize]
    }

    pub fn get_mut(&mut self, idx: u32) -> &mut Scope {
        &mut self.scopes[idx as usize]
    }

    /// Résout `(depth, slot)` en remontant `depth` liens parent depuis `from`.
    fn resolve_scope(&self, from: u32, depth: u8) -> Option<u32> {
        let mut cur = from;
        for _ in 0..depth {
            cur = self.scopes[cur as usize].parent?;
        }
        Some(cur)
    }

    /// Lecture d'une variable en vérifiant la génération (§3.3). `None` si le
    /// scope a été relâché et réutilisé depuis l'émission de la référence.
    pub fn get_var(&self, from: u32, depth: u8, slot: u8, generation: u8) -> Option<Val> {
        let target = self.resolve_scope(from, depth)?;
        let scope = &self.scopes[target as usize];
        if scope.generation != generation || !scope.live {
            return None;
        }
        scope.slots.get(slot as usize).copied()
    }

    pub fn set_var(
        &mut self,
        from: u32,
        depth: u8,
        slot: u8,
        generation: u8,
        value: Val,
    ) -> Option<()> {
        let target = self.resolve_scope(from, depth)?;
        let scope = &mut self.scopes[target as usize];
        if scope.generation != generation || !scope.live {
            return None;
        }
        let dst = scope.slots.get_mut(slot as usize)?;
        *dst = value;
        Some(())
    }

    /// Itère toutes les cellules de tous les scopes *vivants*, pour le
    /// balayage de racines du GC (§4.3).
    pub fn roots_mut(&mut self) -> impl Iterator<Item = &mut Val> {
        self.scopes
            .iter_mut()
            .filter(|s| s.live)
            .flat_map(|s| s.slots.iter_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_invalidated_after_scope_teardown() {
        let mut arena = ScopeArena::new();
        let (idx, gen) = arena.push_scope(None, 2);
        arena.set_var(idx, 0, 0, gen, Val::Number(5.0)).unwrap();
        assert_eq!(arena.get_var(idx, 0, 0, gen), Some(Val::Number(5.0)));

        arena.pop_scope(idx);
        // Same index reused: generation has moved on, old generation must fail.
        let (idx2, gen2) = arena.push_scope(None, 2);
        assert_eq!(idx2, idx);
        assert_ne!(gen2, gen);
        assert_eq!(arena.get_var(idx2, 0, 0, gen), None);
    }

    #[test]
    fn depth_resolves_through_parent_chain() {
        let mut arena = ScopeArena::new();
        let (outer, outer_gen) = arena.push_scope(None, 1);
        arena.set_var(outer, 0, 0, outer_gen, Val::Number(1.0)).unwrap();
        let (inner, _inner_gen) = arena.push_scope(Some(outer), 1);
        assert_eq!(
            arena.get_var(inner, 1, 0, outer_gen),
            Some(Val::Number(1.0))
        );
    }
}
