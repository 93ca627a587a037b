//! Objets boxés vivant sur le tas (`SPEC_FULL.md` §4.4).

use vitte_core::{Handle, Val};

/// Chaîne de caractères (octets) allouée sur le tas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringObj(pub String);

impl StringObj {
    pub fn concat(a: &str, b: &str) -> StringObj {
        let mut s = String::with_capacity(a.len() + b.len());
        s.push_str(a);
        s.push_str(b);
        StringObj(s)
    }
}

/// Tableau à accès indexé.
#[derive(Debug, Clone, Default)]
pub struct ArrayObj(pub Vec<Val>);

impl ArrayObj {
    pub fn get(&self, index: i64) -> Val {
        if index < 0 {
            return Val::Undefined;
        }
        self.0.get(index as usize).copied().unwrap_or(Val::Undefined)
    }

    /// Écriture hors limites : no-op, comme spécifié en §4.1.4.
    pub fn set(&mut self, index: i64, v: Val) {
        if index < 0 {
            return;
        }
        let idx = index as usize;
        if idx < self.0.len() {
            self.0[idx] = v;
        }
        // Hors limites : aucune extension automatique (no-op).
    }
}

/// Dictionnaire ordonné à recherche linéaire (hypothèse de petites maps,
/// §4.4).
#[derive(Debug, Clone, Default)]
pub struct DictObj(pub Vec<(Handle, Val)>);

impl DictObj {
    pub fn get(&self, key: Handle) -> Val {
        self.0
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
            .unwrap_or(Val::Undefined)
    }

    pub fn set(&mut self, key: Handle, v: Val) {
        if let Some(entry) = self.0.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = v;
        } else {
            self.0.push((key, v));
        }
    }
}

/// Fermeture : point d'entrée dans le segment de code + scope capturé.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptObj {
    pub entry_pc: u32,
    pub captured_scope: Option<u32>,
    /// Nombre de paramètres positionnels.
    pub arity: u8,
    /// Taille totale du scope de l'appel (paramètres + locales).
    pub nslots: u8,
}

/// Un objet du tas, ou un renvoi vers sa copie dans l'autre demi-espace.
///
/// C'est l'équivalent sûr de l'en-tête + pointeur de transfert du tas brut
/// de la spécification : comme `unsafe_code` est interdit, chaque demi-espace
/// est un `Vec<HeapObj>` plutôt qu'un buffer d'octets (voir `DESIGN.md`).
#[derive(Debug, Clone)]
pub enum HeapObj {
    Str(StringObj),
    Array(ArrayObj),
    Dict(DictObj),
    Script(ScriptObj),
    /// Déjà copié vers le nouvel espace lors d'un GC ; pointe vers le handle final.
    Forwarded(Handle),
}

impl HeapObj {
    pub fn approx_size(&self) -> usize {
        match self {
            HeapObj::Str(s) => s.0.len() + 8,
            HeapObj::Array(a) => a.0.len() * 16 + 8,
            HeapObj::Dict(d) => d.0.len() * 24 + 8,
            HeapObj::Script(_) => 16,
            HeapObj::Forwarded(_) => 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_out_of_range_read_is_undefined() {
        let a = ArrayObj(vec![Val::Number(1.0)]);
        assert_eq!(a.get(5), Val::Undefined);
        assert_eq!(a.get(-1), Val::Undefined);
    }

    #[test]
    fn array_out_of_range_write_is_noop() {
        let mut a = ArrayObj(vec![Val::Number(1.0)]);
        a.set(5, Val::Number(9.0));
        assert_eq!(a.0, vec![Val::Number(1.0)]);
    }

    #[test]
    fn dict_set_then_get() {
        let mut d = DictObj::default();
        let k = Handle::from_raw(1);
        assert_eq!(d.get(k), Val::Undefined);
        d.set(k, Val::Number(3.0));
        assert_eq!(d.get(k), Val::Number(3.0));
        d.set(k, Val::Number(4.0));
        assert_eq!(d.get(k), Val::Number(4.0));
        assert_eq!(d.0.len(), 1);
    }

    #[test]
    fn string_concat() {
        let s = StringObj::concat("foo", "bar");
        assert_eq!(s.0, "foobar");
    }
}
