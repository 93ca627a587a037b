//! `Executable` : tables de constantes + segment de code (`SPEC_FULL.md` §3.4).
//!
//! Remplace le `Chunk`/`ConstPool` de l'enseignant par trois tables typées
//! séparées (nombres, chaînes, fonctions) au lieu d'un seul pool mixte, pour
//! coller à la disposition attendue par `interp.c` (`PUSH_NUM`/`PUSH_STR`/
//! `PUSH_SCRIPT` indexent chacun leur propre table).

use std::rc::Rc;

use ahash::AHashMap;

use crate::util::fnv1a64;

pub const EXEC_MAGIC: u32 = 0x5649_5443; // "VITC"
pub const EXEC_VERSION: u16 = 1;

/// Bytecode et tables de constantes d'une unité exécutable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Executable {
    pub numbers: Vec<f64>,
    pub strings: Vec<Rc<str>>,
    /// Décalage d'entrée (dans `code`) de chaque fonction/script.
    pub functions: Vec<u32>,
    pub code: Vec<u8>,
}

impl Executable {
    pub fn new() -> Self {
        Executable::default()
    }

    pub fn number_at(&self, idx: u16) -> Option<f64> {
        self.numbers.get(idx as usize).copied()
    }

    pub fn string_at(&self, idx: u16) -> Option<&Rc<str>> {
        self.strings.get(idx as usize)
    }

    pub fn function_entry(&self, idx: u16) -> Option<u32> {
        self.functions.get(idx as usize).copied()
    }

    /// Hachage d'intégrité de l'ensemble (utilisé par le format d'image, §6.2).
    pub fn compute_hash(&self) -> u64 {
        let mut buf = Vec::new();
        for n in &self.numbers {
            buf.extend_from_slice(&n.to_le_bytes());
        }
        for s in &self.strings {
            buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
            buf.extend_from_slice(s.as_bytes());
        }
        for f in &self.functions {
            buf.extend_from_slice(&f.to_le_bytes());
        }
        buf.extend_from_slice(&self.code);
        fnv1a64(&buf)
    }

    /// Désassemblage lisible, dans le style `Chunk::disassemble` de
    /// l'enseignant — utile pour déboguer les tests qui construisent du
    /// bytecode à la main.
    pub fn disassemble(&self, title: &str) -> String {
        use crate::opcode::OpCode;
        use std::fmt::Write as _;

        let mut out = String::new();
        let _ = writeln!(out, "== {title} ==");
        let mut pc = 0usize;
        while pc < self.code.len() {
            let byte = self.code[pc];
            match OpCode::from_byte(byte) {
                Some(op) => {
                    let len = op.encoded_len();
                    let _ = write!(out, "{pc:04} {op}");
                    if len > 1 && pc + len <= self.code.len() {
                        let _ = write!(out, " {:?}", &self.code[pc + 1..pc + len]);
                    }
                    let _ = writeln!(out);
                    pc += len;
                }
                None => {
                    let _ = writeln!(out, "{pc:04} <invalid byte {byte:#04x}>");
                    pc += 1;
                }
            }
        }
        out
    }
}

/// Assembleur de bytecode en mémoire, utilisé par les tests (aucun
/// compilateur n'est fourni par ce crate — voir `SPEC_FULL.md` §6.3).
#[derive(Debug, Default)]
pub struct ExecBuilder {
    exec: Executable,
    str_index: AHashMap<Rc<str>, u16>,
    num_index: AHashMap<u64, u16>,
}

impl ExecBuilder {
    pub fn new() -> Self {
        ExecBuilder::default()
    }

    pub fn intern_number(&mut self, n: f64) -> u16 {
        let key = n.to_bits();
        if let Some(&idx) = self.num_index.get(&key) {
            return idx;
        }
        let idx = self.exec.numbers.len() as u16;
        self.exec.numbers.push(n);
        self.num_index.insert(key, idx);
        idx
    }

    pub fn intern_str(&mut self, s: &str) -> u16 {
        if let Some(&idx) = self.str_index.get(s) {
            return idx;
        }
        let rc: Rc<str> = Rc::from(s);
        let idx = self.exec.strings.len() as u16;
        self.exec.strings.push(rc.clone());
        self.str_index.insert(rc, idx);
        idx
    }

    pub fn add_function(&mut self, entry_pc: u32) -> u16 {
        let idx = self.exec.functions.len() as u16;
        self.exec.functions.push(entry_pc);
        idx
    }

    /// Émet le petit prologue `(arity, nslots)` attendu par `PushScript`
    /// (deux octets bruts, pas un opcode) et enregistre la fonction.
    /// Renvoie son index dans la table des fonctions. Le code du corps doit
    /// être émis juste après cet appel.
    pub fn begin_function(&mut self, arity: u8, nslots: u8) -> u16 {
        let meta_offset = self.offset();
        self.emit_u8(arity);
        self.emit_u8(nslots);
        self.add_function(meta_offset)
    }

    pub fn offset(&self) -> u32 {
        self.exec.code.len() as u32
    }

    pub fn emit_u8(&mut self, byte: u8) -> &mut Self {
        self.exec.code.push(byte);
        self
    }

    pub fn emit_u16(&mut self, v: u16) -> &mut Self {
        self.exec.code.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn emit_i8(&mut self, v: i8) -> &mut Self {
        self.exec.code.push(v as u8);
        self
    }

    pub fn emit_i16(&mut self, v: i16) -> &mut Self {
        self.exec.code.extend_from_slice(&v.to_be_bytes());
        self
    }

    /// Patch un décalage s16 déjà émis (pour les sauts en avant dont la
    /// cible n'est connue qu'après coup).
    pub fn patch_i16(&mut self, at: u32, v: i16) {
        let at = at as usize;
        self.exec.code[at..at + 2].copy_from_slice(&v.to_be_bytes());
    }

    pub fn finish(self) -> Executable {
        self.exec
    }
}
