//! Format d'image persisté (`SPEC_FULL.md` §6.2).
//!
//! Préambule d'ordre d'octets, compteurs nombres/chaînes/fonctions, puis
//! trois tables (nombres en place, chaînes préfixées par longueur,
//! fonctions comme blobs de bytecode), suivi du segment de code et d'un CRC
//! de bout de fichier. Contrairement au `loader.rs` de l'enseignant, ce
//! module ne borrow jamais l'entrée : tout est recopié dans un `Executable`
//! possédé (pas de chemin "zero-copy" — voir `DESIGN.md`).
//!
//! `CursorLE`/`BufLE` ne savent parler qu'un format de fil fixe en
//! little-endian : il n'existe pas de second chemin de décodage. Le marqueur
//! d'ordre d'octets est donc vérifié, pas seulement stocké — toute image
//! marquée autrement qu'en little-endian est rejetée avec
//! `ImageError::BadByteOrder`, à l'image de `interp_env_init_image` qui
//! rejette tout `byte_order != SYS_BYTE_ORDER` plutôt que de réinterpréter.

use std::rc::Rc;

use thiserror::Error;

use crate::executable::Executable;
use crate::util::{crc32_ieee, BufLE, CursorLE};

const BYTE_ORDER_LE: u8 = 0;
// Only ever produced by `read_image`'s rejection path and exercised by
// tests; never written by `write_image`.
#[cfg_attr(not(test), allow(dead_code))]
const BYTE_ORDER_BE: u8 = 1;

pub const MAX_STR_LEN: u32 = 16 * 1024 * 1024;
pub const MAX_COUNT: u32 = 1 << 20;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageError {
    #[error("truncated image: {0}")]
    Truncated(String),
    #[error("unsupported byte order marker {0:#04x}")]
    BadByteOrder(u8),
    #[error("string length {0} exceeds limit")]
    StringTooLong(u32),
    #[error("table count {0} exceeds limit")]
    CountTooLarge(u32),
    #[error("crc mismatch: expected {expected:#010x}, computed {computed:#010x}")]
    CrcMismatch { expected: u32, computed: u32 },
    #[error("invalid utf-8 in string table")]
    InvalidUtf8,
}

impl From<crate::util::CursorError> for ImageError {
    fn from(e: crate::util::CursorError) -> Self {
        ImageError::Truncated(e.to_string())
    }
}

/// Sérialise un `Executable` au format d'image. Cette implémentation écrit
/// toujours en little-endian ; le marqueur d'ordre d'octets n'a donc qu'une
/// seule valeur valide en sortie (`BYTE_ORDER_LE`), vérifiée par
/// `read_image` plutôt que supposée (§6.2).
pub fn write_image(exec: &Executable) -> Vec<u8> {
    let mut buf = BufLE::new();
    buf.write_u8(BYTE_ORDER_LE);
    buf.write_u32(exec.numbers.len() as u32);
    buf.write_u32(exec.strings.len() as u32);
    buf.write_u32(exec.functions.len() as u32);
    buf.write_u32(exec.code.len() as u32);

    for n in &exec.numbers {
        buf.write_f64(*n);
    }
    for s in &exec.strings {
        buf.write_str(s.as_bytes());
    }
    for f in &exec.functions {
        buf.write_u32(*f);
    }
    buf.write_bytes(&exec.code);

    let crc = crc32_ieee(buf.as_slice());
    buf.write_u32(crc);
    buf.into_vec()
}

/// Charge un `Executable` depuis une image sérialisée. Toujours owned :
/// aucune donnée n'emprunte `bytes`.
pub fn read_image(bytes: &[u8]) -> Result<Executable, ImageError> {
    if bytes.len() < 4 {
        return Err(ImageError::Truncated("missing crc trailer".into()));
    }
    let (body, trailer) = bytes.split_at(bytes.len() - 4);
    let expected_crc = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let computed_crc = crc32_ieee(body);
    if expected_crc != computed_crc {
        return Err(ImageError::CrcMismatch {
            expected: expected_crc,
            computed: computed_crc,
        });
    }

    let mut cur = CursorLE::new(body);
    let byte_order = cur.read_u8()?;
    // `CursorLE` only ever decodes little-endian; a big-endian-marked image
    // would be silently misparsed rather than correctly decoded, so it is
    // rejected outright instead of being accepted and ignored.
    if byte_order != BYTE_ORDER_LE {
        return Err(ImageError::BadByteOrder(byte_order));
    }

    let n_numbers = read_count(&mut cur)?;
    let n_strings = read_count(&mut cur)?;
    let n_functions = read_count(&mut cur)?;
    let code_len = read_count(&mut cur)? as usize;

    let mut numbers = Vec::with_capacity(n_numbers as usize);
    for _ in 0..n_numbers {
        numbers.push(cur.read_f64()?);
    }

    let mut strings = Vec::with_capacity(n_strings as usize);
    for _ in 0..n_strings {
        let raw = cur.read_str()?;
        if raw.len() as u32 > MAX_STR_LEN {
            return Err(ImageError::StringTooLong(raw.len() as u32));
        }
        let s = std::str::from_utf8(raw).map_err(|_| ImageError::InvalidUtf8)?;
        strings.push(Rc::from(s));
    }

    let mut functions = Vec::with_capacity(n_functions as usize);
    for _ in 0..n_functions {
        functions.push(cur.read_u32()?);
    }

    let code_bytes = cur.take_rest();
    if code_bytes.len() != code_len {
        return Err(ImageError::Truncated(format!(
            "code segment: expected {code_len} bytes, found {}",
            code_bytes.len()
        )));
    }

    Ok(Executable {
        numbers,
        strings,
        functions,
        code: code_bytes.to_vec(),
    })
}

fn read_count(cur: &mut CursorLE<'_>) -> Result<u32, ImageError> {
    let n = cur.read_u32()?;
    if n > MAX_COUNT {
        return Err(ImageError::CountTooLarge(n));
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executable::ExecBuilder;
    use crate::opcode::OpCode;

    fn sample() -> Executable {
        let mut b = ExecBuilder::new();
        let n = b.intern_number(42.0);
        let s = b.intern_str("hi");
        b.emit_u8(OpCode::PushNum as u8).emit_u16(n);
        b.emit_u8(OpCode::PushStr as u8).emit_u16(s);
        b.emit_u8(OpCode::Stop as u8);
        b.finish()
    }

    #[test]
    fn roundtrip() {
        let exec = sample();
        let bytes = write_image(&exec);
        let back = read_image(&bytes).expect("valid image");
        assert_eq!(back.numbers, exec.numbers);
        assert_eq!(back.strings.len(), exec.strings.len());
        assert_eq!(back.strings[0].as_ref(), "hi");
        assert_eq!(back.code, exec.code);
    }

    #[test]
    fn corrupted_crc_rejected() {
        let exec = sample();
        let mut bytes = write_image(&exec);
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(matches!(
            read_image(&bytes),
            Err(ImageError::CrcMismatch { .. })
        ));
    }

    #[test]
    fn truncated_image_rejected() {
        let exec = sample();
        let bytes = write_image(&exec);
        let truncated = &bytes[..bytes.len() / 2];
        assert!(read_image(truncated).is_err());
    }

    #[test]
    fn big_endian_marker_is_rejected_not_misparsed() {
        let exec = sample();
        let mut bytes = write_image(&exec);
        bytes[0] = BYTE_ORDER_BE;
        let crc_start = bytes.len() - 4;
        let crc = crc32_ieee(&bytes[..crc_start]);
        bytes[crc_start..].copy_from_slice(&crc.to_le_bytes());
        assert_eq!(read_image(&bytes), Err(ImageError::BadByteOrder(BYTE_ORDER_BE)));
    }
}
