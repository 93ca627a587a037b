//! tests/integration.rs — batteries d'intégration pour vitte-core
//!
//! Construit un `Executable` à la main via `ExecBuilder` (aucun compilateur
//! n'est fourni par ce crate), puis vérifie le format d'image de bout en
//! bout : écriture, relecture, détection de corruption.

use vitte_core::image::{read_image, write_image, ImageError};
use vitte_core::util::crc32_ieee;
use vitte_core::{ExecBuilder, OpCode};

/// Mirrors the private `BYTE_ORDER_BE` marker in `image.rs`.
const BYTE_ORDER_BE: u8 = 1;

fn sample_exec() -> vitte_core::Executable {
    let mut b = ExecBuilder::new();
    let one = b.intern_number(1.0);
    let two = b.intern_number(2.0);
    let greeting = b.intern_str("hello");
    b.emit_u8(OpCode::PushNum as u8).emit_u16(one);
    b.emit_u8(OpCode::PushNum as u8).emit_u16(two);
    b.emit_u8(OpCode::Add as u8);
    b.emit_u8(OpCode::PushStr as u8).emit_u16(greeting);
    b.emit_u8(OpCode::Pop as u8);
    b.emit_u8(OpCode::Stop as u8);
    b.finish()
}

#[test]
fn image_roundtrip_preserves_tables_and_code() {
    let exec = sample_exec();
    let buf = write_image(&exec);

    let back = read_image(&buf).expect("read ok");
    assert_eq!(back.numbers, exec.numbers);
    assert_eq!(back.strings.len(), exec.strings.len());
    assert_eq!(back.strings[0].as_ref(), exec.strings[0].as_ref());
    assert_eq!(back.code, exec.code);
    assert_eq!(back.compute_hash(), exec.compute_hash());
}

#[test]
fn image_corruption_is_detected_by_crc() {
    let exec = sample_exec();
    let mut buf = write_image(&exec);

    // Flip a byte in the middle of the code segment, well clear of the
    // header and the trailing CRC itself.
    let mid = buf.len() / 2;
    buf[mid] ^= 0xFF;

    let err = read_image(&buf).unwrap_err();
    assert!(matches!(err, ImageError::CrcMismatch { .. }));
}

#[test]
fn truncated_image_is_rejected() {
    let exec = sample_exec();
    let mut buf = write_image(&exec);
    buf.truncate(buf.len() - 1);

    assert!(read_image(&buf).is_err());
}

#[test]
fn big_endian_marked_image_is_rejected() {
    let exec = sample_exec();
    let mut buf = write_image(&exec);

    // This implementation only ever decodes little-endian; a BE-marked
    // image must be rejected, not silently misparsed as LE.
    buf[0] = BYTE_ORDER_BE;
    let crc_start = buf.len() - 4;
    let crc = crc32_ieee(&buf[..crc_start]);
    buf[crc_start..].copy_from_slice(&crc.to_le_bytes());

    let err = read_image(&buf).unwrap_err();
    assert_eq!(err, ImageError::BadByteOrder(BYTE_ORDER_BE));
}

#[test]
fn disassembly_is_human_readable() {
    let exec = sample_exec();
    let text = exec.disassemble("integration");
    assert!(text.contains("PushNum"));
    assert!(text.contains("Add"));
    assert!(text.contains("PushStr"));
    assert!(text.contains("Stop"));
}
