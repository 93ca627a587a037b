//! Catalogue d'opcodes du bytecode Vitte (voir `SPEC_FULL.md` §6.1).
//!
//! Chaque variante correspond à un octet de tête ; `operand_kind()` décrit
//! ce qui suit dans le flux de bytecode.

use core::fmt;

/// Forme des opérandes suivant l'octet d'opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    None,
    OffsetS8,
    OffsetS16,
    ConstIndexU16,
    VarRef,
    Argc,
    LiteralArity,
}

macro_rules! opcodes {
    ($( $variant:ident = $byte:literal => $kind:expr ),+ $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[repr(u8)]
        pub enum OpCode {
            $( $variant = $byte ),+
        }

        impl OpCode {
            pub fn from_byte(byte: u8) -> Option<OpCode> {
                match byte {
                    $( $byte => Some(OpCode::$variant), )+
                    _ => None,
                }
            }

            pub fn operand_kind(self) -> OperandKind {
                match self {
                    $( OpCode::$variant => $kind, )+
                }
            }

            pub fn mnemonic(self) -> &'static str {
                match self {
                    $( OpCode::$variant => stringify!($variant), )+
                }
            }
        }
    };
}

opcodes! {
    Stop = 0 => OperandKind::None,
    Pass = 1 => OperandKind::None,
    Ret0 = 2 => OperandKind::None,
    Ret = 3 => OperandKind::None,

    Sjmp = 4 => OperandKind::OffsetS8,
    Jmp = 5 => OperandKind::OffsetS16,
    SjmpT = 6 => OperandKind::OffsetS8,
    SjmpF = 7 => OperandKind::OffsetS8,
    JmpT = 8 => OperandKind::OffsetS16,
    JmpF = 9 => OperandKind::OffsetS16,
    PopSjmpT = 10 => OperandKind::OffsetS8,
    PopSjmpF = 11 => OperandKind::OffsetS8,
    PopJmpT = 12 => OperandKind::OffsetS16,
    PopJmpF = 13 => OperandKind::OffsetS16,

    PushUnd = 14 => OperandKind::None,
    PushNan = 15 => OperandKind::None,
    PushTrue = 16 => OperandKind::None,
    PushFalse = 17 => OperandKind::None,
    PushZero = 18 => OperandKind::None,
    PushNum = 19 => OperandKind::ConstIndexU16,
    PushStr = 20 => OperandKind::ConstIndexU16,
    PushVar = 21 => OperandKind::VarRef,
    PushRef = 22 => OperandKind::VarRef,
    PushScript = 23 => OperandKind::ConstIndexU16,
    PushNative = 24 => OperandKind::ConstIndexU16,

    Pop = 25 => OperandKind::None,

    Neg = 26 => OperandKind::None,
    Not = 27 => OperandKind::None,
    LogicNot = 28 => OperandKind::None,

    Mul = 29 => OperandKind::None,
    Div = 30 => OperandKind::None,
    Mod = 31 => OperandKind::None,
    Add = 32 => OperandKind::None,
    Sub = 33 => OperandKind::None,
    AAnd = 34 => OperandKind::None,
    AOr = 35 => OperandKind::None,
    AXor = 36 => OperandKind::None,
    LShift = 37 => OperandKind::None,
    RShift = 38 => OperandKind::None,

    Teq = 39 => OperandKind::None,
    Tne = 40 => OperandKind::None,
    Tgt = 41 => OperandKind::None,
    Tge = 42 => OperandKind::None,
    Tlt = 43 => OperandKind::None,
    Tle = 44 => OperandKind::None,

    Prop = 45 => OperandKind::None,
    PropMeth = 46 => OperandKind::None,
    Elem = 47 => OperandKind::None,
    ElemMeth = 48 => OperandKind::None,

    Assign = 49 => OperandKind::None,
    AddAssign = 50 => OperandKind::None,
    SubAssign = 51 => OperandKind::None,
    MulAssign = 52 => OperandKind::None,
    DivAssign = 53 => OperandKind::None,
    ModAssign = 54 => OperandKind::None,
    AndAssign = 55 => OperandKind::None,
    OrAssign = 56 => OperandKind::None,
    XorAssign = 57 => OperandKind::None,
    LShiftAssign = 58 => OperandKind::None,
    RShiftAssign = 59 => OperandKind::None,

    PropAssign = 60 => OperandKind::None,
    PropAddAssign = 61 => OperandKind::None,
    PropSubAssign = 62 => OperandKind::None,
    PropMulAssign = 63 => OperandKind::None,
    PropDivAssign = 64 => OperandKind::None,
    PropModAssign = 65 => OperandKind::None,
    PropAndAssign = 66 => OperandKind::None,
    PropOrAssign = 67 => OperandKind::None,
    PropXorAssign = 68 => OperandKind::None,
    PropLShiftAssign = 69 => OperandKind::None,
    PropRShiftAssign = 70 => OperandKind::None,

    ElemAssign = 71 => OperandKind::None,
    ElemAddAssign = 72 => OperandKind::None,
    ElemSubAssign = 73 => OperandKind::None,
    ElemMulAssign = 74 => OperandKind::None,
    ElemDivAssign = 75 => OperandKind::None,
    ElemModAssign = 76 => OperandKind::None,
    ElemAndAssign = 77 => OperandKind::None,
    ElemOrAssign = 78 => OperandKind::None,
    ElemXorAssign = 79 => OperandKind::None,
    ElemLShiftAssign = 80 => OperandKind::None,
    ElemRShiftAssign = 81 => OperandKind::None,

    FuncCall = 82 => OperandKind::Argc,

    Array = 83 => OperandKind::LiteralArity,
    Dict = 84 => OperandKind::LiteralArity,

    Tin = 85 => OperandKind::None,
}

impl OpCode {
    /// Nombre d'octets consommés après l'octet d'opcode lui-même.
    pub fn operand_len(self) -> usize {
        match self.operand_kind() {
            OperandKind::None => 0,
            OperandKind::OffsetS8 => 1,
            OperandKind::OffsetS16 => 2,
            OperandKind::ConstIndexU16 => 2,
            OperandKind::VarRef => 2,
            OperandKind::Argc => 1,
            OperandKind::LiteralArity => 2,
        }
    }

    pub fn encoded_len(self) -> usize {
        1 + self.operand_len()
    }

    pub fn is_jump(self) -> bool {
        matches!(
            self.operand_kind(),
            OperandKind::OffsetS8 | OperandKind::OffsetS16
        )
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_roundtrip() {
        for byte in 0u8..=85 {
            let op = OpCode::from_byte(byte).expect("opcode byte in range must decode");
            assert_eq!(op as u8, byte);
        }
        assert!(OpCode::from_byte(200).is_none());
    }

    #[test]
    fn encoded_len_matches_operand_kind() {
        assert_eq!(OpCode::Stop.encoded_len(), 1);
        assert_eq!(OpCode::Sjmp.encoded_len(), 2);
        assert_eq!(OpCode::Jmp.encoded_len(), 3);
        assert_eq!(OpCode::PushNum.encoded_len(), 3);
        assert_eq!(OpCode::PushVar.encoded_len(), 3);
        assert_eq!(OpCode::FuncCall.encoded_len(), 2);
        assert_eq!(OpCode::Array.encoded_len(), 3);
    }

    #[test]
    fn jump_classification() {
        assert!(OpCode::Sjmp.is_jump());
        assert!(OpCode::Jmp.is_jump());
        assert!(OpCode::PopJmpT.is_jump());
        assert!(!OpCode::Add.is_jump());
    }

    #[test]
    fn mnemonics_are_stable() {
        assert_eq!(OpCode::Add.mnemonic(), "Add");
        assert_eq!(OpCode::Tin.mnemonic(), "Tin");
    }
}
