//! Taxonomie d'erreurs du moteur (voir `SPEC_FULL.md` §7).

use thiserror::Error;

/// Code d'erreur latché par `Env` lors de l'exécution.
///
/// Les erreurs de typage "bénignes" (ex: `1 + true`) ne figurent pas ici :
/// elles produisent `Val::Nan`, jamais un `ErrCode` (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ErrCode {
    #[error("not enough memory")]
    NotEnoughMemory,

    #[error("invalid bytecode")]
    InvalidByteCode,

    #[error("invalid left value")]
    InvalidLeftValue,

    #[error("invalid callor")]
    InvalidCallor,

    #[error("invalid input")]
    InvalidInput,

    #[error("system error")]
    SysError,

    #[error("out of gas")]
    OutOfGas,
}

impl ErrCode {
    /// Code numérique stable, utile pour une ABI hôte en entiers négatifs
    /// (§6.3) : `-(code() as i32)`.
    pub const fn code(self) -> u8 {
        match self {
            ErrCode::NotEnoughMemory => 1,
            ErrCode::InvalidByteCode => 2,
            ErrCode::InvalidLeftValue => 3,
            ErrCode::InvalidCallor => 4,
            ErrCode::InvalidInput => 5,
            ErrCode::SysError => 6,
            ErrCode::OutOfGas => 7,
        }
    }
}
