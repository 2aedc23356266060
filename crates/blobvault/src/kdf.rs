//! Per-name key derivation (§4.B).
//!
//! `CodenameKey` is a 256-bit key derived from `(codename, container salt)`
//! through a memory-hard KDF (scrypt). Equality of two `CodenameKey`s implies
//! equality of the `(codename, salt)` pair that produced them; the key is
//! otherwise opaque to every other component.

use scrypt::Params;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::codec;
use crate::error::Result;

/// scrypt cost parameters. Two profiles exist: the real interactive
/// default, and a drastically cheaper one compiled in only for tests.
/// §4.B requires this to be a compile-time choice, never something a
/// runtime caller can select.
#[derive(Clone, Copy, Debug)]
pub struct KdfParams {
    log_n: u8,
    r: u32,
    p: u32,
}

impl KdfParams {
    /// Interactive-use cost parameters (the real default).
    pub const fn interactive() -> Self {
        // log2(N)=15 (N=32768), r=8, p=1 -- standard scrypt "interactive" profile.
        Self { log_n: 15, r: 8, p: 1 }
    }

    /// Cheap parameters for test builds only. Never reachable from a
    /// runtime argument, per §4.B: gated behind the `test-util` Cargo
    /// feature (always on for `cfg(test)`), never a value a caller can
    /// select by passing untrusted input to a public constructor.
    #[cfg(any(test, feature = "test-util"))]
    pub const fn for_tests() -> Self {
        Self { log_n: 4, r: 8, p: 1 }
    }

    fn to_scrypt_params(self) -> Params {
        Params::new(self.log_n, self.r, self.p, 32).expect("valid scrypt parameters")
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        #[cfg(not(any(test, feature = "test-util")))]
        {
            Self::interactive()
        }
        #[cfg(any(test, feature = "test-util"))]
        {
            Self::for_tests()
        }
    }
}

/// A 256-bit key derived from `(codename, salt)`. Zeroed on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct CodenameKey {
    bytes: [u8; 32],
}

impl CodenameKey {
    /// Derive the key for `codename` under `salt`, using `params` for the
    /// scrypt cost.
    pub fn derive_with_params(codename: &str, salt: &[u8], params: KdfParams) -> Result<Self> {
        let name_bytes = codec::codename_to_bytes(codename)?;
        let mut bytes = [0u8; 32];
        scrypt::scrypt(&name_bytes, salt, &params.to_scrypt_params(), &mut bytes)
            .expect("scrypt output length matches key size");
        Ok(Self { bytes })
    }

    /// Derive the key using the default cost profile for this build.
    pub fn derive(codename: &str, salt: &[u8]) -> Result<Self> {
        Self::derive_with_params(codename, salt, KdfParams::default())
    }

    /// The raw 32-byte key.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// An ephemeral key with no associated codename, used only to mint the
    /// initial decoy clusters written at container-creation time (§11.C).
    /// Never derived from a codename and never reused after that write.
    pub(crate) fn from_random() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }
}

impl std::fmt::Debug for CodenameKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodenameKey").field("bytes", &"[REDACTED]").finish()
    }
}

impl PartialEq for CodenameKey {
    fn eq(&self, other: &Self) -> bool {
        use subtle::ConstantTimeEq;
        self.bytes.ct_eq(&other.bytes).into()
    }
}
impl Eq for CodenameKey {}
