use std::time::{SystemTime, UNIX_EPOCH};

use alloy::primitives::U256;

/// Base units per whole token (18 decimals).
pub const WEI_PER_TOKEN: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// Convert a whole-token amount into base units.
pub fn wei(tokens: u64) -> U256 {
    U256::from(tokens) * WEI_PER_TOKEN
}

/// Seconds since the unix epoch.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}
