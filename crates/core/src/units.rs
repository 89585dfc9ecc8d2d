//! Conversion of chain-native integer units into decimal amounts and USD.

/// Convert an integer amount of base units into whole units.
///
/// `decimals` is the number of decimal places of the asset
/// (18 for wei, 9 for lamports, 8 for satoshi, 6 for USDC/USDT).
pub fn raw_to_amount(raw: u128, decimals: u32) -> f64 {
    // Split at the decimal point so large wei values keep their fractional part.
    let scale = 10u128.checked_pow(decimals).unwrap_or(u128::MAX);
    let whole = raw / scale;
    let frac = raw % scale;
    whole as f64 + frac as f64 / scale as f64
}

/// USD value of an amount at the given price. A zero price yields zero.
#[inline]
pub fn usd_value(amount: f64, price: f64) -> f64 {
    if price <= 0.0 || !price.is_finite() {
        return 0.0;
    }
    amount * price
}

/// Current unix time in seconds.
pub fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
