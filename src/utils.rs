use alloy::primitives::U256;
use bigdecimal::BigDecimal;
use std::str::FromStr;

/// Number of wei in one ether.
const WEI_PER_ETH: u128 = 1_000_000_000_000_000_000;

/// Converts an ETH amount to wei, for the `value` of payable calls.
/// Fails on negative amounts, on fractions of a wei, and on amounts that do not fit in a `U256`.
pub fn eth_to_wei(eth: BigDecimal) -> anyhow::Result<U256> {
    let wei = eth * BigDecimal::from(WEI_PER_ETH);
    if wei < BigDecimal::from(0) {
        anyhow::bail!("Negative amount: {wei} wei");
    }
    if !wei.is_integer() {
        anyhow::bail!("Amount is not a whole number of wei: {wei}");
    }
    let (digits, _) = wei.with_scale(0).into_bigint_and_exponent();
    let digits = digits.to_string();
    U256::from_str_radix(&digits, 10).map_err(|e| anyhow::anyhow!("Value too large: {e}"))
}

/// Converts a wei amount to ETH, for display.
pub fn wei_to_eth(wei: U256) -> anyhow::Result<BigDecimal> {
    let wei = BigDecimal::from_str(&wei.to_string())?;
    Ok(wei / BigDecimal::from(WEI_PER_ETH))
}
