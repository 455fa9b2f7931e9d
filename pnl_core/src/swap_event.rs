use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;
use tracing::trace;

use crate::{NATIVE_DECIMALS, SOL_MINT};

/// Decimals assumed when a token leg does not report them
const DEFAULT_TOKEN_DECIMALS: u32 = 9;

/// Enhanced swap transaction as delivered by the swap provider (`type=SWAP`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawSwapEvent {
    pub signature: String,

    /// Unix seconds
    pub timestamp: i64,

    #[serde(default)]
    pub events: Option<SwapEvents>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SwapEvents {
    #[serde(default)]
    pub swap: Option<SwapDetails>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SwapDetails {
    #[serde(rename = "nativeInput", default)]
    pub native_input: Option<NativeIo>,
    #[serde(rename = "nativeOutput", default)]
    pub native_output: Option<NativeIo>,
    #[serde(rename = "tokenInputs", default)]
    pub token_inputs: Vec<TokenIo>,
    #[serde(rename = "tokenOutputs", default)]
    pub token_outputs: Vec<TokenIo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NativeIo {
    #[serde(default)]
    pub account: String,

    /// Lamports; providers send either a string or a number
    #[serde(deserialize_with = "string_or_number")]
    pub amount: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenIo {
    #[serde(rename = "userAccount", default)]
    pub user_account: String,
    pub mint: String,
    #[serde(rename = "rawTokenAmount", default)]
    pub raw_token_amount: Option<RawTokenAmount>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawTokenAmount {
    #[serde(rename = "tokenAmount", deserialize_with = "string_or_number")]
    pub token_amount: String,
    #[serde(default)]
    pub decimals: Option<u8>,
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(i) => i.to_string(),
        Raw::Float(f) => f.to_string(),
    })
}

/// One side of a swap, decoded once from the provider's optional fields
#[derive(Debug, Clone, PartialEq)]
pub enum SwapLeg {
    /// Native SOL, amount already scaled from lamports
    Native { amount: Decimal },
    /// SPL token with its raw on-chain amount and decimals
    Token {
        mint: String,
        raw_amount: String,
        decimals: u32,
    },
}

impl SwapLeg {
    pub fn mint(&self) -> &str {
        match self {
            SwapLeg::Native { .. } => SOL_MINT,
            SwapLeg::Token { mint, .. } => mint,
        }
    }

    /// Human-readable amount, None if the raw amount cannot be scaled
    pub fn amount(&self) -> Option<Decimal> {
        match self {
            SwapLeg::Native { amount } => Some(*amount),
            SwapLeg::Token {
                raw_amount,
                decimals,
                ..
            } => scale_raw_amount(raw_amount, *decimals),
        }
    }

    fn from_native(io: &NativeIo) -> Option<Self> {
        let amount = scale_raw_amount(&io.amount, NATIVE_DECIMALS)?;
        Some(SwapLeg::Native { amount })
    }

    fn from_token(io: &TokenIo) -> Self {
        let (raw_amount, decimals) = match &io.raw_token_amount {
            Some(raw) => (
                raw.token_amount.clone(),
                raw.decimals.map(u32::from).unwrap_or(DEFAULT_TOKEN_DECIMALS),
            ),
            None => ("0".to_string(), DEFAULT_TOKEN_DECIMALS),
        };

        SwapLeg::Token {
            mint: io.mint.clone(),
            raw_amount,
            decimals,
        }
    }
}

impl SwapDetails {
    /// Leg the wallet paid with. The first token input takes precedence over
    /// a native input.
    pub fn input_leg(&self) -> Option<SwapLeg> {
        match self.token_inputs.first() {
            Some(token) => Some(SwapLeg::from_token(token)),
            None => self.native_input.as_ref().and_then(SwapLeg::from_native),
        }
    }

    /// Leg the wallet received. The first token output takes precedence over
    /// a native output.
    pub fn output_leg(&self) -> Option<SwapLeg> {
        match self.token_outputs.first() {
            Some(token) => Some(SwapLeg::from_token(token)),
            None => self.native_output.as_ref().and_then(SwapLeg::from_native),
        }
    }
}

impl RawSwapEvent {
    pub fn swap(&self) -> Option<&SwapDetails> {
        self.events.as_ref().and_then(|events| events.swap.as_ref())
    }
}

/// Divide a raw integer amount by `10^decimals`. Amounts are unsigned on the
/// wire, so the magnitude is used.
pub fn scale_raw_amount(raw: &str, decimals: u32) -> Option<Decimal> {
    let trimmed = raw.trim();
    let mut value = Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .ok()?;

    let scale = value.scale() + decimals;
    if let Err(e) = value.set_scale(scale) {
        trace!("Cannot scale raw amount {} by {} decimals: {}", raw, decimals, e);
        return None;
    }

    Some(value.abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_scale_raw_amount() {
        assert_eq!(scale_raw_amount("1500000000", 9), Some(dec!(1.5)));
        assert_eq!(scale_raw_amount("123456", 6), Some(dec!(0.123456)));
        assert_eq!(scale_raw_amount("42", 0), Some(dec!(42)));
        assert_eq!(scale_raw_amount("not-a-number", 6), None);
    }

    #[test]
    fn test_deserialize_helius_swap() {
        let json = r#"{
            "signature": "sig1",
            "timestamp": 1700000000,
            "type": "SWAP",
            "events": {
                "swap": {
                    "nativeInput": { "account": "wallet", "amount": "2000000000" },
                    "nativeOutput": null,
                    "tokenInputs": [],
                    "tokenOutputs": [{
                        "userAccount": "wallet",
                        "tokenAccount": "ata",
                        "mint": "TokenMint111",
                        "rawTokenAmount": { "tokenAmount": "5000000", "decimals": 6 }
                    }],
                    "innerSwaps": []
                }
            }
        }"#;

        let event: RawSwapEvent = serde_json::from_str(json).unwrap();
        let swap = event.swap().unwrap();

        assert_eq!(swap.input_leg(), Some(SwapLeg::Native { amount: dec!(2) }));

        let output = swap.output_leg().unwrap();
        assert_eq!(output.mint(), "TokenMint111");
        assert_eq!(output.amount(), Some(dec!(5)));
    }

    #[test]
    fn test_numeric_native_amount() {
        let json = r#"{ "account": "wallet", "amount": 500000000 }"#;
        let io: NativeIo = serde_json::from_str(json).unwrap();
        assert_eq!(SwapLeg::from_native(&io), Some(SwapLeg::Native { amount: dec!(0.5) }));
    }

    #[test]
    fn test_token_input_wins_over_native_input() {
        let swap = SwapDetails {
            native_input: Some(NativeIo {
                account: "wallet".to_string(),
                amount: "1000000000".to_string(),
            }),
            token_inputs: vec![TokenIo {
                user_account: "wallet".to_string(),
                mint: "TokenMint111".to_string(),
                raw_token_amount: Some(RawTokenAmount {
                    token_amount: "300".to_string(),
                    decimals: Some(2),
                }),
            }],
            ..Default::default()
        };

        let input = swap.input_leg().unwrap();
        assert_eq!(input.mint(), "TokenMint111");
        assert_eq!(input.amount(), Some(dec!(3)));
    }

    #[test]
    fn test_missing_decimals_default_to_nine() {
        let io = TokenIo {
            user_account: String::new(),
            mint: "TokenMint111".to_string(),
            raw_token_amount: Some(RawTokenAmount {
                token_amount: "1000000000".to_string(),
                decimals: None,
            }),
        };

        assert_eq!(SwapLeg::from_token(&io).amount(), Some(dec!(1)));
    }

    #[test]
    fn test_event_without_swap() {
        let json = r#"{ "signature": "sig2", "timestamp": 1700000000 }"#;
        let event: RawSwapEvent = serde_json::from_str(json).unwrap();
        assert!(event.swap().is_none());
    }
}
