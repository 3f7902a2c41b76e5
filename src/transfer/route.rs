//! Route descriptors: what is being sent, from where, to whom

use super::units;
use crate::chain::Chain;
use crate::config::Settings;
use crate::error::{TransferError, TransferResult};

use serde::Serialize;
use std::fmt;

/// Human decimal amount, validated but never scaled
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Amount(String);

impl Amount {
    pub fn parse(amount: &str) -> TransferResult<Self> {
        let amount = amount.trim();
        if !units::is_decimal(amount) {
            return Err(TransferError::Config(format!(
                "Transfer amount is not a decimal number: {:?}",
                amount
            )));
        }
        if amount.bytes().all(|b| b == b'0' || b == b'.') {
            return Err(TransferError::Config(
                "Transfer amount must be greater than zero".to_string(),
            ));
        }
        Ok(Self(amount.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable description of one requested cross-chain transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteDescriptor {
    pub source_chain: Chain,
    pub destination_chain: Chain,
    pub asset_symbol: String,
    pub amount: Amount,
    pub source_address: String,
    pub destination_address: String,
    pub abstract_decimals: bool,
}

impl RouteDescriptor {
    pub fn new(
        source_chain: Chain,
        destination_chain: Chain,
        asset_symbol: &str,
        amount: &str,
        source_address: &str,
        destination_address: &str,
        abstract_decimals: bool,
    ) -> TransferResult<Self> {
        let asset_symbol = asset_symbol.trim();
        if asset_symbol.is_empty() {
            return Err(TransferError::Config("Asset symbol is empty".to_string()));
        }

        Ok(Self {
            source_chain,
            destination_chain,
            asset_symbol: asset_symbol.to_ascii_uppercase(),
            amount: Amount::parse(amount)?,
            source_address: required("source address (SOURCE_ADDRESS)", source_address)?,
            destination_address: required(
                "destination address (DEST_ADDRESS)",
                destination_address,
            )?,
            abstract_decimals,
        })
    }

    /// Build the descriptor for the configured transfer
    pub fn from_settings(settings: &Settings) -> TransferResult<Self> {
        let transfer = &settings.transfer;
        Self::new(
            transfer.source_chain,
            transfer.destination_chain,
            &transfer.asset,
            &transfer.amount,
            transfer.source_address.as_deref().unwrap_or_default(),
            transfer.destination_address.as_deref().unwrap_or_default(),
            transfer.abstract_decimals,
        )
    }
}

impl fmt::Display for RouteDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} -> {}",
            self.amount, self.asset_symbol, self.source_chain, self.destination_chain
        )
    }
}

fn required(what: &str, value: &str) -> TransferResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(TransferError::Config(format!("Missing {}", what)));
    }
    Ok(value.to_string())
}
