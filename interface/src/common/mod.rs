//! Primitive types shared by most Substrate chains.

use self::ss58format::{Ss58AddressFormat, Ss58Codec, Ss58Error};
use crate::static_type::IdentifiableType;
use crate::value::Value;
use parity_scale_codec::{Compact, Decode, Encode};
use std::fmt;
use std::str::FromStr;

pub mod ss58format;

pub type Balance = u128;
pub type Hash = [u8; 32];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Encode, Decode, IdentifiableType)]
pub struct AccountId32(pub [u8; 32]);

impl AccountId32 {
    pub fn from_ss58_address(address: &str) -> Result<Self, Ss58Error> {
        Self::from_ss58(address)
    }
    pub fn to_ss58_address(&self, format: Ss58AddressFormat) -> Result<String, Ss58Error> {
        self.to_ss58_with_format(format)
    }
    /// Returns the underlying public key or the blake2b hash in case of ECDSA.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }
    /// The account as a dynamic value, fitting `AccountId32` types of the
    /// metadata.
    pub fn to_value(&self) -> Value {
        Value::bytes(self.0)
    }
}

impl Ss58Codec for AccountId32 {}

impl AsRef<[u8]> for AccountId32 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl AsMut<[u8]> for AccountId32 {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl From<[u8; 32]> for AccountId32 {
    fn from(val: [u8; 32]) -> Self {
        AccountId32(val)
    }
}

impl FromStr for AccountId32 {
    type Err = Ss58Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_ss58(s)
    }
}

impl fmt::Display for AccountId32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_ss58_with_format(Ss58AddressFormat::default()) {
            Ok(address) => write!(f, "{}", address),
            Err(_) => write!(f, "0x{}", hex::encode(self.0)),
        }
    }
}

/// The address format used by most chains, `sp_runtime::MultiAddress`.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, IdentifiableType)]
pub enum MultiAddress {
    Id(AccountId32),
    Index(#[codec(compact)] u32),
    Raw(Vec<u8>),
    Address32([u8; 32]),
    Address20([u8; 20]),
}

impl MultiAddress {
    pub fn to_value(&self) -> Value {
        match self {
            MultiAddress::Id(id) => Value::unnamed_variant("Id", [id.to_value()]),
            MultiAddress::Index(idx) => Value::unnamed_variant("Index", [Value::uint(*idx)]),
            MultiAddress::Raw(raw) => Value::unnamed_variant("Raw", [Value::bytes(raw)]),
            MultiAddress::Address32(raw) => Value::unnamed_variant("Address32", [Value::bytes(raw)]),
            MultiAddress::Address20(raw) => Value::unnamed_variant("Address20", [Value::bytes(raw)]),
        }
    }
}

impl From<AccountId32> for MultiAddress {
    fn from(val: AccountId32) -> Self {
        MultiAddress::Id(val)
    }
}

/// Balance type as used by the `Balances` pallet in calls.
pub type CompactBalance = Compact<Balance>;
