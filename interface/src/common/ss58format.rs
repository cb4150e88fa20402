// # COPYRIGHT DISCLAIMER
//
// Large part of the code visible in this file was copied from the
// [Substrate](https://github.com/paritytech/substrate) project, developed by
// [Parity Technologies](https://www.parity.io/) and licensed under the [Apache
// License, Version 2.0](http://www.apache.org/licenses/LICENSE-2.0). The copied
// work was modified by the author of this library. The author of this library
// takes no credit for the copied work and fully complies with the Apache
// License, Version 2.0.
//
// # LICENSE OF THE COPIED WORK
//
// This file is part of Substrate.

// Copyright (C) 2017-2021 Parity Technologies (UK) Ltd.
// SPDX-License-Identifier: Apache-2.0

// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// 	http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use base58::{FromBase58, ToBase58};
use blake2_rfc::blake2b::Blake2b;
use std::fmt;

const CHECKSUM_LEN: usize = 2;
const PREFIX: &[u8] = b"SS58PRE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Ss58Error {
    #[error("invalid base58 character at position {0}")]
    BadBase58(usize),
    #[error("invalid address length")]
    BadLength,
    #[error("invalid address prefix byte {0}")]
    InvalidPrefix(u8),
    #[error("invalid checksum")]
    InvalidChecksum,
    #[error("address format {0} is reserved")]
    FormatNotAllowed(u16),
    #[error("address format {0} is not known")]
    UnknownFormat(u16),
}

/// A network identifier for SS58.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Ss58AddressFormat(u16);

impl Ss58AddressFormat {
    /// Polkadot Relay-chain, standard account (*25519).
    pub const POLKADOT: Self = Ss58AddressFormat(0);
    /// Kusama Relay-chain, standard account (*25519).
    pub const KUSAMA: Self = Ss58AddressFormat(2);
    /// Any Substrate network, standard account (*25519).
    pub const SUBSTRATE: Self = Ss58AddressFormat(42);

    pub const fn custom(prefix: u16) -> Self {
        Ss58AddressFormat(prefix)
    }
    pub fn prefix(&self) -> u16 {
        self.0
    }
    /// Identifiers of 16384 and above do not fit into the prefix.
    pub fn is_reserved(&self) -> bool {
        self.0 >= 16_384
    }
    /// Known networks, as registered in the SS58 registry.
    pub fn name(&self) -> Option<&'static str> {
        let name = match self.0 {
            0 => "polkadot",
            1 => "sr25519",
            2 => "kusama",
            3 => "ed25519",
            5 => "astar",
            7 => "edgeware",
            8 => "karura",
            10 => "acala",
            42 => "substrate",
            43 => "secp256k1",
            1284 => "moonbeam",
            1285 => "moonriver",
            _ => return None,
        };

        Some(name)
    }
}

impl Default for Ss58AddressFormat {
    fn default() -> Self {
        Self::SUBSTRATE
    }
}

impl From<u16> for Ss58AddressFormat {
    fn from(val: u16) -> Self {
        Ss58AddressFormat(val)
    }
}

impl From<Ss58AddressFormat> for u16 {
    fn from(val: Ss58AddressFormat) -> Self {
        val.0
    }
}

impl fmt::Display for Ss58AddressFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "{}", self.0),
        }
    }
}

pub trait Ss58Codec: Sized + AsMut<[u8]> + AsRef<[u8]> + Default {
    /// Converts the SS58 encoded string into the key and returns it.
    fn from_ss58(s: &str) -> Result<Self, Ss58Error> {
        Self::from_ss58_with_format(s).map(|(r, _)| r)
    }
    /// Like `from_ss58`, but will return an error if the address format is
    /// not a known network.
    fn from_ss58_reject_unknown(s: &str) -> Result<Self, Ss58Error> {
        Self::from_ss58_with_format(s).and_then(|(r, v)| match v.name() {
            Some(_) => Ok(r),
            None => Err(Ss58Error::UnknownFormat(v.prefix())),
        })
    }
    /// Converts the SS58 encoded string into the key. Returns the key and the
    /// identified address format.
    fn from_ss58_with_format(s: &str) -> Result<(Self, Ss58AddressFormat), Ss58Error> {
        let mut res = Self::default();

        // Must decode to our type.
        let body_len = res.as_mut().len();

        let data = s.from_base58().map_err(|err| match err {
            base58::FromBase58Error::InvalidBase58Character(_, pos) => Ss58Error::BadBase58(pos),
            _ => Ss58Error::BadLength,
        })?;
        if data.len() < 2 {
            return Err(Ss58Error::BadLength);
        }
        let (prefix_len, ident) = match data[0] {
            0..=63 => (1, data[0] as u16),
            64..=127 => {
                // weird bit manipulation owing to the combination of LE encoding and missing two bits
                // from the left.
                // d[0] d[1] are: 01aaaaaa bbcccccc
                // they make the LE-encoded 16-bit value: aaaaaabb 00cccccc
                // so the lower byte is formed of aaaaaabb and the higher byte is 00cccccc
                let lower = (data[0] << 2) | (data[1] >> 6);
                let upper = data[1] & 0b00111111;
                (2, (lower as u16) | ((upper as u16) << 8))
            }
            other => return Err(Ss58Error::InvalidPrefix(other)),
        };

        if data.len() != prefix_len + body_len + CHECKSUM_LEN {
            return Err(Ss58Error::BadLength);
        }

        let hash = ss58hash(&data[0..body_len + prefix_len]);
        let checksum = &hash.as_bytes()[0..CHECKSUM_LEN];
        if data[body_len + prefix_len..body_len + prefix_len + CHECKSUM_LEN] != *checksum {
            return Err(Ss58Error::InvalidChecksum);
        }

        res.as_mut()
            .copy_from_slice(&data[prefix_len..body_len + prefix_len]);
        Ok((res, ident.into()))
    }
    /// Returns the SS58 encoded string of the key.
    fn to_ss58_with_format(&self, format: Ss58AddressFormat) -> Result<String, Ss58Error> {
        if format.is_reserved() {
            return Err(Ss58Error::FormatNotAllowed(format.prefix()));
        }

        let ident = format.prefix();
        let mut v = match ident {
            0..=63 => vec![ident as u8],
            _ => {
                // upper six bits of the lower byte(!)
                let first = ((ident & 0b0000_0000_1111_1100) as u8) >> 2;
                // lower two bits of the lower byte in the high pos,
                // lower bits of the upper byte in the low pos
                let second = ((ident >> 8) as u8) | ((ident & 0b0000_0000_0000_0011) as u8) << 6;
                vec![first | 0b01000000, second]
            }
        };
        v.extend(self.as_ref());
        let r = ss58hash(&v);
        v.extend(&r.as_bytes()[0..CHECKSUM_LEN]);
        Ok(v.to_base58())
    }
}

fn ss58hash(data: &[u8]) -> blake2_rfc::blake2b::Blake2bResult {
    let mut context = Blake2b::new(64);
    context.update(PREFIX);
    context.update(data);
    context.finalize()
}
