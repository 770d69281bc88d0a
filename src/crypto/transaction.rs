//! Local transaction signing.
//!
//! Legacy transactions are signed with EIP-155 replay protection, fee-market
//! transactions as EIP-2718 type 2 envelopes with an empty access list.

use alloy_primitives::{Address, Bytes, U256};
use alloy_rlp::{BufMut, Encodable, Header};

use super::{keccak256, DeployerKey};
use crate::error::Result;
use crate::gas::GasPrice;

/// A fully populated transaction ready to be signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub gas_limit: u64,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
    pub price: GasPrice,
}

struct EmptyList;

impl Encodable for EmptyList {
    fn encode(&self, out: &mut dyn BufMut) {
        Header {
            list: true,
            payload_length: 0,
        }
        .encode(out);
    }

    fn length(&self) -> usize {
        1
    }
}

/// Contract creation encodes `to` as the empty string.
struct To(Option<Address>);

impl Encodable for To {
    fn encode(&self, out: &mut dyn BufMut) {
        match &self.0 {
            Some(address) => address.encode(out),
            None => [0u8; 0][..].encode(out),
        }
    }

    fn length(&self) -> usize {
        match &self.0 {
            Some(address) => address.length(),
            None => 1,
        }
    }
}

fn rlp_list(fields: &[&dyn Encodable]) -> Vec<u8> {
    let mut out = Vec::new();
    alloy_rlp::encode_list::<_, dyn Encodable>(fields, &mut out);
    out
}

impl UnsignedTransaction {
    /// Bytes whose keccak256 is signed.
    pub fn signing_payload(&self) -> Vec<u8> {
        let to = To(self.to);
        let data = &self.data[..];
        match self.price {
            GasPrice::Legacy { gas_price } => rlp_list(&[
                &self.nonce,
                &gas_price,
                &self.gas_limit,
                &to,
                &self.value,
                &data,
                &self.chain_id,
                &0u8,
                &0u8,
            ]),
            GasPrice::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => {
                let mut out = vec![0x02];
                out.extend(rlp_list(&[
                    &self.chain_id,
                    &self.nonce,
                    &max_priority_fee_per_gas,
                    &max_fee_per_gas,
                    &self.gas_limit,
                    &to,
                    &self.value,
                    &data,
                    &EmptyList,
                ]));
                out
            }
        }
    }

    /// Signs the transaction and returns the raw bytes for
    /// `eth_sendRawTransaction`.
    pub fn sign(&self, key: &DeployerKey) -> Result<Bytes> {
        let signature = key.sign_hash(keccak256(self.signing_payload()))?;
        let recovery = u64::from(signature.v - 27);
        let r = U256::from_be_bytes(signature.r.0);
        let s = U256::from_be_bytes(signature.s.0);
        let to = To(self.to);
        let data = &self.data[..];

        let raw = match self.price {
            GasPrice::Legacy { gas_price } => {
                let v = recovery + 35 + 2 * self.chain_id;
                rlp_list(&[
                    &self.nonce,
                    &gas_price,
                    &self.gas_limit,
                    &to,
                    &self.value,
                    &data,
                    &v,
                    &r,
                    &s,
                ])
            }
            GasPrice::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => {
                let mut out = vec![0x02];
                out.extend(rlp_list(&[
                    &self.chain_id,
                    &self.nonce,
                    &max_priority_fee_per_gas,
                    &max_fee_per_gas,
                    &self.gas_limit,
                    &to,
                    &self.value,
                    &data,
                    &EmptyList,
                    &recovery,
                    &r,
                    &s,
                ]));
                out
            }
        };

        Ok(Bytes::from(raw))
    }
}
