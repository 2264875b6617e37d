//! Legacy (EIP-155) transaction signing.
//!
//! The signing payload is `rlp([nonce, gasPrice, gas, to, value, data, chainId, 0, 0])`
//! and the broadcast form is `rlp([nonce, gasPrice, gas, to, value, data, v, r, s])`
//! with `v = chainId * 2 + 35 + recovery_id`.

use alloy_primitives::{keccak256, Address, Bytes, TxHash, B256, U256};
use alloy_rlp::{Decodable, Encodable, Header};
use secp256k1::{
    ecdsa::{RecoverableSignature, RecoveryId},
    Message, Secp256k1,
};
use thiserror::Error;

use super::{account::Account, tx::BuiltTransaction};

#[derive(Debug, Error)]
pub enum SigningError {
    #[error("Transaction sender {tx_sender} does not match account {account}")]
    SenderMismatch { tx_sender: Address, account: Address },
    #[error("Signing key unusable: {0}")]
    Key(#[from] secp256k1::Error),
    #[error("Malformed signed transaction: {0}")]
    Decode(String),
}

/// A signed transaction ready for broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub raw: Bytes,
    pub hash: TxHash,
}

/// Fields recovered from a broadcast-form legacy transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTransaction {
    pub sender: Address,
    pub recipient: Address,
    pub value: U256,
    pub nonce: u64,
    pub gas_limit: u64,
    pub gas_price: U256,
    pub chain_id: u64,
    pub hash: TxHash,
}

fn encode_list(fields: &[&dyn Encodable]) -> Vec<u8> {
    let payload_length: usize = fields.iter().map(|f| f.length()).sum();
    let mut out = Vec::with_capacity(payload_length + 9);
    Header {
        list: true,
        payload_length,
    }
    .encode(&mut out);
    for field in fields {
        field.encode(&mut out);
    }
    out
}

/// Keccak hash of the EIP-155 signing payload.
pub fn signing_hash(tx: &BuiltTransaction) -> B256 {
    let data = Bytes::new();
    let payload = encode_list(&[
        &tx.nonce,
        &tx.gas_price,
        &tx.gas_limit,
        &tx.recipient,
        &tx.value,
        &data,
        &tx.chain_id,
        &0u8,
        &0u8,
    ]);
    keccak256(payload)
}

/// Sign `tx` with the account's key.
pub fn sign_transaction(
    account: &Account,
    tx: &BuiltTransaction,
) -> Result<SignedTransaction, SigningError> {
    if tx.sender != account.address() {
        return Err(SigningError::SenderMismatch {
            tx_sender: tx.sender,
            account: account.address(),
        });
    }

    let secret = account.secret_key()?;
    let secp = Secp256k1::signing_only();
    let message = Message::from_digest(signing_hash(tx).0);
    let signature = secp.sign_ecdsa_recoverable(&message, &secret);
    let (recovery_id, compact) = signature.serialize_compact();

    let v = tx.chain_id * 2 + 35 + recovery_id.to_i32() as u64;
    let r = U256::from_be_slice(&compact[..32]);
    let s = U256::from_be_slice(&compact[32..]);

    let data = Bytes::new();
    let raw = encode_list(&[
        &tx.nonce,
        &tx.gas_price,
        &tx.gas_limit,
        &tx.recipient,
        &tx.value,
        &data,
        &v,
        &r,
        &s,
    ]);
    let hash = keccak256(&raw);

    Ok(SignedTransaction {
        raw: Bytes::from(raw),
        hash,
    })
}

/// Decode a broadcast-form legacy transaction and recover its sender.
pub fn decode_signed(raw: &[u8]) -> Result<DecodedTransaction, SigningError> {
    let decode_err = |e: alloy_rlp::Error| SigningError::Decode(e.to_string());

    let mut buf = raw;
    let header = Header::decode(&mut buf).map_err(decode_err)?;
    if !header.list {
        return Err(SigningError::Decode("expected an RLP list".to_string()));
    }

    let nonce = u64::decode(&mut buf).map_err(decode_err)?;
    let gas_price = U256::decode(&mut buf).map_err(decode_err)?;
    let gas_limit = u64::decode(&mut buf).map_err(decode_err)?;
    let recipient = Address::decode(&mut buf).map_err(decode_err)?;
    let value = U256::decode(&mut buf).map_err(decode_err)?;
    let _data = Bytes::decode(&mut buf).map_err(decode_err)?;
    let v = u64::decode(&mut buf).map_err(decode_err)?;
    let r = U256::decode(&mut buf).map_err(decode_err)?;
    let s = U256::decode(&mut buf).map_err(decode_err)?;

    if v < 35 {
        return Err(SigningError::Decode(format!("pre-EIP-155 v value {v}")));
    }
    let chain_id = (v - 35) / 2;
    let recovery = ((v - 35) % 2) as i32;

    let unsigned = BuiltTransaction {
        sender: Address::ZERO,
        recipient,
        value,
        nonce,
        gas_limit,
        gas_price,
        chain_id,
    };

    let mut compact = [0u8; 64];
    compact[..32].copy_from_slice(&r.to_be_bytes::<32>());
    compact[32..].copy_from_slice(&s.to_be_bytes::<32>());
    let signature = RecoverableSignature::from_compact(&compact, RecoveryId::from_i32(recovery)?)?;

    let secp = Secp256k1::verification_only();
    let message = Message::from_digest(signing_hash(&unsigned).0);
    let public = secp.recover_ecdsa(&message, &signature)?;
    let sender = Address::from_slice(&keccak256(&public.serialize_uncompressed()[1..])[12..]);

    Ok(DecodedTransaction {
        sender,
        recipient,
        value,
        nonce,
        gas_limit,
        gas_price,
        chain_id,
        hash: keccak256(raw),
    })
}
