//! Root wake-on-radio session keys of the devices a relay forwards for.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;

use crate::mac::types::{DevAddr, AES128};
use crate::Error;

/// Derives the RootWorSKey of a session from its NwkSEncKey.
pub fn derive_root_wor_s_key(nwk_s_enc_key: &AES128) -> AES128 {
    let cipher = Aes128::new(GenericArray::from_slice(&nwk_s_enc_key.0[..]));
    let mut block = GenericArray::from([0u8; 16]);
    block[0] = 0x01;
    cipher.encrypt_block(&mut block);
    AES128(block.into())
}

/// Derives the keys relays need to forward uplinks of other devices.
pub trait RelayKeyService {
    /// Derives the RootWorSKey of each `(device_ids[i], session_key_ids[i])` session of the
    /// application. Entries are returned in order; unknown sessions yield `(None, None)`.
    fn batch_derive_root_wor_s_key(
        &self,
        application_id: &str,
        device_ids: &[String],
        session_key_ids: &[Vec<u8>],
    ) -> Result<Vec<(Option<DevAddr>, Option<AES128>)>, Error>;
}

/// Sessions held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticRelayKeyService {
    sessions: BTreeMap<(String, String, Vec<u8>), (DevAddr, AES128)>,
}

impl StaticRelayKeyService {
    /// Service without sessions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session of a device.
    pub fn with_session(
        mut self,
        application_id: &str,
        device_id: &str,
        session_key_id: &[u8],
        dev_addr: DevAddr,
        nwk_s_enc_key: AES128,
    ) -> Self {
        let id = (application_id.to_string(), device_id.to_string(), session_key_id.to_vec());
        self.sessions.insert(id, (dev_addr, nwk_s_enc_key));
        self
    }
}

impl RelayKeyService for StaticRelayKeyService {
    fn batch_derive_root_wor_s_key(
        &self,
        application_id: &str,
        device_ids: &[String],
        session_key_ids: &[Vec<u8>],
    ) -> Result<Vec<(Option<DevAddr>, Option<AES128>)>, Error> {
        if device_ids.len() != session_key_ids.len() {
            return Err(Error::KeyService);
        }
        Ok(device_ids
            .iter()
            .zip(session_key_ids)
            .map(|(device_id, session_key_id)| {
                let id = (application_id.to_string(), device_id.clone(), session_key_id.clone());
                match self.sessions.get(&id) {
                    Some((dev_addr, key)) => (Some(*dev_addr), Some(derive_root_wor_s_key(key))),
                    None => (None, None),
                }
            })
            .collect())
    }
}
