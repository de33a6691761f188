use rand::RngCore;
use std::sync::Arc;
use zeroize::Zeroizing;

use indigo_core::{Did, Verkey};
use indigo_crypto::{aead_open, aead_seal, seal, PublicKey, SealedBox};
use indigo_wallet::Keyring;

use crate::envelope::{
    decode, decode_nonce, encode, Envelope, PackAlgorithm, ProtectedHeader, Recipient,
    RecipientHeader, ENCRYPTION, MESSAGE_TYPE, TAG_LEN,
};
use crate::error::MessagingError;

/// Result of [`SecureChannel::unpack`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnpackedMessage {
    pub plaintext: Vec<u8>,
    /// `None` for anonymous messages.
    pub sender_verkey: Option<Verkey>,
    pub recipient_verkey: Verkey,
}

/// Packs and unpacks messages with keys held in a keyring.
pub struct SecureChannel {
    keyring: Arc<Keyring>,
}

impl SecureChannel {
    pub fn new(keyring: Arc<Keyring>) -> Self {
        Self { keyring }
    }

    /// Encrypt `plaintext` so that each of `recipients` can decrypt it on
    /// its own. With a sender the message is authcrypted and the recipient
    /// learns the sender verkey; without one it is anonymous.
    pub fn pack(
        &self,
        sender: Option<&Did>,
        recipients: &[Verkey],
        plaintext: &[u8],
    ) -> Result<Envelope, MessagingError> {
        let mut unique: Vec<&Verkey> = Vec::with_capacity(recipients.len());
        for verkey in recipients {
            if !unique.contains(&verkey) {
                unique.push(verkey);
            }
        }
        if unique.is_empty() {
            return Err(MessagingError::NoRecipients);
        }
        let sender_verkey = sender.map(|did| self.keyring.verkey(did)).transpose()?;

        let mut content_key = Zeroizing::new([0u8; 32]);
        rand::rngs::OsRng.fill_bytes(&mut content_key[..]);

        let recipients = unique
            .iter()
            .map(|verkey| self.wrap_key(&content_key, sender_verkey.as_ref(), verkey))
            .collect::<Result<Vec<_>, _>>()?;
        let alg = if sender_verkey.is_some() {
            PackAlgorithm::Authcrypt
        } else {
            PackAlgorithm::Anoncrypt
        };
        let protected = ProtectedHeader {
            enc: ENCRYPTION.to_string(),
            typ: MESSAGE_TYPE.to_string(),
            alg,
            recipients,
        }
        .encode()?;

        let (iv, mut sealed) = aead_seal(&content_key, plaintext, protected.as_bytes())?;
        let tag = sealed.split_off(sealed.len() - TAG_LEN);

        tracing::debug!(alg = ?alg, recipients = unique.len(), bytes = plaintext.len(), "message packed");
        Ok(Envelope {
            protected,
            iv: encode(&iv),
            ciphertext: encode(&sealed),
            tag: encode(&tag),
        })
    }

    fn wrap_key(
        &self,
        content_key: &[u8; 32],
        sender: Option<&Verkey>,
        recipient: &Verkey,
    ) -> Result<Recipient, MessagingError> {
        let recipient_key = PublicKey::from_verkey(recipient)?;
        match sender {
            Some(sender) => {
                let wrapping_key = self.keyring.key_agreement(sender, recipient)?;
                let (iv, wrapped) =
                    aead_seal(&wrapping_key, content_key, recipient.as_str().as_bytes())?;
                let sealed_sender = seal(sender.as_str().as_bytes(), &recipient_key)?;
                Ok(Recipient {
                    encrypted_key: encode(&wrapped),
                    header: RecipientHeader {
                        kid: recipient.to_string(),
                        sender: Some(encode(&sealed_sender.to_bytes())),
                        iv: Some(encode(&iv)),
                    },
                })
            }
            None => {
                let sealed_key = seal(content_key, &recipient_key)?;
                Ok(Recipient {
                    encrypted_key: encode(&sealed_key.to_bytes()),
                    header: RecipientHeader {
                        kid: recipient.to_string(),
                        sender: None,
                        iv: None,
                    },
                })
            }
        }
    }

    /// Decrypt an envelope addressed to one of `recipient`'s verkeys.
    pub fn unpack(
        &self,
        recipient: &Did,
        envelope: &Envelope,
    ) -> Result<UnpackedMessage, MessagingError> {
        let header = envelope.header()?;
        let (entry, recipient_verkey) = header
            .recipients
            .iter()
            .find_map(|entry| {
                let verkey = Verkey::new(entry.header.kid.as_str()).ok()?;
                (self.keyring.did_for_verkey(&verkey).as_ref() == Some(recipient))
                    .then_some((entry, verkey))
            })
            .ok_or_else(|| {
                MessagingError::DecryptionFailed(format!("{} is not a recipient", recipient))
            })?;

        let (content_key, sender_verkey) = match header.alg {
            PackAlgorithm::Authcrypt => {
                let sender = self.unwrap_sender(entry, &recipient_verkey)?;
                let wrapping_key = self
                    .keyring
                    .key_agreement(&recipient_verkey, &sender)
                    .map_err(|e| MessagingError::DecryptionFailed(e.to_string()))?;
                let iv = entry.header.iv.as_deref().ok_or_else(|| {
                    MessagingError::DecryptionFailed("authcrypt recipient without iv".into())
                })?;
                let key = aead_open(
                    &wrapping_key,
                    &decode_nonce(iv, "key iv")?,
                    &decode(&entry.encrypted_key, "encrypted key")?,
                    recipient_verkey.as_str().as_bytes(),
                )
                .map_err(|e| MessagingError::DecryptionFailed(e.to_string()))?;
                (Zeroizing::new(key), Some(sender))
            }
            PackAlgorithm::Anoncrypt => {
                let sealed = SealedBox::from_bytes(&decode(&entry.encrypted_key, "encrypted key")?)
                    .map_err(|e| MessagingError::DecryptionFailed(e.to_string()))?;
                let key = self
                    .keyring
                    .open_sealed(&recipient_verkey, &sealed)
                    .map_err(|e| MessagingError::DecryptionFailed(e.to_string()))?;
                (Zeroizing::new(key), None)
            }
        };
        let content_key: &[u8; 32] = content_key
            .as_slice()
            .try_into()
            .map_err(|_| MessagingError::DecryptionFailed("bad content key length".into()))?;

        let (iv, sealed) = envelope.sealed_payload()?;
        let plaintext = aead_open(content_key, &iv, &sealed, envelope.protected.as_bytes())
            .map_err(|e| MessagingError::DecryptionFailed(e.to_string()))?;

        tracing::debug!(
            recipient = %recipient_verkey,
            authenticated = sender_verkey.is_some(),
            bytes = plaintext.len(),
            "message unpacked"
        );
        Ok(UnpackedMessage {
            plaintext,
            sender_verkey,
            recipient_verkey,
        })
    }

    fn unwrap_sender(&self, entry: &Recipient, recipient: &Verkey) -> Result<Verkey, MessagingError> {
        let sealed = entry.header.sender.as_deref().ok_or_else(|| {
            MessagingError::DecryptionFailed("authcrypt recipient without sender".into())
        })?;
        let sealed = SealedBox::from_bytes(&decode(sealed, "sender")?)
            .map_err(|e| MessagingError::DecryptionFailed(e.to_string()))?;
        let sender = self
            .keyring
            .open_sealed(recipient, &sealed)
            .map_err(|e| MessagingError::DecryptionFailed(e.to_string()))?;
        let sender = String::from_utf8(sender)
            .map_err(|_| MessagingError::DecryptionFailed("sender is not a verkey".into()))?;
        Verkey::new(sender).map_err(|e| MessagingError::DecryptionFailed(e.to_string()))
    }
}
