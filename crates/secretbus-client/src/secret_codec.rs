//! Secret payload encoding.
//!
//! On the wire a secret is the struct `(oayays)`: session path, algorithm
//! parameters, value bytes and content type. Under a plain session the value
//! is the secret itself and the parameters are empty. Under an encrypted
//! session the parameters carry the IV and the value is the ciphertext.

use secretbus_core::SecretValue;
use zeroize::Zeroizing;

use crate::bus::{BusError, ObjectPath, Value};
use crate::crypto;
use crate::error::{Result, SecretError};
use crate::session::Session;

/// A secret as it travels over the bus.
#[derive(Debug, Clone, PartialEq)]
pub struct WireSecret {
    pub session: ObjectPath,
    pub parameters: Vec<u8>,
    pub value: Zeroizing<Vec<u8>>,
    pub content_type: String,
}

impl WireSecret {
    /// Marshal to the `(oayays)` struct.
    ///
    /// The value bytes move into the returned [`Value`] without a copy. From
    /// there the transport owns them and is responsible for wiping them.
    pub fn into_value(mut self) -> Value {
        let value = std::mem::take(&mut *self.value);
        Value::Struct(vec![
            Value::Path(self.session),
            Value::Bytes(self.parameters),
            Value::Bytes(value),
            Value::Str(self.content_type),
        ])
    }

    /// Unmarshal from the `(oayays)` struct.
    pub fn from_value(value: Value) -> std::result::Result<Self, BusError> {
        let fields = value.into_struct()?;
        let [session, parameters, bytes, content_type] =
            <[Value; 4]>::try_from(fields).map_err(|fields| {
                BusError::Malformed(format!("secret struct has {} fields, expected 4", fields.len()))
            })?;

        Ok(Self {
            session: session.into_path()?,
            parameters: parameters.into_bytes()?,
            value: Zeroizing::new(bytes.into_bytes()?),
            content_type: content_type.into_string()?,
        })
    }
}

/// Encode `plaintext` for transfer within `session`.
pub fn encode(plaintext: &[u8], content_type: &str, session: &Session) -> Result<WireSecret> {
    let (parameters, value) = match session.key() {
        Some(key) => {
            let (iv, ciphertext) = crypto::encrypt(key, plaintext)?;
            (iv, Zeroizing::new(ciphertext))
        }
        None => (Vec::new(), Zeroizing::new(plaintext.to_vec())),
    };

    Ok(WireSecret {
        session: session.path().clone(),
        parameters,
        value,
        content_type: content_type.to_string(),
    })
}

/// Decode a secret received within `session`.
pub fn decode(wire: WireSecret, session: &Session) -> Result<SecretValue> {
    if &wire.session != session.path() {
        return Err(SecretError::Integrity(format!(
            "secret belongs to session {}, not {}",
            wire.session,
            session.path()
        )));
    }

    let plaintext = match session.key() {
        Some(key) => crypto::decrypt(key, &wire.parameters, &wire.value)?,
        None => {
            if !wire.parameters.is_empty() {
                return Err(SecretError::Integrity(
                    "plain session secret carries algorithm parameters".to_string(),
                ));
            }
            wire.value.clone()
        }
    };

    Ok(SecretValue::new(plaintext.to_vec(), wire.content_type.clone()))
}
