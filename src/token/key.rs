//! RSA signing keys for access and refresh tokens.

// std
use std::path::Path;
// crates.io
use jsonwebtoken::{DecodingKey, EncodingKey};
use rsa::{
	RsaPrivateKey,
	pkcs1::DecodeRsaPrivateKey,
	pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding},
	rand_core::OsRng,
};
// self
use crate::_prelude::*;

/// Failures raised while loading or generating a [`SigningKey`].
#[derive(Debug, ThisError)]
pub enum KeyError {
	/// PEM data is not an RSA private key in PKCS#1 or PKCS#8 form.
	#[error("PEM data is not a valid RSA private key: {reason}.")]
	Pem {
		/// Underlying parser message.
		reason: String,
	},
	/// RSA key generation failed.
	#[error("RSA key generation failed: {reason}.")]
	Generate {
		/// Underlying generator message.
		reason: String,
	},
	/// Key file could not be read.
	#[error("Key file could not be read.")]
	Io(#[from] std::io::Error),
}

/// Asymmetric key pair used to sign tokens; verification only ever touches the public half.
pub struct SigningKey {
	key_id: Option<String>,
	encoding: EncodingKey,
	decoding: DecodingKey,
}
impl SigningKey {
	/// Modulus size used by [`SigningKey::generate`].
	pub const DEFAULT_BITS: usize = 2048;

	/// Generates a fresh 2048-bit RSA key.
	pub fn generate() -> Result<Self, KeyError> {
		Self::generate_with_bits(Self::DEFAULT_BITS)
	}

	/// Generates a fresh RSA key with the provided modulus size.
	pub fn generate_with_bits(bits: usize) -> Result<Self, KeyError> {
		let private = RsaPrivateKey::new(&mut OsRng, bits)
			.map_err(|e| KeyError::Generate { reason: e.to_string() })?;

		#[cfg(feature = "tracing")]
		tracing::info!(bits, "generated RSA signing key");

		Self::from_rsa(&private)
	}

	/// Loads an RSA private key from PKCS#8 (`PRIVATE KEY`) or PKCS#1 (`RSA PRIVATE KEY`) PEM.
	pub fn from_pem(pem: &[u8]) -> Result<Self, KeyError> {
		let text =
			std::str::from_utf8(pem).map_err(|e| KeyError::Pem { reason: e.to_string() })?;
		let private = RsaPrivateKey::from_pkcs8_pem(text)
			.or_else(|_| RsaPrivateKey::from_pkcs1_pem(text))
			.map_err(|e| KeyError::Pem { reason: e.to_string() })?;

		Self::from_rsa(&private)
	}

	/// Reads and loads a PEM key file.
	pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self, KeyError> {
		let pem = std::fs::read(path)?;

		Self::from_pem(&pem)
	}

	/// Sets the identifier advertised in the `kid` header of every signed token.
	pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
		self.key_id = Some(key_id.into());

		self
	}

	/// Returns the configured key identifier, if any.
	pub fn key_id(&self) -> Option<&str> {
		self.key_id.as_deref()
	}

	pub(crate) fn encoding(&self) -> &EncodingKey {
		&self.encoding
	}

	pub(crate) fn decoding(&self) -> &DecodingKey {
		&self.decoding
	}

	fn from_rsa(private: &RsaPrivateKey) -> Result<Self, KeyError> {
		let pem_error = |reason: String| KeyError::Pem { reason };
		let private_pem =
			private.to_pkcs8_pem(LineEnding::LF).map_err(|e| pem_error(e.to_string()))?;
		let public_pem = private
			.to_public_key()
			.to_public_key_pem(LineEnding::LF)
			.map_err(|e| pem_error(e.to_string()))?;
		let encoding = EncodingKey::from_rsa_pem(private_pem.as_bytes())
			.map_err(|e| pem_error(e.to_string()))?;
		let decoding = DecodingKey::from_rsa_pem(public_pem.as_bytes())
			.map_err(|e| pem_error(e.to_string()))?;

		Ok(Self { key_id: None, encoding, decoding })
	}
}
impl Debug for SigningKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SigningKey")
			.field("key_id", &self.key_id)
			.field("private", &"<redacted>")
			.finish()
	}
}
