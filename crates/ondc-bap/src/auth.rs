//! ONDC `Authorization` headers for signed network calls.
//!
//! The request body is hashed with BLAKE2b-512 and the digest is signed
//! together with a validity window:
//!
//! ```text
//! (created): 1755737751
//! (expires): 1755741351
//! digest: BLAKE-512=<base64 digest>
//! ```
//!
//! The header names the key as `subscriber_id|unique_key_id|ed25519`.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use blake2::{Blake2b512, Digest};
use serde::Serialize;
use serde_json::ser::Formatter;
use serde_json::Value;

use crate::crypto::keys::Ed25519KeyPair;
use crate::crypto::signing;
use crate::error::{OndcError, Result};

pub const ALGORITHM: &str = "ed25519";
pub const SIGNED_HEADERS: &str = "(created) (expires) digest";

/// Base64 BLAKE2b-512 digest of the exact body bytes sent on the wire.
pub fn body_digest(body: &str) -> String {
    STANDARD.encode(Blake2b512::digest(body.as_bytes()))
}

/// Serialize `body` in the form ONDC tooling hashes: no whitespace, and
/// every non-ASCII character (plus DEL) escaped as `\uXXXX` UTF-16 units.
///
/// The result is the exact string to send and to pass to [`body_digest`].
pub fn minify_body(body: &Value) -> Result<String> {
    let mut out = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, AsciiEscaped);
    body.serialize(&mut serializer).map_err(|e| OndcError::Serialization(e.to_string()))?;
    String::from_utf8(out).map_err(|e| OndcError::Serialization(e.to_string()))
}

/// Compact formatter that keeps string contents within printable ASCII.
struct AsciiEscaped;

impl Formatter for AsciiEscaped {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> std::io::Result<()>
    where
        W: ?Sized + std::io::Write,
    {
        let mut start = 0;
        for (i, ch) in fragment.char_indices() {
            if ch.is_ascii() && ch != '\u{7f}' {
                continue;
            }
            writer.write_all(fragment[start..i].as_bytes())?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                writer.write_all(format!("\\u{unit:04x}").as_bytes())?;
            }
            start = i + ch.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}

/// The string covered by the header signature.
pub fn signing_string(digest_b64: &str, created: i64, expires: i64) -> String {
    format!("(created): {created}\n(expires): {expires}\ndigest: BLAKE-512={digest_b64}")
}

/// A parsed `Signature ...` authorization header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationHeader {
    pub subscriber_id: String,
    pub unique_key_id: String,
    pub algorithm: String,
    pub created: i64,
    pub expires: i64,
    pub headers: String,
    pub signature: String,
}

impl AuthorizationHeader {
    /// Sign `body` with `keys`, valid from `created` to `expires` (Unix
    /// seconds).
    pub fn sign(
        keys: &Ed25519KeyPair,
        subscriber_id: &str,
        unique_key_id: &str,
        body: &str,
        created: i64,
        expires: i64,
    ) -> Result<Self> {
        if expires <= created {
            return Err(OndcError::MalformedInput(
                "header must expire after it is created".into(),
            ));
        }
        let message = signing_string(&body_digest(body), created, expires);
        Ok(Self {
            subscriber_id: subscriber_id.to_string(),
            unique_key_id: unique_key_id.to_string(),
            algorithm: ALGORITHM.to_string(),
            created,
            expires,
            headers: SIGNED_HEADERS.to_string(),
            signature: signing::sign_to_base64(keys.signing_key(), message.as_bytes()),
        })
    }

    pub fn key_id(&self) -> String {
        format!("{}|{}|{}", self.subscriber_id, self.unique_key_id, self.algorithm)
    }

    /// Render as the `Authorization` header value.
    pub fn to_header_value(&self) -> String {
        format!(
            "Signature keyId=\"{}\",algorithm=\"{}\",created=\"{}\",expires=\"{}\",headers=\"{}\",signature=\"{}\"",
            self.key_id(),
            self.algorithm,
            self.created,
            self.expires,
            self.headers,
            self.signature
        )
    }

    /// Parse a header value produced by [`to_header_value`] or a peer.
    ///
    /// [`to_header_value`]: AuthorizationHeader::to_header_value
    pub fn parse(value: &str) -> Result<Self> {
        let params = value
            .trim()
            .strip_prefix("Signature ")
            .ok_or_else(|| malformed("header must start with `Signature `"))?;

        let mut fields = HashMap::new();
        for part in params.split(',') {
            let (name, raw) = part
                .trim()
                .split_once('=')
                .ok_or_else(|| malformed("parameter without `=`"))?;
            let quoted = raw
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .ok_or_else(|| malformed("parameter value must be quoted"))?;
            fields.insert(name.trim(), quoted);
        }

        let field = |name: &str| {
            fields
                .get(name)
                .copied()
                .ok_or_else(|| malformed(&format!("missing `{name}`")))
        };
        let timestamp = |name: &str| -> Result<i64> {
            field(name)?
                .parse()
                .map_err(|_| malformed(&format!("`{name}` is not a Unix timestamp")))
        };

        let mut key_id = field("keyId")?.split('|');
        let (Some(subscriber_id), Some(unique_key_id), Some(key_algorithm), None) =
            (key_id.next(), key_id.next(), key_id.next(), key_id.next())
        else {
            return Err(malformed("keyId must be subscriber_id|unique_key_id|algorithm"));
        };
        let algorithm = field("algorithm")?;
        if algorithm != ALGORITHM || key_algorithm != ALGORITHM {
            return Err(malformed(&format!("unsupported algorithm {algorithm}")));
        }

        Ok(Self {
            subscriber_id: subscriber_id.to_string(),
            unique_key_id: unique_key_id.to_string(),
            algorithm: algorithm.to_string(),
            created: timestamp("created")?,
            expires: timestamp("expires")?,
            headers: field("headers")?.to_string(),
            signature: field("signature")?.to_string(),
        })
    }

    /// True when the signature covers `body` under `public_key_b64` and
    /// `now` lies inside `[created, expires]`.
    pub fn verify(&self, body: &str, public_key_b64: &str, now: i64) -> bool {
        if now < self.created || now > self.expires {
            log::debug!(
                "authorization header outside its window ({}..{}, now {now})",
                self.created,
                self.expires
            );
            return false;
        }
        let message = signing_string(&body_digest(body), self.created, self.expires);
        signing::verify_base64(message.as_bytes(), &self.signature, public_key_b64)
    }
}

/// Parse and check a raw header value in one step. Never fails.
pub fn verify_authorization_header(
    header: &str,
    body: &str,
    public_key_b64: &str,
    now: i64,
) -> bool {
    match AuthorizationHeader::parse(header) {
        Ok(parsed) => parsed.verify(body, public_key_b64, now),
        Err(e) => {
            log::debug!("rejecting authorization header: {e}");
            false
        }
    }
}

fn malformed(msg: &str) -> OndcError {
    OndcError::MalformedInput(format!("authorization header: {msg}"))
}
