//! # EPay signatures
//!
//! The payment gateway speaks the "EPay" protocol: every request and every asynchronous notification is a flat set of
//! string key/value pairs plus a `sign` and a `sign_type` field.
//!
//! ## Canonical form
//!
//! The string that gets signed is built by
//! * dropping `sign`, `sign_type` and every parameter with an empty value,
//! * sorting the remaining keys ascending,
//! * joining them as `k=v` pairs with `&`. Values are used raw, i.e. not URL-encoded.
//!
//! ## Schemes
//!
//! * `MD5`: the lowercase hex MD5 digest of the canonical string with the merchant key appended.
//! * `RSA`: a base64 SHA256-with-RSA (PKCS#1 v1.5) signature over the canonical string.
//!
//! The scheme used to verify a notification comes from the merchant configuration. The `sign_type` field sent by the
//! caller can only upgrade verification to RSA, never downgrade it to MD5.
//!
//! ## Keys
//!
//! Operators paste keys in every shape imaginable: with or without the PEM armour, on one line, with Windows line
//! endings. Keys are therefore stored as raw text and rebuilt into canonical PEM (64 character lines) before use.
use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use faka_common::{Amount, Secret};
use log::*;
use md5::{Digest, Md5};
use regex::Regex;
use rsa::{
    pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey},
    pkcs1v15::{Signature, SigningKey, VerifyingKey},
    pkcs8::{DecodePrivateKey, DecodePublicKey},
    sha2::Sha256,
    signature::{SignatureEncoding, Signer, Verifier},
    RsaPrivateKey,
    RsaPublicKey,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::OrderNo;

/// The `trade_status` value that signals a completed payment.
pub const TRADE_SUCCESS: &str = "TRADE_SUCCESS";
pub const DEFAULT_CHANNEL: &str = "alipay";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("The request does not carry a signature")]
    MissingSignature,
    #[error("No {0} has been configured for the payment gateway")]
    MissingKey(&'static str),
    #[error("The configured {0} is not a valid RSA key")]
    InvalidKey(&'static str),
    #[error("The signature is not valid base64: {0}")]
    InvalidEncoding(String),
    #[error("Signature mismatch")]
    Mismatch,
    #[error("Could not create signature: {0}")]
    SigningFailed(String),
    #[error("Invalid sign type: {0}")]
    InvalidScheme(String),
}

//--------------------------------------      SignScheme       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignScheme {
    #[default]
    Md5,
    Rsa,
}

impl FromStr for SignScheme {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MD5" => Ok(Self::Md5),
            "RSA" => Ok(Self::Rsa),
            _ => Err(SignatureError::InvalidScheme(s.to_string())),
        }
    }
}

impl Display for SignScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignScheme::Md5 => write!(f, "MD5"),
            SignScheme::Rsa => write!(f, "RSA"),
        }
    }
}

impl SignScheme {
    /// Picks the verification scheme. The merchant configuration wins; a caller-supplied `RSA` hint is honoured for
    /// legacy gateways that sign with RSA even when the merchant record still says MD5.
    pub fn for_verification(configured: SignScheme, hint: Option<&str>) -> SignScheme {
        match (configured, hint.map(|h| h.trim().eq_ignore_ascii_case("RSA"))) {
            (SignScheme::Rsa, _) => SignScheme::Rsa,
            (SignScheme::Md5, Some(true)) => SignScheme::Rsa,
            (SignScheme::Md5, _) => SignScheme::Md5,
        }
    }
}

//--------------------------------------     GatewayConfig     ---------------------------------------------------------
/// Merchant credentials for the payment gateway. A value of this type is resolved per request and passed into the
/// order flow explicitly.
#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    /// Gateway base URL, e.g. `https://pay.example.com/`.
    pub api_url: String,
    /// Merchant id.
    pub pid: String,
    /// Shared secret for the MD5 scheme.
    pub key: Secret<String>,
    pub sign_scheme: SignScheme,
    /// The gateway's public key, used to verify RSA-signed notifications.
    pub public_key: String,
    /// The merchant's private key, used to sign outbound RSA requests.
    pub private_key: Secret<String>,
    /// The store name shown on the gateway's checkout page.
    pub site_name: String,
}

//--------------------------------------     Canonical form    ---------------------------------------------------------
/// Builds the canonical string that is signed. See the module documentation.
pub fn canonical_params(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .filter(|(k, v)| k.as_str() != "sign" && k.as_str() != "sign_type" && !v.is_empty())
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<String>>()
        .join("&")
}

pub fn md5_signature(canonical: &str, key: &str) -> String {
    let digest = Md5::digest(format!("{canonical}{key}").as_bytes());
    format!("{digest:x}")
}

//--------------------------------------       PEM keys        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PemKind {
    Public,
    RsaPublic,
    RsaPrivate,
    Private,
}

impl PemKind {
    fn label(&self) -> &'static str {
        match self {
            PemKind::Public => "PUBLIC KEY",
            PemKind::RsaPublic => "RSA PUBLIC KEY",
            PemKind::RsaPrivate => "RSA PRIVATE KEY",
            PemKind::Private => "PRIVATE KEY",
        }
    }
}

/// Strips any PEM armour and whitespace from `raw` and re-wraps the base64 body as canonical PEM of the given kind.
pub fn format_pem(raw: &str, kind: PemKind) -> String {
    let body = pem_body(raw);
    let lines = body.as_bytes().chunks(64).map(|c| String::from_utf8_lossy(c).into_owned()).collect::<Vec<String>>();
    let label = kind.label();
    format!("-----BEGIN {label}-----\n{}\n-----END {label}-----\n", lines.join("\n"))
}

fn pem_body(raw: &str) -> String {
    let armour = Regex::new(r"-----(BEGIN|END)[A-Z ]*-----").map(|re| re.replace_all(raw, "").into_owned());
    let stripped = armour.unwrap_or_else(|_| raw.to_string());
    stripped.chars().filter(|c| !c.is_whitespace()).collect()
}

fn parse_public_key(raw: &str) -> Result<RsaPublicKey, SignatureError> {
    if raw.trim().is_empty() {
        return Err(SignatureError::MissingKey("public key"));
    }
    RsaPublicKey::from_public_key_pem(&format_pem(raw, PemKind::Public))
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(&format_pem(raw, PemKind::RsaPublic)))
        .map_err(|e| {
            warn!("🔐️ Could not parse the gateway public key: {e}");
            SignatureError::InvalidKey("public key")
        })
}

fn parse_private_key(raw: &str) -> Result<RsaPrivateKey, SignatureError> {
    if raw.trim().is_empty() {
        return Err(SignatureError::MissingKey("private key"));
    }
    RsaPrivateKey::from_pkcs1_pem(&format_pem(raw, PemKind::RsaPrivate))
        .or_else(|_| RsaPrivateKey::from_pkcs8_pem(&format_pem(raw, PemKind::Private)))
        .map_err(|e| {
            warn!("🔐️ Could not parse the merchant private key: {e}");
            SignatureError::InvalidKey("private key")
        })
}

pub fn rsa_signature(canonical: &str, private_key: &str) -> Result<String, SignatureError> {
    let key = parse_private_key(private_key)?;
    let signing_key = SigningKey::<Sha256>::new(key);
    let signature =
        signing_key.try_sign(canonical.as_bytes()).map_err(|e| SignatureError::SigningFailed(e.to_string()))?;
    Ok(base64::encode(signature.to_bytes()))
}

pub fn rsa_verify(canonical: &str, signature: &str, public_key: &str) -> Result<(), SignatureError> {
    let key = parse_public_key(public_key)?;
    let bytes = base64::decode(signature.trim()).map_err(|e| SignatureError::InvalidEncoding(e.to_string()))?;
    let signature = Signature::try_from(bytes.as_slice()).map_err(|e| SignatureError::InvalidEncoding(e.to_string()))?;
    VerifyingKey::<Sha256>::new(key).verify(canonical.as_bytes(), &signature).map_err(|_| SignatureError::Mismatch)
}

//--------------------------------------     Verification      ---------------------------------------------------------
/// Checks the authenticity of a gateway notification. Returns the scheme that was used on success.
pub fn verify_signature(
    params: &BTreeMap<String, String>,
    config: &GatewayConfig,
) -> Result<SignScheme, SignatureError> {
    let sign = params.get("sign").filter(|s| !s.trim().is_empty()).ok_or(SignatureError::MissingSignature)?;
    let scheme = SignScheme::for_verification(config.sign_scheme, params.get("sign_type").map(|s| s.as_str()));
    let canonical = canonical_params(params);
    trace!("🔐️ Verifying {scheme} signature over '{canonical}'");
    match scheme {
        SignScheme::Md5 => {
            if config.key.is_empty() {
                return Err(SignatureError::MissingKey("merchant key"));
            }
            let expected = md5_signature(&canonical, config.key.reveal());
            if expected.eq_ignore_ascii_case(sign.trim()) {
                Ok(scheme)
            } else {
                Err(SignatureError::Mismatch)
            }
        },
        SignScheme::Rsa => rsa_verify(&canonical, sign, &config.public_key).map(|_| scheme),
    }
}

/// The fields of an authenticated notification that the order flow cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedCallback {
    pub order_no: OrderNo,
    pub trade_status: String,
    /// The gateway's own transaction reference.
    pub trade_no: Option<String>,
    /// The payment channel, e.g. `alipay` or `wxpay`.
    pub channel: Option<String>,
    pub money: Option<String>,
    pub scheme: SignScheme,
}

impl VerifiedCallback {
    /// Verifies `params` and extracts the notification fields. Nothing is extracted from an unverified request.
    pub fn verify(params: &BTreeMap<String, String>, config: &GatewayConfig) -> Result<Self, CallbackError> {
        let scheme = verify_signature(params, config)?;
        let field = |k: &str| params.get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let order_no = field("out_trade_no").ok_or(CallbackError::MissingField("out_trade_no"))?;
        let trade_status = field("trade_status").ok_or(CallbackError::MissingField("trade_status"))?;
        Ok(Self {
            order_no: OrderNo(order_no),
            trade_status,
            trade_no: field("trade_no"),
            channel: field("type"),
            money: field("money"),
            scheme,
        })
    }

    pub fn is_paid(&self) -> bool {
        self.trade_status == TRADE_SUCCESS
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallbackError {
    #[error("Callback is not authentic. {0}")]
    NotAuthentic(#[from] SignatureError),
    #[error("Callback is missing the '{0}' field")]
    MissingField(&'static str),
}

//--------------------------------------   Outbound request    ---------------------------------------------------------
/// The details needed to send a buyer to the gateway's checkout page.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub order_no: OrderNo,
    /// Shown to the buyer on the gateway page, e.g. `VIP membership x2`.
    pub name: String,
    pub amount: Amount,
    pub channel: String,
    pub notify_url: String,
    pub return_url: String,
}

/// Signs `params` according to the configured scheme.
pub fn sign_params(params: &BTreeMap<String, String>, config: &GatewayConfig) -> Result<String, SignatureError> {
    let canonical = canonical_params(params);
    match config.sign_scheme {
        SignScheme::Md5 => {
            if config.key.is_empty() {
                return Err(SignatureError::MissingKey("merchant key"));
            }
            Ok(md5_signature(&canonical, config.key.reveal()))
        },
        SignScheme::Rsa => rsa_signature(&canonical, config.private_key.reveal()),
    }
}

/// Builds the signed `submit.php` URL that the buyer is redirected to.
pub fn payment_url(config: &GatewayConfig, request: &PaymentRequest) -> Result<String, SignatureError> {
    let channel = if request.channel.trim().is_empty() { DEFAULT_CHANNEL } else { request.channel.trim() };
    let mut params = BTreeMap::new();
    params.insert("pid".to_string(), config.pid.clone());
    params.insert("type".to_string(), channel.to_string());
    params.insert("out_trade_no".to_string(), request.order_no.to_string());
    params.insert("notify_url".to_string(), request.notify_url.clone());
    params.insert("return_url".to_string(), request.return_url.clone());
    params.insert("name".to_string(), request.name.clone());
    params.insert("money".to_string(), request.amount.to_decimal_string());
    params.insert("sitename".to_string(), config.site_name.clone());
    let sign = sign_params(&params, config)?;
    params.insert("sign".to_string(), sign);
    params.insert("sign_type".to_string(), config.sign_scheme.to_string());
    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<String>>()
        .join("&");
    let base = config.api_url.trim();
    let separator = if base.ends_with('/') { "" } else { "/" };
    Ok(format!("{base}{separator}submit.php?{query}"))
}
