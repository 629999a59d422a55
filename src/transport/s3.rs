use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::blocking::{Client, Response};
use sha2::{Digest, Sha256};

use crate::config::ResolvedConfig;
use crate::error::{CatError, ConstructionError, OpenError};
use crate::location::Location;
use crate::open::OpenContext;
use crate::source::ByteStream;
use crate::transport::Opener;
use crate::transport::http::{build_client, send_within};

type HmacSha256 = Hmac<Sha256>;

const SERVICE: &str = "s3";
const ALGORITHM: &str = "AWS4-HMAC-SHA256";
// SHA-256 of an empty payload.
const EMPTY_PAYLOAD_SHA256: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
const MAX_ERROR_BODY: usize = 512;

// s3://<bucket>/<key>?region=..&access_key_id=..&secret_access_key=..
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Location {
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    pub key: String,
}

impl S3Location {
    pub fn from_location(location: &Location) -> Result<Self, ConstructionError> {
        let redacted = location.redacted();
        let required = |name: &str| {
            location
                .query_value(name)
                .filter(|value| !value.is_empty())
        };

        let region =
            required("region").ok_or_else(|| ConstructionError::MissingRegion(redacted.clone()))?;
        let access_key_id = required("access_key_id")
            .ok_or_else(|| ConstructionError::MissingAccessKeyId(redacted.clone()))?;
        let secret_access_key = required("secret_access_key")
            .ok_or_else(|| ConstructionError::MissingSecretAccessKey(redacted.clone()))?;

        let bucket = location.host().to_string();
        if bucket.is_empty() {
            return Err(ConstructionError::MissingBucket(redacted));
        }
        let key = location.path().trim_matches('/').to_string();
        if key.is_empty() {
            return Err(ConstructionError::MissingObjectKey(redacted));
        }

        Ok(Self {
            region,
            access_key_id,
            secret_access_key,
            bucket,
            key,
        })
    }
}

/// Without an endpoint the virtual-hosted AWS URL is used; with one, the
/// request goes path-style to `<endpoint>/<bucket>/<key>`.
#[derive(Clone)]
pub struct S3Opener {
    client: Client,
    endpoint: Option<String>,
}

impl S3Opener {
    pub fn new(config: &ResolvedConfig) -> Result<Self, CatError> {
        Ok(Self {
            client: build_client(config, "s3")?,
            endpoint: config
                .s3_endpoint
                .as_ref()
                .map(|endpoint| endpoint.trim_end_matches('/').to_string()),
        })
    }

    fn object_url(&self, object: &S3Location) -> (String, String, String) {
        let encoded_key = uri_encode(&object.key, false);
        match &self.endpoint {
            Some(endpoint) => {
                let host = endpoint
                    .split_once("://")
                    .map(|(_, rest)| rest)
                    .unwrap_or(endpoint.as_str())
                    .to_string();
                let path = format!("/{}/{}", uri_encode(&object.bucket, true), encoded_key);
                (format!("{endpoint}{path}"), host, path)
            }
            None => {
                let host = format!("{}.s3.{}.amazonaws.com", object.bucket, object.region);
                let path = format!("/{encoded_key}");
                (format!("https://{host}{path}"), host, path)
            }
        }
    }

    fn handle_status(response: Response, object: &S3Location) -> Result<Response, OpenError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let mut message = response
            .text()
            .unwrap_or_else(|_| "S3 request failed".to_string());
        if message.len() > MAX_ERROR_BODY {
            let mut end = MAX_ERROR_BODY;
            while !message.is_char_boundary(end) {
                end -= 1;
            }
            message.truncate(end);
        }
        Err(OpenError::S3Status {
            bucket: object.bucket.clone(),
            key: object.key.clone(),
            status,
            message,
        })
    }
}

impl Opener for S3Opener {
    fn open(
        &self,
        location: &Location,
        ctx: &OpenContext,
    ) -> Result<Box<dyn ByteStream>, OpenError> {
        let object = S3Location::from_location(location)
            .map_err(|err| OpenError::InvalidLocation(err.to_string()))?;
        ctx.check()?;

        let (url, host, canonical_uri) = self.object_url(&object);
        let signed = sign_get(&object, &host, &canonical_uri, Utc::now());
        let request = self
            .client
            .get(&url)
            .header("x-amz-date", &signed.amz_date)
            .header("x-amz-content-sha256", EMPTY_PAYLOAD_SHA256)
            .header(reqwest::header::AUTHORIZATION, &signed.authorization);
        let response =
            send_within(request, ctx, location.redacted()).map_err(|err| match err {
                OpenError::Http { message, .. } => OpenError::S3 {
                    bucket: object.bucket.clone(),
                    key: object.key.clone(),
                    message,
                },
                other => other,
            })?;
        let response = Self::handle_status(response, &object)?;
        Ok(Box::new(response))
    }

    fn validate(&self, location: &Location) -> Result<(), ConstructionError> {
        S3Location::from_location(location).map(|_| ())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub amz_date: String,
    pub authorization: String,
}

/// Signs an unpayloaded GET with AWS Signature Version 4. The signed headers
/// are `host`, `x-amz-content-sha256` and `x-amz-date`.
pub fn sign_get(
    object: &S3Location,
    host: &str,
    canonical_uri: &str,
    now: DateTime<Utc>,
) -> SignedHeaders {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();
    let scope = format!("{date}/{}/{SERVICE}/aws4_request", object.region);
    let signed_headers = "host;x-amz-content-sha256;x-amz-date";

    let canonical_request = format!(
        "GET\n{canonical_uri}\n\nhost:{host}\nx-amz-content-sha256:{EMPTY_PAYLOAD_SHA256}\nx-amz-date:{amz_date}\n\n{signed_headers}\n{EMPTY_PAYLOAD_SHA256}"
    );
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let key = signing_key(&object.secret_access_key, &date, &object.region, SERVICE);
    let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));
    let authorization = format!(
        "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
        object.access_key_id
    );

    SignedHeaders {
        amz_date,
        authorization,
    }
}

pub fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{secret}").as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length.
    let mut mac = HmacSha256::new_from_slice(key).expect("hmac key of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

pub fn uri_encode(value: &str, encode_slash: bool) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b'/' if !encode_slash => out.push('/'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
