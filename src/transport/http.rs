use std::thread;

use crossbeam_channel::RecvTimeoutError;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::config::ResolvedConfig;
use crate::error::{CatError, OpenError};
use crate::location::Location;
use crate::open::OpenContext;
use crate::source::ByteStream;
use crate::transport::Opener;

#[derive(Clone)]
pub struct HttpOpener {
    client: Client,
}

impl HttpOpener {
    pub fn new(config: &ResolvedConfig) -> Result<Self, CatError> {
        Ok(Self {
            client: build_client(config, "http")?,
        })
    }

    fn handle_status(response: Response, location: &Location) -> Result<Response, OpenError> {
        if response.status().is_success() {
            return Ok(response);
        }
        Err(OpenError::HttpStatus {
            url: location.redacted(),
            status: response.status().as_u16(),
        })
    }
}

impl Opener for HttpOpener {
    fn open(
        &self,
        location: &Location,
        ctx: &OpenContext,
    ) -> Result<Box<dyn ByteStream>, OpenError> {
        ctx.check()?;
        let request = self.client.get(location.as_str());
        let response = send_within(request, ctx, location.redacted())?;
        let response = Self::handle_status(response, location)?;
        Ok(Box::new(response))
    }
}

/// Sends `request` and waits for the response headers until the context
/// deadline. The body is not bounded by the deadline, only by the read
/// timeout. On expiry the request thread is abandoned.
pub(crate) fn send_within(
    request: RequestBuilder,
    ctx: &OpenContext,
    url: String,
) -> Result<Response, OpenError> {
    let Some(remaining) = ctx.remaining() else {
        return request.send().map_err(|err| map_request_error(err, url));
    };

    let (done, outcome) = crossbeam_channel::bounded(1);
    thread::spawn(move || {
        let _ = done.send(request.send());
    });
    match outcome.recv_timeout(remaining) {
        Ok(result) => result.map_err(|err| map_request_error(err, url)),
        Err(RecvTimeoutError::Timeout) => Err(OpenError::DeadlineExceeded),
        Err(RecvTimeoutError::Disconnected) => Err(OpenError::Http {
            url,
            message: "request thread exited without a response".to_string(),
        }),
    }
}

pub(crate) fn build_client(config: &ResolvedConfig, scheme: &str) -> Result<Client, CatError> {
    let setup_error = |message: String| CatError::TransportSetup {
        scheme: scheme.to_string(),
        message,
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&config.user_agent).map_err(|err| setup_error(err.to_string()))?,
    );
    Client::builder()
        .default_headers(headers)
        .connect_timeout(config.open_timeout)
        .timeout(config.read_timeout)
        .build()
        .map_err(|err| setup_error(err.to_string()))
}

fn map_request_error(err: reqwest::Error, url: String) -> OpenError {
    if err.is_timeout() {
        return OpenError::DeadlineExceeded;
    }
    OpenError::Http {
        url,
        message: err.to_string(),
    }
}
