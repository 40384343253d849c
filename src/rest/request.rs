use std::time::Duration;

use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION},
    multipart::{Form, Part},
    Client, Method, RequestBuilder,
};
use serde_json::Value;

use crate::{
    error::{Error, Result},
    ratelimit::LimitScope,
};

/// Header carrying the reason shown in the guild's audit log.
pub const AUDIT_LOG_REASON: &str = "x-audit-log-reason";

/// A file to upload along with a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileUpload {
    /// Name the file is shown with.
    pub file_name: String,
    /// Media type, e.g. `image/png`.
    pub content_type: Option<String>,
    /// File contents.
    pub data: Vec<u8>,
}

impl FileUpload {
    /// A file with the given name and contents.
    pub fn new(file_name: impl Into<String>, data: impl Into<Vec<u8>>) -> FileUpload {
        FileUpload {
            file_name: file_name.into(),
            content_type: None,
            data: data.into(),
        }
    }

    /// Set the media type.
    pub fn content_type(mut self, content_type: impl Into<String>) -> FileUpload {
        self.content_type = Some(content_type.into());
        self
    }
}

#[derive(Clone, Debug)]
enum Body {
    Empty,
    Json(Value),
    Multipart {
        payload: Option<Value>,
        files: Vec<FileUpload>,
    },
}

/// A request to the REST API, built once and handed to [`Discord::execute`].
///
/// `route` is the template the request is rate limited by (see
/// [`BucketKey`](crate::ratelimit::BucketKey)), `path` the concrete path it
/// is sent to:
///
/// ```ignore
/// let request = RestRequest::new(
///     Method::DELETE,
///     format!("channels/{channel}/messages/:message_id"),
///     format!("channels/{channel}/messages/{message}"),
/// )
/// .reason("spam")?;
/// ```
///
/// [`Discord::execute`]: super::Discord::execute
#[derive(Clone, Debug)]
pub struct RestRequest {
    pub(crate) method: Method,
    pub(crate) route: String,
    pub(crate) path: String,
    query: Vec<(&'static str, String)>,
    body: Body,
    headers: HeaderMap,
    pub(crate) scope: LimitScope,
    pub(crate) timeout: Option<Duration>,
}

impl RestRequest {
    /// A request without a body.
    pub fn new(method: Method, route: impl Into<String>, path: impl Into<String>) -> RestRequest {
        RestRequest {
            method,
            route: route.into(),
            path: path.into(),
            query: Vec::new(),
            body: Body::Empty,
            headers: HeaderMap::new(),
            scope: LimitScope::All,
            timeout: None,
        }
    }

    /// A `GET` request.
    pub fn get(route: impl Into<String>, path: impl Into<String>) -> RestRequest {
        RestRequest::new(Method::GET, route, path)
    }

    /// Route template the request is rate limited by.
    pub fn route(&self) -> &str {
        &self.route
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Add a query parameter.
    pub fn query(mut self, name: &'static str, value: impl ToString) -> RestRequest {
        self.query.push((name, value.to_string()));
        self
    }

    /// Send `payload` as the JSON body.
    ///
    /// If files are attached as well, it becomes the `payload_json` part.
    pub fn json(mut self, payload: Value) -> RestRequest {
        self.body = match self.body {
            Body::Multipart { files, .. } => Body::Multipart {
                payload: Some(payload),
                files,
            },
            _ => Body::Json(payload),
        };
        self
    }

    /// Attach files, turning the body into `multipart/form-data`.
    ///
    /// An empty list leaves the body as it is.
    pub fn files(mut self, files: Vec<FileUpload>) -> RestRequest {
        if files.is_empty() {
            return self;
        }

        self.body = match self.body {
            Body::Empty => Body::Multipart {
                payload: None,
                files,
            },
            Body::Json(payload) => Body::Multipart {
                payload: Some(payload),
                files,
            },
            Body::Multipart {
                payload,
                files: mut existing,
            } => {
                existing.extend(files);
                Body::Multipart {
                    payload,
                    files: existing,
                }
            }
        };
        self
    }

    /// Add an extra header.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> RestRequest {
        self.headers.insert(name, value);
        self
    }

    /// Set the audit log reason. The text is sent as is.
    pub fn reason(self, reason: &str) -> Result<RestRequest> {
        let value = HeaderValue::from_bytes(reason.as_bytes())
            .map_err(|_| Error::InvalidArgument("audit log reason contains control characters"))?;
        Ok(self.header(HeaderName::from_static(AUDIT_LOG_REASON), value))
    }

    /// Set the audit log reason if there is one.
    pub fn maybe_reason(self, reason: Option<&str>) -> Result<RestRequest> {
        match reason {
            Some(reason) => self.reason(reason),
            None => Ok(self),
        }
    }

    /// Skip the global limit, for requests authorized by a webhook token.
    pub fn exempt_from_global(mut self) -> RestRequest {
        if self.scope == LimitScope::All {
            self.scope = LimitScope::RouteOnly;
        }
        self
    }

    /// Skip every limit, for interaction callbacks.
    pub fn exempt_from_all(mut self) -> RestRequest {
        self.scope = LimitScope::Exempt;
        self
    }

    /// Give up with [`Error::TimedOut`] if the request, including every wait
    /// and retry, takes longer than `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> RestRequest {
        self.timeout = Some(timeout);
        self
    }

    /// Build a single attempt. Multipart bodies are rebuilt every time.
    pub(crate) fn build(&self, client: &Client, api_base: &str, token: &str) -> Result<RequestBuilder> {
        let url = format!("{}/{}", api_base, self.path.trim_start_matches('/'));

        let mut builder = client
            .request(self.method.clone(), url)
            .header(AUTHORIZATION, token)
            .headers(self.headers.clone());

        if !self.query.is_empty() {
            builder = builder.query(&self.query);
        }

        builder = match &self.body {
            Body::Empty => builder,
            Body::Json(payload) => builder.json(payload),
            Body::Multipart { payload, files } => builder.multipart(multipart(payload.as_ref(), files)?),
        };

        Ok(builder)
    }
}

fn multipart(payload: Option<&Value>, files: &[FileUpload]) -> Result<Form> {
    let mut form = Form::new();

    if let Some(payload) = payload {
        let part = Part::text(serde_json::to_string(payload)?).mime_str("application/json")?;
        form = form.part("payload_json", part);
    }

    for (n, file) in files.iter().enumerate() {
        let mut part = Part::bytes(file.data.clone()).file_name(file.file_name.clone());
        if let Some(content_type) = file.content_type.as_deref() {
            part = part.mime_str(content_type)?;
        }
        form = form.part(format!("files[{n}]"), part);
    }

    Ok(form)
}
